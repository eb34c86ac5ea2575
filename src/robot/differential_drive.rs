//! # Differential Drive
//!
//! Two [`Motor`]s steered as one actuator. Turning is done on the spot by
//! running the wheels in opposite directions.

use core::fmt;

use embedded_hal::{digital::OutputPin, pwm::SetDutyCycle};

use crate::config::{DriveConfig, SpeedPolicy};
use crate::robot::motor_driver::{Motor, MotorError};

pub use crate::robot::motor_driver::enabled_str;

/// Aggregate state of the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i8)]
pub enum DriveState {
    Reverse = -1,
    Stopped = 0,
    Forward = 1,
    TurnLeft = 2,
    TurnRight = 3,
}

impl DriveState {
    pub fn as_str(self) -> &'static str {
        match self {
            DriveState::Reverse => "REVERSE",
            DriveState::Stopped => "STOPPED",
            DriveState::Forward => "FORWARD",
            DriveState::TurnLeft => "TURN_LEFT",
            DriveState::TurnRight => "TURN_RIGHT",
        }
    }
}

impl fmt::Display for DriveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// High-level motion commands, independent of the wheel hardware.
///
/// Speeds are percentages. `None` means "keep the remembered speed".
pub trait DriveManager {
    fn enable(&mut self) -> Result<(), MotorError>;
    fn disable(&mut self) -> Result<(), MotorError>;
    fn stop(&mut self) -> Result<(), MotorError>;
    fn drive(&mut self, velocity: Option<i8>) -> Result<(), MotorError>;
    fn set_speed(&mut self, speed: Option<u8>) -> Result<(), MotorError>;
    fn fwd(&mut self, speed: Option<u8>) -> Result<(), MotorError>;
    fn rev(&mut self, speed: Option<u8>) -> Result<(), MotorError>;
    fn turn_left(&mut self, speed: Option<u8>) -> Result<(), MotorError>;
    fn turn_right(&mut self, speed: Option<u8>) -> Result<(), MotorError>;

    fn is_enabled(&self) -> bool;
    fn state(&self) -> DriveState;
    fn speed(&self) -> u8;
    fn velocity(&self) -> i8;
}

pub struct DifferentialDrive<LFwd, LRev, LPwm, RFwd, RRev, RPwm>
where
    LFwd: OutputPin,
    LRev: OutputPin,
    LPwm: SetDutyCycle,
    RFwd: OutputPin,
    RRev: OutputPin,
    RPwm: SetDutyCycle,
{
    left: Motor<LFwd, LRev, LPwm>,
    right: Motor<RFwd, RRev, RPwm>,
    default_speed: u8,
    policy: SpeedPolicy,
    enabled: bool,
    state: DriveState,
    speed: u8,
}

impl<LFwd, LRev, LPwm, RFwd, RRev, RPwm> DifferentialDrive<LFwd, LRev, LPwm, RFwd, RRev, RPwm>
where
    LFwd: OutputPin,
    LRev: OutputPin,
    LPwm: SetDutyCycle,
    RFwd: OutputPin,
    RRev: OutputPin,
    RPwm: SetDutyCycle,
{
    pub fn new(
        left_fwd: LFwd,
        left_rev: LRev,
        left_pwm: LPwm,
        right_fwd: RFwd,
        right_rev: RRev,
        right_pwm: RPwm,
        config: DriveConfig,
    ) -> Self {
        DifferentialDrive {
            left: Motor::new(left_fwd, left_rev, left_pwm, config.left),
            right: Motor::new(right_fwd, right_rev, right_pwm, config.right),
            default_speed: config.default_speed,
            policy: config.policy,
            enabled: true,
            state: DriveState::Stopped,
            speed: config.default_speed,
        }
    }

    pub fn init(&mut self) -> Result<(), MotorError> {
        self.left.init()?;
        self.right.init()?;
        info!("drive: initialised, default speed {}%", self.default_speed);
        Ok(())
    }

    pub fn state_str(&self) -> &'static str {
        self.state.as_str()
    }

    pub fn left(&self) -> &Motor<LFwd, LRev, LPwm> {
        &self.left
    }

    pub fn right(&self) -> &Motor<RFwd, RRev, RPwm> {
        &self.right
    }

    fn resolve_speed(&self, speed: Option<u8>) -> Result<u8, MotorError> {
        match speed {
            Some(percent) => self.policy.apply(percent),
            None if self.speed == 0 => Ok(self.default_speed),
            None => Ok(self.speed),
        }
    }

    /// Run the wheels at signed percentages, already validated to `-100..=100`.
    ///
    /// If either wheel fails, both are stopped and the drive reads `Stopped`.
    fn drive_wheels(&mut self, left: i8, right: i8) -> Result<(), MotorError> {
        let result = self
            .left
            .drive(Some(left))
            .and_then(|()| self.right.drive(Some(right)));
        if result.is_err() {
            self.halt();
        }
        result
    }

    /// Best-effort stop of both wheels after a failed command.
    fn halt(&mut self) {
        warn!("drive: wheel command failed, stopping both wheels");
        let _ = self.left.stop();
        let _ = self.right.stop();
        self.state = DriveState::Stopped;
    }

    fn straight(&mut self, velocity: i16) -> Result<(), MotorError> {
        let speed = velocity.unsigned_abs() as u8;
        let velocity = velocity as i8;
        self.drive_wheels(velocity, velocity)?;
        self.speed = speed;
        self.state = match velocity.signum() {
            -1 => DriveState::Reverse,
            0 => DriveState::Stopped,
            _ => DriveState::Forward,
        };
        debug!("drive: {} at {}%", self.state.as_str(), speed);
        Ok(())
    }

    fn spin(&mut self, state: DriveState, speed: u8) -> Result<(), MotorError> {
        let s = speed as i8;
        match state {
            DriveState::TurnLeft => self.drive_wheels(-s, s)?,
            _ => self.drive_wheels(s, -s)?,
        }
        self.speed = speed;
        self.state = state;
        debug!("drive: {} at {}%", state.as_str(), speed);
        Ok(())
    }
}

impl<LFwd, LRev, LPwm, RFwd, RRev, RPwm> DriveManager
    for DifferentialDrive<LFwd, LRev, LPwm, RFwd, RRev, RPwm>
where
    LFwd: OutputPin,
    LRev: OutputPin,
    LPwm: SetDutyCycle,
    RFwd: OutputPin,
    RRev: OutputPin,
    RPwm: SetDutyCycle,
{
    fn enable(&mut self) -> Result<(), MotorError> {
        let left = self.left.enable();
        let right = self.right.enable();
        self.enabled = true;
        info!("drive: {}", enabled_str(true));
        left.and(right)
    }

    fn disable(&mut self) -> Result<(), MotorError> {
        let left = self.left.disable();
        let right = self.right.disable();
        self.enabled = false;
        info!("drive: {}", enabled_str(false));
        left.and(right)
    }

    /// Stop both wheels. The remembered speed is kept for the next command.
    ///
    /// Both wheels are always commanded; the first failure is returned.
    fn stop(&mut self) -> Result<(), MotorError> {
        let left = self.left.stop();
        let right = self.right.stop();
        self.state = DriveState::Stopped;
        debug!("drive: STOPPED");
        left.and(right)
    }

    fn drive(&mut self, velocity: Option<i8>) -> Result<(), MotorError> {
        match velocity {
            Some(v) => {
                let speed = i16::from(self.policy.apply(v.unsigned_abs())?);
                self.straight(if v < 0 { -speed } else { speed })
            }
            None => {
                let speed = self.resolve_speed(None)?;
                self.straight(i16::from(speed))
            }
        }
    }

    /// Change speed while keeping the current motion. A stopped drive starts forward.
    fn set_speed(&mut self, speed: Option<u8>) -> Result<(), MotorError> {
        let speed = self.resolve_speed(speed)?;
        let result = self
            .left
            .set_speed(Some(speed))
            .and_then(|()| self.right.set_speed(Some(speed)));
        if let Err(e) = result {
            self.halt();
            return Err(e);
        }
        if self.state == DriveState::Stopped {
            self.state = DriveState::Forward;
        }
        self.speed = speed;
        Ok(())
    }

    fn fwd(&mut self, speed: Option<u8>) -> Result<(), MotorError> {
        let speed = self.resolve_speed(speed)?;
        self.straight(i16::from(speed))
    }

    fn rev(&mut self, speed: Option<u8>) -> Result<(), MotorError> {
        let speed = self.resolve_speed(speed)?;
        self.straight(-i16::from(speed))
    }

    fn turn_left(&mut self, speed: Option<u8>) -> Result<(), MotorError> {
        let speed = self.resolve_speed(speed)?;
        self.spin(DriveState::TurnLeft, speed)
    }

    fn turn_right(&mut self, speed: Option<u8>) -> Result<(), MotorError> {
        let speed = self.resolve_speed(speed)?;
        self.spin(DriveState::TurnRight, speed)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn state(&self) -> DriveState {
        self.state
    }

    fn speed(&self) -> u8 {
        self.speed
    }

    /// Counter-clockwise rotation is positive.
    fn velocity(&self) -> i8 {
        let speed = self.speed as i8;
        match self.state {
            DriveState::Forward | DriveState::TurnLeft => speed,
            DriveState::Reverse | DriveState::TurnRight => -speed,
            DriveState::Stopped => 0,
        }
    }
}
