//! # H-bridge Motor Driver
//!
//! Driver for one DC motor behind an H-bridge with a forward input, a reverse
//! input and a PWM enable input (L298N, TB6612FNG and friends).
//!
//! The driver keeps the commanded direction and duty cycle even while the
//! motor is disabled, so `enable()` resumes exactly where `disable()` left off.

use core::fmt;

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::config::{MotorConfig, SpeedPolicy};

/// Full-scale value of the internal duty cycle.
pub const DUTY_SCALE: u16 = 255;

/// Errors that can occur during motor operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorError {
    /// GPIO pin operation failed
    GpioError,
    /// PWM operation failed
    PwmError,
    /// Speed above 100 % under [`SpeedPolicy::Reject`]
    InvalidSpeed,
}

impl fmt::Display for MotorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorError::GpioError => write!(f, "GPIO pin operation failed"),
            MotorError::PwmError => write!(f, "PWM operation failed"),
            MotorError::InvalidSpeed => write!(f, "Invalid speed value"),
        }
    }
}

/// Direction state of a single motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i8)]
pub enum MotorState {
    Reverse = -1,
    Stopped = 0,
    Forward = 1,
}

impl MotorState {
    /// Three-way sign of a signed velocity.
    pub fn from_velocity(velocity: i8) -> Self {
        match velocity.signum() {
            -1 => MotorState::Reverse,
            0 => MotorState::Stopped,
            _ => MotorState::Forward,
        }
    }

    /// Signed direction code: -1, 0 or 1.
    pub fn sign(self) -> i8 {
        self as i8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MotorState::Reverse => "REVERSE",
            MotorState::Stopped => "STOPPED",
            MotorState::Forward => "FORWARD",
        }
    }
}

impl fmt::Display for MotorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label for an enabled flag.
pub fn enabled_str(enabled: bool) -> &'static str {
    if enabled {
        "ENABLED"
    } else {
        "DISABLED"
    }
}

/// Scale a 0-100 percentage to a duty cycle in `0..=max_pwm`, rounding to nearest.
pub fn percent_to_pwm(percent: u8, max_pwm: u8) -> u8 {
    let percent = u16::from(percent.min(100));
    ((percent * u16::from(max_pwm) + 50) / 100) as u8
}

/// Inverse of [`percent_to_pwm`]. Exact round trip for any ceiling of at least 100.
pub fn pwm_to_percent(pwm: u8, max_pwm: u8) -> u8 {
    if max_pwm == 0 {
        return 0;
    }
    let max = u16::from(max_pwm);
    let pwm = u16::from(pwm).min(max);
    ((pwm * 100 + max / 2) / max) as u8
}

/// Single motor controller
#[derive(Debug)]
pub struct Motor<FWD, REV, PWM>
where
    FWD: OutputPin,
    REV: OutputPin,
    PWM: SetDutyCycle,
{
    fwd: FWD,
    rev: REV,
    pwm: PWM,
    max_pwm: u8,
    default_speed: u8,
    policy: SpeedPolicy,
    enabled: bool,
    state: MotorState,
    duty: u8,
}

impl<FWD, REV, PWM> Motor<FWD, REV, PWM>
where
    FWD: OutputPin,
    REV: OutputPin,
    PWM: SetDutyCycle,
{
    /// Create a new motor controller. Outputs are untouched until [`Motor::init`].
    pub fn new(fwd: FWD, rev: REV, pwm: PWM, config: MotorConfig) -> Self {
        Motor {
            fwd,
            rev,
            pwm,
            max_pwm: config.max_pwm,
            default_speed: config.default_speed,
            policy: config.policy,
            enabled: true,
            state: MotorState::Stopped,
            duty: 0,
        }
    }

    /// Drive all outputs to their idle level.
    pub fn init(&mut self) -> Result<(), MotorError> {
        self.send_motor_control()
    }

    pub fn enable(&mut self) -> Result<(), MotorError> {
        self.enabled = true;
        self.send_motor_control()
    }

    /// Cut the outputs without forgetting the commanded motion.
    pub fn disable(&mut self) -> Result<(), MotorError> {
        self.enabled = false;
        self.send_motor_control()
    }

    pub fn stop(&mut self) -> Result<(), MotorError> {
        self.state = MotorState::Stopped;
        self.duty = 0;
        self.send_motor_control()
    }

    /// Change speed without reversing. A stopped motor starts forward.
    ///
    /// `None` keeps the current duty, or uses the default speed when idle.
    pub fn set_speed(&mut self, speed: Option<u8>) -> Result<(), MotorError> {
        let duty = self.speed_to_pwm(speed)?;
        if self.state == MotorState::Stopped {
            self.state = MotorState::Forward;
        }
        self.duty = duty;
        self.send_motor_control()
    }

    /// Set direction and speed from a signed velocity in percent.
    ///
    /// `None` drives forward at the default speed.
    pub fn drive(&mut self, velocity: Option<i8>) -> Result<(), MotorError> {
        let (state, magnitude) = match velocity {
            Some(v) => (MotorState::from_velocity(v), v.unsigned_abs()),
            None => (MotorState::Forward, self.default_speed),
        };
        let duty = percent_to_pwm(self.policy.apply(magnitude)?, self.max_pwm);

        self.state = state;
        self.duty = duty;
        self.send_motor_control()
    }

    /// Switch to forward, keeping the duty cycle.
    pub fn fwd(&mut self) -> Result<(), MotorError> {
        self.state = MotorState::Forward;
        self.send_motor_control()
    }

    /// Switch to reverse, keeping the duty cycle.
    pub fn rev(&mut self) -> Result<(), MotorError> {
        self.state = MotorState::Reverse;
        self.send_motor_control()
    }

    /// Push the stored state to the pins.
    pub fn send_motor_control(&mut self) -> Result<(), MotorError> {
        if self.enabled {
            self.set_direction(self.state)?;
            self.set_pwm(self.duty)
        } else {
            self.set_pwm(0)?;
            self.set_direction(MotorState::Stopped)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn state_str(&self) -> &'static str {
        self.state.as_str()
    }

    /// Current duty cycle in `0..=max_pwm`.
    pub fn duty(&self) -> u8 {
        self.duty
    }

    /// Current speed in percent, recovered from the duty cycle.
    pub fn speed(&self) -> u8 {
        pwm_to_percent(self.duty, self.max_pwm)
    }

    /// Signed speed: direction times speed.
    pub fn velocity(&self) -> i8 {
        self.state.sign() * self.speed() as i8
    }

    fn speed_to_pwm(&self, speed: Option<u8>) -> Result<u8, MotorError> {
        match speed {
            Some(percent) => Ok(percent_to_pwm(self.policy.apply(percent)?, self.max_pwm)),
            None if self.duty == 0 => Ok(percent_to_pwm(self.default_speed, self.max_pwm)),
            None => Ok(self.duty),
        }
    }

    fn set_direction(&mut self, state: MotorState) -> Result<(), MotorError> {
        match state {
            MotorState::Forward => {
                self.rev.set_low().map_err(|_| MotorError::GpioError)?;
                self.fwd.set_high().map_err(|_| MotorError::GpioError)?;
            }
            MotorState::Reverse => {
                self.fwd.set_low().map_err(|_| MotorError::GpioError)?;
                self.rev.set_high().map_err(|_| MotorError::GpioError)?;
            }
            MotorState::Stopped => {
                self.fwd.set_low().map_err(|_| MotorError::GpioError)?;
                self.rev.set_low().map_err(|_| MotorError::GpioError)?;
            }
        }
        Ok(())
    }

    fn set_pwm(&mut self, duty: u8) -> Result<(), MotorError> {
        self.pwm
            .set_duty_cycle_fraction(u16::from(duty), DUTY_SCALE)
            .map_err(|_| MotorError::PwmError)
    }
}
