//! Compile-time configuration for the robot.
//!
//! PWM ceilings, default speed, sonar clearance and polling periods. Pin
//! assignments are board specific and live with the firmware binary.

use embassy_time::Duration;

use crate::robot::motor_driver::MotorError;

/// Full-scale PWM value of the 8-bit duty cycle used by the motor driver.
pub const MAX_PWM: u8 = 255;

/// Speed used when a command omits it and nothing has been commanded yet (%).
pub const DEFAULT_SPEED: u8 = 50;

/// Readings strictly above this distance count as a clear path (cm).
pub const CLEARANCE_CM: u16 = 10;

/// Sonar measurements per second.
pub const SONAR_RATE_HZ: u32 = 20;

/// Pings per sonar measurement; the median of the echoes is reported.
pub const SONAR_SAMPLES: usize = 5;

/// Upper bound on the number of pings per measurement.
pub const SONAR_MAX_SAMPLES: usize = 16;

/// Echoes beyond this distance are treated as "no echo" (cm).
pub const SONAR_MAX_DISTANCE_CM: u16 = 500;

/// Minimum time between two accepted IR remote polls (ms).
pub const IR_POLL_PERIOD_MS: u64 = 20;

/// What to do with a speed percentage above 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpeedPolicy {
    /// Saturate to 100 %.
    Clamp,
    /// Refuse the command with [`MotorError::InvalidSpeed`].
    Reject,
}

impl SpeedPolicy {
    /// Validate a speed percentage under this policy.
    pub fn apply(self, percent: u8) -> Result<u8, MotorError> {
        match self {
            SpeedPolicy::Clamp => Ok(percent.min(100)),
            SpeedPolicy::Reject if percent > 100 => Err(MotorError::InvalidSpeed),
            SpeedPolicy::Reject => Ok(percent),
        }
    }
}

/// Per-motor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorConfig {
    /// PWM ceiling reached at 100 % speed.
    pub max_pwm: u8,
    /// Speed used by `drive(None)` and an idle `set_speed(None)` (%).
    pub default_speed: u8,
    pub policy: SpeedPolicy,
}

impl MotorConfig {
    pub const fn new(max_pwm: u8, default_speed: u8) -> Self {
        Self {
            max_pwm,
            default_speed: if default_speed > 100 { 100 } else { default_speed },
            policy: SpeedPolicy::Clamp,
        }
    }

    pub const fn with_policy(mut self, policy: SpeedPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self::new(MAX_PWM, DEFAULT_SPEED)
    }
}

/// Configuration of the two-wheel drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveConfig {
    pub left: MotorConfig,
    pub right: MotorConfig,
    /// Speed used when a drive command omits it and no speed is remembered (%).
    pub default_speed: u8,
    pub policy: SpeedPolicy,
}

impl DriveConfig {
    /// Both wheels share the default speed; each has its own PWM ceiling.
    pub const fn new(left_max_pwm: u8, right_max_pwm: u8, default_speed: u8) -> Self {
        Self {
            left: MotorConfig::new(left_max_pwm, default_speed),
            right: MotorConfig::new(right_max_pwm, default_speed),
            default_speed: if default_speed > 100 { 100 } else { default_speed },
            policy: SpeedPolicy::Clamp,
        }
    }

    /// Apply one speed policy to the drive and both wheels.
    pub const fn with_policy(mut self, policy: SpeedPolicy) -> Self {
        self.left = self.left.with_policy(policy);
        self.right = self.right.with_policy(policy);
        self.policy = policy;
        self
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self::new(MAX_PWM, MAX_PWM, DEFAULT_SPEED)
    }
}

/// Ultrasonic sensor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SonarConfig {
    pub clearance_cm: u16,
    pub rate_hz: u32,
    /// Clamped to `1..=SONAR_MAX_SAMPLES`.
    pub samples: usize,
}

impl SonarConfig {
    pub const fn new(clearance_cm: u16, rate_hz: u32) -> Self {
        Self {
            clearance_cm,
            rate_hz,
            samples: SONAR_SAMPLES,
        }
    }

    pub const fn with_samples(mut self, samples: usize) -> Self {
        self.samples = if samples == 0 {
            1
        } else if samples > SONAR_MAX_SAMPLES {
            SONAR_MAX_SAMPLES
        } else {
            samples
        };
        self
    }

    /// Minimum interval between two physical measurements.
    pub const fn period(&self) -> Duration {
        let hz = if self.rate_hz == 0 { 1 } else { self.rate_hz };
        Duration::from_millis(1000 / hz as u64)
    }
}

impl Default for SonarConfig {
    fn default() -> Self {
        Self::new(CLEARANCE_CM, SONAR_RATE_HZ)
    }
}

/// IR remote polling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteConfig {
    pub poll_period: Duration,
}

impl RemoteConfig {
    pub const fn new(poll_period_ms: u64) -> Self {
        Self {
            poll_period: Duration::from_millis(poll_period_ms),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::new(IR_POLL_PERIOD_MS)
    }
}
