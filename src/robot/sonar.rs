//! # Ultrasonic Distance Sensor
//!
//! [`Sonar`] rate-limits and filters measurements from any [`Ranger`];
//! [`HcSr04`] is the bit-banged backend for the common HC-SR04 module.

use embassy_time::{Duration, Instant};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;

use crate::config::{SonarConfig, SONAR_MAX_DISTANCE_CM, SONAR_MAX_SAMPLES};

/// Round-trip echo time per centimetre of distance (µs).
pub const US_PER_CM: u32 = 57;

/// A single-shot range finder.
pub trait Ranger {
    type Error;

    /// Distance to the nearest obstacle in cm, `0` when nothing echoed back.
    fn ping_cm(&mut self) -> Result<u16, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SonarError {
    TriggerPin,
    EchoPin,
}

/// Convert an echo pulse width to centimetres, rounding to nearest.
/// Any echo at all reads as at least 1 cm.
pub fn echo_to_cm(echo_us: u32) -> u16 {
    let cm = (echo_us + US_PER_CM / 2) / US_PER_CM;
    cm.clamp(1, u32::from(u16::MAX)) as u16
}

/// Rate-limited distance sensor.
pub struct Sonar<R: Ranger> {
    ranger: R,
    config: SonarConfig,
    last_read: Option<Instant>,
    last_distance: u16,
}

impl<R: Ranger> Sonar<R> {
    pub fn new(ranger: R, config: SonarConfig) -> Self {
        Self {
            ranger,
            config: config.with_samples(config.samples),
            last_read: None,
            last_distance: 0,
        }
    }

    /// Fire one ping to settle the sensor. The result is discarded.
    pub fn init(&mut self) {
        let _ = self.ranger.ping_cm();
        info!(
            "sonar: clearance {} cm, {} Hz, {} samples",
            self.config.clearance_cm,
            self.config.rate_hz,
            self.config.samples
        );
    }

    pub fn clearance_cm(&self) -> u16 {
        self.config.clearance_cm
    }

    /// Latest distance in cm, `0` when nothing is in range.
    ///
    /// Measures at most once per period and returns the cached value in between.
    pub fn read(&mut self, now: Instant) -> u16 {
        let due = match self.last_read {
            Some(last) => now.saturating_duration_since(last) >= self.config.period(),
            None => true,
        };
        if due {
            self.last_read = Some(now);
            self.last_distance = self.measure();
        }
        self.last_distance
    }

    /// True when the path is clear beyond the clearance threshold.
    pub fn clear_ahead(&mut self, now: Instant) -> bool {
        self.read(now) > self.config.clearance_cm
    }

    /// True when something echoes back from within the clearance threshold.
    pub fn obstacle_ahead(&mut self, now: Instant) -> bool {
        let distance = self.read(now);
        distance != 0 && distance <= self.config.clearance_cm
    }

    /// Median of the configured number of pings, ignoring misses.
    fn measure(&mut self) -> u16 {
        let mut echoes: Vec<u16, SONAR_MAX_SAMPLES> = Vec::new();
        for _ in 0..self.config.samples {
            match self.ranger.ping_cm() {
                Ok(0) => {}
                Ok(cm) => {
                    let _ = echoes.push(cm);
                }
                Err(_) => warn!("sonar: ping failed"),
            }
        }
        if echoes.is_empty() {
            return 0;
        }
        echoes.sort_unstable();
        echoes[echoes.len() / 2]
    }
}

/// HC-SR04 driver.
///
/// Echo edges are timestamped with `clock`, normally `embassy_time::Instant::now`.
/// The delay only times the trigger pulse.
pub struct HcSr04<TRIG, ECHO, D, CLK>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    D: DelayNs,
    CLK: Fn() -> Instant,
{
    trig: TRIG,
    echo: ECHO,
    delay: D,
    clock: CLK,
    max_echo: Duration,
}

impl<TRIG, ECHO, D, CLK> HcSr04<TRIG, ECHO, D, CLK>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    D: DelayNs,
    CLK: Fn() -> Instant,
{
    pub fn new(trig: TRIG, echo: ECHO, delay: D, clock: CLK) -> Self {
        Self::with_max_distance(trig, echo, delay, clock, SONAR_MAX_DISTANCE_CM)
    }

    pub fn with_max_distance(
        trig: TRIG,
        echo: ECHO,
        delay: D,
        clock: CLK,
        max_distance_cm: u16,
    ) -> Self {
        Self {
            trig,
            echo,
            delay,
            clock,
            max_echo: Duration::from_micros(u64::from(max_distance_cm) * u64::from(US_PER_CM)),
        }
    }

    pub fn max_distance_cm(&self) -> u16 {
        (self.max_echo.as_micros() / u64::from(US_PER_CM)) as u16
    }

    fn trigger(&mut self) -> Result<(), SonarError> {
        self.trig.set_low().map_err(|_| SonarError::TriggerPin)?;
        self.delay.delay_us(2);
        self.trig.set_high().map_err(|_| SonarError::TriggerPin)?;
        self.delay.delay_us(10);
        self.trig.set_low().map_err(|_| SonarError::TriggerPin)
    }

    fn echo_high(&mut self) -> Result<bool, SonarError> {
        self.echo.is_high().map_err(|_| SonarError::EchoPin)
    }
}

impl<TRIG, ECHO, D, CLK> Ranger for HcSr04<TRIG, ECHO, D, CLK>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    D: DelayNs,
    CLK: Fn() -> Instant,
{
    type Error = SonarError;

    fn ping_cm(&mut self) -> Result<u16, SonarError> {
        // The module ignores triggers until its previous echo pulse has ended.
        if self.echo_high()? {
            return Ok(0);
        }
        self.trigger()?;

        let sent = (self.clock)();
        let rise = loop {
            let now = (self.clock)();
            if self.echo_high()? {
                break now;
            }
            if now.saturating_duration_since(sent) > self.max_echo {
                return Ok(0);
            }
        };

        let fall = loop {
            let now = (self.clock)();
            if !self.echo_high()? {
                break now;
            }
            if now.saturating_duration_since(rise) > self.max_echo {
                return Ok(0);
            }
        };

        let width_us = fall.saturating_duration_since(rise).as_micros();
        Ok(echo_to_cm(width_us.min(u64::from(u32::MAX)) as u32))
    }
}
