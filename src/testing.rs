//! Test doubles for the `embedded-hal` traits and the sensor backends.

use core::convert::Infallible;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embassy_time::Instant;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};

use crate::robot::ir_remote::{IrDecoder, IrFrame};
use crate::robot::sonar::Ranger;

/// Output pin whose level stays observable after the pin is moved into a driver.
///
/// `set_failing(true)` makes every later write fail without touching the level.
#[derive(Clone, Default)]
pub struct MockPin {
    level: Rc<Cell<bool>>,
    writes: Rc<Cell<usize>>,
    failing: Rc<Cell<bool>>,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.level.get()
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    fn write(&self, level: bool) -> Result<(), PinError> {
        if self.failing.get() {
            return Err(PinError);
        }
        self.level.set(level);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

#[derive(Debug)]
pub struct PinError;

impl digital::Error for PinError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

impl digital::ErrorType for MockPin {
    type Error = PinError;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

/// PWM channel with an 8-bit range so fractions of 255 map one-to-one.
#[derive(Clone)]
pub struct MockPwm {
    duty: Rc<Cell<u16>>,
    max: u16,
}

impl MockPwm {
    pub fn new() -> Self {
        Self::with_max(255)
    }

    pub fn with_max(max: u16) -> Self {
        Self {
            duty: Rc::new(Cell::new(0)),
            max,
        }
    }

    pub fn duty(&self) -> u16 {
        self.duty.get()
    }
}

impl pwm::ErrorType for MockPwm {
    type Error = Infallible;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty.set(duty);
        Ok(())
    }
}

/// One wheel's observable outputs.
#[derive(Clone)]
pub struct WheelPins {
    pub fwd: MockPin,
    pub rev: MockPin,
    pub pwm: MockPwm,
}

impl WheelPins {
    pub fn new() -> Self {
        Self {
            fwd: MockPin::new(),
            rev: MockPin::new(),
            pwm: MockPwm::new(),
        }
    }

    /// `(forward pin, reverse pin, duty)`.
    pub fn outputs(&self) -> (bool, bool, u16) {
        (self.fwd.is_high(), self.rev.is_high(), self.pwm.duty())
    }
}

/// Input pin that replays a script of levels, then stays at the last one.
pub struct ScriptedPin {
    levels: VecDeque<bool>,
    last: bool,
}

impl ScriptedPin {
    /// `runs` is a list of `(level, number of reads)`.
    pub fn new(runs: &[(bool, usize)]) -> Self {
        let mut levels = VecDeque::new();
        for &(level, count) in runs {
            levels.extend(core::iter::repeat(level).take(count));
        }
        Self { levels, last: false }
    }
}

impl digital::ErrorType for ScriptedPin {
    type Error = Infallible;
}

impl InputPin for ScriptedPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        if let Some(level) = self.levels.pop_front() {
            self.last = level;
        }
        Ok(self.last)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// Delay that returns immediately and adds up what was requested.
#[derive(Default)]
pub struct NoopDelay {
    pub total_ns: u64,
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

/// Microsecond clock that moves forward by one tick on every read.
#[derive(Clone, Default)]
pub struct FakeClock {
    micros: Rc<Cell<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reader(&self) -> impl Fn() -> Instant {
        let micros = self.micros.clone();
        move || {
            let now = micros.get();
            micros.set(now + 1);
            Instant::from_micros(now)
        }
    }

    pub fn reads(&self) -> u64 {
        self.micros.get()
    }
}

/// Range finder that replays readings and counts pings.
#[derive(Clone, Default)]
pub struct FakeRanger {
    readings: Rc<RefCell<VecDeque<Result<u16, ()>>>>,
    pings: Rc<Cell<usize>>,
}

impl FakeRanger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, cm: u16) {
        self.readings.borrow_mut().push_back(Ok(cm));
    }

    pub fn push_error(&self) {
        self.readings.borrow_mut().push_back(Err(()));
    }

    pub fn pings(&self) -> usize {
        self.pings.get()
    }
}

impl Ranger for FakeRanger {
    type Error = ();

    fn ping_cm(&mut self) -> Result<u16, Self::Error> {
        self.pings.set(self.pings.get() + 1);
        self.readings.borrow_mut().pop_front().unwrap_or(Ok(0))
    }
}

/// Decoder that hands out queued frames one `resume` at a time.
#[derive(Clone, Default)]
pub struct FakeDecoder {
    frames: Rc<RefCell<VecDeque<IrFrame>>>,
    started: Rc<Cell<bool>>,
    decodes: Rc<Cell<usize>>,
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, frame: IrFrame) {
        self.frames.borrow_mut().push_back(frame);
    }

    pub fn press(&self, command: u8) {
        self.push(IrFrame {
            address: 0,
            command,
            repeat: false,
        });
    }

    pub fn started(&self) -> bool {
        self.started.get()
    }

    pub fn decodes(&self) -> usize {
        self.decodes.get()
    }
}

impl IrDecoder for FakeDecoder {
    fn start(&mut self) {
        self.started.set(true);
    }

    fn decode(&mut self) -> Option<IrFrame> {
        self.decodes.set(self.decodes.get() + 1);
        self.frames.borrow().front().copied()
    }

    fn resume(&mut self) {
        self.frames.borrow_mut().pop_front();
    }
}
