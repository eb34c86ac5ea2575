//! # Infrared Remote
//!
//! [`Remote`] polls an [`IrDecoder`] at a bounded rate and translates NEC
//! command bytes from the classroom remote into [`IrCommand`]s.
//!
//! [`NecReceiver`] is a non-blocking NEC decoder. It never touches the pin
//! itself: an interrupt handler or async task timestamps every edge of the
//! (active-low) receiver output and feeds it in with [`NecReceiver::on_edge`].

use core::fmt;

use embassy_time::{Duration, Instant};

use crate::config::RemoteConfig;

/// One decoded NEC frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrFrame {
    /// 8-bit address, or 16-bit for extended NEC.
    pub address: u16,
    pub command: u8,
    /// Auto-repeat sent while a button is held down.
    pub repeat: bool,
}

/// Source of decoded IR frames.
pub trait IrDecoder {
    /// Begin listening.
    fn start(&mut self);
    /// The frame waiting to be consumed, if any.
    fn decode(&mut self) -> Option<IrFrame>;
    /// Release the current frame and listen for the next one.
    fn resume(&mut self);
}

/// Buttons of the classroom remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrCommand {
    /// A command byte the remote should not send.
    Error,
    ChDown,
    Ch,
    ChUp,
    Prev,
    Next,
    Play,
    VolDown,
    VolUp,
    Eq,
    Num0,
    Num100,
    Num200,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,
}

const COMMANDS: [(IrCommand, u8, &str); 21] = [
    (IrCommand::ChDown, 69, "CH-"),
    (IrCommand::Ch, 70, "CH"),
    (IrCommand::ChUp, 71, "CH+"),
    (IrCommand::Prev, 68, "<<"),
    (IrCommand::Next, 64, ">>"),
    (IrCommand::Play, 67, "PLAY"),
    (IrCommand::VolDown, 7, "-"),
    (IrCommand::VolUp, 21, "+"),
    (IrCommand::Eq, 9, "EQ"),
    (IrCommand::Num0, 22, "0"),
    (IrCommand::Num100, 25, "100+"),
    (IrCommand::Num200, 13, "200+"),
    (IrCommand::Num1, 12, "1"),
    (IrCommand::Num2, 24, "2"),
    (IrCommand::Num3, 94, "3"),
    (IrCommand::Num4, 8, "4"),
    (IrCommand::Num5, 28, "5"),
    (IrCommand::Num6, 90, "6"),
    (IrCommand::Num7, 66, "7"),
    (IrCommand::Num8, 82, "8"),
    (IrCommand::Num9, 74, "9"),
];

impl IrCommand {
    /// Translate a raw NEC command byte. `0` is "no command".
    pub fn from_code(code: u8) -> Option<Self> {
        if code == 0 {
            return None;
        }
        let command = COMMANDS
            .iter()
            .find(|(_, raw, _)| *raw == code)
            .map_or(IrCommand::Error, |(command, _, _)| *command);
        Some(command)
    }

    /// Raw NEC command byte; `0` for [`IrCommand::Error`].
    pub fn code(self) -> u8 {
        self.entry().map_or(0, |(_, raw, _)| raw)
    }

    /// Label printed on the button.
    pub fn label(self) -> &'static str {
        self.entry().map_or("ERROR", |(_, _, label)| label)
    }

    pub fn is_valid(self) -> bool {
        self != IrCommand::Error
    }

    fn entry(self) -> Option<(IrCommand, u8, &'static str)> {
        COMMANDS.iter().copied().find(|(command, _, _)| *command == self)
    }
}

impl fmt::Display for IrCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rate-limited front end over an [`IrDecoder`].
pub struct Remote<D: IrDecoder> {
    decoder: D,
    poll_period: Duration,
    last_poll: Option<Instant>,
    current: Option<IrFrame>,
}

impl<D: IrDecoder> Remote<D> {
    pub fn new(decoder: D, config: RemoteConfig) -> Self {
        Self {
            decoder,
            poll_period: config.poll_period,
            last_poll: None,
            current: None,
        }
    }

    pub fn init(&mut self) {
        self.decoder.start();
        info!("remote: listening");
    }

    /// Poll the decoder. True when a fresh, non-repeat, non-empty command arrived.
    ///
    /// Calls within the poll period of the last accepted poll return false
    /// without touching the decoder.
    pub fn command_received(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_poll {
            if now.saturating_duration_since(last) < self.poll_period {
                return false;
            }
        }
        self.last_poll = Some(now);

        let frame = self.decoder.decode();
        self.decoder.resume();
        self.current = frame.filter(|frame| !frame.repeat && frame.command > 0);
        self.current.is_some()
    }

    /// The command received since the last poll, if any.
    pub fn query(&mut self, now: Instant) -> Option<IrCommand> {
        if self.command_received(now) {
            self.current.and_then(|frame| IrCommand::from_code(frame.command))
        } else {
            None
        }
    }

    pub fn is_valid(command: Option<IrCommand>) -> bool {
        command.is_some_and(IrCommand::is_valid)
    }

    pub fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }
}

/// A level change on the IR receiver output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrEdge {
    /// Level after the edge.
    pub high: bool,
    pub at: Instant,
}

impl IrEdge {
    pub fn rising(at: Instant) -> Self {
        Self { high: true, at }
    }

    pub fn falling(at: Instant) -> Self {
        Self { high: false, at }
    }
}

// NEC timing windows (µs)
const LEAD_MARK: (u64, u64) = (8_000, 10_000);
const LEAD_SPACE: (u64, u64) = (3_500, 5_000);
const REPEAT_SPACE: (u64, u64) = (1_750, 2_750);
const BIT_MARK: (u64, u64) = (200, 1_000);
const BIT_SPACE: (u64, u64) = (200, 2_500);
const ONE_SPACE_MIN: u64 = 1_200;
const FRAME_BITS: u8 = 32;

fn within(us: u64, (min, max): (u64, u64)) -> bool {
    (min..=max).contains(&us)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NecState {
    Idle,
    LeadMark,
    LeadSpace,
    /// Mark before bit `n`; bit 32 is the stop mark.
    BitMark(u8),
    BitSpace(u8),
}

/// Edge-driven NEC decoder.
pub struct NecReceiver {
    listening: bool,
    state: NecState,
    last_edge: Instant,
    bits: u32,
    last_frame: Option<IrFrame>,
    pending: Option<IrFrame>,
}

impl Default for NecReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl NecReceiver {
    pub const fn new() -> Self {
        Self {
            listening: false,
            state: NecState::Idle,
            last_edge: Instant::from_ticks(0),
            bits: 0,
            last_frame: None,
            pending: None,
        }
    }

    /// Feed one edge of the receiver output.
    pub fn on_edge(&mut self, edge: IrEdge) {
        if !self.listening {
            return;
        }
        let us = edge.at.saturating_duration_since(self.last_edge).as_micros();
        self.last_edge = edge.at;

        self.state = match (self.state, edge.high) {
            // a falling edge always starts a mark
            (NecState::LeadSpace, false) if within(us, LEAD_SPACE) => {
                self.bits = 0;
                NecState::BitMark(0)
            }
            (NecState::LeadSpace, false) if within(us, REPEAT_SPACE) => {
                self.repeat();
                NecState::Idle
            }
            (NecState::BitSpace(n), false) if within(us, BIT_SPACE) => {
                if us > ONE_SPACE_MIN {
                    self.bits |= 1 << n;
                }
                NecState::BitMark(n + 1)
            }
            (_, false) => NecState::LeadMark,

            (NecState::LeadMark, true) if within(us, LEAD_MARK) => NecState::LeadSpace,
            (NecState::BitMark(FRAME_BITS), true) if within(us, BIT_MARK) => {
                self.complete();
                NecState::Idle
            }
            (NecState::BitMark(n), true) if within(us, BIT_MARK) => NecState::BitSpace(n),
            (_, true) => NecState::Idle,
        };
    }

    fn complete(&mut self) {
        let [address, address_inv, command, command_inv] = self.bits.to_le_bytes();
        if command != !command_inv {
            debug!("nec: bad command checksum {=u32:#x}", self.bits);
            return;
        }
        let address = if address == !address_inv {
            u16::from(address)
        } else {
            u16::from_le_bytes([address, address_inv])
        };
        let frame = IrFrame {
            address,
            command,
            repeat: false,
        };
        self.last_frame = Some(frame);
        self.pending = Some(frame);
    }

    fn repeat(&mut self) {
        if let Some(frame) = self.last_frame {
            self.pending = Some(IrFrame {
                repeat: true,
                ..frame
            });
        }
    }
}

impl IrDecoder for NecReceiver {
    fn start(&mut self) {
        self.listening = true;
        self.state = NecState::Idle;
        self.pending = None;
    }

    fn decode(&mut self) -> Option<IrFrame> {
        self.pending
    }

    fn resume(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDecoder;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    /// Edge timestamps of a full NEC frame starting at `t0`.
    fn nec_frame(t0: u64, bytes: [u8; 4]) -> std::vec::Vec<IrEdge> {
        let mut edges = std::vec::Vec::new();
        let mut t = t0;
        let mark = |t: &mut u64, mark_us: u64, space_us: u64, edges: &mut std::vec::Vec<IrEdge>| {
            edges.push(IrEdge::falling(Instant::from_micros(*t)));
            *t += mark_us;
            edges.push(IrEdge::rising(Instant::from_micros(*t)));
            *t += space_us;
        };
        mark(&mut t, 9_000, 4_500, &mut edges);
        let bits = u32::from_le_bytes(bytes);
        for n in 0..32 {
            let space = if bits & (1 << n) != 0 { 1_690 } else { 560 };
            mark(&mut t, 560, space, &mut edges);
        }
        mark(&mut t, 560, 0, &mut edges);
        edges
    }

    fn nec_repeat(t0: u64) -> std::vec::Vec<IrEdge> {
        std::vec![
            IrEdge::falling(Instant::from_micros(t0)),
            IrEdge::rising(Instant::from_micros(t0 + 9_000)),
            IrEdge::falling(Instant::from_micros(t0 + 11_250)),
            IrEdge::rising(Instant::from_micros(t0 + 11_810)),
        ]
    }

    fn feed(receiver: &mut NecReceiver, edges: &[IrEdge]) {
        for edge in edges {
            receiver.on_edge(*edge);
        }
    }

    fn started() -> NecReceiver {
        let mut receiver = NecReceiver::new();
        receiver.start();
        receiver
    }

    #[test]
    fn test_command_table() {
        assert_eq!(IrCommand::from_code(0), None);
        assert_eq!(IrCommand::from_code(71), Some(IrCommand::ChUp));
        assert_eq!(IrCommand::from_code(74), Some(IrCommand::Num9));
        assert_eq!(IrCommand::from_code(200), Some(IrCommand::Error));
        for (command, code, label) in COMMANDS {
            assert_eq!(IrCommand::from_code(code), Some(command));
            assert_eq!(command.code(), code);
            assert_eq!(command.label(), label);
            assert!(command.is_valid());
        }
        assert_eq!(IrCommand::Error.code(), 0);
        assert_eq!(IrCommand::Num100.to_string(), "100+");
    }

    #[test]
    fn test_validity() {
        assert!(Remote::<FakeDecoder>::is_valid(Some(IrCommand::Play)));
        assert!(!Remote::<FakeDecoder>::is_valid(Some(IrCommand::Error)));
        assert!(!Remote::<FakeDecoder>::is_valid(None));
    }

    #[test]
    fn test_init_starts_decoder() {
        let decoder = FakeDecoder::new();
        let mut remote = Remote::new(decoder.clone(), RemoteConfig::default());
        assert!(!decoder.started());
        remote.init();
        assert!(decoder.started());
    }

    #[test]
    fn test_query_translates_button() {
        let decoder = FakeDecoder::new();
        let mut remote = Remote::new(decoder.clone(), RemoteConfig::default());
        decoder.press(70);
        assert_eq!(remote.query(at(0)), Some(IrCommand::Ch));
        assert_eq!(remote.query(at(100)), None);
    }

    #[test]
    fn test_polls_are_rate_limited() {
        let decoder = FakeDecoder::new();
        let mut remote = Remote::new(decoder.clone(), RemoteConfig::default());
        decoder.press(71);
        decoder.press(69);

        assert_eq!(remote.query(at(1000)), Some(IrCommand::ChUp));
        assert_eq!(remote.query(at(1019)), None);
        assert_eq!(decoder.decodes(), 1);
        assert_eq!(remote.query(at(1020)), Some(IrCommand::ChDown));
    }

    #[test]
    fn test_repeats_and_empty_commands_are_dropped() {
        let decoder = FakeDecoder::new();
        let mut remote = Remote::new(decoder.clone(), RemoteConfig::default());
        decoder.push(IrFrame {
            address: 0,
            command: 67,
            repeat: true,
        });
        decoder.press(0);
        decoder.press(67);

        assert!(!remote.command_received(at(0)));
        assert!(!remote.command_received(at(20)));
        assert!(remote.command_received(at(40)));
    }

    #[test]
    fn test_unknown_code_is_error() {
        let decoder = FakeDecoder::new();
        let mut remote = Remote::new(decoder.clone(), RemoteConfig::default());
        decoder.press(1);
        let command = remote.query(at(0));
        assert_eq!(command, Some(IrCommand::Error));
        assert!(!Remote::<FakeDecoder>::is_valid(command));
    }

    #[test]
    fn test_nec_frame_decodes() {
        let mut receiver = started();
        feed(&mut receiver, &nec_frame(0, [0x00, 0xFF, 71, !71]));
        assert_eq!(
            receiver.decode(),
            Some(IrFrame {
                address: 0,
                command: 71,
                repeat: false
            })
        );
        receiver.resume();
        assert_eq!(receiver.decode(), None);
    }

    #[test]
    fn test_nec_extended_address() {
        let mut receiver = started();
        feed(&mut receiver, &nec_frame(0, [0x34, 0x12, 9, !9]));
        let frame = receiver.decode().unwrap();
        assert_eq!(frame.address, 0x1234);
        assert_eq!(frame.command, 9);
    }

    #[test]
    fn test_nec_bad_checksum_is_dropped() {
        let mut receiver = started();
        feed(&mut receiver, &nec_frame(0, [0x00, 0xFF, 71, 0]));
        assert_eq!(receiver.decode(), None);
    }

    #[test]
    fn test_nec_repeat_code() {
        let mut receiver = started();
        feed(&mut receiver, &nec_repeat(0));
        assert_eq!(receiver.decode(), None);

        feed(&mut receiver, &nec_frame(100_000, [0x00, 0xFF, 28, !28]));
        receiver.resume();
        feed(&mut receiver, &nec_repeat(200_000));
        assert_eq!(
            receiver.decode(),
            Some(IrFrame {
                address: 0,
                command: 28,
                repeat: true
            })
        );
    }

    #[test]
    fn test_nec_recovers_from_noise() {
        let mut receiver = started();
        feed(
            &mut receiver,
            &[
                IrEdge::falling(Instant::from_micros(0)),
                IrEdge::rising(Instant::from_micros(300)),
            ],
        );
        feed(&mut receiver, &nec_frame(5_000, [0x00, 0xFF, 90, !90]));
        assert_eq!(receiver.decode().map(|f| f.command), Some(90));
    }

    #[test]
    fn test_nec_ignores_edges_until_started() {
        let mut receiver = NecReceiver::new();
        feed(&mut receiver, &nec_frame(0, [0x00, 0xFF, 71, !71]));
        assert_eq!(receiver.decode(), None);
    }

    #[test]
    fn test_remote_over_nec_receiver() {
        let mut remote = Remote::new(NecReceiver::new(), RemoteConfig::default());
        remote.init();
        feed(remote.decoder_mut(), &nec_frame(0, [0x00, 0xFF, 68, !68]));
        assert_eq!(remote.query(at(100)), Some(IrCommand::Prev));

        feed(remote.decoder_mut(), &nec_repeat(150_000));
        assert_eq!(remote.query(at(200)), None);
    }
}
