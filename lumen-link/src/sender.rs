//! Reliable sender
//!
//! Wraps frames in sequence-tagged envelopes and tracks the single
//! outstanding one through its [`SlotState`]. The sender can be driven by
//! hand (`begin`, `on_bytes`, `poll`, `abandon`) from any scheduler, or used
//! blocking with [`ReliableSender::send_reliable`], which busy-polls the port
//! against a [`Clock`] until the ack or the timeout.
//!
//! Nothing is retried; a timeout is handed back to the caller.

use lumen_hal::{Clock, UartRx, UartTx};
use lumen_protocol::{envelope, Frame, FrameError, FrameParser, Instruction};

use crate::slot::{SlotEvent, SlotState};

/// Largest payload expected back from the renderer (a pong)
const REPLY_LIMIT: usize = 16;

/// Bytes read from the port per poll
const RX_CHUNK: usize = 64;

/// How a reliable send ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendOutcome {
    Acked { seq: u8, rtt_micros: u64 },
    TimedOut { seq: u8 },
}

impl SendOutcome {
    pub fn is_acked(&self) -> bool {
        matches!(self, SendOutcome::Acked { .. })
    }

    pub fn seq(&self) -> u8 {
        match *self {
            SendOutcome::Acked { seq, .. } | SendOutcome::TimedOut { seq } => seq,
        }
    }
}

/// Send errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError<E> {
    /// A reliable send is already outstanding
    Busy,
    /// Waited with nothing outstanding
    NothingOutstanding,
    /// Frame could not be built
    Encode(FrameError),
    /// Frame payload above the configured packet size
    Oversize { len: u16, limit: u16 },
    /// Polygon vertex count outside the protocol range
    VertexCount(usize),
    /// Serial port failure
    Io(E),
}

impl<E> From<FrameError> for SendError<E> {
    fn from(e: FrameError) -> Self {
        SendError::Encode(e)
    }
}

/// Sender counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SenderStats {
    pub sent: u32,
    pub acked: u32,
    pub timed_out: u32,
    pub abandoned: u32,
    /// Acks that matched nothing (late, duplicate or while idle)
    pub stray_acks: u32,
}

/// Sequence counter, slot and reply parser for one link
#[derive(Debug, Clone)]
pub struct ReliableSender {
    slot: SlotState,
    next_seq: u8,
    parser: FrameParser,
    last_pong: Option<u32>,
    stats: SenderStats,
}

impl Default for ReliableSender {
    fn default() -> Self {
        Self::new()
    }
}

impl ReliableSender {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Sender whose first envelope carries `seq`
    pub fn starting_at(seq: u8) -> Self {
        Self {
            slot: SlotState::Idle,
            next_seq: seq,
            parser: FrameParser::with_limit(REPLY_LIMIT),
            last_pong: None,
            stats: SenderStats::default(),
        }
    }

    pub fn state(&self) -> SlotState {
        self.slot
    }

    /// Sequence byte the next envelope will carry
    pub fn next_seq(&self) -> u8 {
        self.next_seq
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    /// Wrap `inner` in an envelope, write it and arm the slot
    ///
    /// `now` should be read just before the call; it is the start of both
    /// the round trip and the timeout.
    pub fn begin<T: UartTx>(
        &mut self,
        tx: &mut T,
        inner: &Frame,
        now: u64,
        timeout_micros: u64,
    ) -> Result<u8, SendError<T::Error>> {
        self.transmit(tx, now, timeout_micros, |seq| envelope(seq, inner))
    }

    /// Write a throughput probe carrying `filler` and arm the slot
    pub fn begin_probe<T: UartTx>(
        &mut self,
        tx: &mut T,
        filler: &[u8],
        now: u64,
        timeout_micros: u64,
    ) -> Result<u8, SendError<T::Error>> {
        self.transmit(tx, now, timeout_micros, |seq| {
            Instruction::LinkProbe { seq, filler }.to_frame()
        })
    }

    fn transmit<T, F>(
        &mut self,
        tx: &mut T,
        now: u64,
        timeout_micros: u64,
        build: F,
    ) -> Result<u8, SendError<T::Error>>
    where
        T: UartTx,
        F: FnOnce(u8) -> Result<Frame, FrameError>,
    {
        if !self.slot.is_idle() {
            return Err(SendError::Busy);
        }

        let seq = self.next_seq;
        let bytes = build(seq)?.encode_to_vec()?;
        tx.write_blocking(&bytes).map_err(SendError::Io)?;
        tx.flush().map_err(SendError::Io)?;

        self.next_seq = seq.wrapping_add(1);
        self.slot = self.slot.transition(SlotEvent::Transmit {
            seq,
            at: now,
            timeout_micros,
        });
        self.stats.sent = self.stats.sent.wrapping_add(1);
        trace!("Sent seq {} ({} bytes)", seq, bytes.len());
        Ok(seq)
    }

    /// Feed bytes received from the renderer
    pub fn on_bytes(&mut self, bytes: &[u8], now: u64) {
        for &byte in bytes {
            match self.parser.feed(byte) {
                Ok(Some(frame)) => self.on_frame(&frame, now),
                Ok(None) => {}
                Err(e) => debug!("Reply framing error: {}", e),
            }
        }
    }

    fn on_frame(&mut self, frame: &Frame, now: u64) {
        match Instruction::decode(frame) {
            Ok(Instruction::Ack { seq }) => {
                let before = self.slot;
                self.slot = before.transition(SlotEvent::Ack { seq, at: now });
                if self.slot == before {
                    self.stats.stray_acks = self.stats.stray_acks.wrapping_add(1);
                    debug!("Ignored ack {}", seq);
                }
            }
            Ok(Instruction::Pong { frames }) => self.last_pong = Some(frames),
            Ok(other) => trace!("Ignored reply {}", other.opcode()),
            Err(e) => debug!("Undecodable reply: {}", e),
        }
    }

    /// Check the clock and hand back a result once the slot resolves
    ///
    /// Returns `None` while waiting and when nothing is outstanding.
    pub fn poll(&mut self, now: u64) -> Option<SendOutcome> {
        self.slot = self.slot.transition(SlotEvent::Tick { now });
        let outcome = match self.slot {
            SlotState::Acked { seq, rtt_micros } => {
                self.stats.acked = self.stats.acked.wrapping_add(1);
                trace!("Seq {} acked in {} us", seq, rtt_micros);
                SendOutcome::Acked { seq, rtt_micros }
            }
            SlotState::TimedOut { seq } => {
                self.stats.timed_out = self.stats.timed_out.wrapping_add(1);
                warn!("Seq {} timed out", seq);
                SendOutcome::TimedOut { seq }
            }
            SlotState::Idle | SlotState::Sent { .. } => return None,
        };
        self.slot = self.slot.transition(SlotEvent::Collect);
        Some(outcome)
    }

    /// Give up on the outstanding send
    ///
    /// Returns the abandoned sequence byte. A late ack for it is ignored.
    pub fn abandon(&mut self) -> Option<u8> {
        let seq = self.slot.outstanding()?;
        self.slot = self.slot.transition(SlotEvent::Abandon);
        self.stats.abandoned = self.stats.abandoned.wrapping_add(1);
        debug!("Abandoned seq {}", seq);
        Some(seq)
    }

    /// Most recent heartbeat answer, consumed
    pub fn take_pong(&mut self) -> Option<u32> {
        self.last_pong.take()
    }

    /// Drop partial replies and any outstanding send
    ///
    /// Used after the line settings change under the parser.
    pub fn resync(&mut self) {
        self.abandon();
        self.parser.reset();
        self.last_pong = None;
    }

    /// Read whatever the port has pending and process it
    pub fn pump<R: UartRx, C: Clock>(&mut self, rx: &mut R, clock: &C) -> Result<usize, R::Error> {
        let mut buf = [0u8; RX_CHUNK];
        let n = rx.read_available(&mut buf)?;
        if n > 0 {
            self.on_bytes(&buf[..n], clock.now_micros());
        }
        Ok(n)
    }

    /// Busy-poll until the outstanding send resolves
    pub fn wait<R: UartRx, C: Clock>(
        &mut self,
        rx: &mut R,
        clock: &C,
    ) -> Result<SendOutcome, SendError<R::Error>> {
        if self.slot.is_idle() {
            return Err(SendError::NothingOutstanding);
        }
        loop {
            self.pump(rx, clock).map_err(SendError::Io)?;
            if let Some(outcome) = self.poll(clock.now_micros()) {
                return Ok(outcome);
            }
        }
    }

    /// Send `inner` in an envelope and block until acked or timed out
    pub fn send_reliable<P, C, E>(
        &mut self,
        port: &mut P,
        clock: &C,
        inner: &Frame,
        timeout_ms: u32,
    ) -> Result<SendOutcome, SendError<E>>
    where
        P: UartTx<Error = E> + UartRx<Error = E>,
        C: Clock,
    {
        let timeout_micros = u64::from(timeout_ms) * 1_000;
        self.begin(port, inner, clock.now_micros(), timeout_micros)?;
        self.wait(port, clock)
    }

    /// Send one probe and block until acked or timed out
    pub fn probe<P, C, E>(
        &mut self,
        port: &mut P,
        clock: &C,
        filler: &[u8],
        timeout_ms: u32,
    ) -> Result<SendOutcome, SendError<E>>
    where
        P: UartTx<Error = E> + UartRx<Error = E>,
        C: Clock,
    {
        let timeout_micros = u64::from(timeout_ms) * 1_000;
        self.begin_probe(port, filler, clock.now_micros(), timeout_micros)?;
        self.wait(port, clock)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::convert::Infallible;
    use std::vec::Vec;

    #[derive(Default)]
    struct Sink {
        bytes: Vec<u8>,
    }

    impl UartTx for Sink {
        type Error = Infallible;

        fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.bytes.extend_from_slice(data);
            Ok(())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn ack(seq: u8) -> [u8; 6] {
        [0xAA, 0x55, 0xF2, 1, 0, seq]
    }

    #[test]
    fn test_envelope_on_the_wire() {
        let mut sender = ReliableSender::starting_at(9);
        let mut tx = Sink::default();
        let inner = Instruction::Present.to_frame().unwrap();

        assert_eq!(sender.begin(&mut tx, &inner, 0, 1_000), Ok(9));
        assert_eq!(tx.bytes, [0xAA, 0x55, 0xE0, 2, 0, 9, 0x51]);
        assert_eq!(sender.state().outstanding(), Some(9));
        assert_eq!(sender.next_seq(), 10);
    }

    #[test]
    fn test_second_send_is_busy() {
        let mut sender = ReliableSender::new();
        let mut tx = Sink::default();
        let inner = Instruction::Nop.to_frame().unwrap();

        sender.begin(&mut tx, &inner, 0, 1_000).unwrap();
        let written = tx.bytes.len();
        assert_eq!(sender.begin(&mut tx, &inner, 0, 1_000), Err(SendError::Busy));
        assert_eq!(tx.bytes.len(), written);
    }

    #[test]
    fn test_ack_resolves_with_round_trip() {
        let mut sender = ReliableSender::new();
        let mut tx = Sink::default();
        let inner = Instruction::Nop.to_frame().unwrap();
        sender.begin(&mut tx, &inner, 100, 1_000).unwrap();

        assert_eq!(sender.poll(200), None);
        sender.on_bytes(&ack(0), 350);
        assert_eq!(
            sender.poll(400),
            Some(SendOutcome::Acked {
                seq: 0,
                rtt_micros: 250
            })
        );
        assert!(sender.state().is_idle());
        assert_eq!(sender.poll(500), None);
    }

    #[test]
    fn test_ack_split_across_reads() {
        let mut sender = ReliableSender::new();
        let mut tx = Sink::default();
        sender
            .begin(&mut tx, &Instruction::Nop.to_frame().unwrap(), 0, 1_000)
            .unwrap();

        let bytes = ack(0);
        sender.on_bytes(&bytes[..4], 10);
        assert_eq!(sender.poll(10), None);
        sender.on_bytes(&bytes[4..], 20);
        assert!(sender.poll(20).is_some_and(|o| o.is_acked()));
    }

    #[test]
    fn test_sequence_wraps() {
        let mut sender = ReliableSender::starting_at(255);
        let mut tx = Sink::default();
        let inner = Instruction::Nop.to_frame().unwrap();

        sender.begin(&mut tx, &inner, 0, 1_000).unwrap();
        sender.on_bytes(&ack(255), 5);
        sender.poll(5).unwrap();
        assert_eq!(sender.begin(&mut tx, &inner, 10, 1_000), Ok(0));
    }

    #[test]
    fn test_stray_acks_counted() {
        let mut sender = ReliableSender::new();
        sender.on_bytes(&ack(3), 0);
        assert!(sender.state().is_idle());
        assert_eq!(sender.stats().stray_acks, 1);
    }

    #[test]
    fn test_pong_is_kept_until_taken() {
        let mut sender = ReliableSender::new();
        sender.on_bytes(&[0xAA, 0x55, 0xF1, 4, 0, 7, 0, 0, 0], 0);
        assert_eq!(sender.take_pong(), Some(7));
        assert_eq!(sender.take_pong(), None);
    }

    #[test]
    fn test_abandon_then_late_ack() {
        let mut sender = ReliableSender::new();
        let mut tx = Sink::default();
        let inner = Instruction::Nop.to_frame().unwrap();
        sender.begin(&mut tx, &inner, 0, 1_000).unwrap();

        assert_eq!(sender.abandon(), Some(0));
        assert_eq!(sender.abandon(), None);

        // Next send goes out with a fresh sequence byte
        assert_eq!(sender.begin(&mut tx, &inner, 10, 1_000), Ok(1));
        sender.on_bytes(&ack(0), 20);
        assert_eq!(sender.poll(20), None);
        assert_eq!(sender.stats().stray_acks, 1);
        assert_eq!(sender.stats().abandoned, 1);
    }
}
