//! Characterization sweep over a simulated serial line

use std::cell::Cell;
use std::collections::VecDeque;
use std::convert::Infallible;

use lumen_hal::{BaudControl, Clock, UartConfig, UartRx, UartTx};
use lumen_link::characterize::MATRIX_FRAME_BYTES;
use lumen_link::{characterize, LinkConfig, LinkProfile, SweepError, SweepPlan};
use lumen_protocol::{FrameParser, Instruction, MAX_PAYLOAD_SIZE, SYNC0, SYNC1};

const ACK_LEN: usize = 6;

struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    fn new() -> Self {
        Self { now: Cell::new(0) }
    }

    fn advance(&self, micros: u64) {
        self.now.set(self.now.get() + micros);
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.now.get()
    }
}

/// Serial line whose time cost follows the baud rate
///
/// Writing a frame advances the clock by its transfer time plus the
/// transfer time of the ack. `drops` decides which probes get lost.
struct SimLine<'c> {
    clock: &'c ManualClock,
    baud: u32,
    parser: FrameParser,
    replies: VecDeque<u8>,
    drops: fn(u32, usize) -> bool,
    baud_changes: Vec<u32>,
}

impl<'c> SimLine<'c> {
    fn new(clock: &'c ManualClock, drops: fn(u32, usize) -> bool) -> Self {
        Self {
            clock,
            baud: 115_200,
            parser: FrameParser::with_limit(MAX_PAYLOAD_SIZE),
            replies: VecDeque::new(),
            drops,
            baud_changes: Vec::new(),
        }
    }
}

impl UartTx for SimLine<'_> {
    type Error = Infallible;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let line = UartConfig::with_baudrate(self.baud);
        self.clock.advance(line.transfer_micros(data.len()));

        for frame in self.parser.frames(data).flatten() {
            if let Ok(Instruction::LinkProbe { seq, .. }) = Instruction::decode(&frame) {
                if (self.drops)(self.baud, frame.payload.len()) {
                    continue;
                }
                self.clock.advance(line.transfer_micros(ACK_LEN));
                self.replies.extend([SYNC0, SYNC1, 0xF2, 1, 0, seq]);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl UartRx for SimLine<'_> {
    type Error = Infallible;

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_available(buf)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.replies.is_empty() {
            // Idle line; let time pass so timeouts can expire
            self.clock.advance(100);
            return Ok(0);
        }
        let n = buf.len().min(self.replies.len());
        for slot in &mut buf[..n] {
            *slot = self.replies.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl BaudControl for SimLine<'_> {
    type Error = Infallible;

    fn set_baudrate(&mut self, baudrate: u32) -> Result<(), Self::Error> {
        self.baud = baudrate;
        self.baud_changes.push(baudrate);
        Ok(())
    }

    fn baudrate(&self) -> u32 {
        self.baud
    }
}

fn never(_baud: u32, _len: usize) -> bool {
    false
}

fn plan() -> SweepPlan<'static> {
    SweepPlan {
        baud_rates: &[2_000_000, 4_000_000],
        packet_sizes: &[512, 4096],
        ..SweepPlan::default()
    }
}

#[test]
fn clean_line_picks_highest_frame_rate() {
    let clock = ManualClock::new();
    let mut line = SimLine::new(&clock, never);

    let report = characterize(&mut line, &clock, &plan()).unwrap();

    assert_eq!(report.entries.len(), 4);
    assert_eq!(report.target_bytes, MATRIX_FRAME_BYTES);
    for entry in &report.entries {
        assert_eq!((entry.sent, entry.acked), (30, 30));
        assert_eq!(entry.success_ratio(), 1.0);
    }

    // Probe frame plus ack, 10 bits per byte
    let slow_small = report.entry(2_000_000, 512).unwrap();
    assert_eq!(slow_small.mean_rtt_micros, 2_585 + 30);
    let fast_big = report.entry(4_000_000, 4096).unwrap();
    assert_eq!(fast_big.mean_rtt_micros, 10_252 + 15);

    let best = report.best().unwrap();
    assert_eq!((best.baudrate, best.packet_size), (4_000_000, 4096));
    let fastest = report
        .entries
        .iter()
        .map(|e| e.frame_rate(report.target_bytes))
        .fold(0.0f32, f32::max);
    assert_eq!(best.frame_rate, fastest);

    // Sweep order, then back to where it started
    assert_eq!(line.baud_changes, [2_000_000, 4_000_000, 115_200]);
}

#[test]
fn lossy_combination_is_never_chosen() {
    fn big_packets_at_4m(baud: u32, len: usize) -> bool {
        baud == 4_000_000 && len == 4096
    }

    let clock = ManualClock::new();
    let mut line = SimLine::new(&clock, big_packets_at_4m);

    let report = characterize(&mut line, &clock, &plan()).unwrap();

    let lossy = report.entry(4_000_000, 4096).unwrap();
    assert_eq!(lossy.acked, 0);
    assert_eq!(lossy.success_ratio(), 0.0);

    let best = report.best().unwrap();
    assert_eq!((best.baudrate, best.packet_size), (4_000_000, 512));
}

#[test]
fn partial_loss_disqualifies() {
    fn every_other(_baud: u32, _len: usize) -> bool {
        thread_local!(static FLIP: Cell<bool> = const { Cell::new(false) });
        FLIP.with(|f| {
            f.set(!f.get());
            f.get()
        })
    }

    let clock = ManualClock::new();
    let mut line = SimLine::new(&clock, every_other);
    let plan = SweepPlan {
        baud_rates: &[2_000_000],
        packet_sizes: &[512],
        packets_per_size: 10,
        ..SweepPlan::default()
    };

    let report = characterize(&mut line, &clock, &plan).unwrap();
    assert_eq!(report.entries[0].acked, 5);
    assert!(report.best().is_none());
}

#[test]
fn invalid_plan_is_rejected_before_touching_the_port() {
    let clock = ManualClock::new();
    let mut line = SimLine::new(&clock, never);
    let plan = SweepPlan {
        packet_sizes: &[5000],
        ..plan()
    };

    assert_eq!(
        characterize(&mut line, &clock, &plan).err(),
        Some(SweepError::BadPacketSize(5000))
    );
    assert!(line.baud_changes.is_empty());
}

#[test]
fn chosen_profile_feeds_the_link_config() {
    let clock = ManualClock::new();
    let mut line = SimLine::new(&clock, never);
    let profile = characterize(&mut line, &clock, &plan())
        .unwrap()
        .best()
        .unwrap();

    let mut buf = [0u8; 32];
    let stored = profile.to_slice(&mut buf).unwrap().len();
    let restored = LinkProfile::from_bytes(&buf[..stored]).unwrap();

    let config = LinkConfig::default().with_profile(&restored);
    assert_eq!(config.uart.baudrate, 4_000_000);
    assert_eq!(config.packet_size, 4096);
    assert_eq!(config.validate(), Ok(()));
}
