//! Link characterization
//!
//! Offline commissioning sweep: for every baud rate and packet size in a
//! [`SweepPlan`], send a fixed number of probes through the reliable slot
//! and record how many were acked and how long the round trips took. The
//! best entry is the one with every probe acked and the highest implied
//! frame rate for the plan's target payload.
//!
//! The renderer has to follow the baud changes on its side and accept
//! payloads as large as the biggest packet size.

use heapless::Vec;
use lumen_hal::{BaudControl, Clock, UartRx, UartTx};
use lumen_protocol::MAX_PAYLOAD_SIZE;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_ACK_TIMEOUT_MS;
use crate::sender::{ReliableSender, SendError, SendOutcome};

/// Probes sent per baud rate and packet size
pub const PACKETS_PER_SIZE: u16 = 30;

/// Baud rates swept by default
pub const DEFAULT_BAUD_RATES: [u32; 10] = [
    2_000_000, 3_000_000, 4_000_000, 5_000_000, 6_000_000, 8_000_000, 10_000_000, 12_000_000,
    15_000_000, 20_000_000,
];

/// Packet sizes swept by default
pub const DEFAULT_PACKET_SIZES: [u16; 4] = [512, 1024, 2048, 4096];

/// One full frame of the default matrix: two 64x32 RGB segments
pub const MATRIX_FRAME_BYTES: u32 = 2 * 64 * 32 * 3;

/// Most entries one report holds
pub const MAX_SWEEP_ENTRIES: usize = 64;

/// Largest serialized [`LinkProfile`]
pub const MAX_PROFILE_SIZE: usize = 24;

const PROBE_FILL: u8 = 0xA5;

/// Sweep errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SweepError<E> {
    /// No baud rates, no packet sizes or no probes
    EmptyPlan,
    /// Plan has more combinations than [`MAX_SWEEP_ENTRIES`]
    TooManyEntries,
    /// Packet size of zero or above the frame payload limit
    BadPacketSize(u16),
    /// Port refused a baud rate
    Baud(E),
    Send(SendError<E>),
}

impl<E> From<SendError<E>> for SweepError<E> {
    fn from(e: SendError<E>) -> Self {
        SweepError::Send(e)
    }
}

/// What to sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPlan<'a> {
    pub baud_rates: &'a [u32],
    /// Probe payload sizes in bytes, sequence byte included
    pub packet_sizes: &'a [u16],
    pub packets_per_size: u16,
    /// Payload the frame rate is computed for
    pub target_bytes: u32,
    pub timeout_ms: u32,
}

impl Default for SweepPlan<'static> {
    fn default() -> Self {
        Self {
            baud_rates: &DEFAULT_BAUD_RATES,
            packet_sizes: &DEFAULT_PACKET_SIZES,
            packets_per_size: PACKETS_PER_SIZE,
            target_bytes: MATRIX_FRAME_BYTES,
            timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
        }
    }
}

impl SweepPlan<'_> {
    pub fn validate<E>(&self) -> Result<(), SweepError<E>> {
        if self.baud_rates.is_empty() || self.packet_sizes.is_empty() || self.packets_per_size == 0
        {
            return Err(SweepError::EmptyPlan);
        }
        if self.baud_rates.len() * self.packet_sizes.len() > MAX_SWEEP_ENTRIES {
            return Err(SweepError::TooManyEntries);
        }
        if let Some(&size) = self
            .packet_sizes
            .iter()
            .find(|&&s| s == 0 || s as usize > MAX_PAYLOAD_SIZE)
        {
            return Err(SweepError::BadPacketSize(size));
        }
        Ok(())
    }
}

/// Measurements for one baud rate and packet size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SweepEntry {
    pub baudrate: u32,
    pub packet_size: u16,
    pub sent: u16,
    pub acked: u16,
    /// Mean over acked probes; zero when none were acked
    pub mean_rtt_micros: u32,
}

impl SweepEntry {
    /// Acked share of sent probes, `0.0..=1.0`
    pub fn success_ratio(&self) -> f32 {
        if self.sent == 0 {
            return 0.0;
        }
        self.acked as f32 / self.sent as f32
    }

    pub fn is_reliable(&self) -> bool {
        self.sent > 0 && self.acked == self.sent
    }

    /// Probes per second at the measured round trip
    pub fn packet_rate(&self) -> f32 {
        if self.acked == 0 {
            return 0.0;
        }
        1_000_000.0 / self.mean_rtt_micros.max(1) as f32
    }

    /// Packets needed to carry `target_bytes`
    pub fn fragments(&self, target_bytes: u32) -> u32 {
        target_bytes.div_ceil(u32::from(self.packet_size.max(1))).max(1)
    }

    /// Whole payloads of `target_bytes` per second
    pub fn frame_rate(&self, target_bytes: u32) -> f32 {
        self.packet_rate() / self.fragments(target_bytes) as f32
    }
}

/// Chosen operating point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkProfile {
    pub baudrate: u32,
    pub packet_size: u16,
    pub success_ratio: f32,
    pub mean_rtt_micros: u32,
    pub frame_rate: f32,
}

impl LinkProfile {
    pub fn from_entry(entry: &SweepEntry, target_bytes: u32) -> Self {
        Self {
            baudrate: entry.baudrate,
            packet_size: entry.packet_size,
            success_ratio: entry.success_ratio(),
            mean_rtt_micros: entry.mean_rtt_micros,
            frame_rate: entry.frame_rate(target_bytes),
        }
    }

    /// Decode a stored profile
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    /// Serialize into `buffer`, returning the used prefix
    pub fn to_slice<'b>(&self, buffer: &'b mut [u8]) -> Result<&'b mut [u8], postcard::Error> {
        postcard::to_slice(self, buffer)
    }
}

/// Full sweep result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub target_bytes: u32,
    pub entries: Vec<SweepEntry, MAX_SWEEP_ENTRIES>,
}

impl SweepReport {
    /// Best fully reliable entry, see [`select_best`]
    pub fn best(&self) -> Option<LinkProfile> {
        select_best(&self.entries, self.target_bytes)
            .map(|entry| LinkProfile::from_entry(entry, self.target_bytes))
    }

    pub fn entry(&self, baudrate: u32, packet_size: u16) -> Option<&SweepEntry> {
        self.entries
            .iter()
            .find(|e| e.baudrate == baudrate && e.packet_size == packet_size)
    }
}

/// Entry with every probe acked and the highest frame rate
///
/// On a tie the earlier entry wins.
pub fn select_best(entries: &[SweepEntry], target_bytes: u32) -> Option<&SweepEntry> {
    entries
        .iter()
        .filter(|e| e.is_reliable())
        .fold(None, |best: Option<&SweepEntry>, e| match best {
            Some(b) if b.frame_rate(target_bytes) >= e.frame_rate(target_bytes) => Some(b),
            _ => Some(e),
        })
}

/// Run a sweep over `port`
///
/// The port is left at its original baud rate.
pub fn characterize<P, C, E>(
    port: &mut P,
    clock: &C,
    plan: &SweepPlan<'_>,
) -> Result<SweepReport, SweepError<E>>
where
    P: UartTx<Error = E> + UartRx<Error = E> + BaudControl<Error = E>,
    C: Clock,
{
    plan.validate::<E>()?;

    let filler = [PROBE_FILL; MAX_PAYLOAD_SIZE];
    let original = port.baudrate();
    let mut report = SweepReport {
        target_bytes: plan.target_bytes,
        entries: Vec::new(),
    };

    for &baudrate in plan.baud_rates {
        port.set_baudrate(baudrate).map_err(SweepError::Baud)?;
        info!("Sweep at {} baud", baudrate);

        for &packet_size in plan.packet_sizes {
            // The sequence byte is part of the packet
            let probe = &filler[..packet_size as usize - 1];
            let entry = measure(port, clock, plan, baudrate, packet_size, probe)?;
            info!(
                "{} baud, {} bytes: {}/{} acked, {} us",
                baudrate, packet_size, entry.acked, entry.sent, entry.mean_rtt_micros
            );
            report
                .entries
                .push(entry)
                .map_err(|_| SweepError::TooManyEntries)?;
        }
    }

    port.set_baudrate(original).map_err(SweepError::Baud)?;
    Ok(report)
}

fn measure<P, C, E>(
    port: &mut P,
    clock: &C,
    plan: &SweepPlan<'_>,
    baudrate: u32,
    packet_size: u16,
    filler: &[u8],
) -> Result<SweepEntry, SweepError<E>>
where
    P: UartTx<Error = E> + UartRx<Error = E>,
    C: Clock,
{
    let mut sender = ReliableSender::new();
    let mut acked: u16 = 0;
    let mut rtt_sum: u64 = 0;

    for _ in 0..plan.packets_per_size {
        match sender.probe(port, clock, filler, plan.timeout_ms)? {
            SendOutcome::Acked { rtt_micros, .. } => {
                acked += 1;
                rtt_sum += rtt_micros;
            }
            SendOutcome::TimedOut { seq } => debug!("Probe {} lost", seq),
        }
    }

    let mean_rtt_micros = match acked {
        0 => 0,
        n => (rtt_sum / u64::from(n)).min(u64::from(u32::MAX)) as u32,
    };
    Ok(SweepEntry {
        baudrate,
        packet_size,
        sent: plan.packets_per_size,
        acked,
        mean_rtt_micros,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(baudrate: u32, packet_size: u16, acked: u16, mean_rtt_micros: u32) -> SweepEntry {
        SweepEntry {
            baudrate,
            packet_size,
            sent: 30,
            acked,
            mean_rtt_micros,
        }
    }

    #[test]
    fn test_frame_rate() {
        let e = entry(4_000_000, 4096, 30, 10_000);
        assert_eq!(e.fragments(MATRIX_FRAME_BYTES), 3);
        assert_eq!(e.packet_rate(), 100.0);
        assert!((e.frame_rate(MATRIX_FRAME_BYTES) - 33.333).abs() < 0.01);

        // Partial fragments round up
        assert_eq!(entry(0, 5000, 30, 1).fragments(12_288), 3);
        assert_eq!(entry(0, 512, 30, 1).fragments(100), 1);
    }

    #[test]
    fn test_best_requires_full_success() {
        let entries = [
            entry(2_000_000, 512, 30, 2_600),
            entry(8_000_000, 4096, 29, 5_000),
            entry(4_000_000, 4096, 30, 10_000),
        ];
        let best = select_best(&entries, MATRIX_FRAME_BYTES).unwrap();
        assert_eq!((best.baudrate, best.packet_size), (4_000_000, 4096));
    }

    #[test]
    fn test_no_reliable_entry() {
        let entries = [entry(2_000_000, 512, 0, 0), entry(4_000_000, 512, 12, 900)];
        assert!(select_best(&entries, MATRIX_FRAME_BYTES).is_none());
        assert!(select_best(&[], MATRIX_FRAME_BYTES).is_none());
    }

    #[test]
    fn test_tie_keeps_first() {
        let entries = [entry(2_000_000, 512, 30, 1_000), entry(3_000_000, 512, 30, 1_000)];
        let best = select_best(&entries, 512).unwrap();
        assert_eq!(best.baudrate, 2_000_000);
    }

    #[test]
    fn test_plan_validation() {
        let plan = SweepPlan {
            packet_sizes: &[512, 0],
            ..SweepPlan::default()
        };
        assert_eq!(plan.validate::<()>(), Err(SweepError::BadPacketSize(0)));

        let plan = SweepPlan {
            baud_rates: &[],
            ..SweepPlan::default()
        };
        assert_eq!(plan.validate::<()>(), Err(SweepError::EmptyPlan));

        assert_eq!(SweepPlan::default().validate::<()>(), Ok(()));
    }

    #[test]
    fn test_profile_persists() {
        let profile = LinkProfile::from_entry(&entry(4_000_000, 4096, 30, 10_000), 12_288);
        let mut buf = [0u8; MAX_PROFILE_SIZE];
        let used = profile.to_slice(&mut buf).unwrap().len();
        assert_eq!(LinkProfile::from_bytes(&buf[..used]).unwrap(), profile);
        assert_eq!(profile.success_ratio, 1.0);
    }
}
