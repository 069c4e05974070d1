//! Reliable-send slot
//!
//! One frame at a time may wait for an acknowledgement. The slot moves
//! `Idle -> Sent -> {Acked | TimedOut} -> Idle`; every other event leaves it
//! where it is.

/// Slot states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotState {
    /// Nothing outstanding
    #[default]
    Idle,
    /// Envelope written, waiting for its ack
    Sent {
        seq: u8,
        /// Clock reading taken just before the write
        sent_at: u64,
        timeout_micros: u64,
    },
    /// Matching ack seen; waiting to be collected
    Acked { seq: u8, rtt_micros: u64 },
    /// No ack within the timeout; waiting to be collected
    TimedOut { seq: u8 },
}

/// Things that happen to a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotEvent {
    /// An envelope carrying `seq` went out at `at`
    Transmit {
        seq: u8,
        at: u64,
        timeout_micros: u64,
    },
    /// An ack for `seq` arrived at `at`
    Ack { seq: u8, at: u64 },
    /// Clock check
    Tick { now: u64 },
    /// Caller gave up on the outstanding send
    Abandon,
    /// Caller took the result
    Collect,
}

impl SlotState {
    /// Process an event and return the next state
    pub fn transition(self, event: SlotEvent) -> Self {
        use SlotEvent::*;
        use SlotState::*;

        match (self, event) {
            (
                Idle,
                Transmit {
                    seq,
                    at,
                    timeout_micros,
                },
            ) => Sent {
                seq,
                sent_at: at,
                timeout_micros,
            },

            (Sent { seq, sent_at, .. }, Ack { seq: acked, at }) if acked == seq => Acked {
                seq,
                rtt_micros: at.saturating_sub(sent_at),
            },
            (
                Sent {
                    seq,
                    sent_at,
                    timeout_micros,
                },
                Tick { now },
            ) if now.saturating_sub(sent_at) > timeout_micros => TimedOut { seq },
            (Sent { .. }, Abandon) => Idle,

            (Acked { .. } | TimedOut { .. }, Collect) => Idle,

            // Stray acks, early ticks, sends while busy
            (state, _) => state,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SlotState::Idle)
    }

    /// Sequence byte the slot is waiting on
    pub fn outstanding(&self) -> Option<u8> {
        match self {
            SlotState::Sent { seq, .. } => Some(*seq),
            _ => None,
        }
    }

    /// Whether the slot holds a result for the caller
    pub fn is_resolved(&self) -> bool {
        matches!(self, SlotState::Acked { .. } | SlotState::TimedOut { .. })
    }
}
