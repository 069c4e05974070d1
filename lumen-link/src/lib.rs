//! Lumen host link
//!
//! The host end of the serial link: it decides what to draw and gets it to
//! the renderer.
//!
//! ```text
//! HostLink ─▶ ReliableSender ─▶ envelope(seq, frame) ─▶ UART ─▶ renderer
//!                   ▲                                             │
//!                   └────────────── ack(seq) ◀────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`slot`] - `Idle -> Sent -> {Acked | TimedOut} -> Idle` state machine
//! - [`sender`] - Sequence numbering, ack matching and timeouts
//! - [`host`] - Drawing command API with a configurable ack mode
//! - [`characterize`] - Baud rate and packet size sweep
//! - [`config`] - Link settings, persisted with postcard

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod characterize;
pub mod config;
pub mod host;
pub mod sender;
pub mod slot;

pub use characterize::{
    characterize, select_best, LinkProfile, SweepEntry, SweepError, SweepPlan, SweepReport,
    PACKETS_PER_SIZE,
};
pub use config::{AckMode, LinkConfig, LinkConfigError};
pub use host::{Delivery, HostLink};
pub use sender::{ReliableSender, SendError, SendOutcome, SenderStats};
pub use slot::{SlotEvent, SlotState};
