//! Lumen renderer
//!
//! The renderer end of the link. It owns the physical outputs and turns a
//! stream of frames into pixels:
//!
//! ```text
//! UART bytes ─▶ Receiver (FrameParser) ─▶ Session::handle_frame
//!                    ▲                          │
//!                    └──── ack / pong ◀─────────┤
//!                                               ▼
//!                              Compositor ─▶ PanelDriver::show (on present)
//! ```
//!
//! Everything here is chip independent. Firmware wires a [`Session`] to a
//! concrete panel driver and serial port and calls one of the receive loops.

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod receiver;
pub mod session;

pub use receiver::{LinkError, Receiver, RX_CHUNK};
pub use session::{
    DispatchError, Outcome, Reply, Session, SessionStats, ANIMATION_VAR_BASE, MAX_REPLY_SIZE,
};
