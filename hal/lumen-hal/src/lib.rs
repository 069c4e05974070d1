//! Lumen Hardware Abstraction Layer
//!
//! Traits the link layers are written against, so the same host and
//! renderer code runs on any chip (and on the development machine in tests).
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │ lumen-link (host)    │      │ lumen-renderer       │
//! └──────────────────────┘      └──────────────────────┘
//!            │                             │
//!            ▼                             ▼
//! ┌─────────────────────────────────────────────────────┐
//! │  lumen-hal (this crate - traits)                    │
//! └─────────────────────────────────────────────────────┘
//!            │
//!            ▼
//!    chip HAL / embedded-io implementation
//! ```
//!
//! # Traits
//!
//! - [`uart::UartTx`], [`uart::UartRx`] - Serial communication
//! - [`uart::BaudControl`] - Runtime baud rate changes
//! - [`time::Clock`] - Monotonic microsecond clock
//!
//! [`io::IoUart`] adapts any `embedded-io` serial port to the UART traits.

#![no_std]
#![deny(unsafe_code)]

pub mod io;
pub mod time;
pub mod uart;

pub use io::IoUart;
pub use time::Clock;
pub use uart::{BaudControl, DataBits, Parity, StopBits, Uart, UartConfig, UartRx, UartTx};
