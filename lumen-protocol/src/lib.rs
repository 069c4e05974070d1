//! Lumen Host ↔ Renderer Protocol
//!
//! This crate defines the serial protocol between the host MCU (decides what
//! to draw) and the renderer MCU (owns the LED matrix and the secondary
//! panel). The link is a plain UART: no framing, flow control or CRC of its
//! own, so everything here is layered on raw bytes.
//!
//! # Protocol Overview
//!
//! All messages use a single binary frame format:
//! ```text
//! ┌───────┬───────┬────────┬──────────────┬──────────────┐
//! │ SYNC0 │ SYNC1 │ OPCODE │ LENGTH (LE)  │ PAYLOAD      │
//! │ 0xAA  │ 0x55  │ 1B     │ 2B           │ 0–4096B      │
//! └───────┴───────┴────────┴──────────────┴──────────────┘
//! ```
//!
//! There is no checksum. Delivery is confirmed by acknowledgement frames
//! (see [`Instruction::Ack`]) rather than by integrity checks.

#![no_std]
#![deny(unsafe_code)]

pub mod frame;
pub mod instruction;
pub mod opcode;
mod wire;

pub use frame::{
    Frame, FrameError, FrameParser, Frames, DEFAULT_RX_LIMIT, HEADER_SIZE, MAX_FRAME_SIZE,
    MAX_PAYLOAD_SIZE, SYNC0, SYNC1,
};
pub use instruction::{
    envelope, AnimationId, DecodeError, Easing, Instruction, LoopMode, Rgb, SpriteFormat,
    TargetId, VarValues, MAX_POLYGON_VERTICES, MIN_POLYGON_VERTICES,
};
pub use opcode::Opcode;
