//! Little-endian payload cursor helpers

use heapless::Vec;

use crate::frame::{FrameError, MAX_PAYLOAD_SIZE};
use crate::instruction::{DecodeError, Rgb};

/// Bounds-checked reader over a payload slice
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.bytes.get(self.pos).ok_or(DecodeError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, DecodeError> {
        let lo = self.u8()?;
        let hi = self.u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    pub(crate) fn i16(&mut self) -> Result<i16, DecodeError> {
        self.u16().map(|v| v as i16)
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DecodeError> {
        let lo = self.u16()? as u32;
        let hi = self.u16()? as u32;
        Ok(lo | (hi << 16))
    }

    pub(crate) fn rgb(&mut self) -> Result<Rgb, DecodeError> {
        Ok(Rgb::new(self.u8()?, self.u8()?, self.u8()?))
    }

    /// Everything not yet read
    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        rest
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

/// Payload builder; every push fails once the frame payload is full
pub(crate) struct Writer {
    buf: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub(crate) fn u8(&mut self, v: u8) -> Result<&mut Self, FrameError> {
        self.buf.push(v).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(self)
    }

    pub(crate) fn u16(&mut self, v: u16) -> Result<&mut Self, FrameError> {
        self.bytes(&v.to_le_bytes())
    }

    pub(crate) fn i16(&mut self, v: i16) -> Result<&mut Self, FrameError> {
        self.u16(v as u16)
    }

    pub(crate) fn u32(&mut self, v: u32) -> Result<&mut Self, FrameError> {
        self.bytes(&v.to_le_bytes())
    }

    pub(crate) fn rgb(&mut self, c: Rgb) -> Result<&mut Self, FrameError> {
        self.bytes(&[c.r, c.g, c.b])
    }

    pub(crate) fn bytes(&mut self, b: &[u8]) -> Result<&mut Self, FrameError> {
        self.buf
            .extend_from_slice(b)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(self)
    }

    pub(crate) fn finish(self) -> Vec<u8, MAX_PAYLOAD_SIZE> {
        self.buf
    }
}
