//! Opcode table
//!
//! Opcodes are grouped by high nibble, following the renderer's memory map:
//! - `0x0_` system no-op
//! - `0x2_` sprite storage
//! - `0x3_` variables and palette
//! - `0x4_` drawing primitives
//! - `0x5_` target control
//! - `0xA_` animation
//! - `0xE_` link reliability
//! - `0xF_` system control

/// Every opcode the protocol knows about
///
/// Unknown bytes are never guessed: [`Opcode::from_byte`] returns `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,

    UploadSprite = 0x20,
    DeleteSprite = 0x21,

    SetVar = 0x30,
    SetVars = 0x31,
    SetPalette = 0x38,

    DrawPixel = 0x40,
    DrawLine = 0x41,
    DrawRect = 0x42,
    FillRect = 0x43,
    DrawCircle = 0x44,
    DrawPolygon = 0x45,
    DrawSprite = 0x46,
    Clear = 0x47,
    DrawTriangle = 0x48,
    FillCircle = 0x49,

    SelectTarget = 0x50,
    Present = 0x51,

    AnimStart = 0xA0,
    AnimStop = 0xA1,
    AnimKeyframe = 0xA2,

    /// Sequence-tagged envelope around another instruction
    Reliable = 0xE0,
    /// Throughput probe, acknowledged but never dispatched
    LinkProbe = 0xE1,

    Ping = 0xF0,
    Pong = 0xF1,
    Ack = 0xF2,
    Reset = 0xFF,
}

impl Opcode {
    /// Parse an opcode from its wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        use Opcode::*;
        let op = match byte {
            0x00 => Nop,
            0x20 => UploadSprite,
            0x21 => DeleteSprite,
            0x30 => SetVar,
            0x31 => SetVars,
            0x38 => SetPalette,
            0x40 => DrawPixel,
            0x41 => DrawLine,
            0x42 => DrawRect,
            0x43 => FillRect,
            0x44 => DrawCircle,
            0x45 => DrawPolygon,
            0x46 => DrawSprite,
            0x47 => Clear,
            0x48 => DrawTriangle,
            0x49 => FillCircle,
            0x50 => SelectTarget,
            0x51 => Present,
            0xA0 => AnimStart,
            0xA1 => AnimStop,
            0xA2 => AnimKeyframe,
            0xE0 => Reliable,
            0xE1 => LinkProbe,
            0xF0 => Ping,
            0xF1 => Pong,
            0xF2 => Ack,
            0xFF => Reset,
            _ => return None,
        };
        Some(op)
    }

    /// Convert to wire byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Exact payload length for opcodes with a fixed layout
    ///
    /// `None` for variable-length payloads (sprites, variable batches,
    /// envelopes, probes).
    pub fn fixed_payload_len(self) -> Option<usize> {
        use Opcode::*;
        match self {
            Nop | Present | Ping | Reset => Some(0),
            DeleteSprite | SelectTarget | AnimStop | Ack => Some(1),
            AnimStart => Some(2),
            SetVar | Clear => Some(3),
            SetPalette | Pong => Some(4),
            DrawPolygon | DrawSprite => Some(5),
            AnimKeyframe => Some(6),
            DrawPixel => Some(7),
            DrawCircle | FillCircle => Some(9),
            DrawLine | DrawRect | FillRect => Some(11),
            DrawTriangle => Some(15),
            UploadSprite | SetVars | Reliable | LinkProbe => None,
        }
    }

    /// Whether the instruction writes pixels into the active surface
    pub fn is_draw(self) -> bool {
        matches!(
            self,
            Opcode::DrawPixel
                | Opcode::DrawLine
                | Opcode::DrawRect
                | Opcode::FillRect
                | Opcode::DrawCircle
                | Opcode::FillCircle
                | Opcode::DrawPolygon
                | Opcode::DrawSprite
                | Opcode::DrawTriangle
                | Opcode::Clear
        )
    }
}
