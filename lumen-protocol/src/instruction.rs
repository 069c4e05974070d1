//! Typed instruction set
//!
//! Every opcode has exactly one payload layout. [`Instruction::decode`] turns
//! a frame into a strongly typed value with a single exhaustive match, and
//! [`Instruction::to_frame`] is its inverse. All integers are little-endian,
//! coordinates are signed 16-bit.

use crate::frame::{Frame, FrameError};
use crate::opcode::Opcode;
use crate::wire::{Reader, Writer};

/// Animation slot identifier
pub type AnimationId = u8;

/// Maximum number of polygon vertices
pub const MAX_POLYGON_VERTICES: u8 = 16;

/// Minimum number of polygon vertices
pub const MIN_POLYGON_VERTICES: u8 = 3;

/// Errors turning a frame into an [`Instruction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Opcode byte is not in the table
    UnknownOpcode(u8),
    /// Payload length does not match the opcode's layout
    BadLength {
        opcode: Opcode,
        expected: u16,
        actual: u16,
    },
    /// Payload ended before all fields were read
    Truncated,
    /// A field holds a value outside its domain
    InvalidField(Opcode),
}

/// An RGB colour triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Whether a monochrome sink would light this pixel
    pub fn is_lit(self) -> bool {
        (self.r as u16 + self.g as u16 + self.b as u16) > 384
    }
}

/// Wire identifier of a drawing target
///
/// Whether a segment index exists is decided by the renderer's layout, not
/// by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TargetId {
    /// The virtual matrix spanning all segments
    Matrix,
    /// The secondary panel
    Panel,
    /// One matrix segment in its own local coordinates
    Segment(u8),
}

const TARGET_MATRIX: u8 = 0x00;
const TARGET_PANEL: u8 = 0x01;
const TARGET_SEGMENT_BASE: u8 = 0x10;

impl TargetId {
    /// Parse a target from its wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            TARGET_MATRIX => Some(TargetId::Matrix),
            TARGET_PANEL => Some(TargetId::Panel),
            0x10..=0x1F => Some(TargetId::Segment(byte - TARGET_SEGMENT_BASE)),
            _ => None,
        }
    }

    /// Convert to wire byte
    pub fn to_byte(self) -> u8 {
        match self {
            TargetId::Matrix => TARGET_MATRIX,
            TargetId::Panel => TARGET_PANEL,
            TargetId::Segment(n) => TARGET_SEGMENT_BASE + (n & 0x0F),
        }
    }
}

/// Pixel layout of uploaded sprite data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpriteFormat {
    /// 3 bytes per pixel
    Rgb888,
    /// 1 bit per pixel, rows padded to a byte, MSB first
    Mono1,
    /// 1 byte per pixel, index into the renderer palette
    Indexed8,
}

impl SpriteFormat {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(SpriteFormat::Rgb888),
            1 => Some(SpriteFormat::Mono1),
            2 => Some(SpriteFormat::Indexed8),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            SpriteFormat::Rgb888 => 0,
            SpriteFormat::Mono1 => 1,
            SpriteFormat::Indexed8 => 2,
        }
    }

    /// Number of data bytes for a sprite of this size
    pub fn data_len(self, width: u8, height: u8) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            SpriteFormat::Rgb888 => w * h * 3,
            SpriteFormat::Mono1 => w.div_ceil(8) * h,
            SpriteFormat::Indexed8 => w * h,
        }
    }
}

/// What an animation does when its cursor reaches the last keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopMode {
    /// Stop on the last keyframe
    #[default]
    Once,
    /// Jump back to the first keyframe
    Loop,
    /// Reverse direction at each end
    PingPong,
}

impl LoopMode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(LoopMode::Once),
            1 => Some(LoopMode::Loop),
            2 => Some(LoopMode::PingPong),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            LoopMode::Once => 0,
            LoopMode::Loop => 1,
            LoopMode::PingPong => 2,
        }
    }
}

/// Interpolation curve from one keyframe to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Hold the keyframe value until the next keyframe
    Step,
}

impl Easing {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Easing::Linear),
            1 => Some(Easing::EaseIn),
            2 => Some(Easing::EaseOut),
            3 => Some(Easing::EaseInOut),
            4 => Some(Easing::Step),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Easing::Linear => 0,
            Easing::EaseIn => 1,
            Easing::EaseOut => 2,
            Easing::EaseInOut => 3,
            Easing::Step => 4,
        }
    }
}

/// Values carried by a `SetVars` instruction
///
/// Decoded instructions borrow the raw little-endian payload; instructions
/// built on the host borrow a slice of values.
#[derive(Debug, Clone, Copy)]
pub enum VarValues<'a> {
    Wire(&'a [u8]),
    Values(&'a [i16]),
}

impl<'a> VarValues<'a> {
    /// Number of values
    pub fn len(&self) -> usize {
        match self {
            VarValues::Wire(raw) => raw.len() / 2,
            VarValues::Values(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the values in order
    pub fn iter(&self) -> impl Iterator<Item = i16> + 'a {
        let (raw, values): (&'a [u8], &'a [i16]) = match *self {
            VarValues::Wire(raw) => (raw, &[]),
            VarValues::Values(v) => (&[], v),
        };
        raw.chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .chain(values.iter().copied())
    }
}

impl PartialEq for VarValues<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for VarValues<'_> {}

/// One decoded protocol instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// Do nothing (keep-alive)
    Nop,
    /// Store a sprite in a renderer slot
    UploadSprite {
        id: u8,
        width: u8,
        height: u8,
        format: SpriteFormat,
        data: &'a [u8],
    },
    /// Free a sprite slot
    DeleteSprite { id: u8 },
    /// Set one numeric variable
    SetVar { index: u8, value: i16 },
    /// Set consecutive numeric variables
    SetVars { start: u8, values: VarValues<'a> },
    /// Set one palette entry used by indexed sprites
    SetPalette { index: u8, color: Rgb },
    /// Set one pixel
    DrawPixel { x: i16, y: i16, color: Rgb },
    /// Draw a line between two points
    DrawLine {
        x0: i16,
        y0: i16,
        x1: i16,
        y1: i16,
        color: Rgb,
    },
    /// Draw a rectangle outline
    DrawRect {
        x: i16,
        y: i16,
        w: i16,
        h: i16,
        color: Rgb,
    },
    /// Fill a rectangle
    FillRect {
        x: i16,
        y: i16,
        w: i16,
        h: i16,
        color: Rgb,
    },
    /// Draw a circle outline
    DrawCircle {
        cx: i16,
        cy: i16,
        radius: i16,
        color: Rgb,
    },
    /// Fill a circle
    FillCircle {
        cx: i16,
        cy: i16,
        radius: i16,
        color: Rgb,
    },
    /// Draw a triangle outline
    DrawTriangle { points: [(i16, i16); 3], color: Rgb },
    /// Fill a polygon whose vertices live in the variable table
    ///
    /// Vertex `i` is `(var[var_start + 2i], var[var_start + 2i + 1])`.
    DrawPolygon { count: u8, var_start: u8, color: Rgb },
    /// Blit a stored sprite
    DrawSprite { id: u8, x: i16, y: i16 },
    /// Fill the active surface with one colour
    Clear { color: Rgb },
    /// Route subsequent drawing to a surface
    SelectTarget { target: TargetId },
    /// Make the pending buffer of the active surface visible
    Present,
    /// Rewind and play an animation
    AnimStart { id: AnimationId, mode: LoopMode },
    /// Halt an animation at its current cursor
    AnimStop { id: AnimationId },
    /// Add a keyframe to an animation
    AnimKeyframe {
        id: AnimationId,
        time_ms: u16,
        value: i16,
        easing: Easing,
    },
    /// Sequence-tagged envelope; the renderer acks `seq` after dispatching
    /// the inner instruction
    Reliable {
        seq: u8,
        opcode: u8,
        payload: &'a [u8],
    },
    /// Throughput probe, acked and otherwise ignored
    LinkProbe { seq: u8, filler: &'a [u8] },
    /// Heartbeat request
    Ping,
    /// Heartbeat response with the renderer's present counter
    Pong { frames: u32 },
    /// Acknowledgement of a sequence byte
    Ack { seq: u8 },
    /// Return the renderer to its boot state
    Reset,
}

impl<'a> Instruction<'a> {
    /// Decode a received frame
    pub fn decode(frame: &'a Frame) -> Result<Self, DecodeError> {
        Self::decode_parts(frame.opcode, &frame.payload)
    }

    /// Decode an opcode byte and payload
    pub fn decode_parts(opcode: u8, payload: &'a [u8]) -> Result<Self, DecodeError> {
        let op = Opcode::from_byte(opcode).ok_or(DecodeError::UnknownOpcode(opcode))?;
        if let Some(expected) = op.fixed_payload_len() {
            check_len(op, expected, payload.len())?;
        }

        let mut r = Reader::new(payload);
        let instruction = match op {
            Opcode::Nop => Instruction::Nop,
            Opcode::UploadSprite => {
                let id = r.u8()?;
                let width = r.u8()?;
                let height = r.u8()?;
                let format =
                    SpriteFormat::from_byte(r.u8()?).ok_or(DecodeError::InvalidField(op))?;
                let data = r.rest();
                check_len(op, 4 + format.data_len(width, height), payload.len())?;
                Instruction::UploadSprite {
                    id,
                    width,
                    height,
                    format,
                    data,
                }
            }
            Opcode::DeleteSprite => Instruction::DeleteSprite { id: r.u8()? },
            Opcode::SetVar => Instruction::SetVar {
                index: r.u8()?,
                value: r.i16()?,
            },
            Opcode::SetVars => {
                let start = r.u8()?;
                let count = r.u8()? as usize;
                check_len(op, 2 + count * 2, payload.len())?;
                Instruction::SetVars {
                    start,
                    values: VarValues::Wire(r.rest()),
                }
            }
            Opcode::SetPalette => Instruction::SetPalette {
                index: r.u8()?,
                color: r.rgb()?,
            },
            Opcode::DrawPixel => Instruction::DrawPixel {
                x: r.i16()?,
                y: r.i16()?,
                color: r.rgb()?,
            },
            Opcode::DrawLine => Instruction::DrawLine {
                x0: r.i16()?,
                y0: r.i16()?,
                x1: r.i16()?,
                y1: r.i16()?,
                color: r.rgb()?,
            },
            Opcode::DrawRect => Instruction::DrawRect {
                x: r.i16()?,
                y: r.i16()?,
                w: r.i16()?,
                h: r.i16()?,
                color: r.rgb()?,
            },
            Opcode::FillRect => Instruction::FillRect {
                x: r.i16()?,
                y: r.i16()?,
                w: r.i16()?,
                h: r.i16()?,
                color: r.rgb()?,
            },
            Opcode::DrawCircle => Instruction::DrawCircle {
                cx: r.i16()?,
                cy: r.i16()?,
                radius: r.i16()?,
                color: r.rgb()?,
            },
            Opcode::FillCircle => Instruction::FillCircle {
                cx: r.i16()?,
                cy: r.i16()?,
                radius: r.i16()?,
                color: r.rgb()?,
            },
            Opcode::DrawTriangle => Instruction::DrawTriangle {
                points: [
                    (r.i16()?, r.i16()?),
                    (r.i16()?, r.i16()?),
                    (r.i16()?, r.i16()?),
                ],
                color: r.rgb()?,
            },
            Opcode::DrawPolygon => {
                let count = r.u8()?;
                if !(MIN_POLYGON_VERTICES..=MAX_POLYGON_VERTICES).contains(&count) {
                    return Err(DecodeError::InvalidField(op));
                }
                Instruction::DrawPolygon {
                    count,
                    var_start: r.u8()?,
                    color: r.rgb()?,
                }
            }
            Opcode::DrawSprite => Instruction::DrawSprite {
                id: r.u8()?,
                x: r.i16()?,
                y: r.i16()?,
            },
            Opcode::Clear => Instruction::Clear { color: r.rgb()? },
            Opcode::SelectTarget => Instruction::SelectTarget {
                target: TargetId::from_byte(r.u8()?).ok_or(DecodeError::InvalidField(op))?,
            },
            Opcode::Present => Instruction::Present,
            Opcode::AnimStart => Instruction::AnimStart {
                id: r.u8()?,
                mode: LoopMode::from_byte(r.u8()?).ok_or(DecodeError::InvalidField(op))?,
            },
            Opcode::AnimStop => Instruction::AnimStop { id: r.u8()? },
            Opcode::AnimKeyframe => Instruction::AnimKeyframe {
                id: r.u8()?,
                time_ms: r.u16()?,
                value: r.i16()?,
                easing: Easing::from_byte(r.u8()?).ok_or(DecodeError::InvalidField(op))?,
            },
            Opcode::Reliable => {
                let seq = r.u8()?;
                let opcode = r.u8()?;
                // Envelopes do not nest
                if opcode == Opcode::Reliable.to_byte() {
                    return Err(DecodeError::InvalidField(op));
                }
                Instruction::Reliable {
                    seq,
                    opcode,
                    payload: r.rest(),
                }
            }
            Opcode::LinkProbe => Instruction::LinkProbe {
                seq: r.u8()?,
                filler: r.rest(),
            },
            Opcode::Ping => Instruction::Ping,
            Opcode::Pong => Instruction::Pong { frames: r.u32()? },
            Opcode::Ack => Instruction::Ack { seq: r.u8()? },
            Opcode::Reset => Instruction::Reset,
        };

        debug_assert_eq!(r.remaining(), 0);
        Ok(instruction)
    }

    /// Opcode of this instruction
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Nop => Opcode::Nop,
            Instruction::UploadSprite { .. } => Opcode::UploadSprite,
            Instruction::DeleteSprite { .. } => Opcode::DeleteSprite,
            Instruction::SetVar { .. } => Opcode::SetVar,
            Instruction::SetVars { .. } => Opcode::SetVars,
            Instruction::SetPalette { .. } => Opcode::SetPalette,
            Instruction::DrawPixel { .. } => Opcode::DrawPixel,
            Instruction::DrawLine { .. } => Opcode::DrawLine,
            Instruction::DrawRect { .. } => Opcode::DrawRect,
            Instruction::FillRect { .. } => Opcode::FillRect,
            Instruction::DrawCircle { .. } => Opcode::DrawCircle,
            Instruction::FillCircle { .. } => Opcode::FillCircle,
            Instruction::DrawTriangle { .. } => Opcode::DrawTriangle,
            Instruction::DrawPolygon { .. } => Opcode::DrawPolygon,
            Instruction::DrawSprite { .. } => Opcode::DrawSprite,
            Instruction::Clear { .. } => Opcode::Clear,
            Instruction::SelectTarget { .. } => Opcode::SelectTarget,
            Instruction::Present => Opcode::Present,
            Instruction::AnimStart { .. } => Opcode::AnimStart,
            Instruction::AnimStop { .. } => Opcode::AnimStop,
            Instruction::AnimKeyframe { .. } => Opcode::AnimKeyframe,
            Instruction::Reliable { .. } => Opcode::Reliable,
            Instruction::LinkProbe { .. } => Opcode::LinkProbe,
            Instruction::Ping => Opcode::Ping,
            Instruction::Pong { .. } => Opcode::Pong,
            Instruction::Ack { .. } => Opcode::Ack,
            Instruction::Reset => Opcode::Reset,
        }
    }

    /// Encode this instruction into a frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let mut w = Writer::new();
        match self {
            Instruction::Nop
            | Instruction::Present
            | Instruction::Ping
            | Instruction::Reset => {}
            Instruction::UploadSprite {
                id,
                width,
                height,
                format,
                data,
            } => {
                w.u8(*id)?.u8(*width)?.u8(*height)?.u8(format.to_byte())?.bytes(data)?;
            }
            Instruction::DeleteSprite { id } => {
                w.u8(*id)?;
            }
            Instruction::SetVar { index, value } => {
                w.u8(*index)?.i16(*value)?;
            }
            Instruction::SetVars { start, values } => {
                let count = u8::try_from(values.len()).map_err(|_| FrameError::PayloadTooLarge)?;
                w.u8(*start)?.u8(count)?;
                for value in values.iter() {
                    w.i16(value)?;
                }
            }
            Instruction::SetPalette { index, color } => {
                w.u8(*index)?.rgb(*color)?;
            }
            Instruction::DrawPixel { x, y, color } => {
                w.i16(*x)?.i16(*y)?.rgb(*color)?;
            }
            Instruction::DrawLine {
                x0,
                y0,
                x1,
                y1,
                color,
            } => {
                w.i16(*x0)?.i16(*y0)?.i16(*x1)?.i16(*y1)?.rgb(*color)?;
            }
            Instruction::DrawRect { x, y, w: rw, h, color }
            | Instruction::FillRect { x, y, w: rw, h, color } => {
                w.i16(*x)?.i16(*y)?.i16(*rw)?.i16(*h)?.rgb(*color)?;
            }
            Instruction::DrawCircle {
                cx,
                cy,
                radius,
                color,
            }
            | Instruction::FillCircle {
                cx,
                cy,
                radius,
                color,
            } => {
                w.i16(*cx)?.i16(*cy)?.i16(*radius)?.rgb(*color)?;
            }
            Instruction::DrawTriangle { points, color } => {
                for (x, y) in points {
                    w.i16(*x)?.i16(*y)?;
                }
                w.rgb(*color)?;
            }
            Instruction::DrawPolygon {
                count,
                var_start,
                color,
            } => {
                w.u8(*count)?.u8(*var_start)?.rgb(*color)?;
            }
            Instruction::DrawSprite { id, x, y } => {
                w.u8(*id)?.i16(*x)?.i16(*y)?;
            }
            Instruction::Clear { color } => {
                w.rgb(*color)?;
            }
            Instruction::SelectTarget { target } => {
                w.u8(target.to_byte())?;
            }
            Instruction::AnimStart { id, mode } => {
                w.u8(*id)?.u8(mode.to_byte())?;
            }
            Instruction::AnimStop { id } => {
                w.u8(*id)?;
            }
            Instruction::AnimKeyframe {
                id,
                time_ms,
                value,
                easing,
            } => {
                w.u8(*id)?.u16(*time_ms)?.i16(*value)?.u8(easing.to_byte())?;
            }
            Instruction::Reliable {
                seq,
                opcode,
                payload,
            } => {
                w.u8(*seq)?.u8(*opcode)?.bytes(payload)?;
            }
            Instruction::LinkProbe { seq, filler } => {
                w.u8(*seq)?.bytes(filler)?;
            }
            Instruction::Pong { frames } => {
                w.u32(*frames)?;
            }
            Instruction::Ack { seq } => {
                w.u8(*seq)?;
            }
        }

        Ok(Frame {
            opcode: self.opcode().to_byte(),
            payload: w.finish(),
        })
    }
}

/// Wrap an already encoded frame in a reliable envelope
pub fn envelope(seq: u8, inner: &Frame) -> Result<Frame, FrameError> {
    Instruction::Reliable {
        seq,
        opcode: inner.opcode,
        payload: &inner.payload,
    }
    .to_frame()
}

fn check_len(opcode: Opcode, expected: usize, actual: usize) -> Result<(), DecodeError> {
    if expected != actual {
        return Err(DecodeError::BadLength {
            opcode,
            expected: expected.min(u16::MAX as usize) as u16,
            actual: actual.min(u16::MAX as usize) as u16,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_pixel_layout() {
        let frame = Instruction::DrawPixel {
            x: 70,
            y: 5,
            color: Rgb::new(10, 20, 30),
        }
        .to_frame()
        .unwrap();

        assert_eq!(frame.opcode, 0x40);
        assert_eq!(&frame.payload[..], &[70, 0, 5, 0, 10, 20, 30]);
    }

    #[test]
    fn test_negative_coordinates() {
        let frame = Instruction::DrawLine {
            x0: -1,
            y0: -300,
            x1: 5,
            y1: 6,
            color: Rgb::WHITE,
        }
        .to_frame()
        .unwrap();
        assert_eq!(&frame.payload[..4], &[0xFF, 0xFF, 0xD4, 0xFE]);

        let decoded = Instruction::decode(&frame).unwrap();
        assert!(matches!(decoded, Instruction::DrawLine { x0: -1, y0: -300, .. }));
    }

    #[test]
    fn test_unknown_opcode() {
        let frame = Frame::new(0x7E, &[1, 2]).unwrap();
        assert_eq!(
            Instruction::decode(&frame),
            Err(DecodeError::UnknownOpcode(0x7E))
        );
    }

    #[test]
    fn test_short_payload_rejected() {
        let frame = Frame::new(0x40, &[70, 0, 5, 0, 10, 20]).unwrap();
        assert_eq!(
            Instruction::decode(&frame),
            Err(DecodeError::BadLength {
                opcode: Opcode::DrawPixel,
                expected: 7,
                actual: 6
            })
        );
    }

    #[test]
    fn test_long_payload_rejected() {
        let frame = Frame::new(0x51, &[0]).unwrap();
        assert!(matches!(
            Instruction::decode(&frame),
            Err(DecodeError::BadLength { opcode: Opcode::Present, .. })
        ));
    }

    #[test]
    fn test_sprite_length_checked_against_format() {
        // 2x2 RGB sprite needs 12 data bytes
        let mut payload = [0u8; 4 + 11];
        payload[..4].copy_from_slice(&[3, 2, 2, 0]);
        let frame = Frame::new(0x20, &payload).unwrap();
        assert!(matches!(
            Instruction::decode(&frame),
            Err(DecodeError::BadLength { expected: 16, actual: 15, .. })
        ));

        // 9x1 mono sprite packs into 2 bytes
        let frame = Frame::new(0x20, &[0, 9, 1, 1, 0xFF, 0x80]).unwrap();
        let decoded = Instruction::decode(&frame).unwrap();
        assert!(matches!(
            decoded,
            Instruction::UploadSprite { format: SpriteFormat::Mono1, data, .. } if data.len() == 2
        ));
    }

    #[test]
    fn test_set_vars_values() {
        let values = [10i16, -20, 300];
        let frame = Instruction::SetVars {
            start: 4,
            values: VarValues::Values(&values),
        }
        .to_frame()
        .unwrap();
        assert_eq!(frame.payload.len(), 2 + 6);

        match Instruction::decode(&frame).unwrap() {
            Instruction::SetVars { start, values: decoded } => {
                assert_eq!(start, 4);
                assert!(decoded.iter().eq(values.iter().copied()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_set_vars_count_mismatch() {
        let frame = Frame::new(0x31, &[0, 3, 1, 0, 2, 0]).unwrap();
        assert!(matches!(
            Instruction::decode(&frame),
            Err(DecodeError::BadLength { opcode: Opcode::SetVars, .. })
        ));
    }

    #[test]
    fn test_polygon_vertex_count_domain() {
        let frame = Frame::new(0x45, &[2, 0, 1, 2, 3]).unwrap();
        assert_eq!(
            Instruction::decode(&frame),
            Err(DecodeError::InvalidField(Opcode::DrawPolygon))
        );
        let frame = Frame::new(0x45, &[17, 0, 1, 2, 3]).unwrap();
        assert!(Instruction::decode(&frame).is_err());
    }

    #[test]
    fn test_select_target_ids() {
        assert_eq!(TargetId::from_byte(0x00), Some(TargetId::Matrix));
        assert_eq!(TargetId::from_byte(0x01), Some(TargetId::Panel));
        assert_eq!(TargetId::from_byte(0x11), Some(TargetId::Segment(1)));
        assert_eq!(TargetId::from_byte(0x02), None);
        assert_eq!(TargetId::Segment(3).to_byte(), 0x13);

        let frame = Frame::new(0x50, &[0x02]).unwrap();
        assert_eq!(
            Instruction::decode(&frame),
            Err(DecodeError::InvalidField(Opcode::SelectTarget))
        );
    }

    #[test]
    fn test_envelope_wraps_inner_frame() {
        let inner = Instruction::Clear { color: Rgb::RED }.to_frame().unwrap();
        let wrapped = envelope(9, &inner).unwrap();

        assert_eq!(wrapped.opcode, 0xE0);
        assert_eq!(&wrapped.payload[..], &[9, 0x47, 255, 0, 0]);

        match Instruction::decode(&wrapped).unwrap() {
            Instruction::Reliable { seq, opcode, payload } => {
                assert_eq!(seq, 9);
                let inner = Instruction::decode_parts(opcode, payload).unwrap();
                assert_eq!(inner, Instruction::Clear { color: Rgb::RED });
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nested_envelope_rejected() {
        let frame = Frame::new(0xE0, &[1, 0xE0, 2, 0x00]).unwrap();
        assert_eq!(
            Instruction::decode(&frame),
            Err(DecodeError::InvalidField(Opcode::Reliable))
        );
    }

    #[test]
    fn test_ack_layout() {
        let frame = Instruction::Ack { seq: 0x42 }.to_frame().unwrap();
        assert_eq!(frame.opcode, 0xF2);
        assert_eq!(&frame.payload[..], &[0x42]);
    }

    #[test]
    fn test_keyframe_layout() {
        let frame = Instruction::AnimKeyframe {
            id: 2,
            time_ms: 500,
            value: -8,
            easing: Easing::EaseInOut,
        }
        .to_frame()
        .unwrap();
        assert_eq!(&frame.payload[..], &[2, 0xF4, 0x01, 0xF8, 0xFF, 3]);
    }
}
