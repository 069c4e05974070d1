//! Renderer session
//!
//! A [`Session`] owns everything the renderer keeps between frames: the
//! compositor, the current target, variables, palette, sprites, animation
//! tracks and the panel driver. Instructions are applied one at a time by
//! [`Session::dispatch`]; a failed instruction leaves the session exactly as
//! it was and ready for the next one.

use heapless::Vec;
use lumen_core::animation::{AnimationError, Animations, Keyframe, MAX_ANIMATIONS};
use lumen_core::compositor::{Compositor, DrawError};
use lumen_core::config::{ConfigError, RendererConfig};
use lumen_core::palette::Palette;
use lumen_core::raster;
use lumen_core::sprites::{Sprite, SpriteError, SpriteStore};
use lumen_core::traits::PanelDriver;
use lumen_core::vars::{UnsetVariable, VariableTable};
use lumen_protocol::{
    frame, DecodeError, Frame, FrameError, Instruction, Opcode, TargetId, MAX_POLYGON_VERTICES,
    MIN_POLYGON_VERTICES,
};

/// First variable slot mirrored from animation tracks
///
/// After every [`Session::tick`], track `n` writes its sampled value to
/// variable `ANIMATION_VAR_BASE + n`.
pub const ANIMATION_VAR_BASE: u8 = (256 - MAX_ANIMATIONS) as u8;

/// Why an instruction was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    /// Frame did not decode into an instruction
    Decode(DecodeError),
    /// Target or bounds problem
    Draw(DrawError),
    /// Instruction read a variable that was never set
    UnsetVariable(u8),
    /// Palette index out of range
    BadPaletteIndex(u8),
    Sprite(SpriteError),
    Animation(AnimationError),
    /// Opcode is valid on the wire but never sent to the renderer
    Unexpected(Opcode),
}

impl From<DecodeError> for DispatchError {
    fn from(e: DecodeError) -> Self {
        DispatchError::Decode(e)
    }
}

impl From<DrawError> for DispatchError {
    fn from(e: DrawError) -> Self {
        DispatchError::Draw(e)
    }
}

impl From<UnsetVariable> for DispatchError {
    fn from(e: UnsetVariable) -> Self {
        DispatchError::UnsetVariable(e.0)
    }
}

impl From<SpriteError> for DispatchError {
    fn from(e: SpriteError) -> Self {
        DispatchError::Sprite(e)
    }
}

impl From<AnimationError> for DispatchError {
    fn from(e: AnimationError) -> Self {
        DispatchError::Animation(e)
    }
}

/// A frame the renderer sends back to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    /// Delivery confirmation for a sequence byte
    Ack(u8),
    /// Heartbeat answer carrying the present counter
    Pong(u32),
}

/// Largest encoded reply
pub const MAX_REPLY_SIZE: usize = frame::HEADER_SIZE + 4;

impl Reply {
    /// Encode into `buffer`, returning the frame length
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        match *self {
            Reply::Ack(seq) => frame::encode(Opcode::Ack.to_byte(), &[seq], buffer),
            Reply::Pong(frames) => {
                frame::encode(Opcode::Pong.to_byte(), &frames.to_le_bytes(), buffer)
            }
        }
    }
}

/// Result of handling one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the instruction took effect
    pub result: Result<(), DispatchError>,
    /// Frame to send back, if any
    pub reply: Option<Reply>,
}

/// Dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionStats {
    /// Instructions applied
    pub dispatched: u32,
    /// Frames or instructions skipped with an error
    pub rejected: u32,
    /// `Present` instructions applied, including ones the panel driver failed
    pub presents: u32,
}

/// All renderer state behind the receive loop
pub struct Session<P> {
    config: RendererConfig,
    compositor: Compositor,
    target: TargetId,
    vars: VariableTable,
    palette: Palette,
    sprites: SpriteStore,
    animations: Animations,
    panel: P,
    stats: SessionStats,
}

impl<P: PanelDriver> Session<P> {
    /// Build a session from a configuration
    ///
    /// Fails if the configuration does not validate; no receive loop can be
    /// created without a session.
    pub fn new(config: RendererConfig, panel: P) -> Result<Self, ConfigError> {
        let compositor = Compositor::new(&config).map_err(|e| {
            error!("Invalid renderer configuration: {}", e);
            e
        })?;
        let target = config.default_target();
        info!(
            "Renderer ready: {} segments, {}x{} panel",
            config.segment_count(),
            config.panel_width,
            config.panel_height
        );

        Ok(Self {
            config,
            compositor,
            target,
            vars: VariableTable::new(),
            palette: Palette::new(),
            sprites: SpriteStore::new(),
            animations: Animations::new(),
            panel,
            stats: SessionStats::default(),
        })
    }

    /// Build a session from postcard-encoded configuration bytes
    pub fn from_stored(bytes: &[u8], panel: P) -> Result<Self, ConfigError> {
        Self::new(RendererConfig::from_bytes(bytes)?, panel)
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn vars(&self) -> &VariableTable {
        &self.vars
    }

    pub fn animations(&self) -> &Animations {
        &self.animations
    }

    pub fn sprites(&self) -> &SpriteStore {
        &self.sprites
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut P {
        &mut self.panel
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Decode and apply one received frame
    pub fn handle_frame(&mut self, frame: &Frame) -> Outcome {
        match Instruction::decode(frame) {
            Ok(instruction) => self.handle(&instruction),
            Err(e) => {
                warn!("Rejected frame {:#x}: {}", frame.opcode, e);
                self.stats.rejected += 1;
                Outcome {
                    result: Err(e.into()),
                    reply: None,
                }
            }
        }
    }

    /// Apply one instruction, unwrapping reliable envelopes
    ///
    /// Envelopes are acknowledged once the inner instruction has been
    /// dispatched, whether or not it succeeded: the ack confirms delivery.
    /// Probes are acknowledged and otherwise ignored.
    pub fn handle(&mut self, instruction: &Instruction<'_>) -> Outcome {
        let (result, reply) = match *instruction {
            Instruction::Reliable {
                seq,
                opcode,
                payload,
            } => {
                let result = Instruction::decode_parts(opcode, payload)
                    .map_err(DispatchError::from)
                    .and_then(|inner| self.dispatch(&inner).map(|_| ()));
                (result, Some(Reply::Ack(seq)))
            }
            Instruction::LinkProbe { seq, filler } => {
                trace!("Probe {} ({} bytes)", seq, filler.len());
                (Ok(()), Some(Reply::Ack(seq)))
            }
            _ => match self.dispatch(instruction) {
                Ok(reply) => (Ok(()), reply),
                Err(e) => (Err(e), None),
            },
        };

        match result {
            Ok(()) => self.stats.dispatched += 1,
            Err(e) => {
                warn!("Skipped {}: {}", instruction.opcode(), e);
                self.stats.rejected += 1;
            }
        }
        Outcome { result, reply }
    }

    /// Apply one plain instruction to the session state
    pub fn dispatch(&mut self, instruction: &Instruction<'_>) -> Result<Option<Reply>, DispatchError> {
        trace!("Dispatch {}", instruction.opcode());
        let target = self.target;

        match *instruction {
            Instruction::Nop => {}

            Instruction::UploadSprite {
                id,
                width,
                height,
                format,
                data,
            } => {
                let sprite = Sprite::new(width, height, format, data)?;
                self.sprites.upload(id, sprite)?;
            }
            Instruction::DeleteSprite { id } => self.sprites.delete(id)?,

            Instruction::SetVar { index, value } => self.vars.set(index, value),
            Instruction::SetVars { start, values } => self.vars.set_many(start, values.iter()),
            Instruction::SetPalette { index, color } => self
                .palette
                .set(index, color)
                .map_err(|e| DispatchError::BadPaletteIndex(e.0))?,

            Instruction::DrawPixel { x, y, color } => {
                self.compositor.set_pixel(target, x, y, color)?;
            }
            Instruction::DrawLine {
                x0,
                y0,
                x1,
                y1,
                color,
            } => {
                let mut view = self.compositor.view(target)?;
                raster::line(&mut view, x0.into(), y0.into(), x1.into(), y1.into(), color);
            }
            Instruction::DrawRect { x, y, w, h, color } => {
                let mut view = self.compositor.view(target)?;
                raster::rect(&mut view, x.into(), y.into(), w.into(), h.into(), color);
            }
            Instruction::FillRect { x, y, w, h, color } => {
                let mut view = self.compositor.view(target)?;
                raster::fill_rect(&mut view, x.into(), y.into(), w.into(), h.into(), color);
            }
            Instruction::DrawCircle {
                cx,
                cy,
                radius,
                color,
            } => {
                let mut view = self.compositor.view(target)?;
                raster::circle(&mut view, cx.into(), cy.into(), radius.into(), color);
            }
            Instruction::FillCircle {
                cx,
                cy,
                radius,
                color,
            } => {
                let mut view = self.compositor.view(target)?;
                raster::fill_circle(&mut view, cx.into(), cy.into(), radius.into(), color);
            }
            Instruction::DrawTriangle { points, color } => {
                let points = points.map(|(x, y)| (x as i32, y as i32));
                let mut view = self.compositor.view(target)?;
                raster::triangle(&mut view, points, color);
            }
            Instruction::DrawPolygon {
                count,
                var_start,
                color,
            } => {
                let bad_count = DecodeError::InvalidField(Opcode::DrawPolygon);
                if !(MIN_POLYGON_VERTICES..=MAX_POLYGON_VERTICES).contains(&count) {
                    return Err(bad_count.into());
                }
                // Resolve every vertex before touching any pixel
                let mut vertices: Vec<(i32, i32), { MAX_POLYGON_VERTICES as usize }> = Vec::new();
                for i in 0..count {
                    let base = var_start.wrapping_add(i.wrapping_mul(2));
                    let x = self.vars.get(base)?;
                    let y = self.vars.get(base.wrapping_add(1))?;
                    vertices
                        .push((x as i32, y as i32))
                        .map_err(|_| DispatchError::from(bad_count))?;
                }
                let mut view = self.compositor.view(target)?;
                raster::fill_polygon(&mut view, &vertices, color);
            }
            Instruction::DrawSprite { id, x, y } => {
                let sprite = self.sprites.get(id)?;
                let mut view = self.compositor.view(target)?;
                sprite.blit(&mut view, &self.palette, x.into(), y.into());
            }
            Instruction::Clear { color } => self.compositor.clear(target, color)?,

            Instruction::SelectTarget { target } => {
                self.compositor.check_target(target)?;
                debug!("Target -> {}", target);
                self.target = target;
            }
            Instruction::Present => {
                let result = self.compositor.present(target, &mut self.panel);
                self.stats.presents = self.stats.presents.wrapping_add(1);
                debug!("Present {} #{}", target, self.stats.presents);
                result?;
            }

            Instruction::AnimStart { id, mode } => self.animations.start(id, mode)?,
            Instruction::AnimStop { id } => self.animations.stop(id)?,
            Instruction::AnimKeyframe {
                id,
                time_ms,
                value,
                easing,
            } => self.animations.add_keyframe(
                id,
                Keyframe {
                    time_ms,
                    value,
                    easing,
                },
            )?,

            Instruction::Ping => return Ok(Some(Reply::Pong(self.stats.presents))),
            Instruction::Reset => self.reset(),

            Instruction::Reliable { .. }
            | Instruction::LinkProbe { .. }
            | Instruction::Pong { .. }
            | Instruction::Ack { .. } => {
                return Err(DispatchError::Unexpected(instruction.opcode()));
            }
        }
        Ok(None)
    }

    /// Advance animations and publish their values to the variable table
    pub fn tick(&mut self, delta_ms: u32) {
        self.animations.tick(delta_ms);
        for id in 0..MAX_ANIMATIONS as u8 {
            if let Some(value) = self.animations.sample(id) {
                self.vars.set(ANIMATION_VAR_BASE + id, value);
            }
        }
    }

    /// Return to the boot state
    ///
    /// Counters are kept.
    pub fn reset(&mut self) {
        info!("Renderer reset");
        self.compositor.reset();
        self.target = self.config.default_target();
        self.vars.clear();
        self.palette = Palette::new();
        self.sprites.clear();
        self.animations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::compositor::Canvas;
    use lumen_core::traits::{PanelError, SurfaceId};
    use lumen_protocol::Rgb;

    struct NullPanel;

    impl PanelDriver for NullPanel {
        fn show(&mut self, _surface: SurfaceId, _frame: &Canvas) -> Result<(), PanelError> {
            Ok(())
        }
    }

    fn session() -> Session<NullPanel> {
        Session::new(RendererConfig::default(), NullPanel).unwrap()
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let config = RendererConfig {
            segment_height: 0,
            ..RendererConfig::default()
        };
        assert_eq!(
            Session::new(config, NullPanel).err(),
            Some(ConfigError::ZeroHeight)
        );
    }

    #[test]
    fn test_polygon_vertex_count_checked_on_dispatch() {
        let mut s = session();
        s.dispatch(&Instruction::SetVars {
            start: 0,
            values: lumen_protocol::VarValues::Values(&[1; 40]),
        })
        .unwrap();

        let invalid = DispatchError::Decode(DecodeError::InvalidField(Opcode::DrawPolygon));
        for count in [0, 2, MAX_POLYGON_VERTICES + 1, u8::MAX] {
            let polygon = Instruction::DrawPolygon {
                count,
                var_start: 0,
                color: Rgb::RED,
            };
            assert_eq!(s.dispatch(&polygon), Err(invalid));
        }
        for surface in [SurfaceId::Segment(0), SurfaceId::Segment(1)] {
            assert_eq!(s.compositor().pending(surface).unwrap().lit_count(), 0);
        }

        let triangle = Instruction::DrawPolygon {
            count: MIN_POLYGON_VERTICES,
            var_start: 0,
            color: Rgb::RED,
        };
        assert_eq!(s.dispatch(&triangle), Ok(None));
    }

    #[test]
    fn test_reply_encoding() {
        let mut buf = [0u8; MAX_REPLY_SIZE];
        let n = Reply::Ack(7).encode(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0xAA, 0x55, 0xF2, 1, 0, 7]);

        let n = Reply::Pong(0x0102_0304).encode(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0xAA, 0x55, 0xF1, 4, 0, 4, 3, 2, 1]);
    }

    #[test]
    fn test_select_target_validated() {
        let mut s = session();
        let bad = Instruction::SelectTarget {
            target: TargetId::Segment(2),
        };
        assert_eq!(
            s.dispatch(&bad),
            Err(DispatchError::Draw(DrawError::NoSuchSegment(2)))
        );
        assert_eq!(s.target(), TargetId::Matrix);

        let good = Instruction::SelectTarget {
            target: TargetId::Panel,
        };
        s.dispatch(&good).unwrap();
        assert_eq!(s.target(), TargetId::Panel);
    }

    #[test]
    fn test_ping_reports_presents() {
        let mut s = session();
        s.dispatch(&Instruction::Present).unwrap();
        s.dispatch(&Instruction::Present).unwrap();
        assert_eq!(s.dispatch(&Instruction::Ping), Ok(Some(Reply::Pong(2))));
    }

    #[test]
    fn test_host_bound_opcodes_rejected() {
        let mut s = session();
        assert_eq!(
            s.dispatch(&Instruction::Ack { seq: 1 }),
            Err(DispatchError::Unexpected(Opcode::Ack))
        );
    }

    #[test]
    fn test_palette_bounds() {
        let mut s = session();
        let set = Instruction::SetPalette {
            index: 16,
            color: Rgb::RED,
        };
        assert_eq!(s.dispatch(&set), Err(DispatchError::BadPaletteIndex(16)));
    }

    #[test]
    fn test_tick_publishes_animation_values() {
        let mut s = session();
        for (time_ms, value) in [(0u16, 0i16), (100, 50)] {
            s.dispatch(&Instruction::AnimKeyframe {
                id: 1,
                time_ms,
                value,
                easing: lumen_protocol::Easing::Linear,
            })
            .unwrap();
        }
        s.dispatch(&Instruction::AnimStart {
            id: 1,
            mode: lumen_protocol::LoopMode::Once,
        })
        .unwrap();

        s.tick(40);
        assert_eq!(s.vars().get(ANIMATION_VAR_BASE + 1), Ok(20));
        assert!(!s.vars().is_set(ANIMATION_VAR_BASE));
    }

    #[test]
    fn test_reset_restores_boot_state() {
        let mut s = session();
        s.dispatch(&Instruction::SetVar { index: 3, value: 9 }).unwrap();
        s.dispatch(&Instruction::SelectTarget {
            target: TargetId::Panel,
        })
        .unwrap();
        s.dispatch(&Instruction::Clear { color: Rgb::WHITE }).unwrap();

        s.dispatch(&Instruction::Reset).unwrap();
        assert_eq!(s.target(), TargetId::Matrix);
        assert!(!s.vars().is_set(3));
        assert_eq!(
            s.compositor().pending(SurfaceId::Panel).map(|c| c.lit_count()),
            Some(0)
        );
    }
}
