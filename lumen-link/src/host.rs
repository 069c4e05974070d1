//! Host command API
//!
//! [`HostLink`] owns the serial port and clock, encodes drawing commands and
//! applies the configured [`AckMode`](crate::config::AckMode): frames picked
//! by the mode go through the reliable slot, the rest are written plain.

use lumen_hal::{Clock, UartRx, UartTx};
use lumen_protocol::{
    Easing, Frame, Instruction, LoopMode, Rgb, SpriteFormat, TargetId, VarValues,
    MAX_POLYGON_VERTICES, MIN_POLYGON_VERTICES,
};

use crate::config::{LinkConfig, LinkConfigError};
use crate::sender::{ReliableSender, SendError, SendOutcome};

/// Envelope bytes added in front of the inner payload (sequence and opcode)
const ENVELOPE_OVERHEAD: usize = 2;

/// What happened to one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    /// Written without asking for an ack
    Unconfirmed,
    Acked { seq: u8, rtt_micros: u64 },
    TimedOut { seq: u8 },
}

impl Delivery {
    pub fn timed_out(&self) -> bool {
        matches!(self, Delivery::TimedOut { .. })
    }
}

impl From<SendOutcome> for Delivery {
    fn from(outcome: SendOutcome) -> Self {
        match outcome {
            SendOutcome::Acked { seq, rtt_micros } => Delivery::Acked { seq, rtt_micros },
            SendOutcome::TimedOut { seq } => Delivery::TimedOut { seq },
        }
    }
}

/// Host end of the link
pub struct HostLink<P, C> {
    port: P,
    clock: C,
    config: LinkConfig,
    sender: ReliableSender,
    commands: u32,
}

impl<P, C, E> HostLink<P, C>
where
    P: UartTx<Error = E> + UartRx<Error = E>,
    C: Clock,
{
    /// Fails if `config` does not validate
    pub fn new(port: P, clock: C, config: LinkConfig) -> Result<Self, LinkConfigError> {
        config.validate()?;
        info!(
            "Host link at {} baud, ack mode {}",
            config.uart.baudrate, config.ack_mode
        );
        Ok(Self {
            port,
            clock,
            config,
            sender: ReliableSender::new(),
            commands: 0,
        })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn sender(&self) -> &ReliableSender {
        &self.sender
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn into_parts(self) -> (P, C) {
        (self.port, self.clock)
    }

    /// Send one instruction, reliably or plain per the ack mode
    pub fn send(&mut self, instruction: &Instruction<'_>) -> Result<Delivery, SendError<E>> {
        let index = self.commands;
        self.commands = self.commands.wrapping_add(1);

        if self.config.ack_mode.wants_ack(index) {
            let timeout_ms = self.config.ack_timeout_ms;
            self.send_reliable(instruction, timeout_ms).map(Delivery::from)
        } else {
            self.send_plain(instruction).map(|_| Delivery::Unconfirmed)
        }
    }

    /// Send one instruction in an envelope and wait for its ack
    pub fn send_reliable(
        &mut self,
        instruction: &Instruction<'_>,
        timeout_ms: u32,
    ) -> Result<SendOutcome, SendError<E>> {
        let frame = instruction.to_frame()?;
        self.check_size(frame.payload.len() + ENVELOPE_OVERHEAD)?;
        self.sender
            .send_reliable(&mut self.port, &self.clock, &frame, timeout_ms)
    }

    /// Write one instruction without an envelope
    pub fn send_plain(&mut self, instruction: &Instruction<'_>) -> Result<(), SendError<E>> {
        let frame = instruction.to_frame()?;
        self.check_size(frame.payload.len())?;
        self.write_frame(&frame)
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), SendError<E>> {
        let bytes = frame.encode_to_vec()?;
        self.port.write_blocking(&bytes).map_err(SendError::Io)?;
        self.port.flush().map_err(SendError::Io)
    }

    fn check_size(&self, len: usize) -> Result<(), SendError<E>> {
        let limit = self.config.packet_size;
        if len > limit as usize {
            return Err(SendError::Oversize {
                len: len.min(u16::MAX as usize) as u16,
                limit,
            });
        }
        Ok(())
    }

    /// Process replies that arrived since the last call
    pub fn poll_replies(&mut self) -> Result<usize, SendError<E>> {
        self.sender
            .pump(&mut self.port, &self.clock)
            .map_err(SendError::Io)
    }

    /// Ask for a heartbeat
    ///
    /// Returns the renderer's present counter, or `None` if no pong arrived
    /// within `timeout_ms`.
    pub fn ping(&mut self, timeout_ms: u32) -> Result<Option<u32>, SendError<E>> {
        // Stale answers do not count
        self.poll_replies()?;
        let _ = self.sender.take_pong();

        let start = self.clock.now_micros();
        self.send_plain(&Instruction::Ping)?;
        let timeout_micros = u64::from(timeout_ms) * 1_000;
        loop {
            self.poll_replies()?;
            if let Some(frames) = self.sender.take_pong() {
                return Ok(Some(frames));
            }
            if self.clock.elapsed_micros(start) > timeout_micros {
                warn!("Ping timed out after {} ms", timeout_ms);
                return Ok(None);
            }
        }
    }

    pub fn nop(&mut self) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::Nop)
    }

    pub fn reset(&mut self) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::Reset)
    }

    pub fn select_target(&mut self, target: TargetId) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::SelectTarget { target })
    }

    pub fn present(&mut self) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::Present)
    }

    pub fn clear(&mut self, color: Rgb) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::Clear { color })
    }

    pub fn draw_pixel(&mut self, x: i16, y: i16, color: Rgb) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::DrawPixel { x, y, color })
    }

    pub fn draw_line(
        &mut self,
        (x0, y0): (i16, i16),
        (x1, y1): (i16, i16),
        color: Rgb,
    ) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::DrawLine {
            x0,
            y0,
            x1,
            y1,
            color,
        })
    }

    pub fn draw_rect(
        &mut self,
        x: i16,
        y: i16,
        w: i16,
        h: i16,
        color: Rgb,
    ) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::DrawRect { x, y, w, h, color })
    }

    pub fn fill_rect(
        &mut self,
        x: i16,
        y: i16,
        w: i16,
        h: i16,
        color: Rgb,
    ) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::FillRect { x, y, w, h, color })
    }

    pub fn draw_circle(
        &mut self,
        cx: i16,
        cy: i16,
        radius: i16,
        color: Rgb,
    ) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::DrawCircle {
            cx,
            cy,
            radius,
            color,
        })
    }

    pub fn fill_circle(
        &mut self,
        cx: i16,
        cy: i16,
        radius: i16,
        color: Rgb,
    ) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::FillCircle {
            cx,
            cy,
            radius,
            color,
        })
    }

    pub fn draw_triangle(
        &mut self,
        points: [(i16, i16); 3],
        color: Rgb,
    ) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::DrawTriangle { points, color })
    }

    /// Fill a polygon through the variable table
    ///
    /// Vertices are written to variables starting at `var_start`, then the
    /// polygon is drawn from them. If the vertex write times out the draw is
    /// skipped and that delivery is returned.
    pub fn fill_polygon(
        &mut self,
        var_start: u8,
        points: &[(i16, i16)],
        color: Rgb,
    ) -> Result<Delivery, SendError<E>> {
        let count = points.len();
        if !(MIN_POLYGON_VERTICES as usize..=MAX_POLYGON_VERTICES as usize).contains(&count) {
            return Err(SendError::VertexCount(count));
        }

        let mut values = [0i16; 2 * MAX_POLYGON_VERTICES as usize];
        for (slot, (x, y)) in values.chunks_exact_mut(2).zip(points) {
            slot[0] = *x;
            slot[1] = *y;
        }
        let vertices = self.set_vars(var_start, &values[..2 * count])?;
        if vertices.timed_out() {
            return Ok(vertices);
        }
        self.send(&Instruction::DrawPolygon {
            count: count as u8,
            var_start,
            color,
        })
    }

    pub fn set_var(&mut self, index: u8, value: i16) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::SetVar { index, value })
    }

    pub fn set_vars(&mut self, start: u8, values: &[i16]) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::SetVars {
            start,
            values: VarValues::Values(values),
        })
    }

    pub fn set_palette(&mut self, index: u8, color: Rgb) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::SetPalette { index, color })
    }

    pub fn upload_sprite(
        &mut self,
        id: u8,
        width: u8,
        height: u8,
        format: SpriteFormat,
        data: &[u8],
    ) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::UploadSprite {
            id,
            width,
            height,
            format,
            data,
        })
    }

    pub fn delete_sprite(&mut self, id: u8) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::DeleteSprite { id })
    }

    pub fn draw_sprite(&mut self, id: u8, x: i16, y: i16) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::DrawSprite { id, x, y })
    }

    pub fn anim_keyframe(
        &mut self,
        id: u8,
        time_ms: u16,
        value: i16,
        easing: Easing,
    ) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::AnimKeyframe {
            id,
            time_ms,
            value,
            easing,
        })
    }

    pub fn anim_start(&mut self, id: u8, mode: LoopMode) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::AnimStart { id, mode })
    }

    pub fn anim_stop(&mut self, id: u8) -> Result<Delivery, SendError<E>> {
        self.send(&Instruction::AnimStop { id })
    }
}
