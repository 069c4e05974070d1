//! Virtual display compositor
//!
//! Owns one [`DoubleBuffer`] per matrix segment plus one for the secondary
//! panel. Drawing always lands in pending buffers; only [`Compositor::present`]
//! makes anything visible, and only to the surfaces of the presented target.
//!
//! Targets:
//! - `Matrix`: virtual coordinates spanning every segment, split per pixel
//!   through [`SegmentLayout::map_virtual`]
//! - `Segment(n)`: segment-local coordinates
//! - `Panel`: panel-local coordinates

mod buffer;
mod layout;

pub use buffer::{Canvas, DoubleBuffer};
pub use layout::{OutOfBounds, SegmentLayout, SegmentPoint};

use alloc::vec::Vec;

use lumen_protocol::{Rgb, TargetId};

use crate::config::{ConfigError, RendererConfig};
use crate::raster::PixelSink;
use crate::traits::{PanelDriver, PanelError, SurfaceId};

/// Errors from compositor operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrawError {
    /// Segment index beyond the configured layout
    NoSuchSegment(u8),
    /// Single pixel outside the target
    OutOfBounds,
    /// Panel driver rejected a presented frame
    Panel(PanelError),
}

impl From<OutOfBounds> for DrawError {
    fn from(_: OutOfBounds) -> Self {
        DrawError::OutOfBounds
    }
}

impl From<PanelError> for DrawError {
    fn from(e: PanelError) -> Self {
        DrawError::Panel(e)
    }
}

/// All surfaces and their buffers
#[derive(Debug, Clone)]
pub struct Compositor {
    layout: SegmentLayout,
    segments: Vec<DoubleBuffer>,
    panel: DoubleBuffer,
}

impl Compositor {
    /// Allocate every surface described by a validated configuration
    pub fn new(config: &RendererConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let layout = SegmentLayout::from_config(config);
        let segments = config
            .segment_widths
            .iter()
            .map(|w| DoubleBuffer::new(*w, config.segment_height))
            .collect();

        Ok(Self {
            layout,
            segments,
            panel: DoubleBuffer::new(config.panel_width, config.panel_height),
        })
    }

    pub fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Resolve a virtual matrix coordinate
    pub fn map_virtual(&self, x: i16, y: i16) -> Result<SegmentPoint, OutOfBounds> {
        self.layout.map_virtual(x, y)
    }

    /// Check that a target exists in this layout
    pub fn check_target(&self, target: TargetId) -> Result<(), DrawError> {
        match target {
            TargetId::Segment(n) if n as usize >= self.segments.len() => {
                Err(DrawError::NoSuchSegment(n))
            }
            _ => Ok(()),
        }
    }

    /// Drawing view over the pending buffers of a target
    pub fn view(&mut self, target: TargetId) -> Result<TargetView<'_>, DrawError> {
        self.check_target(target)?;
        let view = match target {
            TargetId::Matrix => TargetView::Matrix {
                layout: &self.layout,
                segments: &mut self.segments,
            },
            TargetId::Segment(n) => TargetView::Single(self.segments[n as usize].pending_mut()),
            TargetId::Panel => TargetView::Single(self.panel.pending_mut()),
        };
        Ok(view)
    }

    /// Set one pixel, reporting coordinates outside the target
    pub fn set_pixel(&mut self, target: TargetId, x: i16, y: i16, color: Rgb) -> Result<(), DrawError> {
        if self.view(target)?.plot(x as i32, y as i32, color) {
            Ok(())
        } else {
            Err(DrawError::OutOfBounds)
        }
    }

    /// Fill the pending buffers of a target
    pub fn clear(&mut self, target: TargetId, color: Rgb) -> Result<(), DrawError> {
        self.check_target(target)?;
        match target {
            TargetId::Matrix => self
                .segments
                .iter_mut()
                .for_each(|s| s.pending_mut().fill(color)),
            TargetId::Segment(n) => self.segments[n as usize].pending_mut().fill(color),
            TargetId::Panel => self.panel.pending_mut().fill(color),
        }
        Ok(())
    }

    /// Flip the surfaces of a target and hand each new frame to the driver
    ///
    /// `Matrix` presents every segment, `Segment(n)` only that segment and
    /// `Panel` only the panel. Every affected surface is flipped even if the
    /// driver fails on one of them; the first driver error is returned.
    pub fn present<P: PanelDriver + ?Sized>(
        &mut self,
        target: TargetId,
        driver: &mut P,
    ) -> Result<(), DrawError> {
        self.check_target(target)?;
        let mut result = Ok(());
        let mut show = |surface: SurfaceId, buffer: &mut DoubleBuffer| {
            let frame = buffer.flip();
            if let Err(e) = driver.show(surface, frame) {
                if result.is_ok() {
                    result = Err(DrawError::Panel(e));
                }
            }
        };

        match target {
            TargetId::Matrix => {
                for (i, segment) in self.segments.iter_mut().enumerate() {
                    show(SurfaceId::Segment(i as u8), segment);
                }
            }
            TargetId::Segment(n) => show(SurfaceId::Segment(n), &mut self.segments[n as usize]),
            TargetId::Panel => show(SurfaceId::Panel, &mut self.panel),
        }
        result
    }

    /// Buffers of one surface
    pub fn surface(&self, surface: SurfaceId) -> Option<&DoubleBuffer> {
        match surface {
            SurfaceId::Segment(n) => self.segments.get(n as usize),
            SurfaceId::Panel => Some(&self.panel),
        }
    }

    /// The frame last presented on a surface
    pub fn visible(&self, surface: SurfaceId) -> Option<&Canvas> {
        self.surface(surface).map(DoubleBuffer::visible)
    }

    /// The frame being drawn on a surface
    pub fn pending(&self, surface: SurfaceId) -> Option<&Canvas> {
        self.surface(surface).map(DoubleBuffer::pending)
    }

    /// Black out every buffer of every surface
    pub fn reset(&mut self) {
        self.segments.iter_mut().for_each(DoubleBuffer::reset);
        self.panel.reset();
    }
}

/// Pending buffers of one target, as a [`PixelSink`]
pub enum TargetView<'a> {
    /// Virtual coordinates routed to segments
    Matrix {
        layout: &'a SegmentLayout,
        segments: &'a mut [DoubleBuffer],
    },
    /// A single canvas in local coordinates
    Single(&'a mut Canvas),
}

impl PixelSink for TargetView<'_> {
    fn size(&self) -> (i32, i32) {
        match self {
            TargetView::Matrix { layout, .. } => (layout.width() as i32, layout.height() as i32),
            TargetView::Single(canvas) => canvas.size(),
        }
    }

    fn plot(&mut self, x: i32, y: i32, color: Rgb) -> bool {
        match self {
            TargetView::Matrix { layout, segments } => match layout.locate(x, y) {
                Ok(p) => segments
                    .get_mut(p.segment as usize)
                    .map(|s| s.pending_mut().set(p.x, p.y, color))
                    .unwrap_or(false),
                Err(OutOfBounds) => false,
            },
            TargetView::Single(canvas) => canvas.plot(x, y, color),
        }
    }
}
