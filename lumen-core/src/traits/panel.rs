//! Panel driver trait

use crate::compositor::Canvas;

/// Errors reported by a panel driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelError {
    /// Previous transfer still in progress
    Busy,
    /// Bus or peripheral failure
    Bus,
}

/// A physical output the compositor can present to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SurfaceId {
    /// Matrix segment, numbered left to right
    Segment(u8),
    /// The secondary panel
    Panel,
}

/// Trait for the driver that owns the physical outputs
///
/// The compositor calls [`PanelDriver::show`] only from inside `present`,
/// and only with a fully drawn frame. Drivers either copy the canvas out or
/// stream it to the hardware before returning; the canvas is not borrowed
/// past the call.
pub trait PanelDriver {
    /// Push a completed frame to one output
    fn show(&mut self, surface: SurfaceId, frame: &Canvas) -> Result<(), PanelError>;
}

impl<T: PanelDriver + ?Sized> PanelDriver for &mut T {
    fn show(&mut self, surface: SurfaceId, frame: &Canvas) -> Result<(), PanelError> {
        (**self).show(surface, frame)
    }
}
