//! Hardware abstraction traits
//!
//! The interface between the compositor and whatever physically lights the
//! pixels.

pub mod panel;

pub use panel::{PanelDriver, PanelError, SurfaceId};
