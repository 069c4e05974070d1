//! Board-agnostic core of the Lumen renderer
//!
//! Everything the renderer keeps between frames, none of which depends on a
//! particular chip or panel:
//!
//! - Virtual display compositor (segment mapping, double buffering, present)
//! - Rasterizer for the drawing primitives
//! - Variable table, palette and sprite store
//! - Keyframe animation tracks
//! - Renderer configuration and its validation
//! - The panel driver trait the compositor presents through

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod animation;
pub mod compositor;
pub mod config;
pub mod palette;
pub mod raster;
pub mod sprites;
pub mod traits;
pub mod vars;
