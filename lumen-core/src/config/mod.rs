//! Renderer configuration
//!
//! Describes the physical surfaces the renderer owns. Configuration is
//! stored as postcard binary data and checked once at startup: a renderer is
//! never built from a configuration that fails [`RendererConfig::validate`].

use heapless::Vec;
use lumen_protocol::{Opcode, TargetId, MAX_PAYLOAD_SIZE};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of matrix segments
pub const MAX_SEGMENTS: usize = 4;

/// Current configuration format version
pub const CONFIG_VERSION: u8 = 1;

/// Maximum serialized configuration size
pub const MAX_CONFIG_SIZE: usize = 64;

/// Configuration errors
///
/// All of them are fatal: the receive loop is never started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// No matrix segments configured
    NoSegments,
    /// More segments than [`MAX_SEGMENTS`]
    TooManySegments,
    /// A segment has zero width
    ZeroWidthSegment(u8),
    /// Matrix height is zero
    ZeroHeight,
    /// Secondary panel has a zero dimension
    ZeroSizePanel,
    /// Virtual matrix is wider than a signed coordinate can address
    MatrixTooWide,
    /// A surface is taller than a signed coordinate can address
    TooTall,
    /// Receive limit is above the protocol maximum or too small for any
    /// fixed-size instruction
    BadRxLimit(u16),
    /// Default target byte is not a valid target for this layout
    BadDefaultTarget(u8),
    /// Stored configuration version does not match
    VersionMismatch,
    /// Stored configuration could not be decoded
    Deserialize,
    /// Configuration does not fit the output buffer
    Serialize,
}

/// Renderer surface layout and receive settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RendererConfig {
    /// Format version
    pub version: u8,
    /// Width of each matrix segment, left to right
    pub segment_widths: Vec<u16, MAX_SEGMENTS>,
    /// Height shared by all matrix segments
    pub segment_height: u16,
    /// Secondary panel width
    pub panel_width: u16,
    /// Secondary panel height
    pub panel_height: u16,
    /// Largest frame payload the receiver buffers
    pub rx_limit: u16,
    /// Wire id of the target selected at start and after reset
    pub default_target: u8,
}

impl Default for RendererConfig {
    /// Two 64×32 matrix segments and a 128×128 panel
    fn default() -> Self {
        let mut segment_widths = Vec::new();
        let _ = segment_widths.push(64);
        let _ = segment_widths.push(64);
        Self {
            version: CONFIG_VERSION,
            segment_widths,
            segment_height: 32,
            panel_width: 128,
            panel_height: 128,
            rx_limit: 2048,
            default_target: TargetId::Matrix.to_byte(),
        }
    }
}

impl RendererConfig {
    /// Build a configuration with the given segment widths
    pub fn with_segments(widths: &[u16], height: u16) -> Result<Self, ConfigError> {
        let segment_widths =
            Vec::from_slice(widths).map_err(|_| ConfigError::TooManySegments)?;
        Ok(Self {
            segment_widths,
            segment_height: height,
            ..Self::default()
        })
    }

    /// Number of matrix segments
    pub fn segment_count(&self) -> usize {
        self.segment_widths.len()
    }

    /// Width of the virtual matrix
    pub fn total_width(&self) -> u32 {
        self.segment_widths.iter().map(|w| *w as u32).sum()
    }

    /// Check every constraint the renderer relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::VersionMismatch);
        }
        if self.segment_widths.is_empty() {
            return Err(ConfigError::NoSegments);
        }
        if self.segment_widths.len() > MAX_SEGMENTS {
            return Err(ConfigError::TooManySegments);
        }
        if let Some(index) = self.segment_widths.iter().position(|w| *w == 0) {
            return Err(ConfigError::ZeroWidthSegment(index as u8));
        }
        if self.segment_height == 0 {
            return Err(ConfigError::ZeroHeight);
        }
        if self.panel_width == 0 || self.panel_height == 0 {
            return Err(ConfigError::ZeroSizePanel);
        }

        let max = i16::MAX as u32;
        if self.total_width() > max || self.panel_width as u32 > max {
            return Err(ConfigError::MatrixTooWide);
        }
        if self.segment_height as u32 > max || self.panel_height as u32 > max {
            return Err(ConfigError::TooTall);
        }

        let rx_limit = self.rx_limit as usize;
        if rx_limit > MAX_PAYLOAD_SIZE || rx_limit < largest_fixed_payload() {
            return Err(ConfigError::BadRxLimit(self.rx_limit));
        }

        match TargetId::from_byte(self.default_target) {
            Some(TargetId::Segment(n)) if (n as usize) < self.segment_count() => Ok(()),
            Some(TargetId::Matrix) | Some(TargetId::Panel) => Ok(()),
            _ => Err(ConfigError::BadDefaultTarget(self.default_target)),
        }
    }

    /// The default target, assuming the configuration is valid
    pub fn default_target(&self) -> TargetId {
        TargetId::from_byte(self.default_target).unwrap_or(TargetId::Matrix)
    }
}

#[cfg(feature = "serde")]
impl RendererConfig {
    /// Decode and validate a stored configuration
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: RendererConfig =
            postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize into `buffer`, returning the used prefix
    pub fn to_slice<'b>(&self, buffer: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        postcard::to_slice(self, buffer).map_err(|_| ConfigError::Serialize)
    }
}

/// Largest payload among opcodes with a fixed layout
fn largest_fixed_payload() -> usize {
    (0..=u8::MAX)
        .filter_map(Opcode::from_byte)
        .filter_map(Opcode::fixed_payload_len)
        .max()
        .unwrap_or(0)
}
