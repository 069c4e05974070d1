//! Host link configuration
//!
//! Stored as postcard bytes next to the renderer configuration. A
//! characterization run produces a [`LinkProfile`] that can be folded into
//! the configuration with [`LinkConfig::with_profile`].

use lumen_hal::UartConfig;
use lumen_protocol::{DEFAULT_RX_LIMIT, MAX_PAYLOAD_SIZE};
use serde::{Deserialize, Serialize};

use crate::characterize::LinkProfile;

/// Default wait for an ack
pub const DEFAULT_ACK_TIMEOUT_MS: u32 = 50;

/// Configuration version
pub const LINK_CONFIG_VERSION: u8 = 1;

/// Largest serialized [`LinkConfig`]
pub const MAX_LINK_CONFIG_SIZE: usize = 32;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkConfigError {
    ZeroBaudrate,
    ZeroTimeout,
    /// `EveryNth(0)`
    ZeroAckInterval,
    /// Packet size of zero or above the frame payload limit
    BadPacketSize(u16),
    VersionMismatch,
    Deserialize,
    Serialize,
}

/// Which frames travel in a reliable envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckMode {
    /// Every frame is acked
    #[default]
    EveryFrame,
    /// Every `n`th frame is acked, the rest are sent plain
    EveryNth(u16),
    /// Plain frames only
    Never,
}

impl AckMode {
    /// Whether the frame with zero-based `index` should be acked
    pub fn wants_ack(self, index: u32) -> bool {
        match self {
            AckMode::EveryFrame => true,
            AckMode::EveryNth(0) | AckMode::Never => false,
            AckMode::EveryNth(n) => (index % u32::from(n)) == u32::from(n) - 1,
        }
    }
}

/// Host side link settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    pub version: u8,
    pub uart: UartConfig,
    /// Wait for each ack at most this long
    pub ack_timeout_ms: u32,
    pub ack_mode: AckMode,
    /// Largest frame payload the host will send
    ///
    /// Must not exceed the renderer's receive limit.
    pub packet_size: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            version: LINK_CONFIG_VERSION,
            uart: UartConfig::default(),
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            ack_mode: AckMode::EveryFrame,
            packet_size: DEFAULT_RX_LIMIT as u16,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<(), LinkConfigError> {
        if self.version != LINK_CONFIG_VERSION {
            return Err(LinkConfigError::VersionMismatch);
        }
        if self.uart.baudrate == 0 {
            return Err(LinkConfigError::ZeroBaudrate);
        }
        if self.ack_timeout_ms == 0 {
            return Err(LinkConfigError::ZeroTimeout);
        }
        if self.ack_mode == AckMode::EveryNth(0) {
            return Err(LinkConfigError::ZeroAckInterval);
        }
        if self.packet_size == 0 || self.packet_size as usize > MAX_PAYLOAD_SIZE {
            return Err(LinkConfigError::BadPacketSize(self.packet_size));
        }
        Ok(())
    }

    /// Adopt the baud rate and packet size of a characterized profile
    pub fn with_profile(self, profile: &LinkProfile) -> Self {
        Self {
            uart: UartConfig {
                baudrate: profile.baudrate,
                ..self.uart
            },
            packet_size: profile.packet_size,
            ..self
        }
    }

    /// Decode and validate a stored configuration
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LinkConfigError> {
        let config: LinkConfig =
            postcard::from_bytes(bytes).map_err(|_| LinkConfigError::Deserialize)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize into `buffer`, returning the used prefix
    pub fn to_slice<'b>(&self, buffer: &'b mut [u8]) -> Result<&'b mut [u8], LinkConfigError> {
        postcard::to_slice(self, buffer).map_err(|_| LinkConfigError::Serialize)
    }
}
