//! # Bridge Configuration
//!
//! Every tunable of the bridge in one serde-friendly struct. The defaults are
//! the values the hardware was validated with. A configuration can be stored
//! in a flash sector with [`BridgeConfig::to_slice`] and read back with
//! [`BridgeConfig::from_bytes`] (postcard encoding).

use serde::{Deserialize, Serialize};

use crate::frame::MacAddr;
use crate::link::Channel;

/// Default 2.4 GHz channel
pub const DEFAULT_CHANNEL: Channel = Channel::DEFAULT;

/// Default rendezvous tag carried in Addr3
pub const DEFAULT_RENDEZVOUS_TAG: MacAddr = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x00]);

/// Default wired link speed
pub const DEFAULT_BAUD_RATE: u32 = 460_800;

/// Default tick period (100 Hz)
pub const DEFAULT_TICK_PERIOD_MS: u32 = 10;

/// Upper bound for an encoded configuration
pub const MAX_ENCODED_LEN: usize = 64;

/// Runtime parameters of the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct BridgeConfig {
    /// Radio channel
    pub channel: Channel,
    /// Addr3 value that marks bridge frames
    pub rendezvous_tag: MacAddr,
    /// Wired UART baud rate (8N1)
    pub baud_rate: u32,
    /// Period of the bridge tick in milliseconds
    pub tick_period_ms: u32,
    /// Ticks between heartbeat reports
    pub heartbeat_ticks: u32,
    /// Ticks between LED flashes
    pub led_period_ticks: u32,
    /// Length of an LED flash in ticks
    pub led_flash_ticks: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL,
            rendezvous_tag: DEFAULT_RENDEZVOUS_TAG,
            baud_rate: DEFAULT_BAUD_RATE,
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            heartbeat_ticks: 500,
            led_period_ticks: 500,
            led_flash_ticks: 5,
        }
    }
}

/// Configuration rejected by [`BridgeConfig::validate`] or decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Rendezvous tag has the group bit set
    MulticastTag,
    /// A period or interval is zero
    ZeroInterval,
    /// Baud rate of zero
    ZeroBaudRate,
    /// Encoding buffer too small
    BufferTooSmall,
    /// Stored bytes are not a configuration
    Corrupt,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::MulticastTag => f.write_str("rendezvous tag must be a unicast address"),
            ConfigError::ZeroInterval => f.write_str("tick, heartbeat and LED periods must be non-zero"),
            ConfigError::ZeroBaudRate => f.write_str("baud rate must be non-zero"),
            ConfigError::BufferTooSmall => f.write_str("buffer too small for configuration"),
            ConfigError::Corrupt => f.write_str("stored configuration is corrupt"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

impl BridgeConfig {
    /// Check the values that cannot be expressed in the types
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rendezvous_tag.is_multicast() {
            return Err(ConfigError::MulticastTag);
        }
        if self.tick_period_ms == 0 || self.heartbeat_ticks == 0 || self.led_period_ticks == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::ZeroBaudRate);
        }
        Ok(())
    }

    /// Encode into `buffer` for persistent storage
    pub fn to_slice<'a>(&self, buffer: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buffer).map_err(|_| ConfigError::BufferTooSmall)
    }

    /// Decode and validate a stored configuration
    pub fn from_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(data).map_err(|_| ConfigError::Corrupt)?;
        config.validate()?;
        Ok(config)
    }
}
