//! Host-side configuration.
//!
//! Wraps the core [`BridgeConfig`] with the endpoints of the simulated
//! medium. Loaded from JSON:
//!
//! ```json
//! {
//!   "bridge": { "channel": 6, "rendezvous_tag": [170, 187, 204, 221, 238, 0] },
//!   "medium_bind": "0.0.0.0:47800",
//!   "medium_peer": "255.255.255.255:47800",
//!   "mac_address": [2, 0, 0, 0, 0, 1]
//! }
//! ```

use std::net::SocketAddr;
use std::path::Path;

use radio_core::{BridgeConfig, MacAddr};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default UDP port of the simulated medium
pub const DEFAULT_MEDIUM_PORT: u16 = 47800;

/// Everything needed to run one bridge on a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Core bridge parameters
    pub bridge: BridgeConfig,
    /// Local address of the medium socket
    pub medium_bind: SocketAddr,
    /// Where injected frames are sent (a broadcast address or one peer)
    pub medium_peer: SocketAddr,
    /// Station address reported by the simulated radio
    pub mac_address: MacAddr,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            medium_bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_MEDIUM_PORT)),
            medium_peer: SocketAddr::from(([255, 255, 255, 255], DEFAULT_MEDIUM_PORT)),
            mac_address: MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
        }
    }
}

impl HostConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.bridge.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use radio_core::ConfigError;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = HostConfig::from_json(r#"{ "bridge": { "channel": 6 } }"#).unwrap();
        assert_eq!(config.bridge.channel.get(), 6);
        assert_eq!(config.bridge.baud_rate, 460_800);
        assert_eq!(config.medium_bind.port(), DEFAULT_MEDIUM_PORT);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = HostConfig {
            medium_peer: "127.0.0.1:9000".parse().unwrap(),
            ..HostConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(HostConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_out_of_range_channel_rejected() {
        let err = HostConfig::from_json(r#"{ "bridge": { "channel": 15 } }"#).unwrap_err();
        assert!(matches!(err, HostError::Json(_)));
    }

    #[test]
    fn test_multicast_tag_rejected() {
        let json = r#"{ "bridge": { "rendezvous_tag": [1, 0, 0, 0, 0, 0] } }"#;
        let err = HostConfig::from_json(json).unwrap_err();
        assert!(matches!(err, HostError::Config(ConfigError::MulticastTag)));
    }
}
