//! Host runtime errors.

use radio_core::{ChannelError, ConfigError};
use thiserror::Error;

/// Errors raised while configuring or running a bridge
#[derive(Error, Debug)]
pub enum HostError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("Bridge is not running")]
    Stopped,
}

/// Result alias for the host crate
pub type Result<T> = std::result::Result<T, HostError>;
