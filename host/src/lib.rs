//! # Bridge Host Runtime
//!
//! Runs the [`radio_core`] bridge on a desktop host so it can be used and
//! tested without radio hardware:
//!
//! - **Wired link**: a TCP stream stands in for the UART
//! - **Medium**: UDP datagrams carry raw 802.11 frames between hosts
//! - **Runtime**: tokio tasks mirror the firmware's execution contexts
//!
//! ```no_run
//! use bridge_host::{spawn_bridge, HostConfig};
//! use tokio::net::TcpListener;
//!
//! # async fn run() -> bridge_host::Result<()> {
//! let config = HostConfig::load("bridge.json")?;
//! let listener = TcpListener::bind("127.0.0.1:7000").await?;
//! let (wired, _) = listener.accept().await?;
//! let bridge = spawn_bridge(config, wired).await?;
//! println!("{}", bridge.stats_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! Logging goes through the `log` facade; install whichever logger the
//! embedding program prefers.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod medium;
pub mod runtime;

pub use config::HostConfig;
pub use diagnostics::{LogDiagnostics, LogIndicator};
pub use error::{HostError, Result};
pub use medium::{CaptureAdapter, UdpMedium};
pub use runtime::{spawn_bridge, spawn_bridge_on, BridgeHandle};
