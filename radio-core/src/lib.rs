//! # Raw Radio Bridge Core
//!
//! This crate is the whole "dumb radio" between a wired serial link and raw
//! 802.11 broadcast frames:
//!
//! - **Ring Channels**: lock-free SPSC byte rings shared with the UART interrupt
//! - **Packet Framer**: resumable decoder for `[len_hi][len_lo][payload]`
//! - **Radio Link**: probe-request frame builder and the tag-based receive filter
//! - **Bridge Tick**: the periodic step that moves one packet per tick
//!
//! The bridge never looks inside a payload. Encryption, sequencing and
//! integrity checks belong to the device on the wired side.
//!
//! ## Architecture
//!
//! ```text
//! UART RX ──► RingChannel(in) ──► PacketFramer ──► Transmitter ──► medium
//!                                   (tick)
//! UART TX ◄── RingChannel(out) ◄── Receiver::on_frame ◄─────────── medium
//!                                   (capture callback)
//! ```
//!
//! ## Execution Contexts
//!
//! 1. UART interrupt: [`port::service_rx`] / [`port::service_tx`], ring indices only
//! 2. Tick (default 10 ms): [`tick::BridgeTick`] and [`housekeeping::Housekeeping`]
//! 3. Capture callback: [`link::Receiver::on_frame`]
//!
//! None of them block or take a lock; full buffers drop and count.

#![cfg_attr(not(feature = "std"), no_std)]

// Must come first so the logging macros are visible to every module
mod fmt;

pub mod config;
pub mod frame;
pub mod framer;
pub mod housekeeping;
pub mod link;
pub mod port;
pub mod ring;
pub mod tick;
pub mod traits;

// Re-export main types for convenience
pub use config::{BridgeConfig, ConfigError};
pub use frame::{FrameHeader, MacAddr, RxMetadata, SequenceCounter};
pub use framer::{FramerState, FramerStats, PacketFramer};
pub use housekeeping::{HeartbeatReport, Housekeeping, WiredStats};
pub use link::{Channel, ChannelError, LinkError, LinkState, LinkStats, Receiver, RxDrop, SendError, Transmitter};
pub use ring::{Consumer, Producer, RingChannel};
pub use tick::{BridgeTick, TickOutcome};
pub use traits::{ByteSink, ByteSource, DiagnosticsSink, RawRadio, StatusIndicator};

/// Library version for diagnostics banners
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest payload carried in one packet (wired and wireless)
pub const MAX_PACKET_SIZE: usize = 256;

/// Size of the big-endian length prefix on the wired link
pub const LEN_PREFIX_SIZE: usize = 2;

/// Wired-in ring size (power of two)
pub const WIRED_RX_BUFFER_SIZE: usize = 1024;

/// Wired-out ring size (power of two)
pub const WIRED_TX_BUFFER_SIZE: usize = 1024;

/// Ring carrying bytes from the UART to the framer
pub type WiredRxChannel = RingChannel<WIRED_RX_BUFFER_SIZE>;

/// Ring carrying received payloads to the UART
pub type WiredTxChannel = RingChannel<WIRED_TX_BUFFER_SIZE>;
