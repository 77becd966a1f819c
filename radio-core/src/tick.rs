//! Periodic wired -> wireless step.
//!
//! Each call feeds the framer once from the wired-in channel and dispatches
//! at most one packet, which bounds the work done per tick. A packet refused
//! with [`SendError::Busy`] is kept and offered again on the following tick
//! before the framer is fed any further.

use heapless::Vec;

use crate::framer::{FramerStats, PacketFramer};
use crate::link::{LinkState, SendError, Transmitter};
use crate::traits::{ByteSource, RawRadio};
use crate::MAX_PACKET_SIZE;

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// No complete packet this tick
    Idle,
    /// A packet of `len` bytes was accepted by the medium
    Sent {
        /// Payload length
        len: usize,
    },
    /// The medium is busy; the packet is held for the next tick
    Deferred,
    /// The packet was refused and dropped
    Dropped(SendError),
}

/// Orchestrates framer and transmitter on the tick context
pub struct BridgeTick {
    framer: PacketFramer,
    pending: Option<Vec<u8, MAX_PACKET_SIZE>>,
}

impl BridgeTick {
    /// Create an idle tick driver
    pub const fn new() -> Self {
        Self {
            framer: PacketFramer::new(),
            pending: None,
        }
    }

    /// Run one tick
    pub fn tick<S, R>(
        &mut self,
        wired_in: &mut S,
        tx: &mut Transmitter<R>,
        state: &LinkState,
    ) -> TickOutcome
    where
        S: ByteSource + ?Sized,
        R: RawRadio,
    {
        if let Some(packet) = self.pending.take() {
            return match tx.send(state, &packet) {
                Ok(()) => TickOutcome::Sent { len: packet.len() },
                Err(SendError::Busy) => {
                    self.pending = Some(packet);
                    TickOutcome::Deferred
                }
                Err(e) => TickOutcome::Dropped(e),
            };
        }

        let Some(packet) = self.framer.feed(wired_in) else {
            return TickOutcome::Idle;
        };

        match tx.send(state, packet) {
            Ok(()) => {
                trace!("tick: wired -> radio {} bytes", packet.len());
                TickOutcome::Sent { len: packet.len() }
            }
            Err(SendError::Busy) => {
                // packet.len() <= MAX_PACKET_SIZE, so the copy cannot fail
                self.pending = Vec::from_slice(packet).ok();
                TickOutcome::Deferred
            }
            Err(e) => {
                debug!("tick: dropped packet ({:?})", e);
                TickOutcome::Dropped(e)
            }
        }
    }

    /// A busy-refused packet is waiting for the next tick
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Framer counters
    pub fn framer_stats(&self) -> FramerStats {
        self.framer.stats()
    }

    /// Framer, for inspection
    pub fn framer(&self) -> &PacketFramer {
        &self.framer
    }
}

impl Default for BridgeTick {
    fn default() -> Self {
        Self::new()
    }
}
