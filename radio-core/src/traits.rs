//! # Bridge Seams
//!
//! Small traits that separate the bridge logic from the hardware and the
//! platform it runs on:
//!
//! - **Byte paths**: [`ByteSource`] / [`ByteSink`] for the wired direction
//! - **Medium**: [`RawRadio`] for raw frame injection and channel control
//! - **Collaborators**: [`DiagnosticsSink`] and [`StatusIndicator`] for
//!   heartbeat reports and the status LED
//!
//! Each trait is deliberately narrow so tests can mock exactly one side.

use crate::housekeeping::HeartbeatReport;
use crate::frame::MacAddr;
use crate::link::Channel;

/// Non-blocking source of bytes (the consumer side of a ring channel)
pub trait ByteSource {
    /// Bytes that can be read right now
    fn available(&self) -> usize;

    /// Read up to `buf.len()` bytes. Returns 0 when nothing is available.
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

/// Non-blocking, lossy sink of bytes (the producer side of a ring channel)
pub trait ByteSink {
    /// Store as many bytes as fit and return how many were taken
    fn write(&mut self, data: &[u8]) -> usize;
}

/// Raw 802.11 medium with a promiscuous receiver
///
/// The receive direction is not part of this trait: the platform calls
/// [`crate::link::Receiver::on_frame`] from its capture callback.
pub trait RawRadio {
    /// Error reported when the medium refuses a frame or a setting
    type Error: core::fmt::Debug;

    /// Hardware address of this station
    fn mac_address(&self) -> MacAddr;

    /// Hand a complete frame (header + payload, no FCS) to the medium
    ///
    /// `Ok` means accepted for transmission. Completion is reported later
    /// through [`crate::link::LinkState::complete_tx`].
    fn inject(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Retune to `channel`
    fn set_channel(&mut self, channel: Channel) -> Result<(), Self::Error>;

    /// Channel currently in use
    fn channel(&self) -> Channel;
}

/// Receiver of periodic heartbeat reports
pub trait DiagnosticsSink {
    /// Publish one report. Must not block.
    fn report(&mut self, report: &HeartbeatReport);
}

/// On/off status output (the board LED)
pub trait StatusIndicator {
    /// Drive the indicator
    fn set(&mut self, on: bool);
}

impl<T: ByteSource + ?Sized> ByteSource for &mut T {
    fn available(&self) -> usize {
        (**self).available()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }
}

impl<T: ByteSink + ?Sized> ByteSink for &mut T {
    fn write(&mut self, data: &[u8]) -> usize {
        (**self).write(data)
    }
}

/// Plain byte slices act as a source, which keeps framer tests simple
impl ByteSource for &[u8] {
    fn available(&self) -> usize {
        self.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let len = buf.len().min(self.len());
        let (head, rest) = self.split_at(len);
        buf[..len].copy_from_slice(head);
        *self = rest;
        len
    }
}

/// Fixed-capacity vectors act as a lossy sink
impl<const N: usize> ByteSink for heapless::Vec<u8, N> {
    fn write(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(self.capacity() - self.len());
        // Length is clamped to the spare capacity above
        let _ = self.extend_from_slice(&data[..len]);
        len
    }
}
