//! # Simulated Broadcast Medium
//!
//! Raw 802.11 frames carried in UDP datagrams. A datagram is exactly what
//! would be on the air: header, body and a 4-byte FCS trailer (zeroed, the
//! receive path never checks it).
//!
//! On the receive side each datagram is wrapped in the same capture layout a
//! radio driver hands to its promiscuous callback ([`RxMetadata`] followed by
//! the frame) so it goes through the real filter chain.

use std::io;
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::Arc;

use log::{debug, trace};
use radio_core::frame::{FCS_LEN, MAX_FRAME_LEN, RX_METADATA_LEN};
use radio_core::traits::{ByteSink, RawRadio};
use radio_core::{Channel, LinkState, MacAddr, Receiver, RxMetadata};
use tokio::net::UdpSocket;

/// Receive buffer size, comfortably above the largest valid frame
pub const MAX_DATAGRAM_LEN: usize = 2048;

/// Signal strength reported for simulated captures
const SIMULATED_RSSI: i8 = -40;

/// [`RawRadio`] over a UDP socket
///
/// Injection never waits: the socket is non-blocking, so if it cannot take
/// the datagram right now the frame is refused. Handing the datagram to the
/// socket counts as transmit completion.
pub struct UdpMedium {
    socket: StdUdpSocket,
    peer: SocketAddr,
    mac: MacAddr,
    channel: Channel,
    state: Arc<LinkState>,
    datagram: Vec<u8>,
}

impl UdpMedium {
    /// Send frames from `socket` to `peer`
    ///
    /// Switches the socket to non-blocking mode and enables broadcast.
    pub fn new(
        socket: StdUdpSocket,
        peer: SocketAddr,
        mac: MacAddr,
        channel: Channel,
        state: Arc<LinkState>,
    ) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        socket.set_broadcast(true)?;
        Ok(Self {
            socket,
            peer,
            mac,
            channel,
            state,
            datagram: Vec::with_capacity(MAX_FRAME_LEN + FCS_LEN),
        })
    }

    /// Where frames are sent
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl RawRadio for UdpMedium {
    type Error = io::Error;

    fn mac_address(&self) -> MacAddr {
        self.mac
    }

    fn inject(&mut self, frame: &[u8]) -> io::Result<()> {
        self.datagram.clear();
        self.datagram.extend_from_slice(frame);
        self.datagram.extend_from_slice(&[0u8; FCS_LEN]);

        let sent = self.socket.send_to(&self.datagram, self.peer)?;
        if sent != self.datagram.len() {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "short datagram"));
        }

        self.state.complete_tx();
        Ok(())
    }

    fn set_channel(&mut self, channel: Channel) -> io::Result<()> {
        self.channel = channel;
        Ok(())
    }

    fn channel(&self) -> Channel {
        self.channel
    }
}

/// Turns received datagrams into captures for the filter chain
pub struct CaptureAdapter {
    receiver: Receiver,
    channel: Channel,
    capture: Vec<u8>,
}

impl CaptureAdapter {
    /// Filter for frames tagged with `tag`
    pub fn new(tag: MacAddr, channel: Channel) -> Self {
        Self {
            receiver: Receiver::new(tag),
            channel,
            capture: Vec::with_capacity(RX_METADATA_LEN + MAX_DATAGRAM_LEN),
        }
    }

    /// Follow a retune of the radio
    pub fn set_channel(&mut self, channel: Channel) {
        self.channel = channel;
    }

    /// Run one datagram through the receive path
    ///
    /// Returns the forwarded payload length, or `None` if the filter dropped
    /// the frame.
    pub fn deliver<S: ByteSink>(
        &mut self,
        state: &LinkState,
        datagram: &[u8],
        out: &mut S,
    ) -> Option<u16> {
        // The length field is 12 bits wide
        let air_len = datagram.len().min(0x0FFF) as u16;
        let meta = RxMetadata::legacy(air_len, SIMULATED_RSSI, self.channel.get());

        self.capture.clear();
        self.capture.extend_from_slice(&meta.encode());
        self.capture.extend_from_slice(datagram);

        match self.receiver.on_frame(state, &self.capture, out) {
            Ok(len) => Some(len),
            Err(reason) => {
                trace!("medium: dropped {} byte datagram ({:?})", datagram.len(), reason);
                None
            }
        }
    }
}

/// Receive one datagram from the medium socket and its sender
pub async fn recv_datagram(
    socket: &UdpSocket,
    buf: &mut [u8],
) -> io::Result<(usize, SocketAddr)> {
    let (len, from) = socket.recv_from(buf).await?;
    trace!("medium: {} bytes from {}", len, from);
    Ok((len, from))
}

/// Source address our own injected datagrams arrive from
///
/// A radio does not capture what it transmits, but a UDP broadcast is looped
/// back to the sender. For a socket bound to the unspecified address the
/// source IP is whatever the kernel routes `peer` through.
pub fn own_source_addr(socket: &StdUdpSocket, peer: SocketAddr) -> io::Result<SocketAddr> {
    let local = socket.local_addr()?;
    if !local.ip().is_unspecified() {
        return Ok(local);
    }

    let route = StdUdpSocket::bind(SocketAddr::new(local.ip(), 0))?;
    route.set_broadcast(true)?;
    match route.connect(peer).and_then(|()| route.local_addr()) {
        Ok(routed) => Ok(SocketAddr::new(routed.ip(), local.port())),
        Err(e) => {
            debug!("medium: no route to {} ({}), echo filter uses {}", peer, e, local);
            Ok(local)
        }
    }
}
