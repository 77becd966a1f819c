//! # Raw Radio Link
//!
//! Send and receive paths of the bridge's 802.11 layer.
//!
//! ```text
//!   tick context                         capture callback context
//!  ┌──────────────┐                     ┌──────────────────────┐
//!  │ Transmitter  │── inject ─► medium ─│ Receiver::on_frame   │
//!  │  seq, frame  │                     │  filter chain        │
//!  └──────┬───────┘                     └──────────┬───────────┘
//!         │            ┌─────────────┐             │
//!         └───────────►│  LinkState  │◄────────────┘
//!    tx_ready, counters└─────────────┘ counters
//! ```
//!
//! [`LinkState`] is the only state shared between the two contexts. Its
//! `tx_ready` flag enforces single-flight sending: the tick context clears it,
//! the medium's completion signal sets it again.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::frame::{
    FrameHeader, MacAddr, RxMetadata, SequenceCounter, FCS_LEN, FTYPE_MGMT, HEADER_LEN,
    MAX_FRAME_LEN, RX_METADATA_LEN,
};
use crate::traits::{ByteSink, RawRadio};
use crate::{LEN_PREFIX_SIZE, MAX_PACKET_SIZE};

/// 2.4 GHz channel number, 1 through 14
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(try_from = "u8", into = "u8")]
pub struct Channel(u8);

impl Channel {
    /// Lowest valid channel
    pub const MIN: u8 = 1;
    /// Highest valid channel
    pub const MAX: u8 = 14;

    /// Factory default channel
    pub const DEFAULT: Self = Self(11);

    /// Validate a channel number
    pub const fn new(number: u8) -> Result<Self, ChannelError> {
        if number < Self::MIN || number > Self::MAX {
            return Err(ChannelError(number));
        }
        Ok(Self(number))
    }

    /// Channel number
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Channel {
    type Error = ChannelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

/// Channel number outside 1..=14
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelError(pub u8);

impl core::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid channel {} (must be 1-14)", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ChannelError {}

/// Why a send was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    /// Empty payload or longer than `MAX_PACKET_SIZE`
    Invalid,
    /// Previous frame not yet completed; resubmit on a later tick
    Busy,
    /// The medium refused the frame synchronously
    Radio,
}

/// Why a captured frame was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxDrop {
    /// Not a legacy 11b/g capture
    UnsupportedSignal,
    /// Buffer shorter than metadata + header + FCS
    TooShort,
    /// Not a management frame
    NotManagement,
    /// Addr3 is not our rendezvous tag
    TagMismatch,
    /// Declared length implies an impossible payload
    BadLength,
    /// Declared payload extends past the captured bytes
    Truncated,
}

/// Counter snapshot
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Frames accepted by the medium
    pub tx_count: u32,
    /// Sends refused (invalid, busy or medium error)
    pub tx_error_count: u32,
    /// Frames forwarded to the wired side
    pub rx_count: u32,
    /// Captures rejected by the filter chain
    pub rx_drop_count: u32,
}

/// State shared by the send path, the receive path and the completion signal
#[derive(Debug)]
pub struct LinkState {
    tx_ready: AtomicBool,
    tx_count: AtomicU32,
    tx_error_count: AtomicU32,
    rx_count: AtomicU32,
    rx_drop_count: AtomicU32,
}

impl LinkState {
    /// Fresh state: ready to send, all counters zero
    pub const fn new() -> Self {
        Self {
            tx_ready: AtomicBool::new(true),
            tx_count: AtomicU32::new(0),
            tx_error_count: AtomicU32::new(0),
            rx_count: AtomicU32::new(0),
            rx_drop_count: AtomicU32::new(0),
        }
    }

    /// No frame in flight
    #[inline]
    pub fn is_tx_ready(&self) -> bool {
        self.tx_ready.load(Ordering::Acquire)
    }

    /// Transmit completion signal from the medium
    pub fn complete_tx(&self) {
        self.tx_ready.store(true, Ordering::Release);
    }

    /// Read all counters
    pub fn snapshot(&self) -> LinkStats {
        LinkStats {
            tx_count: self.tx_count.load(Ordering::Relaxed),
            tx_error_count: self.tx_error_count.load(Ordering::Relaxed),
            rx_count: self.rx_count.load(Ordering::Relaxed),
            rx_drop_count: self.rx_drop_count.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters (the ready flag is left alone)
    pub fn reset_stats(&self) {
        self.tx_count.store(0, Ordering::Relaxed);
        self.tx_error_count.store(0, Ordering::Relaxed);
        self.rx_count.store(0, Ordering::Relaxed);
        self.rx_drop_count.store(0, Ordering::Relaxed);
    }

    fn mark_tx_busy(&self) {
        self.tx_ready.store(false, Ordering::Release);
    }

    fn count_tx(&self) {
        self.tx_count.fetch_add(1, Ordering::Relaxed);
    }

    fn count_tx_error(&self) {
        self.tx_error_count.fetch_add(1, Ordering::Relaxed);
    }

    fn count_rx(&self) {
        self.rx_count.fetch_add(1, Ordering::Relaxed);
    }

    fn count_rx_drop(&self) {
        self.rx_drop_count.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

/// Send path: builds probe-request frames and injects them
pub struct Transmitter<R: RawRadio> {
    radio: R,
    source: MacAddr,
    tag: MacAddr,
    sequence: SequenceCounter,
    frame: Vec<u8, MAX_FRAME_LEN>,
}

impl<R: RawRadio> Transmitter<R> {
    /// Wrap `radio`, reading its MAC address once
    pub fn new(radio: R, tag: MacAddr) -> Self {
        let source = radio.mac_address();
        info!("link: source {} tag {}", source, tag);
        Self {
            radio,
            source,
            tag,
            sequence: SequenceCounter::new(),
            frame: Vec::new(),
        }
    }

    /// Send one packet as a single frame
    ///
    /// `Ok` means the medium accepted the frame, not that anyone received it.
    pub fn send(&mut self, state: &LinkState, payload: &[u8]) -> Result<(), SendError> {
        if payload.is_empty() || payload.len() > MAX_PACKET_SIZE {
            debug!("link: invalid payload length {}", payload.len());
            state.count_tx_error();
            return Err(SendError::Invalid);
        }

        if !state.is_tx_ready() {
            trace!("link: tx busy");
            state.count_tx_error();
            return Err(SendError::Busy);
        }

        let seq = self.sequence.next();
        let header = FrameHeader::probe_request(self.source, self.tag, seq);

        self.frame.clear();
        // Both fit: HEADER_LEN + MAX_PACKET_SIZE == MAX_FRAME_LEN
        let _ = self.frame.extend_from_slice(&header.encode());
        let _ = self.frame.extend_from_slice(payload);

        state.mark_tx_busy();
        match self.radio.inject(&self.frame) {
            Ok(()) => {
                state.count_tx();
                trace!("link: tx len={} seq={}", payload.len(), seq);
                Ok(())
            }
            Err(_) => {
                state.complete_tx();
                state.count_tx_error();
                warn!("link: tx rejected len={}", payload.len());
                Err(SendError::Radio)
            }
        }
    }

    /// Retune the radio. Invalid channel numbers leave it untouched.
    pub fn set_channel(&mut self, number: u8) -> Result<(), LinkError<R::Error>> {
        let channel = Channel::new(number)?;
        self.radio.set_channel(channel).map_err(LinkError::Radio)?;
        info!("link: channel {}", number);
        Ok(())
    }

    /// Channel the radio is on
    pub fn channel(&self) -> Channel {
        self.radio.channel()
    }

    /// Sequence number the next frame will carry
    pub fn next_sequence(&self) -> u16 {
        self.sequence.peek()
    }

    /// Our own hardware address
    pub fn source(&self) -> MacAddr {
        self.source
    }

    /// Access the wrapped radio
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Mutable access to the wrapped radio
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }
}

/// Errors from radio control operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<E> {
    /// Channel number outside 1..=14
    Channel(ChannelError),
    /// Medium-specific failure
    Radio(E),
}

impl<E> From<ChannelError> for LinkError<E> {
    fn from(e: ChannelError) -> Self {
        LinkError::Channel(e)
    }
}

/// Receive path: the filter chain run from the capture callback
#[derive(Debug, Clone, Copy)]
pub struct Receiver {
    tag: MacAddr,
}

impl Receiver {
    /// Smallest capture worth looking at
    pub const MIN_CAPTURE_LEN: usize = RX_METADATA_LEN + HEADER_LEN + FCS_LEN;

    /// Accept frames tagged with `tag`
    pub const fn new(tag: MacAddr) -> Self {
        Self { tag }
    }

    /// Filter one capture and forward its payload with a length prefix
    ///
    /// `capture` is the platform buffer: [`RxMetadata`] followed by the frame.
    /// Returns the forwarded payload length. Writes into `out` are lossy; a
    /// full channel truncates the record and the ring counts the drop.
    pub fn on_frame<S: ByteSink>(
        &self,
        state: &LinkState,
        capture: &[u8],
        out: &mut S,
    ) -> Result<u16, RxDrop> {
        match self.filter(capture) {
            Ok(payload) => {
                state.count_rx();
                let len = payload.len() as u16;
                let prefix: [u8; LEN_PREFIX_SIZE] = len.to_be_bytes();
                out.write(&prefix);
                out.write(payload);
                trace!("link: rx {} bytes", len);
                Ok(len)
            }
            Err(reason) => {
                state.count_rx_drop();
                Err(reason)
            }
        }
    }

    /// Run the filter chain and return the payload slice
    pub fn filter<'a>(&self, capture: &'a [u8]) -> Result<&'a [u8], RxDrop> {
        let meta = RxMetadata::parse(capture).ok_or(RxDrop::TooShort)?;
        if !meta.is_legacy() {
            return Err(RxDrop::UnsupportedSignal);
        }
        if capture.len() < Self::MIN_CAPTURE_LEN {
            return Err(RxDrop::TooShort);
        }

        let frame = &capture[RX_METADATA_LEN..];
        let header = FrameHeader::parse(frame).ok_or(RxDrop::TooShort)?;
        if header.frame_type() != FTYPE_MGMT {
            return Err(RxDrop::NotManagement);
        }
        if header.addr3 != self.tag {
            return Err(RxDrop::TagMismatch);
        }

        // legacy_length covers header + body + FCS
        let payload_len = (meta.legacy_length as usize)
            .checked_sub(HEADER_LEN + FCS_LEN)
            .ok_or(RxDrop::BadLength)?;
        if payload_len > MAX_PACKET_SIZE {
            debug!("link: rx payload too large ({})", payload_len);
            return Err(RxDrop::BadLength);
        }

        frame
            .get(HEADER_LEN..HEADER_LEN + payload_len)
            .ok_or(RxDrop::Truncated)
    }

    /// Rendezvous tag being matched
    pub const fn tag(&self) -> MacAddr {
        self.tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RingChannel;

    const TAG: MacAddr = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x00]);
    const OWN: MacAddr = MacAddr([0x5C, 0xCF, 0x7F, 0x10, 0x20, 0x30]);

    /// Records injected frames; can be told to refuse
    struct MockRadio {
        frames: std::vec::Vec<std::vec::Vec<u8>>,
        refuse: bool,
        channel: Channel,
    }

    impl MockRadio {
        fn new() -> Self {
            Self {
                frames: std::vec::Vec::new(),
                refuse: false,
                channel: Channel(11),
            }
        }
    }

    impl RawRadio for MockRadio {
        type Error = ();

        fn mac_address(&self) -> MacAddr {
            OWN
        }

        fn inject(&mut self, frame: &[u8]) -> Result<(), ()> {
            if self.refuse {
                return Err(());
            }
            self.frames.push(frame.to_vec());
            Ok(())
        }

        fn set_channel(&mut self, channel: Channel) -> Result<(), ()> {
            self.channel = channel;
            Ok(())
        }

        fn channel(&self) -> Channel {
            self.channel
        }
    }

    fn capture(tag: MacAddr, payload: &[u8]) -> std::vec::Vec<u8> {
        let header = FrameHeader::probe_request(OWN, tag, 7).encode();
        let legacy_len = (HEADER_LEN + payload.len() + FCS_LEN) as u16;
        let mut buf = RxMetadata::legacy(legacy_len, -40, 11).encode().to_vec();
        buf.extend_from_slice(&header);
        buf.extend_from_slice(payload);
        buf.extend_from_slice(&[0u8; FCS_LEN]);
        buf
    }

    #[test]
    fn test_send_builds_frame() {
        let state = LinkState::new();
        let mut tx = Transmitter::new(MockRadio::new(), TAG);

        assert_eq!(tx.send(&state, b"abc"), Ok(()));
        let frame = &tx.radio().frames[0];
        assert_eq!(frame.len(), HEADER_LEN + 3);
        let header = FrameHeader::parse(frame).unwrap();
        assert_eq!(header, FrameHeader::probe_request(OWN, TAG, 0));
        assert_eq!(&frame[HEADER_LEN..], b"abc");

        assert!(!state.is_tx_ready());
        assert_eq!(state.snapshot().tx_count, 1);
    }

    #[test]
    fn test_send_invalid_payload() {
        let state = LinkState::new();
        let mut tx = Transmitter::new(MockRadio::new(), TAG);

        assert_eq!(tx.send(&state, &[]), Err(SendError::Invalid));
        assert_eq!(tx.send(&state, &[0u8; MAX_PACKET_SIZE + 1]), Err(SendError::Invalid));
        assert!(tx.radio().frames.is_empty());
        assert_eq!(state.snapshot().tx_error_count, 2);
        assert_eq!(tx.next_sequence(), 0);
        assert!(state.is_tx_ready());
    }

    #[test]
    fn test_send_busy_leaves_sequence_and_count() {
        let state = LinkState::new();
        let mut tx = Transmitter::new(MockRadio::new(), TAG);

        tx.send(&state, b"one").unwrap();
        let before = state.snapshot();
        let seq_before = tx.next_sequence();

        assert_eq!(tx.send(&state, b"two"), Err(SendError::Busy));
        let after = state.snapshot();
        assert_eq!(tx.next_sequence(), seq_before);
        assert_eq!(after.tx_count, before.tx_count);
        assert_eq!(after.tx_error_count, before.tx_error_count + 1);
        assert_eq!(tx.radio().frames.len(), 1);

        state.complete_tx();
        assert_eq!(tx.send(&state, b"two"), Ok(()));
    }

    #[test]
    fn test_send_radio_rejection_resets_ready() {
        let state = LinkState::new();
        let mut radio = MockRadio::new();
        radio.refuse = true;
        let mut tx = Transmitter::new(radio, TAG);

        assert_eq!(tx.send(&state, b"x"), Err(SendError::Radio));
        assert!(state.is_tx_ready());
        assert_eq!(state.snapshot().tx_error_count, 1);
        assert_eq!(state.snapshot().tx_count, 0);

        tx.radio_mut().refuse = false;
        assert_eq!(tx.send(&state, b"x"), Ok(()));
    }

    #[test]
    fn test_sequence_increments_and_wraps() {
        let state = LinkState::new();
        let mut tx = Transmitter::new(MockRadio::new(), TAG);

        for _ in 0..4097 {
            tx.send(&state, b"p").unwrap();
            state.complete_tx();
        }
        let seqs: std::vec::Vec<u16> = tx
            .radio()
            .frames
            .iter()
            .map(|f| FrameHeader::parse(f).unwrap().sequence())
            .collect();
        assert_eq!(seqs[0], 0);
        assert_eq!(seqs[1], 1);
        assert_eq!(seqs[4095], 4095);
        assert_eq!(seqs[4096], 0);
    }

    #[test]
    fn test_set_channel_validates() {
        let mut tx = Transmitter::new(MockRadio::new(), TAG);
        assert_eq!(tx.set_channel(0), Err(LinkError::Channel(ChannelError(0))));
        assert_eq!(tx.set_channel(15), Err(LinkError::Channel(ChannelError(15))));
        assert_eq!(tx.channel().get(), 11);
        tx.set_channel(6).unwrap();
        assert_eq!(tx.channel().get(), 6);
    }

    #[test]
    fn test_receive_forwards_with_prefix() {
        let state = LinkState::new();
        let rx = Receiver::new(TAG);
        let mut ring = RingChannel::<512>::new();
        let (mut out, mut wired) = ring.split();

        let payload: [u8; 10] = core::array::from_fn(|i| 0x30 + i as u8);
        assert_eq!(rx.on_frame(&state, &capture(TAG, &payload), &mut out), Ok(10));

        let mut buf = [0u8; 32];
        let n = wired.read(&mut buf);
        assert_eq!(n, 12);
        assert_eq!(&buf[..2], &[0x00, 0x0A]);
        assert_eq!(&buf[2..12], &payload);
        assert_eq!(state.snapshot().rx_count, 1);
        assert_eq!(state.snapshot().rx_drop_count, 0);
    }

    #[test]
    fn test_receive_rejects_any_tag_byte_difference() {
        let state = LinkState::new();
        let rx = Receiver::new(TAG);
        let mut sink: Vec<u8, 512> = Vec::new();

        for i in 0..6 {
            let mut other = TAG;
            other.0[i] ^= 0x01;
            assert_eq!(
                rx.on_frame(&state, &capture(other, b"data"), &mut sink),
                Err(RxDrop::TagMismatch)
            );
        }
        assert!(sink.is_empty());
        assert_eq!(state.snapshot().rx_drop_count, 6);
        assert_eq!(state.snapshot().rx_count, 0);
    }

    #[test]
    fn test_receive_filter_chain() {
        let state = LinkState::new();
        let rx = Receiver::new(TAG);
        let mut sink: Vec<u8, 512> = Vec::new();

        // 11n capture
        let mut ht = capture(TAG, b"data");
        let mut meta = RxMetadata::parse(&ht).unwrap();
        meta.sig_mode = 1;
        ht[..RX_METADATA_LEN].copy_from_slice(&meta.encode());
        assert_eq!(rx.on_frame(&state, &ht, &mut sink), Err(RxDrop::UnsupportedSignal));

        // shorter than metadata + header + FCS
        let short = capture(TAG, b"");
        assert_eq!(
            rx.on_frame(&state, &short[..Receiver::MIN_CAPTURE_LEN - 1], &mut sink),
            Err(RxDrop::TooShort)
        );

        // data frame (type 2)
        let mut data = capture(TAG, b"data");
        data[RX_METADATA_LEN] = 0x08;
        assert_eq!(rx.on_frame(&state, &data, &mut sink), Err(RxDrop::NotManagement));

        // declared length claims more than MAX_PACKET_SIZE
        let mut big = capture(TAG, b"data");
        let mut meta = RxMetadata::parse(&big).unwrap();
        meta.legacy_length = (HEADER_LEN + FCS_LEN + MAX_PACKET_SIZE + 1) as u16;
        big[..RX_METADATA_LEN].copy_from_slice(&meta.encode());
        assert_eq!(rx.on_frame(&state, &big, &mut sink), Err(RxDrop::BadLength));

        // declared length shorter than header + FCS
        let mut tiny = capture(TAG, b"data");
        let mut meta = RxMetadata::parse(&tiny).unwrap();
        meta.legacy_length = 10;
        tiny[..RX_METADATA_LEN].copy_from_slice(&meta.encode());
        assert_eq!(rx.on_frame(&state, &tiny, &mut sink), Err(RxDrop::BadLength));

        // declared payload longer than the captured bytes
        let mut cut = capture(TAG, b"data");
        let mut meta = RxMetadata::parse(&cut).unwrap();
        meta.legacy_length += 40;
        cut[..RX_METADATA_LEN].copy_from_slice(&meta.encode());
        assert_eq!(rx.on_frame(&state, &cut, &mut sink), Err(RxDrop::Truncated));

        assert!(sink.is_empty());
        assert_eq!(state.snapshot().rx_drop_count, 6);
    }

    #[test]
    fn test_receive_into_full_channel_is_lossy() {
        let state = LinkState::new();
        let rx = Receiver::new(TAG);
        let mut ring = RingChannel::<8>::new();
        let (mut out, wired) = ring.split();

        assert_eq!(rx.on_frame(&state, &capture(TAG, b"0123456789"), &mut out), Ok(10));
        assert_eq!(wired.available(), 7);
        assert_eq!(out.overflow_count(), 5);
        assert_eq!(state.snapshot().rx_count, 1);
    }

    #[test]
    fn test_reset_stats() {
        let state = LinkState::new();
        let mut tx = Transmitter::new(MockRadio::new(), TAG);
        tx.send(&state, b"a").unwrap();
        tx.send(&state, b"b").unwrap_err();
        state.reset_stats();
        assert_eq!(state.snapshot(), LinkStats::default());
        assert!(!state.is_tx_ready());
    }
}
