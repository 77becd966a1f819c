//! # Length-Prefixed Packet Framer
//!
//! Rebuilds packets from the wired byte stream:
//!
//! ```text
//! ┌────────┬────────┬──────────────────────────┐
//! │ len_hi │ len_lo │   payload (len bytes)    │
//! └────────┴────────┴──────────────────────────┘
//!   big-endian, 0 < len <= MAX_PACKET_SIZE
//! ```
//!
//! The framer is re-entered once per tick and never waits for bytes. A header
//! with length 0 or above `MAX_PACKET_SIZE` is discarded as a whole and the
//! next two bytes are taken as the next header. There is no byte-by-byte
//! search for a plausible header, so a stream that loses alignment stays
//! misaligned until the sender's lengths happen to line up again.

use crate::traits::ByteSource;
use crate::{LEN_PREFIX_SIZE, MAX_PACKET_SIZE};

/// Where the framer is within the current packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramerState {
    /// Waiting for the 2-byte length prefix
    AwaitingHeader,
    /// Collecting `expected` payload bytes, `received` so far
    AwaitingPayload {
        /// Length from the prefix
        expected: u16,
        /// Bytes already in the scratch buffer
        received: u16,
    },
}

/// Framer diagnostics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FramerStats {
    /// Packets completed
    pub packets: u32,
    /// Headers discarded for a zero or oversized length
    pub bad_headers: u32,
}

/// Resumable length-prefix decoder with a fixed scratch buffer
pub struct PacketFramer {
    state: FramerState,
    scratch: [u8; MAX_PACKET_SIZE],
    stats: FramerStats,
}

impl PacketFramer {
    /// Create a framer waiting for a header
    pub const fn new() -> Self {
        Self {
            state: FramerState::AwaitingHeader,
            scratch: [0u8; MAX_PACKET_SIZE],
            stats: FramerStats {
                packets: 0,
                bad_headers: 0,
            },
        }
    }

    /// Advance with whatever `source` has right now
    ///
    /// Reads a header if one is due, then as much payload as is available,
    /// and returns the packet if it is now complete. Never consumes bytes
    /// beyond the end of the current packet.
    pub fn feed<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Option<&[u8]> {
        if self.state == FramerState::AwaitingHeader && source.available() >= LEN_PREFIX_SIZE {
            let mut prefix = [0u8; LEN_PREFIX_SIZE];
            if source.read(&mut prefix) == LEN_PREFIX_SIZE {
                let len = u16::from_be_bytes(prefix);
                if len == 0 || len as usize > MAX_PACKET_SIZE {
                    self.stats.bad_headers = self.stats.bad_headers.wrapping_add(1);
                    debug!("framer: bad length {}", len);
                } else {
                    self.state = FramerState::AwaitingPayload {
                        expected: len,
                        received: 0,
                    };
                }
            }
        }

        let FramerState::AwaitingPayload { expected, received } = self.state else {
            return None;
        };

        let start = received as usize;
        let want = (expected - received) as usize;
        let take = want.min(source.available());
        let got = if take > 0 {
            source.read(&mut self.scratch[start..start + take])
        } else {
            0
        };
        let received = received + got as u16;

        if received < expected {
            self.state = FramerState::AwaitingPayload { expected, received };
            return None;
        }

        self.state = FramerState::AwaitingHeader;
        self.stats.packets = self.stats.packets.wrapping_add(1);
        Some(&self.scratch[..expected as usize])
    }

    /// Current state
    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Length announced by the current header, 0 while awaiting one
    pub fn expected_len(&self) -> u16 {
        match self.state {
            FramerState::AwaitingHeader => 0,
            FramerState::AwaitingPayload { expected, .. } => expected,
        }
    }

    /// Payload bytes collected for the current packet
    pub fn received_len(&self) -> u16 {
        match self.state {
            FramerState::AwaitingHeader => 0,
            FramerState::AwaitingPayload { received, .. } => received,
        }
    }

    /// Counters since creation
    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Abandon any partial packet
    pub fn reset(&mut self) {
        self.state = FramerState::AwaitingHeader;
    }
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RingChannel;

    const HELLO: [u8; 7] = [0x00, 0x05, b'h', b'e', b'l', b'l', b'o'];

    #[test]
    fn test_hello_all_at_once() {
        let mut framer = PacketFramer::new();
        let mut src: &[u8] = &HELLO;
        assert_eq!(framer.feed(&mut src), Some(&b"hello"[..]));
        assert_eq!(framer.state(), FramerState::AwaitingHeader);
        assert!(src.is_empty());
    }

    #[test]
    fn test_hello_any_split() {
        // Every way of cutting the stream into two chunks, plus byte-at-a-time
        for cut in 0..=HELLO.len() {
            let mut ring = RingChannel::<16>::new();
            let (mut tx, mut rx) = ring.split();
            let mut framer = PacketFramer::new();
            let mut packets = 0;

            tx.write(&HELLO[..cut]);
            if let Some(p) = framer.feed(&mut rx) {
                assert_eq!(p, b"hello");
                packets += 1;
            }
            tx.write(&HELLO[cut..]);
            for _ in 0..2 {
                if let Some(p) = framer.feed(&mut rx) {
                    assert_eq!(p, b"hello");
                    packets += 1;
                }
            }
            assert_eq!(packets, 1, "cut at {cut}");
            assert_eq!(framer.state(), FramerState::AwaitingHeader);
        }

        let mut ring = RingChannel::<16>::new();
        let (mut tx, mut rx) = ring.split();
        let mut framer = PacketFramer::new();
        let mut packets = 0;
        for &b in &HELLO {
            tx.write(&[b]);
            if let Some(p) = framer.feed(&mut rx) {
                assert_eq!(p, b"hello");
                packets += 1;
            }
        }
        assert_eq!(packets, 1);
    }

    #[test]
    fn test_partial_progress_is_tracked() {
        let mut framer = PacketFramer::new();
        let mut src: &[u8] = &HELLO[..4];
        assert_eq!(framer.feed(&mut src), None);
        assert_eq!(framer.expected_len(), 5);
        assert_eq!(framer.received_len(), 2);

        let mut src: &[u8] = &HELLO[4..];
        assert_eq!(framer.feed(&mut src), Some(&b"hello"[..]));
        assert_eq!(framer.expected_len(), 0);
    }

    #[test]
    fn test_single_header_byte_is_not_consumed() {
        let mut framer = PacketFramer::new();
        let mut src: &[u8] = &[0x00];
        assert_eq!(framer.feed(&mut src), None);
        assert_eq!(src.len(), 1);
        assert_eq!(framer.state(), FramerState::AwaitingHeader);
    }

    #[test]
    fn test_zero_length_discarded() {
        let mut framer = PacketFramer::new();
        let mut src: &[u8] = &[0x00, 0x00, 0xDE, 0xAD];
        assert_eq!(framer.feed(&mut src), None);
        assert_eq!(framer.state(), FramerState::AwaitingHeader);
        // only the header was consumed
        assert_eq!(src, &[0xDE, 0xAD]);
        assert_eq!(framer.stats().bad_headers, 1);
    }

    #[test]
    fn test_oversized_length_discarded() {
        let mut framer = PacketFramer::new();
        // 257
        let mut src: &[u8] = &[0x01, 0x01, 0x00];
        assert_eq!(framer.feed(&mut src), None);
        assert_eq!(framer.state(), FramerState::AwaitingHeader);
        assert_eq!(src, &[0x00]);
        assert_eq!(framer.stats().packets, 0);
    }

    #[test]
    fn test_max_length_accepted() {
        let mut stream = [0xA5u8; MAX_PACKET_SIZE + 2];
        stream[..2].copy_from_slice(&(MAX_PACKET_SIZE as u16).to_be_bytes());
        let mut framer = PacketFramer::new();
        let mut src: &[u8] = &stream;
        let packet = framer.feed(&mut src).unwrap();
        assert_eq!(packet.len(), MAX_PACKET_SIZE);
        assert!(packet.iter().all(|&b| b == 0xA5));
    }

    #[test]
    fn test_back_to_back_packets_one_per_feed() {
        let stream = [0x00, 0x01, 0xAA, 0x00, 0x02, 0xBB, 0xCC];
        let mut framer = PacketFramer::new();
        let mut src: &[u8] = &stream;

        assert_eq!(framer.feed(&mut src), Some(&[0xAA][..]));
        assert_eq!(src.len(), 3);
        assert_eq!(framer.feed(&mut src), Some(&[0xBB, 0xCC][..]));
        assert_eq!(framer.feed(&mut src), None);
        assert_eq!(framer.stats().packets, 2);
    }

    #[test]
    fn test_bad_header_resyncs_on_next_two_bytes() {
        // garbage header, then a valid packet right behind it
        let stream = [0xFF, 0xFF, 0x00, 0x02, 0x11, 0x22];
        let mut framer = PacketFramer::new();
        let mut src: &[u8] = &stream;

        assert_eq!(framer.feed(&mut src), None);
        assert_eq!(framer.feed(&mut src), Some(&[0x11, 0x22][..]));
    }

    #[test]
    fn test_reset_drops_partial_packet() {
        let mut framer = PacketFramer::new();
        let mut src: &[u8] = &[0x00, 0x04, 0x01];
        framer.feed(&mut src);
        framer.reset();
        assert_eq!(framer.state(), FramerState::AwaitingHeader);
        assert_eq!(framer.received_len(), 0);
    }
}
