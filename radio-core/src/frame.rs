//! # Raw 802.11 Frame Layout
//!
//! The bridge carries its payload in probe-request management frames, the
//! only subtype the listening mode captures with the full body (data frames
//! arrive truncated, beacons get their first 8 bytes overwritten with the TSF).
//!
//! ## Frame Format
//!
//! ```text
//! ┌────────┬──────────┬───────────┬───────────┬───────────┬──────────┬─────────────┐
//! │   FC   │ Duration │   Addr1   │   Addr2   │   Addr3   │ Seq Ctrl │   Payload   │
//! │ 0x0040 │    0     │ broadcast │  own MAC  │    tag    │ seq << 4 │  opaque     │
//! │ 2 bytes│  2 bytes │  6 bytes  │  6 bytes  │  6 bytes  │  2 bytes │ 1..=256     │
//! └────────┴──────────┴───────────┴───────────┴───────────┴──────────┴─────────────┘
//! ```
//!
//! Multi-byte fields are little-endian as on the air. Addr3 normally holds
//! the BSSID; here it carries the rendezvous tag that receivers filter on.
//! The 4-byte FCS is appended and stripped by the medium.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::MAX_PACKET_SIZE;

/// Fixed 802.11 MAC header size
pub const HEADER_LEN: usize = 24;

/// Frame check sequence appended by the medium
pub const FCS_LEN: usize = 4;

/// Largest frame the bridge ever builds (header + payload)
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PACKET_SIZE;

/// Frame control for a probe request (type 0, subtype 4)
pub const FC_PROBE_REQUEST: u16 = 0x0040;

/// Frame type mask within the frame control field
pub const FCTL_FTYPE: u16 = 0x000C;

/// Management frame type
pub const FTYPE_MGMT: u16 = 0x0000;

/// Sequence numbers wrap at 12 bits
pub const SEQUENCE_MODULUS: u16 = 4096;

/// 48-bit IEEE MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// All-ones broadcast address
    pub const BROADCAST: Self = Self([0xFF; 6]);

    /// Group bit set (broadcast and multicast)
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Raw octets
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MacAddr {
    fn format(&self, f: defmt::Formatter) {
        let [a, b, c, d, e, g] = self.0;
        defmt::write!(
            f,
            "{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}",
            a, b, c, d, e, g
        )
    }
}

/// 12-bit transmit sequence number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceCounter(u16);

impl SequenceCounter {
    /// Start at sequence 0
    pub const fn new() -> Self {
        Self(0)
    }

    /// Sequence number the next frame will carry
    pub const fn peek(&self) -> u16 {
        self.0
    }

    /// Take the current number and advance (wraps 4095 -> 0)
    pub fn next(&mut self) -> u16 {
        let seq = self.0;
        self.0 = (self.0 + 1) % SEQUENCE_MODULUS;
        seq
    }
}

/// Decoded 24-byte MAC header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameHeader {
    /// Frame control field
    pub frame_control: u16,
    /// Duration/ID, always 0 (no ACKs)
    pub duration: u16,
    /// Receiver address
    pub addr1: MacAddr,
    /// Transmitter address
    pub addr2: MacAddr,
    /// BSSID slot, used as the rendezvous tag
    pub addr3: MacAddr,
    /// Sequence control: `[15:4]` sequence, `[3:0]` fragment
    pub seq_ctrl: u16,
}

impl FrameHeader {
    /// Header for an outgoing bridge frame
    pub fn probe_request(source: MacAddr, tag: MacAddr, sequence: u16) -> Self {
        Self {
            frame_control: FC_PROBE_REQUEST,
            duration: 0,
            addr1: MacAddr::BROADCAST,
            addr2: source,
            addr3: tag,
            seq_ctrl: (sequence << 4) & 0xFFF0,
        }
    }

    /// Parse the header at the start of `data`
    pub fn parse(data: &[u8]) -> Option<Self> {
        let h = data.get(..HEADER_LEN)?;
        let addr = |at: usize| {
            let mut a = [0u8; 6];
            a.copy_from_slice(&h[at..at + 6]);
            MacAddr(a)
        };
        Some(Self {
            frame_control: u16::from_le_bytes([h[0], h[1]]),
            duration: u16::from_le_bytes([h[2], h[3]]),
            addr1: addr(4),
            addr2: addr(10),
            addr3: addr(16),
            seq_ctrl: u16::from_le_bytes([h[22], h[23]]),
        })
    }

    /// Serialise into the on-air layout
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..2].copy_from_slice(&self.frame_control.to_le_bytes());
        out[2..4].copy_from_slice(&self.duration.to_le_bytes());
        out[4..10].copy_from_slice(&self.addr1.0);
        out[10..16].copy_from_slice(&self.addr2.0);
        out[16..22].copy_from_slice(&self.addr3.0);
        out[22..24].copy_from_slice(&self.seq_ctrl.to_le_bytes());
        out
    }

    /// Type bits of the frame control field (`FTYPE_MGMT` for management)
    pub const fn frame_type(&self) -> u16 {
        self.frame_control & FCTL_FTYPE
    }

    /// 12-bit sequence number
    pub const fn sequence(&self) -> u16 {
        self.seq_ctrl >> 4
    }

    /// Fragment number
    pub const fn fragment(&self) -> u8 {
        (self.seq_ctrl & 0x000F) as u8
    }
}

/// Size of the capture metadata the platform prepends to each frame
pub const RX_METADATA_LEN: usize = 12;

/// Capture metadata delivered ahead of every received frame
///
/// Packed little-endian bitfields, three 32-bit words:
///
/// ```text
/// word 0: rssi[7:0] rate[11:8] group[12] - sig_mode[15:14] legacy_length[27:16] match bits[31:28]
/// word 1: mcs[6:0] cwb[7] ht_length[23:8] smoothing/sounding/aggregation/stbc/fec/sgi
/// word 2: rxend_state[7:0] ampdu_cnt[15:8] channel[19:16]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxMetadata {
    /// Received signal strength in dBm
    pub rssi: i8,
    /// PHY rate index
    pub rate: u8,
    /// Group-addressed frame
    pub is_group: bool,
    /// 0 for 11b/g, non-zero for 11n
    pub sig_mode: u8,
    /// Over-the-air frame length: MAC header + body + FCS
    pub legacy_length: u16,
    /// Channel the frame was captured on
    pub channel: u8,
}

impl RxMetadata {
    /// Metadata for a legacy-rate capture of `frame_len` bytes (incl. FCS)
    pub fn legacy(frame_len: u16, rssi: i8, channel: u8) -> Self {
        Self {
            rssi,
            rate: 0,
            is_group: false,
            sig_mode: 0,
            legacy_length: frame_len & 0x0FFF,
            channel: channel & 0x0F,
        }
    }

    /// Decode the metadata at the start of `data`
    pub fn parse(data: &[u8]) -> Option<Self> {
        let m = data.get(..RX_METADATA_LEN)?;
        let w0 = u32::from_le_bytes([m[0], m[1], m[2], m[3]]);
        let w2 = u32::from_le_bytes([m[8], m[9], m[10], m[11]]);
        Some(Self {
            rssi: (w0 & 0xFF) as u8 as i8,
            rate: ((w0 >> 8) & 0x0F) as u8,
            is_group: (w0 >> 12) & 0x01 != 0,
            sig_mode: ((w0 >> 14) & 0x03) as u8,
            legacy_length: ((w0 >> 16) & 0x0FFF) as u16,
            channel: ((w2 >> 16) & 0x0F) as u8,
        })
    }

    /// Encode in the platform layout (fields not modelled are zero)
    pub fn encode(&self) -> [u8; RX_METADATA_LEN] {
        let w0 = (self.rssi as u8 as u32)
            | ((self.rate as u32 & 0x0F) << 8)
            | ((self.is_group as u32) << 12)
            | ((self.sig_mode as u32 & 0x03) << 14)
            | ((self.legacy_length as u32 & 0x0FFF) << 16);
        let w2 = (self.channel as u32 & 0x0F) << 16;

        let mut out = [0u8; RX_METADATA_LEN];
        out[0..4].copy_from_slice(&w0.to_le_bytes());
        out[8..12].copy_from_slice(&w2.to_le_bytes());
        out
    }

    /// Captured with the legacy 11b/g modulation
    pub const fn is_legacy(&self) -> bool {
        self.sig_mode == 0
    }
}
