//! Wire-level constants and the byte escaper / checksum codec.
//!
//! API-mode frame layout (all multi-byte integers Big Endian):
//!
//! ```text
//! ┌───────────┬──────────┬────────┬───────────┬──────────┐
//! │ Delimiter │ Length   │ API id │ Payload   │ Checksum │
//! │ 0x7E      │ 2 bytes  │ 1 byte │ N bytes   │ 1 byte   │
//! └───────────┴──────────┴────────┴───────────┴──────────┘
//! ```
//!
//! The length field covers the API identifier plus payload. The checksum is
//! `0xFF - (sum of API identifier and payload bytes, mod 256)` and is computed
//! over the logical bytes, before any escaping is applied.
//!
//! In escaped operating mode (`ATAP 2`), the four reserved byte values are
//! byte-stuffed as `0x7D, byte ^ 0x20` everywhere except the delimiter, the
//! two length bytes and the checksum byte, which travel unescaped.

/// Frame start delimiter.
pub const FRAME_DELIMITER: u8 = 0x7E;

/// Escape marker byte.
pub const ESCAPE: u8 = 0x7D;

/// XON flow-control byte (reserved, escaped on the wire).
pub const XON: u8 = 0x11;

/// XOFF flow-control byte (reserved, escaped on the wire).
pub const XOFF: u8 = 0x13;

/// XOR mask applied to a byte following the escape marker.
pub const ESCAPE_XOR: u8 = 0x20;

/// Overhead bytes per frame: delimiter, 2 length bytes, checksum.
pub const FRAME_OVERHEAD: usize = 4;

/// Bytes needed from the front of the receive buffer to learn the frame length.
pub const LENGTH_PEEK: usize = 3;

/// Position of the API identifier within a complete received frame.
pub const POSN_API_ID: usize = 3;

/// Position of the first payload byte within a complete received frame.
pub const POSN_PAYLOAD: usize = 4;

/// 16-bit broadcast address.
pub const BROADCAST_ADDR: u16 = 0xFFFF;

/// API identifiers: the first byte of the API-specific structure within a
/// frame, indicating the kind of data which follows.
///
/// Values outside this enumeration are unrecognized but not fatal; such
/// frames are offered to decoders by raw identifier and discarded if
/// unclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ApiId {
    /// Transmit request, 64-bit destination address.
    TxRequest64 = 0x00,
    /// Transmit request, 16-bit destination address.
    TxRequest16 = 0x01,
    /// Local AT command (apply immediately).
    AtCommand = 0x08,
    /// Local AT command (queue parameter value).
    AtCommandQueued = 0x09,
    /// Remote AT command request.
    RemoteAtCommand = 0x17,
    /// Received packet, 64-bit source address.
    RxPacket64 = 0x80,
    /// Received packet, 16-bit source address.
    RxPacket16 = 0x81,
    /// Response to a local AT command.
    AtResponse = 0x88,
    /// Transmit status for a previously sent request.
    TxStatus = 0x89,
    /// Modem status (hardware reset, association events, ...).
    ModemStatus = 0x8A,
    /// Response to a remote AT command.
    RemoteAtResponse = 0x97,
}

impl ApiId {
    /// Decode a raw identifier byte, `None` if unrecognized.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::TxRequest64),
            0x01 => Some(Self::TxRequest16),
            0x08 => Some(Self::AtCommand),
            0x09 => Some(Self::AtCommandQueued),
            0x17 => Some(Self::RemoteAtCommand),
            0x80 => Some(Self::RxPacket64),
            0x81 => Some(Self::RxPacket16),
            0x88 => Some(Self::AtResponse),
            0x89 => Some(Self::TxStatus),
            0x8A => Some(Self::ModemStatus),
            0x97 => Some(Self::RemoteAtResponse),
            _ => None,
        }
    }

    /// The raw wire value.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Whether a byte value must be escaped when escaping is enabled.
#[inline]
pub fn needs_escape(byte: u8) -> bool {
    matches!(byte, FRAME_DELIMITER | ESCAPE | XON | XOFF)
}

/// Compute the frame checksum over the API identifier and payload bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0xFF - sum
}

/// Verify a checksummed span (API identifier + payload + checksum byte).
///
/// The span validates when the truncated sum of all bytes, including the
/// received checksum, equals 0xFF.
pub fn checksum_valid(bytes_with_checksum: &[u8]) -> bool {
    let sum = bytes_with_checksum
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum == 0xFF
}

/// Escape a byte sequence, expanding reserved values to two-byte stuffed form.
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        if needs_escape(b) {
            out.push(ESCAPE);
            out.push(b ^ ESCAPE_XOR);
        } else {
            out.push(b);
        }
    }
    out
}

/// Undo [`escape`]. Assumes the sequence is well formed (no trailing marker).
pub fn unescape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut pending = false;
    for &b in data {
        if pending {
            out.push(b ^ ESCAPE_XOR);
            pending = false;
        } else if b == ESCAPE {
            pending = true;
        } else {
            out.push(b);
        }
    }
    out
}
