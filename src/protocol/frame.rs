//! Frame abstraction: outbound frame producers and received frame views.
//!
//! [`TxFrame`] is the polymorphic producer side: anything that can be
//! rendered as an API identifier plus payload bytes, possibly in fragments.
//! [`RxFrame`] is a zero-copy view over one complete frame lifted out of the
//! receive buffer, delimiter through checksum.

use bytes::Bytes;

use super::wire::{
    self, ApiId, ESCAPE, ESCAPE_XOR, FRAME_DELIMITER, FRAME_OVERHEAD, POSN_API_ID, POSN_PAYLOAD,
};

/// An outbound API frame.
///
/// Producers may fragment their payload: `chunk(0)` need not return the whole
/// payload, and the serializer keeps requesting the next offset until the
/// cumulative length reaches [`TxFrame::payload_len`]. Across repeated calls
/// from offset 0 the chunks must yield exactly `payload_len()` bytes in order.
pub trait TxFrame: Send + Sync {
    /// API identifier for this frame.
    fn api_id(&self) -> ApiId;

    /// Total payload length in bytes (excluding the API identifier).
    fn payload_len(&self) -> u16;

    /// The payload bytes starting at `offset`.
    fn chunk(&self, offset: u16) -> &[u8];
}

/// The simplest [`TxFrame`]: an API identifier and a contiguous payload.
#[derive(Debug, Clone)]
pub struct RawFrame {
    id: ApiId,
    data: Bytes,
}

impl RawFrame {
    /// Create a frame from an identifier and payload bytes.
    pub fn new(id: ApiId, data: impl Into<Bytes>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }
}

impl TxFrame for RawFrame {
    fn api_id(&self) -> ApiId {
        self.id
    }

    fn payload_len(&self) -> u16 {
        self.data.len() as u16
    }

    fn chunk(&self, offset: u16) -> &[u8] {
        &self.data[offset as usize..]
    }
}

/// Serialize a frame to its on-the-wire byte sequence.
///
/// Writes the delimiter, the big-endian length field (payload + 1 for the
/// API identifier), the escaped API identifier and payload, and the trailing
/// checksum. The delimiter, length bytes and checksum are never escaped; the
/// checksum sums the logical bytes, not their escaped expansion.
pub fn encode_frame(frame: &dyn TxFrame, escaping: bool) -> Vec<u8> {
    let payload_len = frame.payload_len();
    let cmd_len = payload_len + 1;

    let mut out = Vec::with_capacity(cmd_len as usize + FRAME_OVERHEAD);
    out.push(FRAME_DELIMITER);
    out.extend_from_slice(&cmd_len.to_be_bytes());

    let mut sum = 0u8;
    push_escaped(&mut out, frame.api_id().as_u8(), escaping, &mut sum);

    let mut written = 0u16;
    while written < payload_len {
        let chunk = frame.chunk(written);
        let remaining = (payload_len - written) as usize;
        let take = chunk.len().min(remaining);
        for &b in &chunk[..take] {
            push_escaped(&mut out, b, escaping, &mut sum);
        }
        written += take as u16;
    }

    out.push(0xFF - sum);
    out
}

fn push_escaped(out: &mut Vec<u8>, byte: u8, escaping: bool, sum: &mut u8) {
    *sum = sum.wrapping_add(byte);
    if escaping && wire::needs_escape(byte) {
        out.push(ESCAPE);
        out.push(byte ^ ESCAPE_XOR);
    } else {
        out.push(byte);
    }
}

/// One complete received frame, delimiter through checksum, unescaped.
///
/// Decoders receive this view from the dispatch path; the backing bytes are
/// shared (cheaply cloneable) but a decoder that needs the data beyond the
/// callback must copy what it keeps.
#[derive(Debug, Clone)]
pub struct RxFrame {
    bytes: Bytes,
}

impl RxFrame {
    /// Wrap a complete, unescaped frame byte sequence.
    pub(crate) fn new(bytes: Bytes) -> Self {
        debug_assert!(bytes.len() >= FRAME_OVERHEAD + 1);
        debug_assert_eq!(bytes[0], FRAME_DELIMITER);
        Self { bytes }
    }

    /// The raw API identifier byte.
    #[inline]
    pub fn api_id_raw(&self) -> u8 {
        self.bytes[POSN_API_ID]
    }

    /// The API identifier, `None` if unrecognized.
    #[inline]
    pub fn api_id(&self) -> Option<ApiId> {
        ApiId::from_u8(self.api_id_raw())
    }

    /// Length field value: API identifier + payload byte count.
    #[inline]
    pub fn declared_len(&self) -> u16 {
        u16::from_be_bytes([self.bytes[1], self.bytes[2]])
    }

    /// The payload bytes (after the API identifier, before the checksum).
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[POSN_PAYLOAD..self.bytes.len() - 1]
    }

    /// The received checksum byte.
    #[inline]
    pub fn checksum_byte(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// The entire frame as received, delimiter through checksum.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total frame length in bytes, overhead included.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a constructed frame; present for slice-like symmetry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
