//! Outbound radio data: transmit requests and delivery status.

use std::sync::Mutex;

use bytes::Bytes;

use crate::decoder::FrameDecoder;
use crate::error::{Result, XBeeError};
use crate::protocol::{ApiId, RxFrame, TxFrame};

/// Largest payload a single transmit request may carry.
pub const MAX_TX_PAYLOAD: usize = 100;

/// Frame identifier stamped on transmit requests so their status frames can
/// be told apart from other traffic.
const TX_FRAME_ID: u8 = b'T';

/// Destination of a transmit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// 16-bit network address; `0xFFFF` broadcasts.
    Short(u16),
    /// 64-bit factory serial number.
    Long(u64),
}

/// A radio transmit request.
///
/// Serializes as frame identifier, destination address, options byte, then
/// the data payload. The payload is handed to the serializer as a separate
/// fragment, so building a request never copies the data.
#[derive(Debug, Clone)]
pub struct TxRequest {
    id: ApiId,
    /// Frame id, address bytes and options, in wire order.
    header: [u8; 10],
    header_len: usize,
    data: Bytes,
}

impl TxRequest {
    /// Create a request for `data` addressed to `dest`.
    ///
    /// Fails with [`XBeeError::PayloadTooLarge`] when `data` exceeds
    /// [`MAX_TX_PAYLOAD`].
    pub fn new(dest: Address, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.len() > MAX_TX_PAYLOAD {
            return Err(XBeeError::PayloadTooLarge(data.len()));
        }

        let mut header = [0u8; 10];
        header[0] = TX_FRAME_ID;
        let (id, header_len) = match dest {
            Address::Short(addr) => {
                header[1..3].copy_from_slice(&addr.to_be_bytes());
                (ApiId::TxRequest16, 4)
            }
            Address::Long(addr) => {
                header[1..9].copy_from_slice(&addr.to_be_bytes());
                (ApiId::TxRequest64, 10)
            }
        };

        Ok(Self {
            id,
            header,
            header_len,
            data,
        })
    }

    /// Ask the remote not to acknowledge this frame.
    pub fn disable_ack(mut self) -> Self {
        self.header[self.header_len - 1] |= 0x01;
        self
    }

    /// Send to the broadcast PAN identifier instead of the configured one.
    pub fn pan_broadcast(mut self) -> Self {
        self.header[self.header_len - 1] |= 0x04;
        self
    }
}

impl TxFrame for TxRequest {
    fn api_id(&self) -> ApiId {
        self.id
    }

    fn payload_len(&self) -> u16 {
        (self.header_len + self.data.len()) as u16
    }

    fn chunk(&self, offset: u16) -> &[u8] {
        let offset = offset as usize;
        if offset < self.header_len {
            &self.header[offset..self.header_len]
        } else {
            &self.data[offset - self.header_len..]
        }
    }
}

/// Delivery outcome reported for a transmit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Delivered (or broadcast sent).
    Ok,
    /// No acknowledgement received after all retries.
    NoAck,
    /// Channel never became clear.
    CcaFail,
    /// Dropped by the coordinator before transmission.
    Purged,
    /// A status byte outside the documented set.
    Other(u8),
}

impl TxStatus {
    fn from_u8(byte: u8) -> Self {
        match byte {
            0 => Self::Ok,
            1 => Self::NoAck,
            2 => Self::CcaFail,
            3 => Self::Purged,
            other => Self::Other(other),
        }
    }
}

/// Decoder that records the most recent transmit status.
#[derive(Default)]
pub struct TxStatusMonitor {
    last: Mutex<Option<TxStatus>>,
}

impl TxStatusMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of the most recent completed transmission, if any arrived.
    pub fn last(&self) -> Option<TxStatus> {
        *lock(&self.last)
    }

    /// Forget the recorded status, e.g. before sending the next request.
    pub fn clear(&self) {
        *lock(&self.last) = None;
    }
}

impl FrameDecoder for TxStatusMonitor {
    fn decode(&self, frame: &RxFrame) -> bool {
        if frame.api_id() != Some(ApiId::TxStatus) {
            return false;
        }
        let payload = frame.payload();
        if payload.len() != 2 || payload[0] != TX_FRAME_ID {
            return false;
        }
        *lock(&self.last) = Some(TxStatus::from_u8(payload[1]));
        true
    }
}

fn lock(last: &Mutex<Option<TxStatus>>) -> std::sync::MutexGuard<'_, Option<TxStatus>> {
    last.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
