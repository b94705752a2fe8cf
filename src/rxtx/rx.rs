//! Inbound radio data: received packets and the buffering decoder.

use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::Bytes;

use crate::decoder::FrameDecoder;
use crate::protocol::{ApiId, RxFrame};

use super::tx::Address;

/// One data packet received over the air.
#[derive(Debug, Clone)]
pub struct RxPacket {
    /// Sender's address, short or long depending on the frame type.
    pub source: Address,
    /// Received signal strength in dBm (always negative).
    pub rssi_dbm: i16,
    /// The frame was sent to the broadcast address.
    pub address_broadcast: bool,
    /// The frame was sent to the broadcast PAN identifier.
    pub pan_broadcast: bool,
    /// Application data.
    pub data: Bytes,
}

impl RxPacket {
    /// Parse a received-data frame; `None` for any other frame type or a
    /// truncated payload.
    pub fn parse(frame: &RxFrame) -> Option<Self> {
        let addr_len = match frame.api_id()? {
            ApiId::RxPacket64 => 8,
            ApiId::RxPacket16 => 2,
            _ => return None,
        };

        let payload = frame.payload();
        // Address, RSSI byte, options byte.
        if payload.len() < addr_len + 2 {
            return None;
        }

        let source = if addr_len == 8 {
            let mut addr = [0u8; 8];
            addr.copy_from_slice(&payload[..8]);
            Address::Long(u64::from_be_bytes(addr))
        } else {
            Address::Short(u16::from_be_bytes([payload[0], payload[1]]))
        };

        let rssi = payload[addr_len];
        let options = payload[addr_len + 1];

        Some(Self {
            source,
            rssi_dbm: -(rssi as i16),
            address_broadcast: options & 0x02 != 0,
            pan_broadcast: options & 0x04 != 0,
            data: Bytes::copy_from_slice(&payload[addr_len + 2..]),
        })
    }
}

/// Decoder that queues received packets until the application drains them.
///
/// The queue is bounded; when full, newly arriving packets are dropped with
/// a warning and the older ones are kept.
pub struct RxPacketBuffer {
    queue: Mutex<VecDeque<RxPacket>>,
    capacity: usize,
}

impl RxPacketBuffer {
    /// Create a buffer holding at most `capacity` packets.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Take the oldest buffered packet.
    pub fn pop(&self) -> Option<RxPacket> {
        lock(&self.queue).pop_front()
    }

    /// Number of buffered packets.
    pub fn len(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Whether no packets are buffered.
    pub fn is_empty(&self) -> bool {
        lock(&self.queue).is_empty()
    }

    /// Discard every buffered packet.
    pub fn clear(&self) {
        lock(&self.queue).clear();
    }
}

impl FrameDecoder for RxPacketBuffer {
    fn decode(&self, frame: &RxFrame) -> bool {
        let Some(packet) = RxPacket::parse(frame) else {
            return false;
        };

        let mut queue = lock(&self.queue);
        if queue.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "rx buffer full, dropping packet");
        } else {
            queue.push_back(packet);
        }
        true
    }
}

fn lock(queue: &Mutex<VecDeque<RxPacket>>) -> std::sync::MutexGuard<'_, VecDeque<RxPacket>> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
