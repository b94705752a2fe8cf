//! Table-driven AT command engine.
//!
//! One engine instance handles every parameter in the descriptor table. It
//! builds query and set frames from descriptors, and as a registered frame
//! decoder it consumes AT command responses, correlating each back to its
//! parameter via the echoed tag and folding the result into a cache of
//! last-known values. Callers observe the cache through [`cached`] and
//! [`last_status`]; the blocking adapter polls the same cache.
//!
//! [`cached`]: AtCommandEngine::cached
//! [`last_status`]: AtCommandEngine::last_status

use std::collections::HashMap;
use std::sync::Mutex;

use crate::decoder::FrameDecoder;
use crate::device::DeviceHandle;
use crate::error::{Result, XBeeError};
use crate::protocol::{ApiId, RawFrame, RxFrame};

use super::param::{self, AtStatus, Direction, Param};

/// Response payload layout: tag, two command letters, status, value bytes.
const RESPONSE_FIXED_LEN: usize = 4;

#[derive(Default)]
struct Entry {
    /// Last value confirmed by the device, valid when `has_value`.
    committed: u64,
    /// Value sent in the most recent set, committed once the device accepts.
    pending: u64,
    has_value: bool,
    last_status: Option<AtStatus>,
}

/// Request/response engine for the local device's AT parameters.
pub struct AtCommandEngine {
    device: DeviceHandle,
    cache: Mutex<HashMap<Param, Entry>>,
}

impl AtCommandEngine {
    /// Create an engine sending through `device`.
    ///
    /// The engine must also be registered as a decoder on the same transport,
    /// or responses will never reach the cache.
    pub fn new(device: DeviceHandle) -> Self {
        Self {
            device,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Send a query for `param`.
    ///
    /// Invalidates the cached value first: once this returns, [`cached`]
    /// stays `None` until the device's response arrives. A second query for
    /// the same parameter before the response simply reuses the same tag.
    ///
    /// [`cached`]: AtCommandEngine::cached
    pub async fn request(&self, param: Param) -> Result<()> {
        let desc = param::descriptor(param);

        {
            let mut cache = lock(&self.cache);
            let entry = cache.entry(param).or_default();
            entry.has_value = false;
            entry.last_status = None;
        }

        let payload = vec![desc.get_tag, desc.command[0], desc.command[1]];
        self.device
            .send_frame(&RawFrame::new(ApiId::AtCommand, payload))
            .await
    }

    /// Send a set for `param`.
    ///
    /// `value` is encoded big-endian in the parameter's wire width; bits
    /// above that width are ignored. Fails with
    /// [`XBeeError::ReadOnlyParameter`] for parameters without a set command.
    pub async fn set(&self, param: Param, value: u64) -> Result<()> {
        let desc = param::descriptor(param);
        let Some(set_tag) = desc.set_tag else {
            return Err(XBeeError::ReadOnlyParameter(param));
        };

        {
            let mut cache = lock(&self.cache);
            let entry = cache.entry(param).or_default();
            entry.pending = value;
            entry.has_value = false;
            entry.last_status = None;
        }

        let mut payload = vec![set_tag, desc.command[0], desc.command[1]];
        payload.extend_from_slice(&value.to_be_bytes()[8 - desc.width..]);
        self.device
            .send_frame(&RawFrame::new(ApiId::AtCommand, payload))
            .await
    }

    /// Last value confirmed by the device, if any.
    pub fn cached(&self, param: Param) -> Option<u64> {
        let cache = lock(&self.cache);
        cache
            .get(&param)
            .filter(|e| e.has_value)
            .map(|e| e.committed)
    }

    /// Status of the most recent response for `param`.
    ///
    /// `None` while no response has arrived since the last query or set.
    pub fn last_status(&self, param: Param) -> Option<AtStatus> {
        lock(&self.cache).get(&param).and_then(|e| e.last_status)
    }

    /// Drop every cached value and status.
    pub fn clear(&self) {
        lock(&self.cache).clear();
    }

    fn apply_response(&self, payload: &[u8]) -> bool {
        let tag = payload[0];
        let Some((desc, direction)) = param::by_tag(tag) else {
            return false;
        };

        if payload[1..3] != desc.command {
            tracing::warn!(
                tag = %(tag as char),
                command = %String::from_utf8_lossy(&payload[1..3]),
                "response tag does not match its command letters, ignoring"
            );
            return true;
        }

        let status = AtStatus::from_u8(payload[3]);
        let value_bytes = &payload[RESPONSE_FIXED_LEN..];

        let mut cache = lock(&self.cache);
        let entry = cache.entry(desc.param).or_default();
        entry.last_status = Some(status);

        if !status.is_ok() {
            tracing::warn!(param = ?desc.param, ?status, "device rejected AT command");
            return true;
        }

        match direction {
            Direction::Get => {
                if value_bytes.len() != desc.width {
                    tracing::warn!(
                        param = ?desc.param,
                        expected = desc.width,
                        got = value_bytes.len(),
                        "AT response value width mismatch, ignoring"
                    );
                    entry.last_status = None;
                    return true;
                }
                let mut value = 0u64;
                for &b in value_bytes {
                    value = (value << 8) | b as u64;
                }
                entry.committed = value;
                entry.has_value = true;
            }
            Direction::Set => {
                // Set responses carry no value; the confirmed value is the
                // one we sent.
                entry.committed = entry.pending;
                entry.has_value = true;
            }
        }
        true
    }
}

impl FrameDecoder for AtCommandEngine {
    fn decode(&self, frame: &RxFrame) -> bool {
        if frame.api_id() != Some(ApiId::AtResponse) {
            return false;
        }
        let payload = frame.payload();
        if payload.len() < RESPONSE_FIXED_LEN {
            return false;
        }
        self.apply_response(payload)
    }
}

fn lock(cache: &Mutex<HashMap<Param, Entry>>) -> std::sync::MutexGuard<'_, HashMap<Param, Entry>> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceHandle;
    use crate::protocol::{encode_frame, RxParser};
    use tokio::sync::mpsc;

    fn engine() -> (AtCommandEngine, mpsc::Receiver<Vec<u8>>) {
        let (handle, rx) = DeviceHandle::detached(true);
        (AtCommandEngine::new(handle), rx)
    }

    fn response_frame(payload: Vec<u8>) -> RxFrame {
        let bytes = encode_frame(&RawFrame::new(ApiId::AtResponse, payload), true);
        RxParser::new(true)
            .push(&bytes)
            .pop()
            .expect("fixture frame must parse")
    }

    #[tokio::test]
    async fn test_request_sends_tagged_query() {
        let (engine, mut rx) = engine();
        engine.request(Param::FirmwareVersion).await.unwrap();

        let sent = rx.recv().await.unwrap();
        // 7E len 08 '1' 'V' 'R' cs
        assert_eq!(sent[3], 0x08);
        assert_eq!(&sent[4..7], b"1VR");
    }

    #[tokio::test]
    async fn test_set_encodes_value_in_wire_width() {
        let (engine, mut rx) = engine();
        engine.set(Param::PanId, 0xBEEF).await.unwrap();

        let sent = rx.recv().await.unwrap();
        assert_eq!(&sent[4..7], b"9ID");
        assert_eq!(&sent[7..9], &[0xBE, 0xEF]);
    }

    #[tokio::test]
    async fn test_set_read_only_rejected() {
        let (engine, _rx) = engine();
        let err = engine.set(Param::FirmwareVersion, 1).await.unwrap_err();
        assert!(matches!(
            err,
            XBeeError::ReadOnlyParameter(Param::FirmwareVersion)
        ));
    }

    #[tokio::test]
    async fn test_get_response_fills_cache() {
        let (engine, _rx) = engine();
        assert_eq!(engine.cached(Param::FirmwareVersion), None);

        let frame = response_frame(vec![b'1', b'V', b'R', 0x00, 0x10, 0xE8]);
        assert!(engine.decode(&frame));

        assert_eq!(engine.cached(Param::FirmwareVersion), Some(0x10E8));
        assert_eq!(
            engine.last_status(Param::FirmwareVersion),
            Some(AtStatus::Ok)
        );
    }

    #[tokio::test]
    async fn test_set_response_commits_pending_value() {
        let (engine, _rx) = engine();
        engine.set(Param::Channel, 0x0E).await.unwrap();
        assert_eq!(engine.cached(Param::Channel), None);

        let frame = response_frame(vec![b'4', b'C', b'H', 0x00]);
        assert!(engine.decode(&frame));
        assert_eq!(engine.cached(Param::Channel), Some(0x0E));
    }

    #[tokio::test]
    async fn test_error_status_recorded_without_value() {
        let (engine, _rx) = engine();
        engine.set(Param::Channel, 0x42).await.unwrap();

        let frame = response_frame(vec![b'4', b'C', b'H', 0x03]);
        assert!(engine.decode(&frame));

        assert_eq!(engine.cached(Param::Channel), None);
        assert_eq!(
            engine.last_status(Param::Channel),
            Some(AtStatus::InvalidParameter)
        );
    }

    #[tokio::test]
    async fn test_request_invalidates_cache() {
        let (engine, _rx) = engine();
        let frame = response_frame(vec![b'3', b'C', b'H', 0x00, 0x0C]);
        assert!(engine.decode(&frame));
        assert_eq!(engine.cached(Param::Channel), Some(0x0C));

        engine.request(Param::Channel).await.unwrap();
        assert_eq!(engine.cached(Param::Channel), None);
        assert_eq!(engine.last_status(Param::Channel), None);
    }

    #[tokio::test]
    async fn test_unknown_tag_not_consumed() {
        let (engine, _rx) = engine();
        let frame = response_frame(vec![b'z', b'C', b'H', 0x00, 0x0C]);
        assert!(!engine.decode(&frame));
    }

    #[tokio::test]
    async fn test_foreign_api_id_not_consumed() {
        let (engine, _rx) = engine();
        let bytes = encode_frame(&RawFrame::new(ApiId::ModemStatus, vec![0x06]), true);
        let frame = RxParser::new(true).push(&bytes).pop().unwrap();
        assert!(!engine.decode(&frame));
    }

    #[tokio::test]
    async fn test_width_mismatch_ignored() {
        let (engine, _rx) = engine();
        // CH is one byte wide; a two-byte value is malformed.
        let frame = response_frame(vec![b'3', b'C', b'H', 0x00, 0x0C, 0x0D]);
        assert!(engine.decode(&frame));
        assert_eq!(engine.cached(Param::Channel), None);
    }
}
