//! Blocking-style adapter over the AT command engine.
//!
//! Turns the engine's fire-and-forget cache into call-and-wait accessors:
//! a get issues the query and polls the cache until the value lands, a set
//! issues the command and polls until the confirmed readback matches. Each
//! call resolves to a value or a typed error within the configured timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::error::{Result, XBeeError};

use super::engine::AtCommandEngine;
use super::param::Param;

/// Timing knobs for the polling loops.
#[derive(Debug, Clone)]
pub struct BlockingConfig {
    /// Total time to wait for a response before giving up.
    pub timeout: Duration,
    /// Sleep between cache polls.
    pub poll_interval: Duration,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Call-and-wait parameter access.
pub struct AtBlocking {
    engine: Arc<AtCommandEngine>,
    config: BlockingConfig,
}

impl AtBlocking {
    /// Wrap `engine` with default timing.
    pub fn new(engine: Arc<AtCommandEngine>) -> Self {
        Self::with_config(engine, BlockingConfig::default())
    }

    /// Wrap `engine` with explicit timing.
    pub fn with_config(engine: Arc<AtCommandEngine>, config: BlockingConfig) -> Self {
        Self { engine, config }
    }

    /// Read `param`, returning the cached value when one is already known.
    ///
    /// Otherwise sends a query and waits for the response. A rejection from
    /// the device surfaces as [`XBeeError::CommandFailed`]; silence for the
    /// full timeout as [`XBeeError::ResponseTimeout`].
    pub async fn get(&self, param: Param) -> Result<u64> {
        if let Some(value) = self.engine.cached(param) {
            return Ok(value);
        }

        self.engine.request(param).await?;
        let deadline = Instant::now() + self.config.timeout;
        loop {
            if let Some(value) = self.engine.cached(param) {
                return Ok(value);
            }
            if let Some(status) = self.engine.last_status(param) {
                if !status.is_ok() {
                    return Err(XBeeError::CommandFailed { param, status });
                }
            }
            if Instant::now() >= deadline {
                return Err(XBeeError::ResponseTimeout(param));
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Write `param` and wait until the device confirms the new value.
    ///
    /// Success means the confirmed readback equals `value`. A rejection
    /// surfaces as [`XBeeError::CommandFailed`]; a missing confirmation as
    /// [`XBeeError::ConfirmTimeout`].
    pub async fn set(&self, param: Param, value: u64) -> Result<()> {
        self.engine.set(param, value).await?;

        let deadline = Instant::now() + self.config.timeout;
        loop {
            if self.engine.cached(param) == Some(value) {
                return Ok(());
            }
            if let Some(status) = self.engine.last_status(param) {
                if !status.is_ok() {
                    return Err(XBeeError::CommandFailed { param, status });
                }
            }
            if Instant::now() >= deadline {
                return Err(XBeeError::ConfirmTimeout(param));
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Firmware version word.
    pub async fn firmware_version(&self) -> Result<u16> {
        Ok(self.get(Param::FirmwareVersion).await? as u16)
    }

    /// Hardware version word.
    pub async fn hardware_version(&self) -> Result<u16> {
        Ok(self.get(Param::HardwareVersion).await? as u16)
    }

    /// Operating channel.
    pub async fn channel(&self) -> Result<u8> {
        Ok(self.get(Param::Channel).await? as u8)
    }

    /// Set the operating channel.
    pub async fn set_channel(&self, channel: u8) -> Result<()> {
        self.set(Param::Channel, channel as u64).await
    }

    /// PAN identifier.
    pub async fn pan_id(&self) -> Result<u16> {
        Ok(self.get(Param::PanId).await? as u16)
    }

    /// Set the PAN identifier.
    pub async fn set_pan_id(&self, id: u16) -> Result<()> {
        self.set(Param::PanId, id as u64).await
    }

    /// Whether the device acts as coordinator.
    pub async fn coordinator_enabled(&self) -> Result<bool> {
        Ok(self.get(Param::CoordinatorEnabled).await? != 0)
    }

    /// Enable or disable the coordinator role.
    pub async fn set_coordinator_enabled(&self, enabled: bool) -> Result<()> {
        self.set(Param::CoordinatorEnabled, enabled as u64).await
    }

    /// Whether end-device association is enabled.
    pub async fn end_device_association(&self) -> Result<bool> {
        Ok(self.get(Param::EndDeviceAssociation).await? != 0)
    }

    /// Enable or disable end-device association.
    pub async fn set_end_device_association(&self, enabled: bool) -> Result<()> {
        self.set(Param::EndDeviceAssociation, enabled as u64).await
    }

    /// 16-bit source address.
    pub async fn source_address(&self) -> Result<u16> {
        Ok(self.get(Param::SourceAddress).await? as u16)
    }

    /// Set the 16-bit source address.
    pub async fn set_source_address(&self, address: u16) -> Result<()> {
        self.set(Param::SourceAddress, address as u64).await
    }

    /// Factory serial number, both halves joined.
    pub async fn serial_number(&self) -> Result<u64> {
        let high = self.get(Param::SerialHigh).await?;
        let low = self.get(Param::SerialLow).await?;
        Ok((high << 32) | low)
    }

    /// Unicast retry count.
    pub async fn retry_count(&self) -> Result<u8> {
        Ok(self.get(Param::RetryCount).await? as u8)
    }

    /// Set the unicast retry count.
    pub async fn set_retry_count(&self, retries: u8) -> Result<()> {
        self.set(Param::RetryCount, retries as u64).await
    }

    /// Random delay slots used for CSMA backoff.
    pub async fn random_delay_slots(&self) -> Result<u8> {
        Ok(self.get(Param::RandomDelaySlots).await? as u8)
    }

    /// Set the random delay slots.
    pub async fn set_random_delay_slots(&self, slots: u8) -> Result<()> {
        self.set(Param::RandomDelaySlots, slots as u64).await
    }

    /// MAC mode.
    pub async fn mac_mode(&self) -> Result<u8> {
        Ok(self.get(Param::MacMode).await? as u8)
    }

    /// Set the MAC mode.
    pub async fn set_mac_mode(&self, mode: u8) -> Result<()> {
        self.set(Param::MacMode, mode as u64).await
    }

    /// Configure the device for flat peer-to-peer networking: coordinator
    /// off, end-device association off, then the given channel and PAN
    /// identifier. Each step is confirmed before the next.
    pub async fn set_network_p2p(&self, channel: u8, pan_id: u16) -> Result<()> {
        self.set_coordinator_enabled(false).await?;
        self.set_end_device_association(false).await?;
        self.set_channel(channel).await?;
        self.set_pan_id(pan_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::at::param::AtStatus;
    use crate::device::DeviceHandle;
    use crate::protocol::{encode_frame, ApiId, RawFrame, RxParser};
    use tokio::sync::mpsc;

    fn fixture() -> (AtBlocking, Arc<AtCommandEngine>, mpsc::Receiver<Vec<u8>>) {
        let (handle, rx) = DeviceHandle::detached(true);
        let engine = Arc::new(AtCommandEngine::new(handle));
        let blocking = AtBlocking::with_config(
            engine.clone(),
            BlockingConfig {
                timeout: Duration::from_millis(200),
                poll_interval: Duration::from_millis(10),
            },
        );
        (blocking, engine, rx)
    }

    fn respond(engine: &Arc<AtCommandEngine>, payload: Vec<u8>) {
        use crate::decoder::FrameDecoder;
        let bytes = encode_frame(&RawFrame::new(ApiId::AtResponse, payload), true);
        let frame = RxParser::new(true).push(&bytes).pop().unwrap();
        assert!(engine.decode(&frame));
    }

    #[tokio::test]
    async fn test_get_returns_cached_without_query() {
        let (blocking, engine, mut rx) = fixture();
        respond(&engine, vec![b'3', b'C', b'H', 0x00, 0x0C]);

        assert_eq!(blocking.channel().await.unwrap(), 0x0C);
        assert!(rx.try_recv().is_err(), "cached get must not send");
    }

    #[tokio::test]
    async fn test_get_waits_for_response() {
        let (blocking, engine, mut rx) = fixture();

        let responder = tokio::spawn(async move {
            let sent = rx.recv().await.unwrap();
            assert_eq!(&sent[4..7], b"1VR");
            respond(&engine, vec![b'1', b'V', b'R', 0x00, 0x10, 0xE8]);
        });

        assert_eq!(blocking.firmware_version().await.unwrap(), 0x10E8);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_get_times_out_on_silence() {
        let (blocking, _engine, _rx) = fixture();
        let err = blocking.channel().await.unwrap_err();
        assert!(matches!(err, XBeeError::ResponseTimeout(Param::Channel)));
    }

    #[tokio::test]
    async fn test_set_confirms_readback() {
        let (blocking, engine, mut rx) = fixture();

        let responder = tokio::spawn(async move {
            let sent = rx.recv().await.unwrap();
            assert_eq!(&sent[4..7], b"4CH");
            assert_eq!(sent[7], 0x0E);
            respond(&engine, vec![b'4', b'C', b'H', 0x00]);
        });

        blocking.set_channel(0x0E).await.unwrap();
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_set_rejection_surfaces_status() {
        let (blocking, engine, mut rx) = fixture();

        let responder = tokio::spawn(async move {
            let _ = rx.recv().await.unwrap();
            respond(&engine, vec![b'4', b'C', b'H', 0x03]);
        });

        let err = blocking.set_channel(0xFF).await.unwrap_err();
        assert!(matches!(
            err,
            XBeeError::CommandFailed {
                param: Param::Channel,
                status: AtStatus::InvalidParameter,
            }
        ));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_serial_number_joins_both_halves() {
        let (blocking, engine, mut rx) = fixture();

        let responder = tokio::spawn(async move {
            let sent = rx.recv().await.unwrap();
            assert_eq!(&sent[4..7], b"cSH");
            respond(&engine, vec![b'c', b'S', b'H', 0x00, 0x00, 0x13, 0xA2, 0x00]);
            let sent = rx.recv().await.unwrap();
            assert_eq!(&sent[4..7], b"dSL");
            respond(&engine, vec![b'd', b'S', b'L', 0x00, 0x40, 0x3E, 0x07, 0x54]);
        });

        assert_eq!(blocking.serial_number().await.unwrap(), 0x0013_A200_403E_0754);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_network_p2p_applies_all_four_settings() {
        let (blocking, engine, mut rx) = fixture();

        let responder = tokio::spawn(async move {
            for (prefix, echo) in [
                (&b"5CE"[..], vec![b'5', b'C', b'E', 0x00]),
                (b"7A1", vec![b'7', b'A', b'1', 0x00]),
                (b"4CH", vec![b'4', b'C', b'H', 0x00]),
                (b"9ID", vec![b'9', b'I', b'D', 0x00]),
            ] {
                let sent = rx.recv().await.unwrap();
                assert_eq!(&sent[4..7], prefix);
                respond(&engine, echo);
            }
        });

        blocking.set_network_p2p(0x0E, 0x3332).await.unwrap();
        responder.await.unwrap();
    }
}
