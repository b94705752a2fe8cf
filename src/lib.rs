//! Host-side driver for XBee 802.15.4 radio modules in API mode.
//!
//! The module sits on the far side of a serial byte channel and speaks a
//! binary framing protocol: delimiter, length, API identifier, payload,
//! checksum, with reserved byte values escaped in `AP=2` operating mode.
//! This crate provides the layers on top of any `AsyncRead + AsyncWrite`
//! pair carrying those bytes:
//!
//! - [`protocol`] — frame codec and the receive-side parser.
//! - [`device`] — the transport: background read/write tasks, decoder
//!   dispatch, and the command-mode handshake that switches a factory-fresh
//!   module into API mode.
//! - [`at`] — local AT parameter access, as an async engine plus a
//!   call-and-wait adapter.
//! - [`rxtx`] — the radio data plane: transmit requests, delivery status
//!   and received packets.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use xbee_api::at::{AtBlocking, AtCommandEngine};
//! use xbee_api::device::XBeeDevice;
//!
//! # async fn run() -> xbee_api::Result<()> {
//! // Any AsyncRead/AsyncWrite pair works; a serial port in practice.
//! let (serial, _peer) = tokio::io::duplex(1024);
//! let (rx, tx) = tokio::io::split(serial);
//!
//! let device = XBeeDevice::new(rx, tx);
//! device.setup_api_mode().await?;
//!
//! let engine = Arc::new(AtCommandEngine::new(device.handle()));
//! device.register_decoder(engine.clone())?;
//!
//! let at = AtBlocking::new(engine);
//! println!("firmware {:04x}", at.firmware_version().await?);
//! at.set_channel(0x0E).await?;
//! # Ok(())
//! # }
//! ```

pub mod at;
pub mod decoder;
pub mod device;
pub mod error;
pub mod protocol;
pub mod rxtx;

pub use at::{AtBlocking, AtCommandEngine, AtStatus, Param};
pub use decoder::{DecoderHandle, FrameDecoder};
pub use device::{DeviceConfig, DeviceHandle, XBeeDevice};
pub use error::{Result, XBeeError};
pub use protocol::{ApiId, RxFrame, TxFrame};
pub use rxtx::{Address, RxPacket, RxPacketBuffer, TxRequest, TxStatus, TxStatusMonitor};
