//! The transport: serial tasks, mode switching and frame dispatch.
//!
//! [`XBeeDevice`] owns two background tasks over the byte channel. The read
//! task runs the receive parser and offers every complete frame to the
//! registered decoders; the writer task drains a bounded queue of
//! pre-serialized frames, so concurrent senders can never interleave bytes
//! on the wire. [`DeviceHandle`] is the cheap clonable sending side handed
//! to subsystems like the AT engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::decoder::{DecoderHandle, DecoderRegistry, FrameDecoder};
use crate::error::{Result, XBeeError};
use crate::protocol::{encode_frame, RxParser, TxFrame};

/// Queued outbound frames before senders start waiting.
const TX_QUEUE_DEPTH: usize = 32;

/// Read buffer size for the serial read task.
const READ_CHUNK: usize = 256;

/// Sleep between checks for a command-mode acknowledgement.
const ACK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Whether the link runs in escaped API mode (`AP=2`).
    pub escaping: bool,
    /// Silence required before and after the command-mode escape sequence.
    pub guard_period: Duration,
    /// How long to wait for each command-mode acknowledgement.
    pub command_timeout: Duration,
    /// Maximum number of registered decoders.
    pub max_decoders: usize,
    /// Inbound frames longer than this are treated as garbage.
    pub max_frame_len: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            escaping: true,
            guard_period: Duration::from_millis(1000),
            command_timeout: Duration::from_millis(3000),
            max_decoders: 10,
            max_frame_len: crate::protocol::rx_parser::DEFAULT_MAX_FRAME_LEN,
        }
    }
}

struct Shared {
    registry: Mutex<DecoderRegistry>,
    /// While set, inbound bytes are ASCII command responses, not frames.
    command_mode: AtomicBool,
    /// Accumulated command-mode response bytes.
    cmd_rx: Mutex<Vec<u8>>,
}

impl Shared {
    fn new(config: &DeviceConfig) -> Self {
        Self {
            registry: Mutex::new(DecoderRegistry::new(config.max_decoders)),
            command_mode: AtomicBool::new(false),
            cmd_rx: Mutex::new(Vec::new()),
        }
    }
}

/// Driver for one radio module attached over a byte channel.
pub struct XBeeDevice {
    shared: Arc<Shared>,
    tx: mpsc::Sender<Vec<u8>>,
    config: DeviceConfig,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl XBeeDevice {
    /// Attach to a byte channel with default configuration.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::with_config(reader, writer, DeviceConfig::default())
    }

    /// Attach to a byte channel.
    pub fn with_config<R, W>(reader: R, writer: W, config: DeviceConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let shared = Arc::new(Shared::new(&config));
        let (tx, tx_rx) = mpsc::channel(TX_QUEUE_DEPTH);

        let read_task = tokio::spawn(read_loop(
            reader,
            shared.clone(),
            RxParser::with_max_frame_len(config.escaping, config.max_frame_len),
        ));
        let write_task = tokio::spawn(write_loop(writer, tx_rx));

        Self {
            shared,
            tx,
            config,
            read_task,
            write_task,
        }
    }

    /// A clonable sending handle for subsystems that build frames.
    pub fn handle(&self) -> DeviceHandle {
        DeviceHandle {
            tx: self.tx.clone(),
            shared: self.shared.clone(),
            escaping: self.config.escaping,
        }
    }

    /// Register a frame decoder at the end of the dispatch order.
    pub fn register_decoder(&self, decoder: Arc<dyn FrameDecoder>) -> Result<DecoderHandle> {
        lock(&self.shared.registry).register(decoder)
    }

    /// Remove a decoder; returns `false` if the handle is unknown.
    pub fn unregister_decoder(&self, handle: DecoderHandle) -> bool {
        lock(&self.shared.registry).unregister(handle)
    }

    /// Serialize and queue a frame for transmission.
    pub async fn send_frame(&self, frame: &dyn TxFrame) -> Result<()> {
        self.handle().send_frame(frame).await
    }

    /// Switch the module out of transparent mode into escaped API mode.
    ///
    /// Runs the `+++` escape handshake, issues `ATAP 2` and leaves command
    /// mode with `ATCN`. Frame reception and [`send_frame`] are suspended
    /// for the duration and restored afterwards, whether or not the
    /// handshake succeeds.
    ///
    /// [`send_frame`]: XBeeDevice::send_frame
    pub async fn setup_api_mode(&self) -> Result<()> {
        lock(&self.shared.cmd_rx).clear();
        self.shared.command_mode.store(true, Ordering::SeqCst);

        let result = self.command_sequence().await;

        self.shared.command_mode.store(false, Ordering::SeqCst);
        lock(&self.shared.cmd_rx).clear();
        result
    }

    async fn command_sequence(&self) -> Result<()> {
        sleep(self.config.guard_period).await;
        self.send_ascii(b"+++").await?;
        self.wait_for_ok().await?;
        sleep(self.config.guard_period).await;

        self.send_ascii(b"ATAP 2\r").await?;
        self.wait_for_ok().await?;

        self.send_ascii(b"ATCN\r").await?;
        self.wait_for_ok().await
    }

    async fn send_ascii(&self, bytes: &[u8]) -> Result<()> {
        self.tx
            .send(bytes.to_vec())
            .await
            .map_err(|_| XBeeError::LinkClosed)
    }

    /// Wait for the module's `OK\r` acknowledgement.
    async fn wait_for_ok(&self) -> Result<()> {
        let deadline = Instant::now() + self.config.command_timeout;
        loop {
            let expired = Instant::now() >= deadline;
            let ack = {
                let mut buf = lock(&self.shared.cmd_rx);
                if buf.len() >= 3 || (expired && !buf.is_empty()) {
                    Some(std::mem::take(&mut *buf))
                } else {
                    None
                }
            };

            match ack {
                Some(bytes) if bytes == b"OK\r" => return Ok(()),
                Some(bytes) if bytes.len() != 3 => {
                    return Err(XBeeError::UnexpectedAckLength(bytes.len()))
                }
                Some(bytes) => return Err(XBeeError::UnexpectedAck(bytes)),
                None if expired => return Err(XBeeError::AckTimeout),
                None => sleep(ACK_POLL_INTERVAL).await,
            }
        }
    }

    /// Stop both background tasks. Dropping the device does the same.
    pub fn shutdown(self) {}
}

impl Drop for XBeeDevice {
    fn drop(&mut self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

/// Clonable sending side of a device.
#[derive(Clone)]
pub struct DeviceHandle {
    tx: mpsc::Sender<Vec<u8>>,
    shared: Arc<Shared>,
    escaping: bool,
}

impl DeviceHandle {
    /// Serialize and queue a frame for transmission.
    ///
    /// Fails with [`XBeeError::WrongMode`] while the transport is in
    /// command mode, and [`XBeeError::LinkClosed`] once the writer task
    /// has shut down.
    pub async fn send_frame(&self, frame: &dyn TxFrame) -> Result<()> {
        if self.shared.command_mode.load(Ordering::SeqCst) {
            return Err(XBeeError::WrongMode);
        }
        self.tx
            .send(encode_frame(frame, self.escaping))
            .await
            .map_err(|_| XBeeError::LinkClosed)
    }

    /// A handle wired to a bare channel instead of a transport, for
    /// exercising frame-building subsystems in isolation.
    #[cfg(test)]
    pub(crate) fn detached(escaping: bool) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(TX_QUEUE_DEPTH);
        let handle = Self {
            tx,
            shared: Arc::new(Shared::new(&DeviceConfig::default())),
            escaping,
        };
        (handle, rx)
    }
}

async fn read_loop<R>(mut reader: R, shared: Arc<Shared>, mut parser: RxParser)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::info!("serial link closed by peer");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "serial read failed");
                return;
            }
        };

        if shared.command_mode.load(Ordering::SeqCst) {
            // ASCII command responses bypass the frame parser entirely. An
            // escape marker cut off by the mode switch must not survive it.
            parser.clear_escape();
            lock(&shared.cmd_rx).extend_from_slice(&buf[..n]);
            continue;
        }

        for frame in parser.push(&buf[..n]) {
            let claimed = lock(&shared.registry).dispatch(&frame);
            if !claimed {
                tracing::warn!(api_id = frame.api_id_raw(), "no decoder claimed inbound frame");
            }
        }
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<Vec<u8>>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = rx.recv().await {
        let result = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            tracing::error!(error = %e, "serial write failed, stopping writer");
            return;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
