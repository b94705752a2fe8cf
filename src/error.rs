//! Error types for the XBee API driver.

use thiserror::Error;

use crate::at::{AtStatus, Param};

/// Main error type for all driver operations.
#[derive(Debug, Error)]
pub enum XBeeError {
    /// I/O error on the underlying byte channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte channel (or the writer task) has shut down.
    #[error("serial link closed")]
    LinkClosed,

    /// The requested operation is not valid in the transport's current mode,
    /// e.g. sending an ASCII command while in API mode.
    #[error("operation not valid in the current mode")]
    WrongMode,

    /// No command-mode acknowledgement arrived within the configured timeout.
    #[error("timed out waiting for command-mode acknowledgement")]
    AckTimeout,

    /// A command-mode acknowledgement arrived but had the wrong length.
    #[error("unexpected command-mode acknowledgement length: {0} bytes")]
    UnexpectedAckLength(usize),

    /// A command-mode acknowledgement arrived with unexpected content.
    #[error("unexpected command-mode acknowledgement: {0:?}")]
    UnexpectedAck(Vec<u8>),

    /// The decoder registry is at capacity.
    #[error("decoder registry full (capacity {0})")]
    RegistryFull(usize),

    /// The decoder is already registered with this transport.
    #[error("decoder already registered")]
    AlreadyRegistered,

    /// Attempted to set a parameter the device only allows reading.
    #[error("parameter {0:?} is read-only")]
    ReadOnlyParameter(Param),

    /// The device answered an AT command with a non-success status.
    #[error("device rejected command for {param:?}: {status:?}")]
    CommandFailed { param: Param, status: AtStatus },

    /// No response for the parameter arrived within the timeout budget.
    #[error("timed out waiting for a response for {0:?}")]
    ResponseTimeout(Param),

    /// A set operation was issued but the readback never matched.
    #[error("timed out waiting for {0:?} to be applied")]
    ConfirmTimeout(Param),

    /// Payload exceeds the maximum the radio accepts in one frame.
    #[error("payload of {0} bytes exceeds the maximum transmit payload")]
    PayloadTooLarge(usize),
}

/// Result type alias using [`XBeeError`].
pub type Result<T> = std::result::Result<T, XBeeError>;
