//! Receive-side byte stream state machine.
//!
//! Accumulates unescaped bytes in a single `BytesMut` buffer and lifts out
//! complete, checksum-verified frames. Handles arbitrary fragmentation: data
//! may arrive one byte at a time or many frames at once, and the parser
//! yields the same frames either way.
//!
//! Resynchronization: when the buffer is empty, only a frame delimiter is
//! accepted; anything else is discarded. Leading garbage in front of a
//! delimiter is likewise discarded before extraction, so a corrupted stream
//! recovers at the next frame boundary.

use bytes::{Buf, BytesMut};

use super::frame::RxFrame;
use super::wire::{
    self, ESCAPE, ESCAPE_XOR, FRAME_DELIMITER, FRAME_OVERHEAD, LENGTH_PEEK, POSN_API_ID,
};

/// Default cap on a single frame's total length, delimiter through checksum.
pub const DEFAULT_MAX_FRAME_LEN: usize = 512;

/// State machine turning a raw byte stream into complete frames.
pub struct RxParser {
    /// Accumulated unescaped bytes pending frame extraction.
    buffer: BytesMut,
    /// Previous byte was the escape marker; the next byte is XOR-stuffed.
    pending_escape: bool,
    /// Whether the link runs in escaped operating mode.
    escaping: bool,
    /// Frames whose declared length exceeds this are treated as garbage.
    max_frame_len: usize,
}

impl RxParser {
    /// Create a parser; `escaping` matches the transport-wide escape flag.
    pub fn new(escaping: bool) -> Self {
        Self::with_max_frame_len(escaping, DEFAULT_MAX_FRAME_LEN)
    }

    /// Create a parser with a custom frame length cap.
    pub fn with_max_frame_len(escaping: bool, max_frame_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_frame_len),
            pending_escape: false,
            escaping,
            max_frame_len,
        }
    }

    /// Feed received bytes and extract every complete frame now available.
    ///
    /// Corrupt frames (checksum mismatch, zero-length field) are consumed and
    /// dropped with a warning so they cannot stall the pipeline.
    pub fn push(&mut self, data: &[u8]) -> Vec<RxFrame> {
        for &byte in data {
            self.feed(byte);
        }
        self.extract()
    }

    fn feed(&mut self, byte: u8) {
        if self.escaping && byte == ESCAPE && !self.pending_escape {
            self.pending_escape = true;
            return;
        }

        let mut byte = byte;
        if self.pending_escape {
            byte ^= ESCAPE_XOR;
            self.pending_escape = false;
        }

        // Delimiter alignment: an empty buffer accepts only a frame start.
        if !self.buffer.is_empty() || byte == FRAME_DELIMITER {
            self.buffer.extend_from_slice(&[byte]);
        }
    }

    fn extract(&mut self) -> Vec<RxFrame> {
        let mut frames = Vec::new();

        loop {
            // Discard anything in front of the next delimiter.
            while !self.buffer.is_empty() && self.buffer[0] != FRAME_DELIMITER {
                self.buffer.advance(1);
            }

            if self.buffer.len() < LENGTH_PEEK {
                break;
            }

            let declared = u16::from_be_bytes([self.buffer[1], self.buffer[2]]) as usize;
            let total = declared + FRAME_OVERHEAD;

            if declared == 0 || total > self.max_frame_len {
                tracing::warn!(declared, "implausible frame length field, resynchronizing");
                self.buffer.advance(1);
                continue;
            }

            if self.buffer.len() < total {
                // Wait for the rest of the frame.
                break;
            }

            let bytes = self.buffer.split_to(total).freeze();
            if wire::checksum_valid(&bytes[POSN_API_ID..]) {
                frames.push(RxFrame::new(bytes));
            } else {
                tracing::warn!(
                    api_id = bytes[POSN_API_ID],
                    total_len = total,
                    "dropping frame with checksum mismatch"
                );
            }
        }

        frames
    }

    /// Drop any half-consumed escape state.
    ///
    /// Called when the transport leaves API mode so a marker received right
    /// before the transition cannot corrupt the first command-mode byte.
    pub fn clear_escape(&mut self) {
        self.pending_escape = false;
    }

    /// Number of buffered bytes awaiting frame extraction.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
