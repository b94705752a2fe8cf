//! Frame decoders and the transport's dispatch registry.
//!
//! A [`FrameDecoder`] is offered every complete inbound frame and reports
//! whether it consumed it. The [`DecoderRegistry`] keeps decoders in
//! registration order inside an arena indexed by stable [`DecoderHandle`]s;
//! the transport owns the registry, so a decoder can never dangle — dropping
//! the last `Arc` outside the registry is harmless, and removal is an
//! explicit `unregister`.

use std::sync::Arc;

use crate::error::{Result, XBeeError};
use crate::protocol::RxFrame;

/// A consumer of complete inbound frames.
///
/// Implementations must return `true` only when the frame was intended for
/// and decoded by this decoder; returning `true` for foreign frames denies
/// later decoders the chance to examine them.
pub trait FrameDecoder: Send + Sync {
    /// Examine one complete frame; report whether it was consumed.
    ///
    /// The frame view is only guaranteed valid for the duration of the call;
    /// a decoder keeping data must copy it out.
    fn decode(&self, frame: &RxFrame) -> bool;
}

/// Stable handle identifying a registered decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecoderHandle(u32);

/// Ordered, bounded collection of registered decoders.
pub struct DecoderRegistry {
    entries: Vec<(DecoderHandle, Arc<dyn FrameDecoder>)>,
    next_id: u32,
    capacity: usize,
}

impl DecoderRegistry {
    /// Create a registry accepting at most `capacity` decoders.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            next_id: 0,
            capacity,
        }
    }

    /// Register a decoder, appending it to the dispatch order.
    ///
    /// Fails if the same decoder instance is already registered or the
    /// registry is at capacity.
    pub fn register(&mut self, decoder: Arc<dyn FrameDecoder>) -> Result<DecoderHandle> {
        if self
            .entries
            .iter()
            .any(|(_, existing)| Arc::ptr_eq(existing, &decoder))
        {
            return Err(XBeeError::AlreadyRegistered);
        }
        if self.entries.len() >= self.capacity {
            return Err(XBeeError::RegistryFull(self.capacity));
        }

        let handle = DecoderHandle(self.next_id);
        self.next_id += 1;
        self.entries.push((handle, decoder));
        Ok(handle)
    }

    /// Remove a decoder; returns `false` if the handle is not registered.
    pub fn unregister(&mut self, handle: DecoderHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(h, _)| *h != handle);
        self.entries.len() != before
    }

    /// Offer a frame to each decoder in registration order.
    ///
    /// Stops at the first decoder that consumes it; returns whether any did.
    pub fn dispatch(&self, frame: &RxFrame) -> bool {
        for (_, decoder) in &self.entries {
            if decoder.decode(frame) {
                return true;
            }
        }
        false
    }

    /// Number of registered decoders.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no decoders are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
