use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};

use bytes::Bytes;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{ChunkReceiver, Transport};

/// In-process transport.
///
/// Cloning yields another handle to the same transport, so a caller can hand
/// one clone to a link and keep another to inject inbound chunks and inspect
/// what was sent. Two transports created by [`MemoryTransport::pair`] are
/// wired back to back: bytes sent on one are delivered, synchronously and on
/// the sending thread, to the other's receiver.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    receiver: RwLock<Option<ChunkReceiver>>,
    sent: Mutex<Vec<Bytes>>,
    closed: AtomicBool,
    remote: OnceLock<Weak<Inner>>,
}

impl MemoryTransport {
    /// Create a standalone transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create two transports connected back to back.
    pub fn pair() -> (Self, Self) {
        let left = Self::new();
        let right = Self::new();
        let _ = left.inner.remote.set(Arc::downgrade(&right.inner));
        let _ = right.inner.remote.set(Arc::downgrade(&left.inner));
        (left, right)
    }

    /// Deliver a chunk as if it had been read from the wire.
    ///
    /// Returns `false` when no receiver is registered and the chunk was
    /// dropped.
    pub fn inject(&self, chunk: &[u8]) -> bool {
        self.inner.deliver(chunk)
    }

    /// Every buffer passed to `send` so far, in order.
    pub fn sent(&self) -> Vec<Bytes> {
        self.inner.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Drain and return the buffers passed to `send` so far.
    pub fn take_sent(&self) -> Vec<Bytes> {
        self.inner
            .sent
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }

    /// Close the transport; subsequent sends fail with `Shutdown`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Whether a receiver is currently registered.
    pub fn has_receiver(&self) -> bool {
        self.inner
            .receiver
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }
}

impl Inner {
    fn deliver(&self, chunk: &[u8]) -> bool {
        let current = match self.receiver.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match current {
            Some(receiver) => {
                receiver(chunk);
                true
            }
            None => {
                debug!(len = chunk.len(), "no receiver; dropping chunk");
                false
            }
        }
    }
}

impl Transport for MemoryTransport {
    fn register_receiver(&mut self, receiver: ChunkReceiver) -> Result<()> {
        match self.inner.receiver.write() {
            Ok(mut slot) => *slot = Some(receiver),
            Err(poisoned) => *poisoned.into_inner() = Some(receiver),
        }
        Ok(())
    }

    fn send(&self, data: &[u8]) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Shutdown);
        }

        if let Ok(mut sent) = self.inner.sent.lock() {
            sent.push(Bytes::copy_from_slice(data));
        }

        if let Some(remote) = self.inner.remote.get().and_then(Weak::upgrade) {
            remote.deliver(data);
        }
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish()
    }
}
