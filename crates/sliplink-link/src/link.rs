use std::net::Ipv4Addr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};

use bytes::{Bytes, BytesMut};
use sliplink_frame::{encode_frame, encoded_len, FrameConfig, FrameDecoder};
use sliplink_transport::{ChunkReceiver, Transport};
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::handler::{panic_message, DatagramHandler, SharedHandler};
use crate::stats::{LinkStats, LinkStatsSnapshot};

/// One SLIP connection over a single raw transport.
///
/// Outgoing datagrams are framed and written to the transport in one call.
/// Incoming chunks are reassembled into datagrams and handed to the
/// registered [`DatagramHandler`]. Decode state is serialized per link, so
/// concurrent receive events for the same link are processed one at a time.
pub struct Link<T> {
    transport: T,
    config: FrameConfig,
    shared: Arc<LinkShared>,
}

struct LinkShared {
    peer: Option<Ipv4Addr>,
    decoder: Mutex<FrameDecoder>,
    handler: RwLock<Option<SharedHandler>>,
    stats: LinkStats,
}

impl<T: Transport> Link<T> {
    /// Create a link with default framing configuration and no handler.
    pub fn new(transport: T) -> Result<Self> {
        Self::with_config(transport, FrameConfig::default())
    }

    /// Create a link with explicit framing configuration and no handler.
    pub fn with_config(transport: T, config: FrameConfig) -> Result<Self> {
        Self::build(None, transport, config, None)
    }

    /// Create a link whose handler is installed before any byte is read.
    pub fn with_handler(
        transport: T,
        config: FrameConfig,
        handler: impl DatagramHandler + 'static,
    ) -> Result<Self> {
        Self::build(None, transport, config, Some(Arc::new(handler)))
    }

    pub(crate) fn build(
        peer: Option<Ipv4Addr>,
        mut transport: T,
        config: FrameConfig,
        handler: Option<SharedHandler>,
    ) -> Result<Self> {
        let shared = Arc::new(LinkShared {
            peer,
            decoder: Mutex::new(FrameDecoder::with_config(config.clone())),
            handler: RwLock::new(handler),
            stats: LinkStats::default(),
        });

        let receiver: ChunkReceiver = {
            let shared = Arc::clone(&shared);
            Arc::new(move |chunk: &[u8]| shared.on_chunk(chunk))
        };
        transport.register_receiver(receiver)?;

        Ok(Self {
            transport,
            config,
            shared,
        })
    }

    /// Register the upward handler, replacing any previous one.
    pub fn register_receiver(&self, handler: impl DatagramHandler + 'static) {
        self.shared.set_handler(Some(Arc::new(handler)));
    }

    /// Frame `datagram` and write it to the transport.
    pub fn send(&self, datagram: &[u8]) -> Result<()> {
        self.config.check_size(datagram.len())?;

        let mut frame = BytesMut::with_capacity(encoded_len(datagram));
        encode_frame(datagram, &mut frame);
        self.transport.send(&frame)?;

        self.shared.stats.record_sent(frame.len());
        debug!(peer = ?self.shared.peer, len = datagram.len(), "sent frame");
        Ok(())
    }

    /// Feed raw bytes as if they had been read from the transport.
    pub fn receive(&self, chunk: &[u8]) {
        self.shared.on_chunk(chunk);
    }

    /// Peer address this link was registered under, if any.
    pub fn peer(&self) -> Option<Ipv4Addr> {
        self.shared.peer
    }

    /// Number of escaped bytes held for the frame in progress.
    pub fn residual_len(&self) -> usize {
        match self.shared.decoder.lock() {
            Ok(decoder) => decoder.residual().len(),
            Err(poisoned) => poisoned.into_inner().residual().len(),
        }
    }

    /// Current traffic counters.
    pub fn stats(&self) -> LinkStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Borrow the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Framing configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl LinkShared {
    fn set_handler(&self, handler: Option<SharedHandler>) {
        match self.handler.write() {
            Ok(mut slot) => *slot = handler,
            Err(poisoned) => *poisoned.into_inner() = handler,
        }
    }

    fn current_handler(&self) -> Option<SharedHandler> {
        match self.handler.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn on_chunk(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.stats.record_chunk(chunk.len());

        let mut decoder = match self.decoder.lock() {
            Ok(decoder) => decoder,
            Err(poisoned) => poisoned.into_inner(),
        };
        decoder.feed(chunk, |result| match result {
            Ok(datagram) => self.deliver(datagram),
            Err(err) => {
                self.stats.record_dropped();
                warn!(peer = ?self.peer, error = %err, "dropping frame");
            }
        });
    }

    fn deliver(&self, datagram: Bytes) {
        self.stats.record_frame();
        let len = datagram.len();

        let Some(handler) = self.current_handler() else {
            debug!(peer = ?self.peer, len, "no receiver registered; dropping datagram");
            return;
        };

        match catch_unwind(AssertUnwindSafe(|| handler.on_datagram(datagram))) {
            Ok(Ok(())) => debug!(peer = ?self.peer, len, "delivered datagram"),
            Ok(Err(err)) => {
                self.stats.record_handler_failure();
                warn!(peer = ?self.peer, len, error = %err, "receiver failed");
            }
            Err(payload) => {
                self.stats.record_handler_failure();
                error!(
                    peer = ?self.peer,
                    len,
                    panic = %panic_message(payload.as_ref()),
                    "receiver panicked"
                );
            }
        }
    }
}

impl<T> std::fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("peer", &self.shared.peer)
            .field("config", &self.config)
            .finish()
    }
}
