use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use sliplink_frame::FrameConfig;
use sliplink_transport::Transport;
use tracing::{debug, info};

use crate::error::{LinkError, Result};
use crate::handler::{ChannelHandler, DatagramHandler, HandlerResult, SharedHandler};
use crate::link::Link;
use crate::stats::LinkStatsSnapshot;

/// SLIP link layer multiplexing datagrams over one link per peer.
///
/// Each peer (keyed by IPv4 address) owns a [`Link`] with its own decode
/// state. Datagrams received on any link are handed to a single upward
/// handler; the peer they arrived from is not reported.
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
/// use sliplink_link::LinkLayer;
/// use sliplink_transport::MemoryTransport;
///
/// let peer = Ipv4Addr::new(10, 0, 0, 2);
/// let wire = MemoryTransport::new();
/// let (layer, rx) = LinkLayer::channel([(peer, wire.clone())], Default::default(), 16)?;
///
/// layer.send(b"ping", peer)?;
/// assert_eq!(wire.sent()[0].as_ref(), b"\xc0ping\xc0");
///
/// wire.inject(b"\xc0pong\xc0");
/// assert_eq!(rx.recv().unwrap().as_ref(), b"pong");
/// # Ok::<(), sliplink_link::LinkError>(())
/// ```
pub struct LinkLayer<T> {
    links: HashMap<Ipv4Addr, Link<T>>,
    relay: Arc<Relay>,
}

/// Fan-in point shared by every link of a layer.
#[derive(Default)]
struct Relay {
    handler: RwLock<Option<SharedHandler>>,
    undelivered: AtomicU64,
}

impl Relay {
    fn set(&self, handler: Option<SharedHandler>) {
        match self.handler.write() {
            Ok(mut slot) => *slot = handler,
            Err(poisoned) => *poisoned.into_inner() = handler,
        }
    }
}

impl DatagramHandler for Relay {
    fn on_datagram(&self, datagram: Bytes) -> HandlerResult {
        let current = match self.handler.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match current {
            Some(handler) => handler.on_datagram(datagram),
            None => {
                self.undelivered.fetch_add(1, Ordering::Relaxed);
                debug!(len = datagram.len(), "no upward receiver; dropping datagram");
                Ok(())
            }
        }
    }
}

impl<T: Transport> LinkLayer<T> {
    /// Build a layer with default framing and no upward handler yet.
    ///
    /// Datagrams that arrive before [`LinkLayer::register_receiver`] is called
    /// are dropped and counted in [`LinkLayer::undelivered`].
    pub fn new(transports: impl IntoIterator<Item = (Ipv4Addr, T)>) -> Result<Self> {
        Self::with_parts(transports, FrameConfig::default(), None)
    }

    /// Build a layer with explicit framing and no upward handler yet.
    pub fn with_config(
        transports: impl IntoIterator<Item = (Ipv4Addr, T)>,
        config: FrameConfig,
    ) -> Result<Self> {
        Self::with_parts(transports, config, None)
    }

    /// Build a layer whose upward handler is in place before any transport
    /// is attached, so no datagram can be lost to a registration race.
    pub fn with_receiver(
        transports: impl IntoIterator<Item = (Ipv4Addr, T)>,
        config: FrameConfig,
        handler: impl DatagramHandler + 'static,
    ) -> Result<Self> {
        Self::with_parts(transports, config, Some(Arc::new(handler)))
    }

    /// Build a layer that delivers datagrams into a bounded channel.
    ///
    /// Delivery never waits for the consumer: a datagram arriving while
    /// `capacity` datagrams are queued is dropped and counted as a handler
    /// failure on its link.
    pub fn channel(
        transports: impl IntoIterator<Item = (Ipv4Addr, T)>,
        config: FrameConfig,
        capacity: usize,
    ) -> Result<(Self, Receiver<Bytes>)> {
        if capacity == 0 {
            return Err(LinkError::Config(
                "channel capacity must be greater than zero".to_string(),
            ));
        }
        let (handler, rx) = ChannelHandler::bounded(capacity);
        let layer = Self::with_receiver(transports, config, handler)?;
        Ok((layer, rx))
    }

    /// Build a layer from string peer keys, as found in configuration.
    pub fn from_addresses<S: AsRef<str>>(
        transports: impl IntoIterator<Item = (S, T)>,
        config: FrameConfig,
    ) -> Result<Self> {
        let parsed = transports
            .into_iter()
            .map(|(addr, transport)| Ok((parse_peer(addr.as_ref())?, transport)))
            .collect::<Result<Vec<_>>>()?;
        Self::with_parts(parsed, config, None)
    }

    fn with_parts(
        transports: impl IntoIterator<Item = (Ipv4Addr, T)>,
        config: FrameConfig,
        handler: Option<SharedHandler>,
    ) -> Result<Self> {
        let relay = Arc::new(Relay::default());
        relay.set(handler);

        let mut links = HashMap::new();
        for (peer, transport) in transports {
            if links.contains_key(&peer) {
                return Err(LinkError::DuplicatePeer(peer));
            }
            let upward: SharedHandler = relay.clone();
            let link = Link::build(Some(peer), transport, config.clone(), Some(upward))?;
            debug!(%peer, transport = link.transport().transport_name(), "attached link");
            links.insert(peer, link);
        }

        info!(links = links.len(), "link layer ready");
        Ok(Self { links, relay })
    }

    /// Register the upward handler for datagrams from every link, replacing
    /// any previous one.
    pub fn register_receiver(&self, handler: impl DatagramHandler + 'static) {
        self.relay.set(Some(Arc::new(handler)));
    }

    /// Send `datagram` over the link registered for `next_hop`.
    ///
    /// Fails with [`LinkError::UnknownPeer`] without touching any transport
    /// when no link is registered for `next_hop`.
    pub fn send(&self, datagram: &[u8], next_hop: Ipv4Addr) -> Result<()> {
        let link = self
            .links
            .get(&next_hop)
            .ok_or(LinkError::UnknownPeer(next_hop))?;
        link.send(datagram)
    }

    /// Read-only view of the link registered for `peer`.
    pub fn link(&self, peer: Ipv4Addr) -> Option<LinkView<'_, T>> {
        self.links.get(&peer).map(|link| LinkView { peer, link })
    }

    /// Registered peers in ascending address order.
    pub fn peers(&self) -> Vec<Ipv4Addr> {
        let mut peers: Vec<_> = self.links.keys().copied().collect();
        peers.sort();
        peers
    }

    /// Per-peer counters in ascending address order.
    pub fn stats(&self) -> Vec<(Ipv4Addr, LinkStatsSnapshot)> {
        self.peers()
            .into_iter()
            .filter_map(|peer| self.links.get(&peer).map(|link| (peer, link.stats())))
            .collect()
    }

    /// Datagrams decoded while no upward handler was registered.
    pub fn undelivered(&self) -> u64 {
        self.relay.undelivered.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// A link owned by a [`LinkLayer`].
///
/// Exposes state and counters only. The link's upward handler belongs to the
/// layer and cannot be replaced through a view.
///
/// ```compile_fail
/// use std::net::Ipv4Addr;
/// use bytes::Bytes;
/// use sliplink_link::{HandlerResult, LinkLayer};
/// use sliplink_transport::MemoryTransport;
///
/// let peer = Ipv4Addr::new(10, 0, 0, 2);
/// let layer = LinkLayer::new([(peer, MemoryTransport::new())]).unwrap();
/// layer
///     .link(peer)
///     .unwrap()
///     .register_receiver(|_d: Bytes| -> HandlerResult { Ok(()) });
/// ```
pub struct LinkView<'a, T> {
    peer: Ipv4Addr,
    link: &'a Link<T>,
}

impl<'a, T: Transport> LinkView<'a, T> {
    pub fn peer(&self) -> Ipv4Addr {
        self.peer
    }

    /// Number of escaped bytes held for the frame in progress.
    pub fn residual_len(&self) -> usize {
        self.link.residual_len()
    }

    pub fn stats(&self) -> LinkStatsSnapshot {
        self.link.stats()
    }

    pub fn transport(&self) -> &'a T {
        self.link.transport()
    }

    pub fn config(&self) -> &'a FrameConfig {
        self.link.config()
    }
}

impl<T> std::fmt::Debug for LinkView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.link, f)
    }
}

impl<T> std::fmt::Debug for LinkLayer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut peers: Vec<_> = self.links.keys().collect();
        peers.sort();
        f.debug_struct("LinkLayer").field("peers", &peers).finish()
    }
}

/// Parse a dotted-quad peer key.
pub fn parse_peer(addr: &str) -> Result<Ipv4Addr> {
    addr.trim()
        .parse()
        .map_err(|_| LinkError::InvalidPeerAddress(addr.to_string()))
}
