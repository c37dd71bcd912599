use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use bytes::Bytes;

/// Error returned by a failing [`DatagramHandler`].
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of delivering one datagram upward.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Shared handle to an upward handler.
pub type SharedHandler = Arc<dyn DatagramHandler>;

/// Consumer of reassembled datagrams.
///
/// Called synchronously on the thread that delivered the transport's receive
/// event, once per datagram, in arrival order for a given link. A returned
/// error or a panic is logged by the caller and does not affect decoding of
/// later frames.
pub trait DatagramHandler: Send + Sync {
    /// Accept one datagram.
    fn on_datagram(&self, datagram: Bytes) -> HandlerResult;
}

impl<F> DatagramHandler for F
where
    F: Fn(Bytes) -> HandlerResult + Send + Sync,
{
    fn on_datagram(&self, datagram: Bytes) -> HandlerResult {
        self(datagram)
    }
}

/// Handler that forwards datagrams into a bounded channel.
///
/// Never blocks the delivering thread. A datagram that finds the channel
/// full is refused with an error, which the link counts as a handler
/// failure.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: SyncSender<Bytes>,
}

impl ChannelHandler {
    /// Create a handler and the receiving end of its channel.
    ///
    /// A zero capacity is raised to one; a rendezvous channel would refuse
    /// every datagram.
    pub fn bounded(capacity: usize) -> (Self, Receiver<Bytes>) {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl DatagramHandler for ChannelHandler {
    fn on_datagram(&self, datagram: Bytes) -> HandlerResult {
        self.tx.try_send(datagram).map_err(|err| match err {
            TrySendError::Full(_) => HandlerError::from("datagram queue full"),
            TrySendError::Disconnected(_) => HandlerError::from("datagram receiver dropped"),
        })
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
