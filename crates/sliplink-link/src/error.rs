use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Errors that can occur in link and link-layer operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// No link is registered for the requested next hop.
    #[error("no link registered for peer {0}")]
    UnknownPeer(Ipv4Addr),

    /// A peer key is not a dotted-quad IPv4 address.
    #[error("invalid peer address {0:?}")]
    InvalidPeerAddress(String),

    /// Two transports were supplied for the same peer.
    #[error("duplicate link for peer {0}")]
    DuplicatePeer(Ipv4Addr),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sliplink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] sliplink_frame::FrameError),

    /// The link configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The link configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
