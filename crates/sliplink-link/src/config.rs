use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sliplink_frame::{EscapePolicy, FrameConfig};
use sliplink_transport::StreamTransport;
use tracing::debug;

use crate::error::{LinkError, Result};
use crate::layer::parse_peer;

/// Where a link's raw bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// Serial or pseudo-terminal device, switched to raw mode when it is a tty.
    Device(PathBuf),
    /// Unix domain stream socket to connect to.
    Unix(PathBuf),
    /// TCP `host:port` to connect to.
    Tcp(String),
}

impl Endpoint {
    /// Open the endpoint as a stream transport.
    pub fn open(&self) -> Result<StreamTransport> {
        let transport = match self {
            Self::Device(path) => StreamTransport::open_device(path)?,
            Self::Unix(path) => StreamTransport::connect_unix(path)?,
            Self::Tcp(addr) => StreamTransport::connect_tcp(addr.as_str())?,
        };
        Ok(transport)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device(path) => write!(f, "device:{}", path.display()),
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

/// Link-layer configuration file.
///
/// ```json
/// {
///   "max_frame_size": 1500,
///   "links": {
///     "10.0.0.2": { "device": "/dev/ttyUSB0" },
///     "10.0.0.3": { "tcp": "192.168.1.7:5555" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkLayerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_frame_size: Option<usize>,
    #[serde(default)]
    pub reject_malformed_escapes: bool,
    #[serde(default)]
    pub links: BTreeMap<String, Endpoint>,
}

impl LinkLayerConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LinkError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded link config");
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size == Some(0) {
            return Err(LinkError::Config(
                "max_frame_size must be greater than zero".to_string(),
            ));
        }
        for endpoint in self.links.values() {
            if let Endpoint::Tcp(addr) = endpoint {
                if addr.trim().is_empty() {
                    return Err(LinkError::Config("empty tcp address".to_string()));
                }
            }
        }
        self.peers().map(|_| ())
    }

    /// Parsed peer addresses in ascending order.
    pub fn peers(&self) -> Result<Vec<Ipv4Addr>> {
        let mut seen = HashSet::new();
        let mut peers = Vec::with_capacity(self.links.len());
        for key in self.links.keys() {
            let peer = parse_peer(key)?;
            if !seen.insert(peer) {
                return Err(LinkError::DuplicatePeer(peer));
            }
            peers.push(peer);
        }
        peers.sort();
        Ok(peers)
    }

    /// Framing settings shared by every link.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
            escape_policy: if self.reject_malformed_escapes {
                EscapePolicy::Reject
            } else {
                EscapePolicy::PassThrough
            },
        }
    }

    /// Open every configured endpoint.
    ///
    /// Stops at the first endpoint that fails to open; transports already
    /// opened are dropped.
    pub fn open(&self) -> Result<Vec<(Ipv4Addr, StreamTransport)>> {
        self.links
            .iter()
            .map(|(key, endpoint)| {
                let peer = parse_peer(key)?;
                debug!(%peer, %endpoint, "opening link");
                Ok((peer, endpoint.open()?))
            })
            .collect()
    }
}
