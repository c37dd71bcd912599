//! SLIP links and a link layer that multiplexes them by peer address.
//!
//! A [`Link`] wraps one raw transport: datagrams sent through it are framed
//! with [`sliplink_frame`], and bytes the transport receives are reassembled
//! into datagrams for the registered [`DatagramHandler`].
//!
//! A [`LinkLayer`] owns one link per next-hop IPv4 address and fans every
//! received datagram into a single upward handler.

pub mod config;
pub mod error;
pub mod handler;
pub mod layer;
pub mod link;
pub mod stats;

pub use config::{Endpoint, LinkLayerConfig};
pub use error::{LinkError, Result};
pub use handler::{ChannelHandler, DatagramHandler, HandlerError, HandlerResult, SharedHandler};
pub use layer::{parse_peer, LinkLayer, LinkView};
pub use link::Link;
pub use stats::{LinkStats, LinkStatsSnapshot};
