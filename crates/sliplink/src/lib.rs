//! SLIP framing and peer-addressed serial link multiplexing.
//!
//! sliplink carries IP datagrams over raw byte streams (serial lines,
//! pseudo-terminals, stream sockets) using RFC 1055 framing, with one link
//! per next-hop peer.
//!
//! # Crate Structure
//!
//! - [`transport`]: raw byte transports (serial devices, ptys, sockets, in-memory)
//! - [`frame`]: SLIP encoding and incremental decoding
//! - [`link`]: per-peer links and the link-layer multiplexer (behind `link` feature)

/// Re-export transport types.
pub mod transport {
    pub use sliplink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sliplink_frame::*;
}

/// Re-export link types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use sliplink_link::*;
}
