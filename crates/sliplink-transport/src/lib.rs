//! Raw byte transports for sliplink.
//!
//! A transport is anything that can push received bytes to a callback and
//! write bytes out: a serial device, a pseudo-terminal master, a Unix or TCP
//! socket. This is the lowest layer of sliplink; framing and link
//! multiplexing build on the [`Transport`] trait defined here.

pub mod error;
pub mod memory;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod pty;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use stream::StreamTransport;
pub use traits::{ChunkReceiver, Transport};

#[cfg(unix)]
pub use pty::{make_raw, Pty};
