use std::sync::Arc;

use crate::error::Result;

/// Callback invoked with every chunk of raw bytes a transport receives.
///
/// Chunk boundaries carry no meaning; a chunk may hold part of a frame, one
/// frame, or several.
pub type ChunkReceiver = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// A raw, framing-agnostic byte transport.
///
/// Implementations deliver received bytes by invoking the registered
/// [`ChunkReceiver`] on whatever thread they read on. At most one receiver is
/// registered at a time; registering again replaces the previous one.
pub trait Transport: Send + Sync {
    /// Register the callback that receives raw byte chunks.
    fn register_receiver(&mut self, receiver: ChunkReceiver) -> Result<()>;

    /// Write raw bytes to the far end.
    ///
    /// Returns once the bytes have been handed to the underlying stream.
    fn send(&self, data: &[u8]) -> Result<()>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str {
        "transport"
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn register_receiver(&mut self, receiver: ChunkReceiver) -> Result<()> {
        (**self).register_receiver(receiver)
    }

    fn send(&self, data: &[u8]) -> Result<()> {
        (**self).send(data)
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}
