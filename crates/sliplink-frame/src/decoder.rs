use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::codec::{unescape, FrameConfig, END};
use crate::error::{FrameError, Result};

/// Scan position carried between extraction attempts on one buffer.
#[derive(Debug, Default)]
pub(crate) struct ScanState {
    /// Bytes before this offset are known to hold no delimiter.
    scan_from: usize,
    /// Dropping bytes of an oversize frame until the next delimiter.
    discarding: bool,
}

impl ScanState {
    pub(crate) fn reset(&mut self) {
        self.scan_from = 0;
        self.discarding = false;
    }
}

/// Pull the next delimited frame out of `buf`.
///
/// Returns `None` when `buf` holds no further delimiter. Empty frames are
/// skipped. Bytes after the last delimiter stay in `buf`.
pub(crate) fn extract(
    buf: &mut BytesMut,
    state: &mut ScanState,
    config: &FrameConfig,
) -> Option<Result<Bytes>> {
    loop {
        let Some(rel) = buf[state.scan_from..].iter().position(|&b| b == END) else {
            state.scan_from = buf.len();
            return check_partial(buf, state, config);
        };
        let pos = state.scan_from + rel;

        let body = buf.split_to(pos);
        buf.advance(1);
        state.scan_from = 0;

        if state.discarding {
            state.discarding = false;
            debug!(tail = body.len(), "resynchronized after oversize frame");
            continue;
        }
        if body.is_empty() {
            continue;
        }

        let mut payload = BytesMut::with_capacity(body.len());
        let malformed = match unescape(&body, &mut payload, config.escape_policy) {
            Ok(malformed) => malformed,
            Err(err) => return Some(Err(err)),
        };
        if malformed > 0 {
            warn!(
                malformed,
                len = body.len(),
                "malformed escape passed through"
            );
        }
        if let Err(err) = config.check_size(payload.len()) {
            return Some(Err(err));
        }
        return Some(Ok(payload.freeze()));
    }
}

/// Drop an undelimited partial frame that can no longer fit the limit.
fn check_partial(
    buf: &mut BytesMut,
    state: &mut ScanState,
    config: &FrameConfig,
) -> Option<Result<Bytes>> {
    let max = config.max_frame_size?;
    // Escaping at most doubles the size, so only a partial frame longer than
    // twice the limit is certain to be oversize.
    let threshold = max.saturating_mul(2);
    if buf.len() <= threshold {
        return None;
    }

    let size = buf.len();
    buf.clear();
    state.scan_from = 0;
    if state.discarding {
        return None;
    }
    state.discarding = true;
    Some(Err(FrameError::FrameTooLarge { size, max }))
}

/// Incremental SLIP decoder.
///
/// Accepts raw bytes in arbitrarily sized chunks and yields each complete
/// datagram exactly once, in arrival order. Between calls it keeps only the
/// residual: the escaped bytes following the last delimiter seen. An escape
/// byte at the end of one chunk therefore pairs with the first byte of the
/// next.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    residual: BytesMut,
    state: ScanState,
    config: FrameConfig,
}

impl FrameDecoder {
    /// Create a decoder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            residual: BytesMut::new(),
            state: ScanState::default(),
            config,
        }
    }

    /// Append raw bytes to the residual.
    pub fn push(&mut self, chunk: &[u8]) {
        self.residual.extend_from_slice(chunk);
    }

    /// Extract the next complete datagram, if any.
    ///
    /// Frames dropped for size or escape-policy reasons come back as errors;
    /// decoding can continue after them.
    pub fn next_frame(&mut self) -> Option<Result<Bytes>> {
        extract(&mut self.residual, &mut self.state, &self.config)
    }

    /// Push a chunk and hand every frame it completes to `on_frame`.
    ///
    /// Returns the number of datagrams successfully decoded.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_frame: F) -> usize
    where
        F: FnMut(Result<Bytes>),
    {
        if chunk.is_empty() {
            return 0;
        }
        self.push(chunk);

        let mut decoded = 0usize;
        while let Some(result) = self.next_frame() {
            if result.is_ok() {
                decoded += 1;
            }
            on_frame(result);
        }
        decoded
    }

    /// Bytes of the frame currently in progress, still escaped.
    pub fn residual(&self) -> &[u8] {
        &self.residual
    }

    /// Discard any partial frame.
    pub fn reset(&mut self) {
        self.residual.clear();
        self.state.reset();
    }

    /// Current configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
