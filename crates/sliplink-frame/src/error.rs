/// Errors that can occur during SLIP encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An escape byte was followed by something other than ESC_END/ESC_ESC.
    #[error("malformed escape at offset {offset}: 0xdb followed by {byte:#04x}")]
    MalformedEscape { offset: usize, byte: u8 },

    /// The datagram exceeds the configured maximum frame size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before the current frame was terminated.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
