use std::path::PathBuf;

/// Errors that can occur in raw transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a device or file path.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to a socket endpoint.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Pseudo-terminal allocation or configuration failed.
    #[error("pseudo-terminal error: {0}")]
    Pty(String),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
