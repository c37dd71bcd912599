use std::fmt;
use std::io;

use sliplink_frame::FrameError;
use sliplink_link::LinkError;
use sliplink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

/// Failure carrying the process exit code it maps to.
#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::MalformedEscape { .. } | FrameError::FrameTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Transport(err) => transport_error(context, err),
        LinkError::Frame(err) => frame_error(context, err),
        LinkError::UnknownPeer(_) | LinkError::InvalidPeerAddress(_) => {
            CliError::usage(format!("{context}: {err}"))
        }
        LinkError::DuplicatePeer(_)
        | LinkError::Config(_)
        | LinkError::ConfigRead { .. }
        | LinkError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn io_kinds_map_to_codes() {
        let err = io_error("x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.code, PERMISSION_DENIED);
        let err = io_error("x", io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn shutdown_is_transport_error() {
        let err = transport_error("send failed", TransportError::Shutdown);
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("send failed: "));
    }

    #[test]
    fn oversize_frame_is_data_invalid() {
        let err = frame_error("encode", FrameError::FrameTooLarge { size: 9, max: 4 });
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn unknown_peer_is_usage() {
        let err = link_error("send", LinkError::UnknownPeer(Ipv4Addr::LOCALHOST));
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("127.0.0.1"));
    }

    #[test]
    fn nested_transport_error_is_unwrapped() {
        let err = link_error(
            "open",
            LinkError::Transport(TransportError::Io(io::Error::from(
                io::ErrorKind::BrokenPipe,
            ))),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
