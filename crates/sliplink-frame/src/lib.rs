//! SLIP (RFC 1055) framing with incremental reassembly.
//!
//! Every datagram travels as one frame:
//! - a leading `0xC0` delimiter
//! - the payload with `0xC0` escaped as `0xDB 0xDC` and `0xDB` as `0xDB 0xDD`
//! - a trailing `0xC0` delimiter
//!
//! [`FrameDecoder`] accepts bytes in whatever chunks the transport hands
//! over and yields each datagram once, in order.

pub mod codec;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    encode, encode_frame, encoded_len, unescape, EscapePolicy, FrameConfig, END, ESC, ESC_END,
    ESC_ESC,
};
pub use decoder::FrameDecoder;
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::SlipCodec;
