use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{encode_frame, encoded_len, FrameConfig};
use crate::decoder::{extract, ScanState};
use crate::error::{FrameError, Result};

/// `tokio_util` codec for SLIP datagrams.
///
/// Decoding matches [`crate::FrameDecoder`]: empty frames are skipped and
/// frames dropped for size or escape-policy reasons are logged rather than
/// ending the stream.
#[derive(Debug, Default)]
pub struct SlipCodec {
    config: FrameConfig,
    state: ScanState,
}

impl SlipCodec {
    /// Create a codec with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            config,
            state: ScanState::default(),
        }
    }
}

impl Decoder for SlipCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        while let Some(result) = extract(src, &mut self.state, &self.config) {
            match result {
                Ok(datagram) => return Ok(Some(datagram)),
                Err(err) => warn!(error = %err, "dropping frame"),
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if let Some(datagram) = self.decode(src)? {
            return Ok(Some(datagram));
        }
        if src.is_empty() {
            return Ok(None);
        }
        src.clear();
        self.state.reset();
        Err(FrameError::ConnectionClosed)
    }
}

impl Encoder<Bytes> for SlipCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        self.config.check_size(item.len())?;
        dst.reserve(encoded_len(&item));
        encode_frame(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::{END, ESC, ESC_END};

    #[test]
    fn decode_across_calls() {
        let mut codec = SlipCodec::new();
        let mut buf = BytesMut::from(&[END, 0x01, ESC][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[ESC_END, END, END, 0x02, END]);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), &[0x01, END]);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), &[0x02]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_eof_with_partial_frame() {
        let mut codec = SlipCodec::new();
        let mut buf = BytesMut::from(&[END, 0x01][..]);
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn encode_rejects_oversize() {
        let mut codec = SlipCodec::with_config(FrameConfig {
            max_frame_size: Some(1),
            ..FrameConfig::default()
        });
        let mut dst = BytesMut::new();
        let err = codec.encode(Bytes::from_static(b"ab"), &mut dst).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
        assert!(dst.is_empty());
    }

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut sink = FramedWrite::new(client, SlipCodec::new());
        let mut stream = FramedRead::new(server, SlipCodec::new());

        sink.send(Bytes::from_static(b"first")).await.unwrap();
        sink.send(Bytes::from_static(&[END, ESC])).await.unwrap();
        drop(sink);

        assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), b"first");
        assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), &[END, ESC]);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn framed_read_handles_fragmented_writes() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut stream = FramedRead::new(server, SlipCodec::new());

        let writer = tokio::spawn(async move {
            for byte in [END, b'h', ESC, ESC_END, b'i', END] {
                client.write_all(&[byte]).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let datagram = stream.next().await.unwrap().unwrap();
        assert_eq!(datagram.as_ref(), &[b'h', END, b'i']);
        writer.await.unwrap();
    }
}
