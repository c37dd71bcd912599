use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame delimiter.
pub const END: u8 = 0xC0;

/// Escape prefix.
pub const ESC: u8 = 0xDB;

/// Follows [`ESC`] to encode a literal [`END`].
pub const ESC_END: u8 = 0xDC;

/// Follows [`ESC`] to encode a literal [`ESC`].
pub const ESC_ESC: u8 = 0xDD;

/// What to do with an escape byte followed by neither [`ESC_END`] nor
/// [`ESC_ESC`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EscapePolicy {
    /// Keep the escape byte and its follower as literal data.
    #[default]
    PassThrough,
    /// Drop the whole frame.
    Reject,
}

/// Configuration for SLIP encoding and decoding.
#[derive(Debug, Clone, Default)]
pub struct FrameConfig {
    /// Maximum datagram size in bytes. `None` means unlimited.
    pub max_frame_size: Option<usize>,
    /// Handling of malformed escape sequences.
    pub escape_policy: EscapePolicy,
}

impl FrameConfig {
    /// Fail with `FrameTooLarge` if `size` exceeds the configured maximum.
    pub fn check_size(&self, size: usize) -> Result<()> {
        match self.max_frame_size {
            Some(max) if size > max => Err(FrameError::FrameTooLarge { size, max }),
            _ => Ok(()),
        }
    }
}

/// Number of bytes `encode_frame` produces for `payload`.
pub fn encoded_len(payload: &[u8]) -> usize {
    let escapes = payload.iter().filter(|&&b| b == END || b == ESC).count();
    payload.len() + escapes + 2
}

/// Encode a datagram into a SLIP frame.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────────────────────────────┬──────┐
/// │ 0xC0 │ payload                          │ 0xC0 │
/// │      │ 0xC0 -> 0xDB 0xDC                │      │
/// │      │ 0xDB -> 0xDB 0xDD                │      │
/// └──────┴──────────────────────────────────┴──────┘
/// ```
///
/// The empty datagram encodes to `C0 C0`.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(encoded_len(payload));
    dst.put_u8(END);
    for &byte in payload {
        match byte {
            END => dst.put_slice(&[ESC, ESC_END]),
            ESC => dst.put_slice(&[ESC, ESC_ESC]),
            other => dst.put_u8(other),
        }
    }
    dst.put_u8(END);
}

/// Encode a datagram into a freshly allocated frame.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut dst = BytesMut::with_capacity(encoded_len(payload));
    encode_frame(payload, &mut dst);
    dst.freeze()
}

/// Reverse the escape transform on one frame body (delimiters excluded).
///
/// Returns the number of malformed escapes encountered. Under
/// [`EscapePolicy::PassThrough`] a malformed escape is copied through
/// unchanged and its follower is decoded as ordinary data; an escape at the
/// very end of the body is kept as a literal byte. Under
/// [`EscapePolicy::Reject`] the first malformed escape fails the frame.
pub fn unescape(escaped: &[u8], dst: &mut BytesMut, policy: EscapePolicy) -> Result<usize> {
    dst.reserve(escaped.len());
    let mut malformed = 0usize;
    let mut i = 0usize;

    while i < escaped.len() {
        let byte = escaped[i];
        if byte != ESC {
            dst.put_u8(byte);
            i += 1;
            continue;
        }

        match escaped.get(i + 1) {
            Some(&ESC_END) => {
                dst.put_u8(END);
                i += 2;
            }
            Some(&ESC_ESC) => {
                dst.put_u8(ESC);
                i += 2;
            }
            follower => {
                if policy == EscapePolicy::Reject {
                    return Err(FrameError::MalformedEscape {
                        offset: i,
                        byte: follower.copied().unwrap_or(END),
                    });
                }
                malformed += 1;
                dst.put_u8(ESC);
                i += 1;
            }
        }
    }

    Ok(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unescape_vec(escaped: &[u8]) -> (Vec<u8>, usize) {
        let mut dst = BytesMut::new();
        let malformed = unescape(escaped, &mut dst, EscapePolicy::PassThrough).unwrap();
        (dst.to_vec(), malformed)
    }

    #[test]
    fn encode_plain_payload() {
        assert_eq!(encode(b"\x01\x02\x03").as_ref(), b"\xc0\x01\x02\x03\xc0");
    }

    #[test]
    fn encode_empty_payload() {
        assert_eq!(encode(b"").as_ref(), &[END, END]);
    }

    #[test]
    fn encode_escapes_end_and_esc() {
        let frame = encode(&[0x01, END, 0x03, ESC, 0x05]);
        assert_eq!(
            frame.as_ref(),
            &[END, 0x01, ESC, ESC_END, 0x03, ESC, ESC_ESC, 0x05, END]
        );
    }

    #[test]
    fn encode_leaves_esc_end_and_esc_esc_literals_alone() {
        let frame = encode(&[ESC_END, ESC_ESC]);
        assert_eq!(frame.as_ref(), &[END, ESC_END, ESC_ESC, END]);
    }

    #[test]
    fn encoded_len_matches_output() {
        let payload = [END, ESC, 0x00, END, 0xff];
        assert_eq!(encoded_len(&payload), encode(&payload).len());
        assert_eq!(encoded_len(b""), 2);
    }

    #[test]
    fn encode_frame_appends() {
        let mut dst = BytesMut::new();
        encode_frame(b"a", &mut dst);
        encode_frame(b"b", &mut dst);
        assert_eq!(dst.as_ref(), b"\xc0a\xc0\xc0b\xc0");
    }

    #[test]
    fn unescape_reverses_both_sequences() {
        let (out, malformed) = unescape_vec(&[0x01, ESC, ESC_END, ESC, ESC_ESC, 0x02]);
        assert_eq!(out, vec![0x01, END, ESC, 0x02]);
        assert_eq!(malformed, 0);
    }

    #[test]
    fn unescape_does_not_chain_substitutions() {
        // ESC ESC_ESC ESC_END is a literal ESC followed by a literal ESC_END.
        let (out, _) = unescape_vec(&[ESC, ESC_ESC, ESC_END]);
        assert_eq!(out, vec![ESC, ESC_END]);
    }

    #[test]
    fn unescape_passes_malformed_escape_through() {
        let (out, malformed) = unescape_vec(&[0x01, ESC, 0x41, 0x02]);
        assert_eq!(out, vec![0x01, ESC, 0x41, 0x02]);
        assert_eq!(malformed, 1);
    }

    #[test]
    fn unescape_malformed_escape_before_valid_escape() {
        let (out, malformed) = unescape_vec(&[ESC, ESC, ESC_ESC]);
        assert_eq!(out, vec![ESC, ESC]);
        assert_eq!(malformed, 1);
    }

    #[test]
    fn unescape_keeps_trailing_escape() {
        let (out, malformed) = unescape_vec(&[0x01, ESC]);
        assert_eq!(out, vec![0x01, ESC]);
        assert_eq!(malformed, 1);
    }

    #[test]
    fn unescape_reject_policy_reports_offset() {
        let mut dst = BytesMut::new();
        let err = unescape(&[0x01, 0x02, ESC, 0x41], &mut dst, EscapePolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            FrameError::MalformedEscape {
                offset: 2,
                byte: 0x41
            }
        ));
    }

    #[test]
    fn unescape_reject_policy_trailing_escape_reports_end() {
        let mut dst = BytesMut::new();
        let err = unescape(&[ESC], &mut dst, EscapePolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            FrameError::MalformedEscape { offset: 0, byte: END }
        ));
    }

    #[test]
    fn check_size_respects_limit() {
        let cfg = FrameConfig {
            max_frame_size: Some(4),
            ..FrameConfig::default()
        };
        assert!(cfg.check_size(4).is_ok());
        assert!(matches!(
            cfg.check_size(5),
            Err(FrameError::FrameTooLarge { size: 5, max: 4 })
        ));
        assert!(FrameConfig::default().check_size(usize::MAX).is_ok());
    }
}
