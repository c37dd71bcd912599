use std::fs::File;
use std::io::{Cursor, Read};

use sliplink_frame::{EscapePolicy, FrameConfig, FrameError, FrameReader};
use tracing::{info, warn};

use crate::cmd::{read_stdin, DecodeArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS};
use crate::output::{parse_hex, print_datagram, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = FrameConfig {
        max_frame_size: args.max_frame_size,
        escape_policy: if args.reject_malformed {
            EscapePolicy::Reject
        } else {
            EscapePolicy::PassThrough
        },
    };

    let input = open_input(&args)?;
    let decoded = decode_stream(FrameReader::with_config(input, config), format)?;
    info!(datagrams = decoded, "decode complete");
    Ok(SUCCESS)
}

fn open_input(args: &DecodeArgs) -> CliResult<Box<dyn Read>> {
    if args.hex_input {
        let bytes = match &args.input {
            Some(path) => std::fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
            None => read_stdin()?,
        };
        let text = String::from_utf8(bytes)
            .map_err(|_| CliError::usage("--hex-input: input is not text"))?;
        let wire = parse_hex(&text).map_err(|err| CliError::usage(format!("--hex-input: {err}")))?;
        return Ok(Box::new(Cursor::new(wire)));
    }

    match &args.input {
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(std::io::stdin())),
    }
}

/// Print every datagram in the stream. A trailing partial frame is reported
/// and discarded.
fn decode_stream<R: Read>(mut reader: FrameReader<R>, format: OutputFormat) -> CliResult<usize> {
    let mut count = 0usize;
    loop {
        match reader.read_frame() {
            Ok(datagram) => {
                print_datagram(count, &datagram, format);
                count += 1;
            }
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("decode failed", err)),
        }
    }

    let pending = reader.pending();
    if pending > 0 {
        warn!(bytes = pending, "input ended inside a frame; discarding partial frame");
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_datagrams_and_skips_empty_frames() {
        let wire = vec![0xC0, b'a', 0xC0, 0xC0, 0xC0, b'b', 0xC0];
        let reader = FrameReader::new(Cursor::new(wire));
        assert_eq!(decode_stream(reader, OutputFormat::Hex).unwrap(), 2);
    }

    #[test]
    fn trailing_partial_frame_is_not_an_error() {
        let wire = vec![0xC0, b'a', 0xC0, b'b'];
        let reader = FrameReader::new(Cursor::new(wire));
        assert_eq!(decode_stream(reader, OutputFormat::Hex).unwrap(), 1);
    }
}
