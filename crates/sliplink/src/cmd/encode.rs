use sliplink_frame::{encode, FrameConfig, FrameWriter};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = args.payload.read()?;

    let config = FrameConfig {
        max_frame_size: args.max_frame_size,
        ..FrameConfig::default()
    };

    if format == OutputFormat::Raw {
        let mut writer = FrameWriter::with_config(std::io::stdout().lock(), config);
        writer
            .send(&payload)
            .map_err(|err| frame_error("encode failed", err))?;
        tracing::debug!(payload = payload.len(), "wrote raw frame");
        return Ok(SUCCESS);
    }

    config
        .check_size(payload.len())
        .map_err(|err| frame_error("encode failed", err))?;

    let frame = encode(&payload);
    tracing::debug!(payload = payload.len(), frame = frame.len(), "encoded payload");
    print_encoded(payload.len(), &frame, format);
    Ok(SUCCESS)
}
