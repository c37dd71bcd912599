mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "sliplink", version, about = "SLIP framing and serial link CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "sliplink",
            "send",
            "--config",
            "/tmp/links.json",
            "--peer",
            "10.0.0.2",
            "--data",
            "hello",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.peer, std::net::Ipv4Addr::new(10, 0, 0, 2));
                assert_eq!(args.payload.data.as_deref(), Some("hello"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from(["sliplink", "encode", "--hex", "c0", "--data", "hello"])
            .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_non_ipv4_peer() {
        let err = Cli::try_parse_from([
            "sliplink", "send", "--config", "/tmp/x.json", "--peer", "gateway",
        ])
        .expect_err("peer must be an address");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["sliplink", "decode", "--hex-input", "--format", "hex"])
            .expect("decode args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Hex)));
        assert!(matches!(cli.command, Command::Decode(ref a) if a.hex_input && a.input.is_none()));
    }

    #[test]
    fn parses_listen_count() {
        let cli = Cli::try_parse_from([
            "sliplink", "listen", "-c", "/tmp/x.json", "--count", "3",
        ])
        .expect("listen args should parse");
        assert!(matches!(cli.command, Command::Listen(ref a) if a.count == Some(3)));
    }
}
