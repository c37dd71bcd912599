use std::io::Read;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::{io_error, CliError, CliResult};
use crate::output::{parse_hex, OutputFormat};

pub mod decode;
pub mod encode;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Frame a payload as it would appear on the wire.
    Encode(EncodeArgs),
    /// Decode a SLIP byte stream and print the datagrams it carries.
    Decode(DecodeArgs),
    /// Send one datagram to a configured peer.
    Send(SendArgs),
    /// Print datagrams received on every configured link.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where a payload comes from. Standard input when no flag is given.
#[derive(Args, Debug, Default)]
pub struct PayloadArgs {
    /// Payload as a UTF-8 string.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Payload as hex digits (e.g. "45 00 00 1c").
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    pub fn read(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(hex) = &self.hex {
            return parse_hex(hex).map_err(|err| CliError::usage(format!("--hex: {err}")));
        }
        if let Some(path) = &self.file {
            return std::fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
        }
        read_stdin()
    }
}

pub fn read_stdin() -> CliResult<Vec<u8>> {
    let mut buf = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut buf)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(buf)
}

/// Link-layer configuration file.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Link configuration file (JSON).
    #[arg(long, short = 'c', env = "SLIPLINK_CONFIG", value_name = "PATH")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Fail instead of encoding payloads larger than this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_frame_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding the SLIP byte stream. Reads standard input when omitted.
    pub input: Option<PathBuf>,
    /// Treat the input as hex text rather than raw bytes.
    #[arg(long)]
    pub hex_input: bool,
    /// Drop datagrams larger than this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_frame_size: Option<usize>,
    /// Drop frames containing malformed escape sequences.
    #[arg(long)]
    pub reject_malformed: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Next-hop peer address.
    #[arg(long, short = 'p')]
    pub peer: Ipv4Addr,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Exit after receiving N datagrams.
    #[arg(long)]
    pub count: Option<usize>,
    /// Datagrams buffered between the links and the printer.
    #[arg(long, default_value = "64")]
    pub queue: usize,
    /// Suppress the per-link statistics printed on exit.
    #[arg(long)]
    pub no_stats: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
