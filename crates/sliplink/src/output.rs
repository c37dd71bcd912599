use std::io::{IsTerminal, Write};
use std::net::Ipv4Addr;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use sliplink_link::LinkStatsSnapshot;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
    Hex,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct DatagramOutput {
    index: usize,
    size: usize,
    payload: String,
    hex: String,
}

#[derive(Serialize)]
struct EncodedOutput {
    payload_size: usize,
    frame_size: usize,
    frame: String,
}

#[derive(Serialize)]
struct LinkStatsOutput {
    peer: Ipv4Addr,
    #[serde(flatten)]
    stats: LinkStatsSnapshot,
}

#[derive(Serialize)]
struct StatsOutput {
    links: Vec<LinkStatsOutput>,
    undelivered: u64,
}

/// Print one decoded datagram.
pub fn print_datagram(index: usize, datagram: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&DatagramOutput {
            index,
            size: datagram.len(),
            payload: payload_preview(datagram),
            hex: hex::encode(datagram),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    index.to_string(),
                    datagram.len().to_string(),
                    payload_preview(datagram),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "#{index} size={} payload={}",
                datagram.len(),
                payload_preview(datagram)
            );
        }
        OutputFormat::Raw => print_raw(datagram),
        OutputFormat::Hex => println!("{}", hex::encode(datagram)),
    }
}

/// Print the wire form of an encoded payload.
pub fn print_encoded(payload_len: usize, frame: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            payload_size: payload_len,
            frame_size: frame.len(),
            frame: hex::encode(frame),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PAYLOAD", "FRAME", "WIRE"])
                .add_row(vec![
                    payload_len.to_string(),
                    frame.len().to_string(),
                    hex::encode(frame),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "payload={payload_len} frame={} wire={}",
                frame.len(),
                hex::encode(frame)
            );
        }
        OutputFormat::Raw => print_raw(frame),
        OutputFormat::Hex => println!("{}", hex::encode(frame)),
    }
}

/// Print per-link counters. Byte-oriented formats send them to stderr so
/// stdout keeps only datagram bytes.
pub fn print_stats(
    stats: &[(Ipv4Addr, LinkStatsSnapshot)],
    undelivered: u64,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&StatsOutput {
            links: stats
                .iter()
                .map(|(peer, stats)| LinkStatsOutput {
                    peer: *peer,
                    stats: *stats,
                })
                .collect(),
            undelivered,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "PEER", "SENT", "BYTES OUT", "RECEIVED", "BYTES IN", "DROPPED", "FAILED",
                ]);
            for (peer, s) in stats {
                table.add_row(vec![
                    peer.to_string(),
                    s.frames_sent.to_string(),
                    s.bytes_sent.to_string(),
                    s.frames_received.to_string(),
                    s.bytes_received.to_string(),
                    s.frames_dropped.to_string(),
                    s.handler_failures.to_string(),
                ]);
            }
            println!("{table}");
            if undelivered > 0 {
                println!("undelivered: {undelivered}");
            }
        }
        OutputFormat::Pretty => {
            for line in stats_lines(stats) {
                println!("{line}");
            }
        }
        OutputFormat::Raw | OutputFormat::Hex => {
            for line in stats_lines(stats) {
                eprintln!("{line}");
            }
        }
    }
}

fn stats_lines(stats: &[(Ipv4Addr, LinkStatsSnapshot)]) -> Vec<String> {
    stats
        .iter()
        .map(|(peer, s)| {
            format!(
                "peer={peer} sent={} bytes_out={} received={} bytes_in={} dropped={} failed={}",
                s.frames_sent,
                s.bytes_sent,
                s.frames_received,
                s.bytes_received,
                s.frames_dropped,
                s.handler_failures
            )
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

/// Parse hex text. Whitespace, `:` and `-` between digits are ignored, as is
/// a leading `0x`.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, String> {
    let text = text.trim();
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);

    let digits: String = text
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != ':' && *c != '-')
        .collect();
    hex::decode(&digits).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parses_with_separators() {
        assert_eq!(parse_hex("c0 68 69 c0\n").unwrap(), vec![0xC0, b'h', b'i', 0xC0]);
        assert_eq!(parse_hex("0xDB:DC").unwrap(), vec![0xDB, 0xDC]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn hex_rejects_bad_input() {
        assert!(parse_hex("c").is_err());
        assert!(parse_hex("zz").is_err());
        assert!(parse_hex("c0 0").is_err());
    }

    #[test]
    fn preview_marks_binary() {
        assert_eq!(payload_preview(b"hi"), "hi");
        assert_eq!(payload_preview(&[0xFF, 0xFE]), "<binary 2 bytes>");
    }

    #[test]
    fn stats_json_flattens_counters() {
        let out = StatsOutput {
            links: vec![LinkStatsOutput {
                peer: Ipv4Addr::new(10, 0, 0, 2),
                stats: LinkStatsSnapshot {
                    frames_sent: 3,
                    ..LinkStatsSnapshot::default()
                },
            }],
            undelivered: 0,
        };
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["links"][0]["peer"], "10.0.0.2");
        assert_eq!(value["links"][0]["frames_sent"], 3);
    }
}
