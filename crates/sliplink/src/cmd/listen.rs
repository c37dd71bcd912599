use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use sliplink_link::{LinkLayer, LinkLayerConfig};
use tracing::info;

use crate::cmd::ListenArgs;
use crate::exit::{link_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_datagram, print_stats, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    if args.queue == 0 {
        return Err(CliError::new(USAGE, "--queue must be greater than zero"));
    }

    let config = LinkLayerConfig::from_file(&args.config.config)
        .map_err(|err| link_error("config", err))?;
    if config.links.is_empty() {
        return Err(CliError::usage("configuration has no links"));
    }

    let transports = config
        .open()
        .map_err(|err| link_error("failed opening links", err))?;
    let (layer, rx) = LinkLayer::channel(transports, config.frame_config(), args.queue)
        .map_err(|err| link_error("link setup failed", err))?;
    info!(peers = ?layer.peers(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(datagram) => {
                print_datagram(printed, &datagram, format);
                printed = printed.saturating_add(1);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if !args.no_stats {
        print_stats(&layer.stats(), layer.undelivered(), format);
    }
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
