use std::net::Ipv4Addr;

use sliplink_link::{parse_peer, Endpoint, LinkError, LinkLayer, LinkLayerConfig};

use crate::cmd::SendArgs;
use crate::exit::{link_error, CliResult, SUCCESS};

pub fn run(args: SendArgs) -> CliResult<i32> {
    let config = LinkLayerConfig::from_file(&args.config.config)
        .map_err(|err| link_error("config", err))?;
    let payload = args.payload.read()?;

    let endpoint = endpoint_for(&config, args.peer).map_err(|err| link_error("send failed", err))?;
    let transport = endpoint
        .open()
        .map_err(|err| link_error(&format!("failed opening {endpoint}"), err))?;

    // Only the next hop's link is opened; other peers may be offline.
    let layer = LinkLayer::with_config([(args.peer, transport)], config.frame_config())
        .map_err(|err| link_error("link setup failed", err))?;
    layer
        .send(&payload, args.peer)
        .map_err(|err| link_error("send failed", err))?;

    tracing::info!(peer = %args.peer, %endpoint, len = payload.len(), "sent datagram");
    Ok(SUCCESS)
}

fn endpoint_for(config: &LinkLayerConfig, peer: Ipv4Addr) -> Result<&Endpoint, LinkError> {
    for (key, endpoint) in &config.links {
        if parse_peer(key)? == peer {
            return Ok(endpoint);
        }
    }
    Err(LinkError::UnknownPeer(peer))
}
