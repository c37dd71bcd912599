//! Pseudo-terminal SLIP endpoint: prints every datagram that arrives on a
//! freshly allocated pty and answers each one with its reverse.
//!
//! Run with:
//!   cargo run --example pty-bridge
//!
//! Then point the CLI at the printed slave path, e.g. with a config of
//! `{"links": {"10.0.0.1": {"device": "/dev/pts/N"}}}`:
//!   cargo run --features cli -- send -c links.json --peer 10.0.0.1 --data hello

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::Ipv4Addr;

    use sliplink::link::LinkLayer;
    use sliplink::transport::Pty;

    let peer = Ipv4Addr::new(10, 0, 0, 1);
    let pty = Pty::open()?;
    eprintln!("SLIP endpoint on {}", pty.slave_path().display());

    // Keep a slave handle open so the master does not see EOF between clients.
    let _slave = pty.open_slave()?;

    let (layer, rx) = LinkLayer::channel([(peer, pty.into_transport()?)], Default::default(), 16)?;

    for datagram in rx {
        eprintln!("received {} bytes: {:?}", datagram.len(), datagram);
        let reply: Vec<u8> = datagram.iter().rev().copied().collect();
        layer.send(&reply, peer)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("pty-bridge requires a Unix pseudo-terminal");
}
