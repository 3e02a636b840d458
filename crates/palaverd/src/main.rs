use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;
use clap::Parser;
use palaver_net::server::{RelayServer, RelayServerConfig};

/// Multi-room chat relay: clients `/join` a room and `/msg` or `/file`
/// the other members. The server stores nothing; it forwards bytes.
#[derive(Parser)]
#[command(name = "palaverd")]
#[command(version)]
#[command(about = "Multi-room chat relay server")]
struct Cli {
    /// TCP port to listen on
    #[arg(default_value_t = 3490)]
    port: u16,

    /// Listen address
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Session slots; connections past this are refused
    #[arg(long, default_value_t = 1024)]
    max_sessions: usize,

    /// Per-session outbound queue depth
    #[arg(long, default_value_t = 64)]
    msg_cap: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let cfg = RelayServerConfig {
        msg_cap: cli.msg_cap,
        max_sessions: cli.max_sessions,
        ..Default::default()
    };

    let addr = SocketAddr::new(cli.bind, cli.port);
    log::info!("starting relay on {addr}");

    RelayServer::new(cfg)
        .serve_tcp(addr)
        .await
        .with_context(|| format!("serving on {addr}"))?;

    Ok(())
}
