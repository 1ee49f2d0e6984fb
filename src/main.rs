use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use peer_cluster::config::ClusterConfig;
use peer_cluster::manager::service::ClusterManager;
use peer_cluster::membership::types::Peer;
use peer_cluster::transport::client::TcpConnector;
use peer_cluster::transport::listener;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut name: Option<String> = None;
    let mut peer_ip: Option<IpAddr> = None;
    let mut peer_port: Option<u16> = None;
    let mut data_dir: Option<PathBuf> = None;
    let mut gossip_ms: Option<u64> = None;
    let mut fanout: Option<usize> = None;
    let mut joins: Vec<Peer> = vec![];

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--name" => {
                name = Some(args[i + 1].clone());
                i += 2;
            }
            "--ip" => {
                peer_ip = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--port" => {
                peer_port = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--data-dir" => {
                data_dir = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--gossip-ms" => {
                gossip_ms = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--fanout" => {
                fanout = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--join" => {
                joins.push(parse_peer(&args[i + 1])?);
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let Some(name) = name else {
        eprintln!(
            "Usage: {} --name <name> [--ip <addr>] [--port <port>] \
             [--data-dir <path>] [--gossip-ms <ms>] [--fanout <n>] \
             [--join <name@host:port>]...",
            args[0]
        );
        eprintln!("Example: {} --name alpha --port 9000", args[0]);
        eprintln!(
            "Example: {} --name bravo --port 9001 --join alpha@127.0.0.1:9000",
            args[0]
        );
        std::process::exit(1);
    };

    let mut config = ClusterConfig::named(name);
    if let Some(ip) = peer_ip {
        config.peer_ip = ip;
    }
    if let Some(port) = peer_port {
        config.peer_port = port;
    }
    config.data_dir = data_dir;
    if let Some(ms) = gossip_ms {
        config.gossip_interval = Duration::from_millis(ms);
    }
    if let Some(n) = fanout {
        config.fanout = n;
    }

    let bind = (config.peer_ip, config.peer_port);
    let peer_listener = TcpListener::bind(bind).await?;
    info!("Peer listener bound on {}:{}", bind.0, bind.1);

    let connector = TcpConnector::new(config.connect_timeout, config.session_capacity);
    let handle = ClusterManager::spawn(config, connector);
    tokio::spawn(listener::serve(peer_listener, handle.clone()));

    for peer in joins {
        handle.join(peer).await?;
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down; leaving the cluster");
    handle.leave().await?;

    Ok(())
}

/// Parses a `name@host:port` peer reference.
fn parse_peer(value: &str) -> anyhow::Result<Peer> {
    let (name, addr) = value
        .split_once('@')
        .ok_or_else(|| anyhow::anyhow!("expected name@host:port, got {value}"))?;
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("expected name@host:port, got {value}"))?;
    Ok(Peer::new(name, host.parse()?, port.parse()?))
}
