#![forbid(unsafe_code)]
//! PowLedger node: serves the ledger over HTTP and resolves conflicts with peers.

use clap::Parser;
use powledger::config::{load_config, DEFAULT_CONFIG_PATH};
use powledger::node::Node;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "powledger-node", version, about = "Run a PowLedger node")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Address to bind the HTTP API to (overrides node.bind_address)
    #[arg(short, long)]
    bind: Option<String>,

    /// Peer endpoint to register at startup; may be repeated
    #[arg(short, long = "peer")]
    peers: Vec<String>,

    /// Seconds between background conflict resolutions (0 disables)
    #[arg(long)]
    resolve_interval: Option<u64>,

    /// Fixed node identifier instead of a random one
    #[arg(long)]
    identifier: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.node.bind_address = bind;
    }
    if let Some(interval) = cli.resolve_interval {
        config.consensus.resolve_interval_secs = interval;
    }
    if let Some(identifier) = cli.identifier {
        config.node.identifier = Some(identifier);
    }
    config.network.bootstrap_peers.extend(cli.peers);
    config.validate()?;

    let node = Arc::new(Node::new(config)?);
    node.start().await
}
