#![forbid(unsafe_code)]
//! ProofChain node: serves the ledger over HTTP.

use clap::Parser;
use colored::*;
use proofchain::api::run_api_server;
use proofchain::config::{load_config, DEFAULT_CONFIG_PATH};
use proofchain::node::Node;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "proofchain-node", about = "Run a ProofChain ledger node")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Port to listen on (overrides network.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Peer to register at startup; may be repeated
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(port) = args.port {
        config.network.port = port;
    }
    config.network.bootstrap_peers.extend(args.peers);
    config.validate()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let node = Arc::new(Node::from_config(&config)?);
    let addr: SocketAddr = format!("{}:{}", config.network.host, config.network.port).parse()?;

    println!("{}", "ProofChain node".bright_cyan().bold());
    println!("  {} {}", "identifier:".bright_green(), node.identifier());
    println!("  {} http://{}", "listening:".bright_green(), addr);
    println!("  {} {}", "peers:".bright_green(), node.peers().await.len());

    run_api_server(node, addr).await?;
    Ok(())
}
