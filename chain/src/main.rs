// chain/src/main.rs

//! Node binary.
//!
//! Wires up the chain library with default configuration:
//!
//! - in-memory block/UTXO state seeded from the fixed genesis block
//! - peer listener + gossip on the configured port
//! - local proof-of-work miner
//! - Prometheus metrics exporter on /metrics
//!
//! Runs until interrupted, then stops the miner cleanly.

use chain::{Node, NodeConfig};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chain=info".to_string()),
        )
        .init();

    if let Err(err) = run_node().await {
        eprintln!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    // For now, just use defaults. Later you can load from a file/CLI/env.
    let cfg = NodeConfig::default();

    let node = Node::start(cfg).await?;
    tracing::info!(addr = %node.local_addr(), "node up");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for shutdown signal: {e}"))?;

    tracing::info!("shutting down");
    node.shutdown().await;
    Ok(())
}
