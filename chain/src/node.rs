//! Node composition.
//!
//! [`Node::start`] wires the executor, mempool, connection layer, router,
//! and miner together and brings the background tasks up: the accept loop,
//! the router's single-consumer queue, the metrics exporter, and (when
//! enabled) the first mining round. Background task bodies log their own
//! failures at the task boundary; a failing task never takes the rest of
//! the node down with it.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::config::NodeConfig;
use crate::genesis::genesis_block;
use crate::mempool::Mempool;
use crate::metrics::{MetricsRegistry, run_prometheus_http_server};
use crate::miner::Miner;
use crate::net::{ConnectionManager, MessageRouter};
use crate::{DefaultChainExecutor, SharedExecutor};

/// A running peer.
pub struct Node {
    executor: SharedExecutor,
    mempool: Arc<Mutex<Mempool>>,
    connections: ConnectionManager,
    miner: Arc<Miner>,
    metrics: Arc<MetricsRegistry>,
    local_addr: std::net::SocketAddr,
}

impl Node {
    /// Builds and starts a node.
    ///
    /// A listener bind failure is fatal and surfaces here; everything
    /// after that point runs as supervised background tasks.
    pub async fn start(cfg: NodeConfig) -> Result<Node, String> {
        // ---------------------------
        // Metrics registry + exporter
        // ---------------------------

        let metrics = Arc::new(
            MetricsRegistry::new()
                .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
        );

        if cfg.metrics.enabled {
            let metrics_clone = metrics.clone();
            let addr = cfg.metrics.listen_addr;
            tokio::spawn(async move {
                if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                    tracing::warn!(error = %e, "metrics HTTP server error");
                }
            });
            tracing::info!("metrics exporter listening on http://{}/metrics", addr);
        }

        // ---------------------------
        // Executor + mempool
        // ---------------------------

        let genesis = genesis_block(&cfg.consensus);
        tracing::info!(
            genesis = %genesis.compute_id().0.short_hex(),
            "initialising chain"
        );
        let executor = DefaultChainExecutor::with_defaults(cfg.consensus.clone())
            .map_err(|e| format!("failed to initialise chain state: {e}"))?;
        let executor: SharedExecutor = Arc::new(Mutex::new(executor));
        let mempool = Arc::new(Mutex::new(Mempool::new()));

        // ---------------------------
        // Connection layer
        // ---------------------------

        let (router_tx, router_rx) = mpsc::unbounded_channel();
        let connections =
            ConnectionManager::new(executor.clone(), router_tx.clone(), metrics.clone());
        let local_addr = connections
            .start(cfg.network.listen_addr)
            .await
            .map_err(|e| format!("failed to bind peer listener: {e}"))?;

        // ---------------------------
        // Miner + router
        // ---------------------------

        let miner = Arc::new(Miner::new(
            executor.clone(),
            mempool.clone(),
            connections.clone(),
            router_tx,
            cfg.miner.recipient,
            metrics.clone(),
        ));

        let _router_task = MessageRouter::new(
            executor.clone(),
            mempool.clone(),
            connections.clone(),
            miner.clone(),
            metrics.clone(),
        )
        .spawn(router_rx);

        // ---------------------------
        // Bootstrap + first round
        // ---------------------------

        for peer in &cfg.network.bootstrap_peers {
            connections.connect(*peer);
        }

        if cfg.miner.enabled {
            miner.start().await;
        }

        Ok(Node {
            executor,
            mempool,
            connections,
            miner,
            metrics,
            local_addr,
        })
    }

    /// The address the peer listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Shared handle to the chain executor.
    pub fn executor(&self) -> &SharedExecutor {
        &self.executor
    }

    /// Shared handle to the mempool.
    pub fn mempool(&self) -> &Arc<Mutex<Mempool>> {
        &self.mempool
    }

    /// Handle to the connection layer.
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Handle to the miner.
    pub fn miner(&self) -> &Arc<Miner> {
        &self.miner
    }

    /// The node's metrics registry.
    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Stops mining and waits for the in-flight round to exit.
    ///
    /// Socket tasks wind down with the process; only the miner needs an
    /// explicit join so a search is never abandoned mid-cancellation.
    pub async fn shutdown(&self) {
        self.miner.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MetricsConfig, MinerConfig, NetworkConfig};
    use crate::consensus::ConsensusConfig;
    use std::time::Duration;

    fn quiet_config() -> NodeConfig {
        NodeConfig {
            consensus: ConsensusConfig {
                initial_difficulty: 1.0,
                initial_subsidy: 1_000,
                ..ConsensusConfig::default()
            },
            network: NetworkConfig {
                listen_addr: "127.0.0.1:0".parse().expect("addr literal"),
                bootstrap_peers: Vec::new(),
            },
            miner: MinerConfig {
                enabled: false,
                ..MinerConfig::default()
            },
            metrics: MetricsConfig {
                enabled: false,
                ..MetricsConfig::default()
            },
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn two_nodes_connect_and_exchange_hellos() {
        let a = Node::start(quiet_config()).await.expect("node a");

        let mut cfg = quiet_config();
        cfg.network.bootstrap_peers = vec![a.local_addr()];
        let b = Node::start(cfg).await.expect("node b");

        // Wait for the dial + handshake to settle.
        for _ in 0..50 {
            if a.connections().peer_count().await == 1 && b.connections().peer_count().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(a.connections().peer_count().await, 1);
        assert_eq!(b.connections().peer_count().await, 1);

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn mined_blocks_propagate_between_nodes() {
        // Node A mines at a trivial difficulty; node B only listens.
        let a = Node::start(quiet_config()).await.expect("node a");

        let mut cfg = quiet_config();
        cfg.network.bootstrap_peers = vec![a.local_addr()];
        let b = Node::start(cfg).await.expect("node b");

        // Only start mining once the link is up, so B hears every block
        // from height 1 on instead of holding orphans.
        for _ in 0..50 {
            if a.connections().peer_count().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(a.connections().peer_count().await, 1);
        a.miner().start().await;

        // A's self-applied blocks must also reach B over gossip.
        let mut b_height = 0;
        for _ in 0..100 {
            b_height = b.executor().lock().await.latest_block().height;
            if b_height >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(b_height >= 1, "node B never saw a mined block");

        // Both nodes agree the accepted blocks satisfy the PoW rule; spot
        // check B's tip.
        let b_executor = b.executor().lock().await;
        let tip = b_executor.latest_block();
        assert!(
            tip.block.compute_id().difficulty_score() > tip.block.header.difficulty
        );
        drop(b_executor);

        a.shutdown().await;
        b.shutdown().await;
    }
}
