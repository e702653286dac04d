//! The proof-of-work miner.
//!
//! A [`Miner`] is an instance-owned controller: it holds its own
//! cancellation flag and task handle, with no process-wide state. One
//! mining round assembles a candidate from mempool and tip snapshots, runs
//! the blocking nonce search, and on success broadcasts the block to every
//! peer *and* feeds it through the local router, so this node's own state
//! converges the same way a remote peer's would.
//!
//! The round then ends; the router's tip-change handling calls
//! [`Miner::restart`], which re-arms the next round against the new tip.
//! The same restart path cancels an in-flight search when a better block
//! arrives from the network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::mempool::Mempool;
use crate::metrics::MetricsRegistry;
use crate::net::{ConnectionManager, Envelope, InventoryKind, InventoryMessage, RouterInput};
use crate::types::{now_millis, Address, Block};
use crate::SharedExecutor;

pub mod assemble;
pub mod pow;

pub use assemble::{build_candidate, Candidate};
pub use pow::{search, MinedHeader};

/// Cancellable mining controller.
///
/// `start` spawns one mining round; `stop` clears the flag and does not
/// return until the round has observed cancellation and exited; `restart`
/// is a no-op when not mining.
pub struct Miner {
    executor: SharedExecutor,
    mempool: Arc<Mutex<Mempool>>,
    connections: ConnectionManager,
    router: mpsc::UnboundedSender<RouterInput>,
    recipient: Address,
    metrics: Arc<MetricsRegistry>,
    mining: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Miner {
    pub fn new(
        executor: SharedExecutor,
        mempool: Arc<Mutex<Mempool>>,
        connections: ConnectionManager,
        router: mpsc::UnboundedSender<RouterInput>,
        recipient: Address,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            executor,
            mempool,
            connections,
            router,
            recipient,
            metrics,
            mining: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Whether the miner is active (between `start` and `stop`).
    pub fn is_mining(&self) -> bool {
        self.mining.load(Ordering::SeqCst)
    }

    /// Arms the miner and spawns one mining round. No-op if already armed.
    pub async fn start(&self) {
        if self.mining.swap(true, Ordering::SeqCst) {
            return;
        }

        let round = MiningRound {
            executor: self.executor.clone(),
            mempool: self.mempool.clone(),
            connections: self.connections.clone(),
            router: self.router.clone(),
            recipient: self.recipient,
            metrics: self.metrics.clone(),
            mining: self.mining.clone(),
        };
        let handle = tokio::spawn(async move { round.run().await });
        *self.task.lock().await = Some(handle);
    }

    /// Cancels mining and waits for the round to exit.
    ///
    /// The flag is cleared first; the nonce search polls it every
    /// iteration, so the join below completes promptly.
    pub async fn stop(&self) {
        self.mining.store(false, Ordering::SeqCst);
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "mining task failed");
            }
        }
    }

    /// Cancels an in-flight round and re-arms against the current tip.
    /// No-op when the miner is not active.
    pub async fn restart(&self) {
        if !self.is_mining() {
            return;
        }
        self.stop().await;
        self.start().await;
    }
}

/// Everything one mining round needs, detached from the controller so the
/// round can run as its own task.
struct MiningRound {
    executor: SharedExecutor,
    mempool: Arc<Mutex<Mempool>>,
    connections: ConnectionManager,
    router: mpsc::UnboundedSender<RouterInput>,
    recipient: Address,
    metrics: Arc<MetricsRegistry>,
    mining: Arc<AtomicBool>,
}

impl MiningRound {
    async fn run(self) {
        let started = Instant::now();

        // Snapshots first, locks released before the search starts. The
        // pool snapshot is filtered into the candidate; the live pool is
        // never iterated while mutable elsewhere.
        let pool = { self.mempool.lock().await.snapshot() };
        let candidate = {
            let executor = self.executor.lock().await;
            assemble::build_candidate(&executor, pool, self.recipient, now_millis())
        };
        let candidate = match candidate {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!(error = %e, "block assembly failed");
                return;
            }
        };

        let mining = self.mining.clone();
        let header = candidate.header.clone();
        let mined = match tokio::task::spawn_blocking(move || pow::search(header, &mining)).await {
            Ok(Some(mined)) => mined,
            Ok(None) => {
                tracing::debug!("mining round cancelled");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "nonce search task failed");
                return;
            }
        };

        self.metrics
            .node
            .mining_round_seconds
            .observe(started.elapsed().as_secs_f64());
        self.metrics.node.blocks_mined_total.inc();

        let block = Block {
            header: mined.header,
            transaction_ids: candidate.transaction_ids,
            transactions: candidate.transactions,
        };
        tracing::info!(
            block = %mined.id.0.short_hex(),
            txs = block.transaction_ids.len(),
            reward = candidate.reward,
            "block mined"
        );

        let envelope = Envelope::Inventory(InventoryMessage {
            kind: InventoryKind::Content,
            id: mined.id.0,
            is_block: true,
            payload: block.canonical_bytes(),
        });

        self.connections.broadcast(&envelope).await;
        // Local self-apply: the router treats it like any received block,
        // which also re-arms the next round once the tip advances.
        let _ = self.router.send(RouterInput {
            envelope,
            origin: None,
        });
    }
}
