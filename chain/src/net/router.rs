//! The message router.
//!
//! One task consumes `(envelope, origin)` pairs from an unbounded queue fed
//! by every connection reader and by the miner's self-apply. That single
//! consumer is the only writer of committed executor state, so tentative
//! execution elsewhere (always on snapshots) can never interleave with a
//! commit on the same output.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::consensus::BlockOutcome;
use crate::mempool::Mempool;
use crate::metrics::MetricsRegistry;
use crate::miner::Miner;
use crate::types::{Block, BlockId, Transaction};
use crate::SharedExecutor;

use super::connection::{ConnectionManager, RouterInput};
use super::wire::{Envelope, Hello, InventoryKind, InventoryMessage};

/// Dispatches decoded envelopes to the executor, mempool, and miner.
pub struct MessageRouter {
    executor: SharedExecutor,
    mempool: Arc<Mutex<Mempool>>,
    connections: ConnectionManager,
    miner: Arc<Miner>,
    metrics: Arc<MetricsRegistry>,
}

impl MessageRouter {
    pub fn new(
        executor: SharedExecutor,
        mempool: Arc<Mutex<Mempool>>,
        connections: ConnectionManager,
        miner: Arc<Miner>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            executor,
            mempool,
            connections,
            miner,
            metrics,
        }
    }

    /// Spawns the router task over its input queue.
    pub fn spawn(self, mut inputs: mpsc::UnboundedReceiver<RouterInput>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(input) = inputs.recv().await {
                self.handle_message(input.envelope, input.origin).await;
            }
            tracing::info!("message router stopped");
        })
    }

    /// Dispatch by envelope type. `origin` is the peer the message was
    /// learned from, `None` for locally-produced messages.
    pub async fn handle_message(&self, envelope: Envelope, origin: Option<std::net::SocketAddr>) {
        match envelope {
            Envelope::Hello(hello) => self.handle_hello(hello, origin).await,
            Envelope::Inventory(msg) => match (msg.kind, msg.is_block) {
                (InventoryKind::Content, true) => self.handle_block_content(msg, origin).await,
                (InventoryKind::Content, false) => {
                    self.handle_transaction_content(msg, origin).await
                }
                (InventoryKind::Announce, _) => self.handle_announce(msg).await,
            },
        }
    }

    async fn handle_hello(&self, hello: Hello, origin: Option<std::net::SocketAddr>) {
        let (local_genesis, local_ids) = {
            let executor = self.executor.lock().await;
            (executor.genesis_id(), executor.known_block_ids())
        };

        // A different genesis means a different network; there is nothing
        // to gossip with this peer.
        if hello.genesis_id != local_genesis {
            tracing::warn!(
                remote = %hello.genesis_id.0.short_hex(),
                local = %local_genesis.0.short_hex(),
                "peer announced a foreign genesis, dropping"
            );
            if let Some(addr) = origin {
                self.connections.drop_peer(addr).await;
            }
            return;
        }

        self.connections.add_candidates(hello.peers).await;

        // Sync trigger: the remote holds blocks we do not. The backfill
        // protocol itself is driven elsewhere; this only raises the flag.
        let local: HashSet<BlockId> = local_ids.into_iter().collect();
        let missing = hello
            .known_block_ids
            .iter()
            .filter(|id| !local.contains(id))
            .count();
        if missing > 0 {
            tracing::info!(?origin, missing, "peer holds unknown blocks, sync warranted");
        }
    }

    async fn handle_announce(&self, msg: InventoryMessage) {
        // Announce-only inventory: note unknown ids; requesting content is
        // part of the sync protocol, which ends at this trigger.
        let known = if msg.is_block {
            self.mempool.lock().await.is_block_known(&BlockId(msg.id))
        } else {
            let pool = self.mempool.lock().await;
            pool.contains(&crate::types::TxId(msg.id))
        };
        if !known {
            tracing::debug!(
                id = %msg.id.short_hex(),
                is_block = msg.is_block,
                "announced object unknown, content request warranted"
            );
        }
    }

    async fn handle_block_content(
        &self,
        msg: InventoryMessage,
        origin: Option<std::net::SocketAddr>,
    ) {
        let Some(block) = Block::decode(&msg.payload) else {
            tracing::debug!(?origin, "dropping undecodable block payload");
            return;
        };
        let id = block.compute_id();
        if id.0 != msg.id {
            tracing::debug!(?origin, "dropping block whose id does not match its bytes");
            return;
        }

        // Gossip dedup: a re-delivered block is a no-op and is not
        // re-relayed.
        if !self.mempool.lock().await.mark_block_known(id) {
            return;
        }

        let outcome = {
            let mut executor = self.executor.lock().await;
            executor.accept_block(block.clone())
        };

        match outcome {
            Ok(BlockOutcome::TipAdvanced { height, reorg, .. }) => {
                self.metrics.node.blocks_applied_total.inc();
                tracing::info!(
                    block = %id.0.short_hex(),
                    height,
                    reorg,
                    "block applied"
                );
                // Confirmed transactions leave the pool.
                self.mempool.lock().await.remove(&block.transaction_ids);
                self.relay(&msg, origin).await;
                // Tip changed: re-arm mining against it.
                self.miner.restart().await;
            }
            Ok(BlockOutcome::SideBranch { height, .. }) => {
                tracing::debug!(block = %id.0.short_hex(), height, "side-branch block stored");
                self.relay(&msg, origin).await;
            }
            Ok(BlockOutcome::HeldOrphan { .. }) => {
                tracing::info!(
                    block = %id.0.short_hex(),
                    ?origin,
                    "block held pending missing ancestry, sync warranted"
                );
            }
            Ok(BlockOutcome::AlreadyKnown { .. }) => {}
            Err(e) => {
                self.metrics.node.invalid_blocks_total.inc();
                tracing::warn!(block = %id.0.short_hex(), error = %e, "rejecting block");
            }
        }
    }

    async fn handle_transaction_content(
        &self,
        msg: InventoryMessage,
        origin: Option<std::net::SocketAddr>,
    ) {
        let Some(tx) = Transaction::decode(&msg.payload) else {
            tracing::debug!(?origin, "dropping undecodable transaction payload");
            return;
        };
        let id = tx.compute_id();
        if id.0 != msg.id {
            tracing::debug!(?origin, "dropping transaction whose id does not match its bytes");
            return;
        }

        if self.mempool.lock().await.contains(&id) {
            return;
        }

        let result = {
            let executor = self.executor.lock().await;
            executor.validate_transaction(&tx, id)
        };

        match result {
            Ok(info) => {
                tracing::debug!(tx = %id.0.short_hex(), fee = info.fee, "transaction pooled");
                self.mempool.lock().await.add(id, tx, msg.payload.clone());
                self.metrics.node.transactions_pooled_total.inc();
                self.relay(&msg, origin).await;
            }
            Err(e) => {
                // Untrusted gossip routinely carries stale entries; drop
                // without penalty.
                tracing::debug!(tx = %id.0.short_hex(), error = %e, "dropping gossiped transaction");
            }
        }
    }

    /// Forwards an inventory message to every peer except the one it was
    /// learned from. Locally-produced blocks were already broadcast by the
    /// miner, so a `None` origin is not re-sent.
    async fn relay(&self, msg: &InventoryMessage, origin: Option<std::net::SocketAddr>) {
        if msg.is_block && origin.is_none() {
            return;
        }
        self.connections
            .broadcast_except(&Envelope::Inventory(msg.clone()), origin)
            .await;
    }
}
