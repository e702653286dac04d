//! Chain library crate.
//!
//! This crate provides the core building blocks for a proof-of-work node
//! over a UTXO ledger:
//!
//! - strongly-typed domain types (`types`),
//! - a modular chain executor with cumulative-difficulty fork choice
//!   (`consensus`),
//! - a pending-transaction pool and gossip inventory (`mempool`),
//! - a cancellable proof-of-work miner and block assembler (`miner`),
//! - the peer connection layer and message router (`net`),
//! - the ownership-proof seam (`ownership`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).
//!
//! The `node` module composes these pieces into a runnable peer; the
//! binary in `main.rs` is a thin wrapper around it.

pub mod config;
pub mod consensus;
pub mod genesis;
pub mod mempool;
pub mod metrics;
pub mod miner;
pub mod net;
pub mod node;
pub mod ownership;
pub mod types;

// Re-export top-level configuration types.
pub use config::{MetricsConfig, MinerConfig, NetworkConfig, NodeConfig};

// Re-export "core" consensus types and traits.
pub use consensus::{
    BlockOutcome, BlockStore, ChainExecutor, ConsensusConfig, ConsensusError,
    CumulativeDifficultyForkChoice, ExecError, ForkChoice, InMemoryBlockStore, StoredBlock,
    UtxoState,
};

// Re-export the remaining building blocks at the crate root for convenience.
pub use genesis::genesis_block;
pub use mempool::Mempool;
pub use metrics::{MetricsRegistry, run_prometheus_http_server};
pub use miner::Miner;
pub use net::{ConnectionManager, Envelope, Hello, InventoryKind, InventoryMessage, MessageRouter};
pub use node::Node;
pub use ownership::{AcceptAllOwnership, OwnershipVerifier};
pub use types::*;

/// Type alias for the executor stack used by a "typical" node.
///
/// This composes the in-memory block store, the accept-all ownership
/// verifier stand-in, and the cumulative-difficulty fork choice.
pub type DefaultChainExecutor = ChainExecutor<
    InMemoryBlockStore,
    ownership::AcceptAllOwnership,
    CumulativeDifficultyForkChoice,
>;

/// The executor as shared by the router, miner, and connection layer.
///
/// The router task is the only committed-state writer; everyone else takes
/// snapshots through the lock.
pub type SharedExecutor = std::sync::Arc<tokio::sync::Mutex<DefaultChainExecutor>>;

impl DefaultChainExecutor {
    /// Builds the default executor stack around the genesis block for
    /// `config`.
    pub fn with_defaults(config: ConsensusConfig) -> Result<Self, ConsensusError> {
        let genesis = genesis_block(&config);
        let id = genesis.compute_id();
        let stored = StoredBlock {
            total_difficulty: genesis.header.difficulty,
            height: 0,
            block: genesis,
        };
        ChainExecutor::new(
            config,
            InMemoryBlockStore::with_genesis(id, stored),
            ownership::AcceptAllOwnership,
            CumulativeDifficultyForkChoice,
        )
    }
}
