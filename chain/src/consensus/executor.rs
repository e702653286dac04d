//! The chain executor: sole authority over ledger truth.
//!
//! The executor owns the block graph and the committed UTXO state. It
//! validates incoming blocks end to end (structure, proof of work, declared
//! difficulty, full transaction re-execution), applies them, and selects the
//! canonical tip by cumulative difficulty. Blocks whose parent is unknown
//! are held aside pending sync rather than rejected.
//!
//! This struct is generic over:
//!
//! - `S`: storage backend implementing [`BlockStore`],
//! - `O`: ownership-proof verifier implementing [`OwnershipVerifier`],
//! - `F`: fork-choice rule implementing [`ForkChoice`].

use std::collections::HashMap;

use crate::ownership::OwnershipVerifier;
use crate::types::{now_millis, Block, BlockId, Transaction, TxExecInfo, TxId};

use super::config::ConsensusConfig;
use super::difficulty;
use super::error::ConsensusError;
use super::fork_choice::ForkChoice;
use super::state::UtxoState;
use super::store::{BlockStore, StoredBlock};

/// What happened to a block handed to [`ChainExecutor::accept_block`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockOutcome {
    /// The block extended or reorganised the canonical chain and is the
    /// new tip.
    TipAdvanced { id: BlockId, height: u64, reorg: bool },
    /// The block was stored on a non-canonical branch.
    SideBranch { id: BlockId, height: u64 },
    /// The block's parent is unknown; it is held until the parent arrives.
    HeldOrphan { id: BlockId },
    /// The block was already known; nothing changed.
    AlreadyKnown { id: BlockId },
}

/// Fully-configurable chain executor.
pub struct ChainExecutor<S, O, F> {
    config: ConsensusConfig,
    store: S,
    ownership: O,
    fork_choice: F,
    utxo: UtxoState,
    genesis_id: BlockId,
    /// Blocks waiting for a missing parent, keyed by that parent's id.
    orphans: HashMap<BlockId, Vec<(BlockId, Block)>>,
}

impl<S, O, F> ChainExecutor<S, O, F>
where
    S: BlockStore,
    O: OwnershipVerifier,
    F: ForkChoice,
{
    /// Creates an executor over a store that already holds its chain.
    ///
    /// The canonical chain is replayed from genesis to the store's tip to
    /// rebuild the UTXO state, so a store seeded with only the genesis
    /// block yields a freshly-initialised ledger.
    pub fn new(
        config: ConsensusConfig,
        store: S,
        ownership: O,
        fork_choice: F,
    ) -> Result<Self, ConsensusError> {
        // Walk tip-to-genesis: the terminal block is the one whose parent
        // is not stored (genesis links to the all-zero id).
        let mut chain = Vec::new();
        let mut cur = store.tip();
        loop {
            let stored = store
                .get(&cur)
                .ok_or(ConsensusError::BrokenChain(cur))?;
            chain.push(cur);
            let parent = stored.block.header.previous_hash;
            if !store.contains(&parent) {
                break;
            }
            cur = parent;
        }
        let genesis_id = cur;

        let mut utxo = UtxoState::new();
        for id in chain.iter().rev() {
            // Present by construction: `chain` was just read from the store.
            let stored = store
                .get(id)
                .ok_or(ConsensusError::BrokenChain(*id))?;
            execute_block_transactions(&config, &ownership, &mut utxo, &stored.block, stored.height)?;
        }

        Ok(Self {
            config,
            store,
            ownership,
            fork_choice,
            utxo,
            genesis_id,
            orphans: HashMap::new(),
        })
    }

    /// Consensus parameters this executor was built with.
    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// The configured ownership-proof verifier.
    pub fn ownership(&self) -> &O {
        &self.ownership
    }

    /// Id of the genesis block anchoring this chain.
    pub fn genesis_id(&self) -> BlockId {
        self.genesis_id
    }

    /// Id of the current canonical tip.
    pub fn tip_id(&self) -> BlockId {
        self.store.tip()
    }

    /// The current canonical tip with its chain metadata.
    pub fn latest_block(&self) -> &StoredBlock {
        // Safe to expect: the tip id always refers to a stored block; the
        // store is constructed around genesis and the tip is only ever
        // reassigned to blocks just inserted.
        self.store
            .get(&self.store.tip())
            .expect("canonical tip should always be stored")
    }

    /// Snapshot of all block ids currently held, for the handshake.
    pub fn known_block_ids(&self) -> Vec<BlockId> {
        self.store.ids()
    }

    /// The committed UTXO state.
    pub fn utxo(&self) -> &UtxoState {
        &self.utxo
    }

    /// Clones the committed UTXO state for tentative execution.
    ///
    /// Block assembly and gossip pre-validation run against the snapshot,
    /// never against the committed map.
    pub fn utxo_snapshot(&self) -> UtxoState {
        self.utxo.clone()
    }

    /// Walks `previous_hash` links from `id` to genesis.
    ///
    /// The result is ordered tip-to-genesis, both ends inclusive, and its
    /// length equals the starting block's height plus one. Fails with
    /// [`ConsensusError::BrokenChain`] if a link is missing.
    pub fn ancestors(&self, id: &BlockId) -> Result<Vec<BlockId>, ConsensusError> {
        let mut chain = Vec::new();
        let mut cur = *id;
        loop {
            let stored = self
                .store
                .get(&cur)
                .ok_or(ConsensusError::BrokenChain(cur))?;
            chain.push(cur);
            if cur == self.genesis_id {
                return Ok(chain);
            }
            cur = stored.block.header.previous_hash;
        }
    }

    /// Difficulty target for a block built on top of `parent`.
    ///
    /// Pure function of the trailing retarget window ending at `parent`;
    /// see [`difficulty::next_difficulty`].
    pub fn next_difficulty_for(&self, parent: &BlockId) -> Result<f64, ConsensusError> {
        let window = self.retarget_window(parent)?;
        Ok(difficulty::next_difficulty(&self.config, &window))
    }

    fn retarget_window(&self, from: &BlockId) -> Result<Vec<(u64, f64)>, ConsensusError> {
        let mut window = Vec::with_capacity(self.config.difficulty_window);
        let mut cur = *from;
        loop {
            let stored = self
                .store
                .get(&cur)
                .ok_or(ConsensusError::BrokenChain(cur))?;
            window.push((stored.block.header.timestamp, stored.block.header.difficulty));
            if window.len() == self.config.difficulty_window || cur == self.genesis_id {
                return Ok(window);
            }
            cur = stored.block.header.previous_hash;
        }
    }

    /// Validates a gossiped transaction without committing anything.
    ///
    /// Runs the transaction against a snapshot of the committed UTXO state:
    /// ownership proofs and funds sufficiency are checked, the committed
    /// ledger is untouched. Coinbase transactions are only valid inside a
    /// block and are rejected here.
    pub fn validate_transaction(
        &self,
        tx: &Transaction,
        tx_id: TxId,
    ) -> Result<TxExecInfo, ConsensusError> {
        if tx.is_coinbase() {
            return Err(ConsensusError::InvalidTransaction(
                "coinbase transaction outside a block".to_string(),
            ));
        }
        let mut scratch = self.utxo.clone();
        scratch
            .run_transaction(&self.ownership, tx, tx_id, now_millis(), 0, None)
            .map_err(|e| ConsensusError::InvalidTransaction(e.to_string()))
    }

    /// Validates and applies a block.
    ///
    /// Structural checks (transaction root, proof of work, size) and the
    /// declared-difficulty check run first; blocks extending the canonical
    /// tip are then fully re-executed against a snapshot and committed.
    /// Blocks on side branches are stored after the structural checks and
    /// re-executed only when their branch wins fork choice, at which point
    /// the UTXO state is rebuilt along the new branch.
    pub fn accept_block(&mut self, block: Block) -> Result<BlockOutcome, ConsensusError> {
        let id = block.compute_id();
        if self.store.contains(&id) || self.is_held(&id) {
            return Ok(BlockOutcome::AlreadyKnown { id });
        }

        self.check_structure(&id, &block)?;

        let parent_id = block.header.previous_hash;
        if !self.store.contains(&parent_id) {
            tracing::debug!(
                block = %id.0.short_hex(),
                parent = %parent_id.0.short_hex(),
                "holding block with unknown parent"
            );
            self.orphans.entry(parent_id).or_default().push((id, block));
            return Ok(BlockOutcome::HeldOrphan { id });
        }

        let expected = self.next_difficulty_for(&parent_id)?;
        if (block.header.difficulty - expected).abs() > 1e-9 {
            return Err(ConsensusError::InvalidBlock(format!(
                "declared difficulty {} does not match retarget {expected}",
                block.header.difficulty
            )));
        }

        // Present: contains() above.
        let parent = self
            .store
            .get(&parent_id)
            .ok_or(ConsensusError::BrokenChain(parent_id))?;
        let height = parent.height + 1;
        let total_difficulty = parent.total_difficulty + block.header.difficulty;

        let tip_id = self.store.tip();
        let outcome = if parent_id == tip_id {
            // Extending the canonical chain: re-execute on a snapshot and
            // swap it in only if the whole block applies.
            let mut scratch = self.utxo.clone();
            execute_block_transactions(
                &self.config,
                &self.ownership,
                &mut scratch,
                &block,
                height,
            )?;
            self.utxo = scratch;
            self.store.insert(
                id,
                StoredBlock {
                    block,
                    height,
                    total_difficulty,
                },
            );
            self.store.set_tip(id);
            tracing::info!(
                block = %id.0.short_hex(),
                height,
                "chain extended"
            );
            BlockOutcome::TipAdvanced {
                id,
                height,
                reorg: false,
            }
        } else {
            let stored = StoredBlock {
                block,
                height,
                total_difficulty,
            };
            let tip = self
                .store
                .get(&tip_id)
                .ok_or(ConsensusError::BrokenChain(tip_id))?;
            let prefers = self.fork_choice.prefers(tip, &stored);

            self.store.insert(id, stored);
            if prefers {
                match self.rebuild_state_along(&id) {
                    Ok(state) => {
                        self.utxo = state;
                        self.store.set_tip(id);
                        tracing::info!(
                            block = %id.0.short_hex(),
                            height,
                            "reorganised to heavier branch"
                        );
                        BlockOutcome::TipAdvanced {
                            id,
                            height,
                            reorg: true,
                        }
                    }
                    Err(e) => {
                        // The heavier branch does not re-execute; abandon it
                        // and keep the current tip.
                        self.store.remove(&id);
                        return Err(e);
                    }
                }
            } else {
                tracing::debug!(
                    block = %id.0.short_hex(),
                    height,
                    "stored side-branch block"
                );
                BlockOutcome::SideBranch { id, height }
            }
        };

        self.adopt_orphans(id);
        Ok(outcome)
    }

    fn is_held(&self, id: &BlockId) -> bool {
        self.orphans
            .values()
            .any(|waiting| waiting.iter().any(|(held, _)| held == id))
    }

    /// Feeds any blocks that were waiting on `parent` back through
    /// [`accept_block`]. Cascades through grandchildren recursively.
    fn adopt_orphans(&mut self, parent: BlockId) {
        if let Some(waiting) = self.orphans.remove(&parent) {
            for (held_id, block) in waiting {
                match self.accept_block(block) {
                    Ok(_) => {
                        tracing::info!(block = %held_id.0.short_hex(), "adopted held block")
                    }
                    Err(e) => {
                        tracing::warn!(
                            block = %held_id.0.short_hex(),
                            error = %e,
                            "held block failed on adoption"
                        )
                    }
                }
            }
        }
    }

    /// Checks everything that needs no parent or ledger state.
    fn check_structure(&self, id: &BlockId, block: &Block) -> Result<(), ConsensusError> {
        if block.transaction_ids.len() != block.transactions.len() {
            return Err(ConsensusError::InvalidBlock(
                "transaction id and body counts differ".to_string(),
            ));
        }
        if block.header.tx_root != Block::compute_tx_root(&block.transaction_ids) {
            return Err(ConsensusError::InvalidBlock(
                "transaction root does not match transaction ids".to_string(),
            ));
        }
        if id.difficulty_score() <= block.header.difficulty {
            return Err(ConsensusError::InvalidBlock(format!(
                "proof of work score {} does not exceed target {}",
                id.difficulty_score(),
                block.header.difficulty
            )));
        }
        let size = block.canonical_bytes().len();
        if size > self.config.max_block_size_bytes {
            return Err(ConsensusError::InvalidBlock(format!(
                "block size {size} bytes exceeds limit {}",
                self.config.max_block_size_bytes
            )));
        }
        Ok(())
    }

    /// Rebuilds a fresh UTXO state by replaying the branch ending at
    /// `new_tip`, genesis first.
    fn rebuild_state_along(&self, new_tip: &BlockId) -> Result<UtxoState, ConsensusError> {
        let chain = self.ancestors(new_tip)?;
        let mut state = UtxoState::new();
        for id in chain.iter().rev() {
            let stored = self
                .store
                .get(id)
                .ok_or(ConsensusError::BrokenChain(*id))?;
            execute_block_transactions(
                &self.config,
                &self.ownership,
                &mut state,
                &stored.block,
                stored.height,
            )?;
        }
        Ok(state)
    }
}

/// Re-executes every transaction of `block` against `state`.
///
/// The block's first transaction must be its only coinbase. Non-coinbase
/// transactions run first, in order, accumulating fees; the coinbase is
/// checked last against `subsidy(height) + fees`. Any failure maps to
/// [`ConsensusError::InvalidBlock`] and leaves `state` in an intermediate
/// state, so callers operate on a scratch copy and discard it on error.
///
/// Returns the total fees collected.
fn execute_block_transactions<O: OwnershipVerifier>(
    config: &ConsensusConfig,
    ownership: &O,
    state: &mut UtxoState,
    block: &Block,
    height: u64,
) -> Result<u64, ConsensusError> {
    let mut parsed: Vec<(TxId, Transaction)> = Vec::with_capacity(block.transactions.len());
    for (raw, listed_id) in block.transactions.iter().zip(&block.transaction_ids) {
        let tx = Transaction::decode(raw).ok_or_else(|| {
            ConsensusError::InvalidBlock("undecodable transaction body".to_string())
        })?;
        let computed = tx.compute_id();
        if computed != *listed_id {
            return Err(ConsensusError::InvalidBlock(
                "transaction id does not match its canonical bytes".to_string(),
            ));
        }
        parsed.push((computed, tx));
    }

    let Some(((coinbase_id, coinbase), rest)) = parsed.split_first() else {
        return Err(ConsensusError::InvalidBlock(
            "block has no transactions".to_string(),
        ));
    };
    if !coinbase.is_coinbase() {
        return Err(ConsensusError::InvalidBlock(
            "first transaction is not a coinbase".to_string(),
        ));
    }
    if rest.iter().any(|(_, tx)| tx.is_coinbase()) {
        return Err(ConsensusError::InvalidBlock(
            "multiple coinbase transactions".to_string(),
        ));
    }

    let block_time = block.header.timestamp;
    let mut fees: u64 = 0;
    for (tx_id, tx) in rest {
        let info = state
            .run_transaction(ownership, tx, *tx_id, block_time, 0, None)
            .map_err(|e| ConsensusError::InvalidBlock(e.to_string()))?;
        fees = fees.saturating_add(info.fee);
    }

    let reward = config.subsidy(height).saturating_add(fees);
    state
        .run_transaction(ownership, coinbase, *coinbase_id, block_time, reward, None)
        .map_err(|e| ConsensusError::InvalidBlock(e.to_string()))?;

    Ok(fees)
}
