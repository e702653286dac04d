//! Fork-choice rule for selecting the canonical chain.

use super::store::StoredBlock;

/// Abstraction over fork-choice rules.
///
/// Given the currently canonical tip and a stored candidate, a fork-choice
/// implementation decides whether the candidate's chain should become
/// canonical. Implementations must be pure so that all nodes converge.
pub trait ForkChoice {
    /// Returns `true` if `candidate`'s chain should replace the tip's.
    fn prefers(&self, tip: &StoredBlock, candidate: &StoredBlock) -> bool;
}

/// Cumulative-difficulty fork choice.
///
/// Among competing chains the canonical one is the chain whose blocks sum
/// to the greatest total difficulty, not merely the tallest one. Ties keep
/// the current tip, so a node never reorgs without strict improvement.
#[derive(Clone, Copy, Debug, Default)]
pub struct CumulativeDifficultyForkChoice;

impl ForkChoice for CumulativeDifficultyForkChoice {
    fn prefers(&self, tip: &StoredBlock, candidate: &StoredBlock) -> bool {
        candidate.total_difficulty > tip.total_difficulty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Block, BlockHeader, BlockId, Hash256, HASH_LEN};

    fn stored(height: u64, total_difficulty: f64) -> StoredBlock {
        StoredBlock {
            block: Block {
                header: BlockHeader {
                    previous_hash: BlockId(Hash256([0; HASH_LEN])),
                    difficulty: 1.0,
                    nonce: 0,
                    timestamp: 0,
                    tx_root: Hash256([0; HASH_LEN]),
                },
                transaction_ids: Vec::new(),
                transactions: Vec::new(),
            },
            height,
            total_difficulty,
        }
    }

    #[test]
    fn heavier_chain_wins_even_when_shorter() {
        let rule = CumulativeDifficultyForkChoice;
        let tip = stored(10, 100.0);
        let shorter_but_heavier = stored(8, 120.0);
        let taller_but_lighter = stored(12, 90.0);

        assert!(rule.prefers(&tip, &shorter_but_heavier));
        assert!(!rule.prefers(&tip, &taller_but_lighter));
    }

    #[test]
    fn ties_keep_the_current_tip() {
        let rule = CumulativeDifficultyForkChoice;
        let tip = stored(5, 50.0);
        let rival = stored(5, 50.0);
        assert!(!rule.prefers(&tip, &rival));
    }
}
