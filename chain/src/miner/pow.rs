//! The proof-of-work nonce search.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{now_millis, BlockHeader, BlockId};

/// A header whose id satisfies its difficulty target.
#[derive(Clone, Debug)]
pub struct MinedHeader {
    pub header: BlockHeader,
    pub id: BlockId,
}

/// Searches for a nonce that makes the header's id beat its target.
///
/// The nonce is seeded from a cryptographically random value and then
/// incremented. Each iteration stamps the nonce and the current wall-clock
/// time, recomputes the header digest, and accepts iff the digest's score
/// **strictly** exceeds `header.difficulty`.
///
/// The `mining` flag is polled once per iteration. `None` means the search
/// observed the flag cleared and exited: a normal termination, not a
/// failure. This function blocks the calling thread and belongs on a
/// blocking task.
pub fn search(mut header: BlockHeader, mining: &AtomicBool) -> Option<MinedHeader> {
    let mut nonce: u64 = rand::random();

    while mining.load(Ordering::Relaxed) {
        header.nonce = nonce;
        header.timestamp = now_millis();

        let id = header.compute_id();
        if id.difficulty_score() > header.difficulty {
            return Some(MinedHeader { header, id });
        }

        nonce = nonce.wrapping_add(1);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Hash256, HASH_LEN};

    fn header(difficulty: f64) -> BlockHeader {
        BlockHeader {
            previous_hash: BlockId(Hash256([1; HASH_LEN])),
            difficulty,
            nonce: 0,
            timestamp: 0,
            tx_root: Hash256([2; HASH_LEN]),
        }
    }

    #[test]
    fn cleared_flag_terminates_without_a_result() {
        let mining = AtomicBool::new(false);
        assert!(search(header(1.0), &mining).is_none());
    }

    #[test]
    fn low_target_search_finds_a_valid_header() {
        let mining = AtomicBool::new(true);
        let mined = search(header(1.0), &mining).expect("trivial target should be met quickly");

        assert!(mined.id.difficulty_score() > mined.header.difficulty);
        // The id matches the header it claims to be for.
        assert_eq!(mined.header.compute_id(), mined.id);
    }
}
