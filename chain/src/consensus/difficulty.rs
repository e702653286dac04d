//! Difficulty retargeting.
//!
//! The next block's target difficulty is a pure function of a trailing
//! window of ancestor `(timestamp, difficulty)` pairs. Every node computes
//! the same value from the same chain data, so the declared difficulty of
//! an incoming block can be checked exactly.

use super::config::ConsensusConfig;

/// Lowest difficulty the retarget will ever produce.
pub const MIN_DIFFICULTY: f64 = 1.0;

/// Largest per-retarget adjustment, in score points.
const MAX_ADJUSTMENT: f64 = 1.0;

/// Computes the difficulty target for the block following the window.
///
/// `window` holds the `(timestamp_millis, difficulty)` pairs of the most
/// recent ancestors, newest first, at most `cfg.difficulty_window` entries.
/// With fewer than two entries there is no spacing to measure and the
/// newest difficulty (or the configured initial difficulty for an empty
/// window) is carried forward.
///
/// The adjustment is `log2(target_spacing / observed_spacing)` clamped to
/// one score point per retarget: blocks arriving twice as fast as the
/// target raise the score target by one point (halving the hit rate),
/// twice as slow lowers it by one.
pub fn next_difficulty(cfg: &ConsensusConfig, window: &[(u64, f64)]) -> f64 {
    let newest = match window.first() {
        Some(&(_, difficulty)) => difficulty,
        None => return cfg.initial_difficulty,
    };
    if window.len() < 2 {
        return newest;
    }

    let newest_ts = window[0].0;
    let oldest_ts = window[window.len() - 1].0;
    let spans = (window.len() - 1) as u64;

    // Clock skew can order timestamps backwards; floor the observed
    // spacing at one millisecond.
    let observed = (newest_ts.saturating_sub(oldest_ts) / spans).max(1);

    let adjustment = (cfg.target_block_millis as f64 / observed as f64)
        .log2()
        .clamp(-MAX_ADJUSTMENT, MAX_ADJUSTMENT);

    (newest + adjustment).max(MIN_DIFFICULTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ConsensusConfig {
        ConsensusConfig {
            initial_difficulty: 16.0,
            target_block_millis: 10_000,
            ..ConsensusConfig::default()
        }
    }

    /// Builds a newest-first window with a fixed spacing in milliseconds.
    fn window(spacing: u64, difficulty: f64, len: usize) -> Vec<(u64, f64)> {
        (0..len)
            .map(|i| (1_000_000_000 - (i as u64) * spacing, difficulty))
            .collect()
    }

    #[test]
    fn empty_window_uses_initial_difficulty() {
        assert_eq!(next_difficulty(&cfg(), &[]), 16.0);
    }

    #[test]
    fn single_entry_carries_difficulty_forward() {
        assert_eq!(next_difficulty(&cfg(), &[(123, 9.5)]), 9.5);
    }

    #[test]
    fn on_target_spacing_is_a_fixed_point() {
        let w = window(10_000, 12.0, 6);
        let next = next_difficulty(&cfg(), &w);
        assert!((next - 12.0).abs() < 1e-9);
    }

    #[test]
    fn fast_blocks_raise_difficulty() {
        let w = window(5_000, 12.0, 6);
        let next = next_difficulty(&cfg(), &w);
        assert!((next - 13.0).abs() < 1e-9);
    }

    #[test]
    fn slow_blocks_lower_difficulty() {
        let w = window(20_000, 12.0, 6);
        let next = next_difficulty(&cfg(), &w);
        assert!((next - 11.0).abs() < 1e-9);
    }

    #[test]
    fn adjustment_is_clamped_to_one_point() {
        let fast = window(1, 12.0, 6);
        assert!((next_difficulty(&cfg(), &fast) - 13.0).abs() < 1e-9);

        let slow = window(10_000_000, 12.0, 6);
        assert!((next_difficulty(&cfg(), &slow) - 11.0).abs() < 1e-9);
    }

    #[test]
    fn difficulty_never_drops_below_floor() {
        let slow = window(10_000_000, MIN_DIFFICULTY, 6);
        assert_eq!(next_difficulty(&cfg(), &slow), MIN_DIFFICULTY);
    }

    #[test]
    fn retarget_is_reproducible() {
        let w = window(7_321, 14.25, 12);
        assert_eq!(next_difficulty(&cfg(), &w), next_difficulty(&cfg(), &w));
    }
}
