/// Consensus configuration parameters.
///
/// This includes both protocol-level knobs (difficulty retarget, block
/// reward schedule) and implementation-level limits (maximum block size).
/// Every node on a network must agree on these values; they feed the
/// genesis block and all validity checks.
#[derive(Clone, Debug)]
pub struct ConsensusConfig {
    /// Difficulty score assigned to the genesis block and used until the
    /// retarget window has enough data.
    pub initial_difficulty: f64,
    /// Number of trailing ancestor blocks the retarget function looks at.
    pub difficulty_window: usize,
    /// Target spacing between blocks, in milliseconds.
    pub target_block_millis: u64,
    /// Hard limit on the serialized size of a block, in bytes.
    pub max_block_size_bytes: usize,
    /// Estimated serialized size of an empty block, used as the starting
    /// point when the assembler sums candidate transaction sizes.
    pub base_block_size: usize,
    /// Fixed per-transaction overhead added to each candidate's encoded
    /// length during assembly.
    pub tx_size_overhead: usize,
    /// Block subsidy at height zero.
    pub initial_subsidy: u64,
    /// Number of blocks between subsidy halvings.
    pub halving_interval: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: 16.0,
            difficulty_window: 12,
            target_block_millis: 10_000,
            max_block_size_bytes: 1_000_000,
            base_block_size: 350,
            tx_size_overhead: 50,
            initial_subsidy: 1_000_000,
            halving_interval: 100_000,
        }
    }
}

impl ConsensusConfig {
    /// Block subsidy at the given height.
    ///
    /// The subsidy halves every `halving_interval` blocks and reaches zero
    /// once shifted past 63 halvings.
    pub fn subsidy(&self, height: u64) -> u64 {
        let halvings = height / self.halving_interval;
        if halvings >= 64 {
            return 0;
        }
        self.initial_subsidy >> halvings
    }
}
