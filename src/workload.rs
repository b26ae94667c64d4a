//! Random per-peer workloads of angles in degrees.

use crate::config::WorkloadConfig;
use crate::types::Rank;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Generate one peer's local batch.
///
/// The batch holds a uniform number of items in `[0, max_items)`, each
/// uniform in `[0, max_value]`. With a configured seed the batch depends
/// only on `seed + rank`; otherwise it is seeded from the clock and the rank
/// so peers started together still differ.
pub fn generate(rank: Rank, config: &WorkloadConfig) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(seed_for(rank, config));
    let count = rng.gen_range(0..config.max_items.max(1));
    (0..count)
        .map(|_| rng.gen_range(0..=config.max_value.max(0)))
        .collect()
}

fn seed_for(rank: Rank, config: &WorkloadConfig) -> u64 {
    let base = config.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default()
    });
    base.wrapping_add(rank as u64)
}
