//! Core types used throughout the protocol.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Index of a peer within the group, in `[0, size)`.
pub type Rank = usize;

/// Conventional coordinator rank.
pub const DEFAULT_COORDINATOR: Rank = 0;

/// An element that can travel through the collective exchanges.
pub trait Item: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Item for T where T: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// The collective operations the protocol is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectiveOp {
    /// Fixed-size gather of one scalar per peer.
    CollectScalar,
    /// Variable-length gather into a coordinator buffer.
    CollectVariable,
    /// Fixed-size scatter of one scalar per peer.
    BroadcastScalar,
    /// Variable-length scatter out of a coordinator buffer.
    DistributeVariable,
    /// Full-group synchronization point.
    Barrier,
}

impl CollectiveOp {
    /// All operations, in declaration order.
    pub const ALL: [CollectiveOp; 5] = [
        CollectiveOp::CollectScalar,
        CollectiveOp::CollectVariable,
        CollectiveOp::BroadcastScalar,
        CollectiveOp::DistributeVariable,
        CollectiveOp::Barrier,
    ];

    /// Stable snake_case name, used for logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectiveOp::CollectScalar => "collect_scalar",
            CollectiveOp::CollectVariable => "collect_variable",
            CollectiveOp::BroadcastScalar => "broadcast_scalar",
            CollectiveOp::DistributeVariable => "distribute_variable",
            CollectiveOp::Barrier => "barrier",
        }
    }
}

impl fmt::Display for CollectiveOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a completed round trip on one peer.
#[derive(Debug, Clone)]
pub struct RoundOutcome<O> {
    /// This peer's rank.
    pub rank: Rank,
    /// Results for this peer's original items, in input order.
    pub results: Vec<O>,
    /// Number of items this peer transformed after rebalancing.
    pub processed: usize,
    /// Total items across the group. Only known at the coordinator.
    pub total_items: Option<usize>,
    /// Wall time spent in each phase, in execution order.
    pub phase_timings: Vec<(&'static str, Duration)>,
}

impl<O> RoundOutcome<O> {
    /// Total wall time across all phases.
    pub fn elapsed(&self) -> Duration {
        self.phase_timings.iter().map(|(_, d)| *d).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collective_op_names_unique() {
        let mut names: Vec<_> = CollectiveOp::ALL.iter().map(|op| op.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CollectiveOp::ALL.len());
    }

    #[test]
    fn test_outcome_elapsed() {
        let outcome = RoundOutcome::<f32> {
            rank: 0,
            results: Vec::new(),
            processed: 0,
            total_items: Some(0),
            phase_timings: vec![
                ("collect_counts", Duration::from_millis(2)),
                ("consolidate", Duration::from_millis(3)),
            ],
        };
        assert_eq!(outcome.elapsed(), Duration::from_millis(5));
    }
}
