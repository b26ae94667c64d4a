//! Partitioning module for laying out items across peers.
//!
//! Two layouts drive the round trip, both built the same way (counts plus the
//! exclusive prefix sum of the counts as offsets):
//!
//! - the **origin** layout, from the counts each peer reported, which says
//!   where each peer's items sit in the consolidated buffer;
//! - the **balanced** layout, from `(N, P)` alone, which hands every peer
//!   `N / P` items and the first `N % P` peers one more.
//!
//! ```text
//!  counts [2, 0, 5]        N = 7, P = 3
//!
//!  origin    │a a│ │b b b b b│
//!            0   2 2         7
//!
//!  balanced  │a a b│b b│b b│
//!            0     3   5   7
//! ```
//!
//! # Example
//!
//! ```rust
//! use regather::partitioning::Partition;
//!
//! let origin = Partition::from_counts(vec![8, 1, 4]).unwrap();
//! let plan = Partition::balanced(origin.total(), origin.peers()).unwrap();
//!
//! assert_eq!(plan.counts(), &[5, 4, 4]);
//! assert_eq!(plan.offsets(), &[0, 5, 9]);
//! ```

mod partition;

pub use partition::{Partition, PartitionKind};
