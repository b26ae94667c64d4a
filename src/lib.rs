//! Collective load rebalancing for a fixed group of cooperating peers.
//!
//! Each peer of a group starts with its own batch of items, of arbitrary and
//! uneven size. This crate evens the work out through a designated
//! coordinator before a pure per-item transform runs on every peer. Each
//! result then goes back to the peer that owned the item, in its original order.
//!
//! - **Collectives** (gather, variable gather, scatter, variable scatter,
//!   barrier) rooted at the coordinator
//! - **Balanced partitioning**: `N / P` items each, the first `N % P` peers
//!   take one more
//! - **Two transports**: in-process tokio channels and a TCP star
//! - **Phase tagging**: every exchange carries its operation and sequence
//!   number, so peers running different phases fail loudly
//!
//! # Example
//!
//! ```rust,no_run
//! use regather::{local_group, run_round_trip, Communicator, ProtocolConfig, Square};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let batches = vec![vec![3i64, 4], vec![5]];
//!
//!     let mut handles = Vec::new();
//!     for (transport, batch) in local_group(2, 0).into_iter().zip(batches) {
//!         handles.push(tokio::spawn(async move {
//!             let comm = Communicator::new(transport);
//!             run_round_trip(&comm, &batch, &Square, &ProtocolConfig::default()).await
//!         }));
//!     }
//!
//!     for handle in handles {
//!         let outcome = handle.await??;
//!         // rank 0 -> [9, 16], rank 1 -> [25]
//!         println!("rank {} -> {:?}", outcome.rank, outcome.results);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               RoundTrip driver              │
//! │  CoordinatorRole  │  WorkerRole             │
//! └─────────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────────┐
//! │               Communicator                  │
//! │  • collect_scalar / collect_variable        │
//! │  • broadcast_scalar / distribute_variable   │
//! │  • barrier                                  │
//! └─────────────────────────────────────────────┘
//!                     │
//!     ┌───────────────┼───────────────┐
//!     ▼               ▼               ▼
//! ┌─────────┐   ┌──────────┐   ┌───────────┐
//! │  Local  │   │   TCP    │   │ Partition │
//! │Transport│   │Transport │   │  layouts  │
//! └─────────┘   └──────────┘   └───────────┘
//! ```
//!
//! # Consistency Model
//!
//! - Links are FIFO per ordered pair of peers
//! - Every collective is entered by all peers in the same order
//! - The transform runs exactly once per item, somewhere in the group
//! - Any failure is fatal for the round trip; there is no partial result

pub mod collective;
pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod partitioning;
pub mod rebalancing;
pub mod testing;
pub mod transform;
pub mod types;
pub mod workload;

// Re-export main types for convenience
pub use collective::Communicator;
pub use config::{Config, GroupConfig, ProtocolConfig, TransportConfig, WorkloadConfig};
pub use error::{Error, ExchangeError, NetworkError, Result, TransformError};
pub use types::{CollectiveOp, Item, Rank, RoundOutcome, DEFAULT_COORDINATOR};

// Re-export network types
pub use network::{local_group, LocalTransport, TcpTransport, Transport};

// Re-export partitioning types
pub use partitioning::{Partition, PartitionKind};

// Re-export rebalancing types
pub use rebalancing::{
    run_round_trip, transform_chunk, CoordinatorRole, PhaseSequence, RoundState, RoundTrip,
    WorkerRole,
};

// Re-export transforms
pub use transform::{DegreesSine, Square, Transform};

// Re-export metrics types
pub use metrics::{
    Counter, Histogram, HistogramSnapshot, LabeledCounter, LabeledHistogram, MetricsSnapshot,
    ProtocolMetrics,
};

// Re-export testing types
pub use testing::LocalCluster;
