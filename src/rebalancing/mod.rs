//! Collective load rebalancing round trip.
//!
//! Every peer starts with its own batch of items, of arbitrary and uneven
//! size. One round trip evens the work out and transforms each item exactly
//! once. Every result ends up back at the peer that owned the item.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RoundTrip                            │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │  Phase 1: Collect Counts                              │  │
//! │  │  - Every peer reports its batch length                │  │
//! │  │  - Coordinator builds the origin layout               │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                          ↓                                  │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │  Phase 2: Consolidate                                 │  │
//! │  │  - Items gathered in rank order at the coordinator    │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                          ↓                                  │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │  Phase 3: Redistribute                                │  │
//! │  │  - Coordinator computes the balanced plan             │  │
//! │  │  - Balanced counts scattered, then the task chunks    │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                          ↓                                  │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │  Phase 4: Transform                                   │  │
//! │  │  - Each peer maps its chunk locally                   │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                          ↓                                  │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │  Phase 5: Consolidate Results                         │  │
//! │  │  - Results gathered under the balanced plan           │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                          ↓                                  │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │  Phase 6: Return Results                              │  │
//! │  │  - Results scattered back under the origin layout     │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The role is picked once, from the communicator's rank. The coordinator
//! runs [`CoordinatorRole`] and owns the group-wide buffers; every other
//! peer runs [`WorkerRole`]. Both implement [`PhaseSequence`], so the
//! driver walks the same six phases on every peer.
//!
//! # Example
//!
//! ```rust,no_run
//! use regather::collective::Communicator;
//! use regather::config::ProtocolConfig;
//! use regather::network::local_group;
//! use regather::rebalancing::run_round_trip;
//! use regather::transform::Square;
//!
//! # async fn demo() -> regather::Result<()> {
//! let mut handles = Vec::new();
//! for (rank, transport) in local_group(2, 0).into_iter().enumerate() {
//!     handles.push(tokio::spawn(async move {
//!         let comm = Communicator::new(transport);
//!         let batch: Vec<i64> = if rank == 0 { vec![3, 4] } else { vec![5] };
//!         run_round_trip(&comm, &batch, &Square, &ProtocolConfig::default()).await
//!     }));
//! }
//! for handle in handles {
//!     let outcome = handle.await.expect("peer task panicked")?;
//!     println!("rank {} -> {:?}", outcome.rank, outcome.results);
//! }
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod round_trip;
mod worker;

pub use coordinator::CoordinatorRole;
pub use round_trip::{run_round_trip, transform_chunk, PhaseSequence, RoundState, RoundTrip};
pub use worker::WorkerRole;
