//! Collective operations rooted at the coordinator.
//!
//! | Operation | Coordinator | Worker |
//! |---|---|---|
//! | `collect_scalar` | gets one value per rank | sends its value |
//! | `collect_variable` | gets the spans laid out by a [`Partition`] | sends its span |
//! | `broadcast_scalar` | hands one value to each rank | gets its value |
//! | `distribute_variable` | hands each rank its span of a buffer | gets its span |
//! | `barrier` | waits for all, then releases all | checks in, waits for release |
//!
//! [`Partition`]: crate::partitioning::Partition

mod communicator;

pub use communicator::Communicator;
