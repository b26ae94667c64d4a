//! Testing utilities for running whole groups in one process.
//!
//! [`LocalCluster`] runs one tokio task per rank over the in-process
//! transport and hands back every peer's result in rank order.
//!
//! # Example
//!
//! ```rust,no_run
//! use regather::testing::LocalCluster;
//! use regather::transform::Square;
//! use std::sync::Arc;
//!
//! # async fn demo() -> regather::Result<()> {
//! let cluster = LocalCluster::new(3);
//! let batches = vec![vec![1i64; 8], vec![2], vec![3; 4]];
//!
//! let outcomes = cluster.run(batches, Arc::new(Square)).await?;
//! for outcome in outcomes {
//!     let outcome = outcome?;
//!     println!("rank {} processed {}", outcome.rank, outcome.processed);
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(test)]
mod tcp_e2e_tests;
#[cfg(test)]
mod utils;

use crate::collective::Communicator;
use crate::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::metrics::ProtocolMetrics;
use crate::network::local::{local_group, LocalTransport};
use crate::rebalancing::run_round_trip;
use crate::transform::Transform;
use crate::types::{Item, Rank, RoundOutcome, DEFAULT_COORDINATOR};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An in-process group of peers for integration testing.
#[derive(Debug)]
pub struct LocalCluster {
    /// Number of peers.
    size: usize,

    /// Coordinator rank.
    coordinator: Rank,

    /// Protocol settings shared by every peer.
    protocol: ProtocolConfig,

    /// Metrics per rank, kept across runs.
    metrics: Vec<Arc<ProtocolMetrics>>,

    /// When the cluster was created.
    started_at: Instant,
}

impl LocalCluster {
    /// Create a cluster of `size` peers coordinated by rank 0.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            coordinator: DEFAULT_COORDINATOR,
            protocol: ProtocolConfig::default(),
            metrics: (0..size).map(|_| Arc::new(ProtocolMetrics::new())).collect(),
            started_at: Instant::now(),
        }
    }

    /// Use a different coordinator rank.
    pub fn with_coordinator(mut self, coordinator: Rank) -> Self {
        self.coordinator = coordinator;
        self
    }

    /// Use custom protocol settings.
    pub fn with_protocol_config(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }

    /// Get the number of peers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the coordinator rank.
    pub fn coordinator(&self) -> Rank {
        self.coordinator
    }

    /// Get a peer's metrics.
    pub fn metrics(&self, rank: Rank) -> Option<&Arc<ProtocolMetrics>> {
        self.metrics.get(rank)
    }

    /// Get elapsed time since the cluster was created.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Run `peer` once on every rank, concurrently, and collect the results
    /// in rank order.
    pub async fn spawn_each<F, Fut, R>(&self, peer: F) -> Result<Vec<R>>
    where
        F: Fn(Communicator<LocalTransport>) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        if self.coordinator >= self.size {
            return Err(Error::Config(format!(
                "coordinator {} out of range for group of {}",
                self.coordinator, self.size
            )));
        }

        let handles: Vec<_> = local_group(self.size, self.coordinator)
            .into_iter()
            .zip(&self.metrics)
            .map(|(transport, metrics)| {
                tokio::spawn(peer(Communicator::with_metrics(transport, metrics.clone())))
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (rank, handle) in handles.into_iter().enumerate() {
            let result = handle
                .await
                .map_err(|e| Error::Internal(format!("rank {} task failed: {}", rank, e)))?;
            results.push(result);
        }
        Ok(results)
    }

    /// Run the full round trip with one batch per rank.
    pub async fn run<I, O, F>(
        &self,
        batches: Vec<Vec<I>>,
        transform: Arc<F>,
    ) -> Result<Vec<Result<RoundOutcome<O>>>>
    where
        I: Item,
        O: Item,
        F: Transform<I, O> + 'static,
    {
        if batches.len() != self.size {
            return Err(Error::Config(format!(
                "{} batches for a group of {}",
                batches.len(),
                self.size
            )));
        }

        let batches = Arc::new(batches);
        let protocol = self.protocol.clone();

        self.spawn_each(move |comm| {
            let batches = batches.clone();
            let transform = transform.clone();
            let protocol = protocol.clone();
            async move {
                let batch = &batches[comm.rank()];
                run_round_trip(&comm, batch, transform.as_ref(), &protocol).await
            }
        })
        .await
    }
}
