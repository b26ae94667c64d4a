//! The phase sequence shared by both roles, and the driver that runs it.

use crate::collective::Communicator;
use crate::config::ProtocolConfig;
use crate::error::{Error, ExchangeError, Result};
use crate::network::transport::Transport;
use crate::rebalancing::coordinator::CoordinatorRole;
use crate::rebalancing::worker::WorkerRole;
use crate::transform::Transform;
use crate::types::{Item, Rank, RoundOutcome};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, error, info};

/// Where a peer is in the round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Nothing exchanged yet.
    Pending,
    /// Item counts reported (and, at the coordinator, gathered).
    CountsCollected,
    /// Items consolidated at the coordinator.
    Consolidated,
    /// Balanced task chunks handed out.
    Redistributed,
    /// Result chunks consolidated at the coordinator.
    ResultsConsolidated,
    /// Results returned to their original owners.
    Complete,
}

impl RoundState {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundState::Pending => "pending",
            RoundState::CountsCollected => "counts_collected",
            RoundState::Consolidated => "consolidated",
            RoundState::Redistributed => "redistributed",
            RoundState::ResultsConsolidated => "results_consolidated",
            RoundState::Complete => "complete",
        }
    }

    /// Fail unless the current state is `expected`.
    pub(crate) fn require(self, expected: RoundState, phase: &'static str) -> Result<()> {
        if self != expected {
            return Err(ExchangeError::OutOfOrder {
                phase,
                state: self.as_str(),
            }
            .into());
        }
        Ok(())
    }
}

/// The protocol phases, in the order every peer must run them.
///
/// [`CoordinatorRole`] keeps the group-wide buffers and the balancing plan;
/// [`WorkerRole`] keeps only its own counts. Both step through the same
/// states, and each method is one collective on the communicator.
#[async_trait]
pub trait PhaseSequence<I: Item, O: Item>: Send {
    /// Current state.
    fn state(&self) -> RoundState;

    /// Total items across the group, if this role knows it.
    fn total_items(&self) -> Option<usize> {
        None
    }

    /// Report this peer's item count to the coordinator.
    async fn collect_counts<T: Transport>(
        &mut self,
        comm: &Communicator<T>,
        local_len: usize,
    ) -> Result<()>;

    /// Contribute this peer's items to the consolidated buffer.
    async fn consolidate<T: Transport>(&mut self, comm: &Communicator<T>, batch: &[I]) -> Result<()>;

    /// Receive this peer's balanced task chunk.
    async fn redistribute<T: Transport>(&mut self, comm: &Communicator<T>) -> Result<Vec<I>>;

    /// Contribute this peer's result chunk to the consolidated results.
    async fn consolidate_results<T: Transport>(
        &mut self,
        comm: &Communicator<T>,
        results: &[O],
    ) -> Result<()>;

    /// Receive the results for this peer's original items.
    async fn return_results<T: Transport>(
        &mut self,
        comm: &Communicator<T>,
        local_len: usize,
    ) -> Result<Vec<O>>;
}

/// Apply `transform` to every item of a chunk, keeping order.
///
/// The first failing item aborts the chunk.
pub fn transform_chunk<I, O, F>(rank: Rank, chunk: &[I], transform: &F) -> Result<Vec<O>>
where
    F: Transform<I, O> + ?Sized,
{
    chunk
        .iter()
        .enumerate()
        .map(|(index, item)| {
            transform
                .apply(item)
                .map_err(|source| Error::TransformFailed {
                    rank,
                    index,
                    source,
                })
        })
        .collect()
}

/// Runs the full round trip for one peer.
pub struct RoundTrip<'a, T: Transport> {
    comm: &'a Communicator<T>,
    config: ProtocolConfig,
}

impl<'a, T: Transport> RoundTrip<'a, T> {
    /// Create a driver over a communicator.
    pub fn new(comm: &'a Communicator<T>, config: ProtocolConfig) -> Self {
        Self { comm, config }
    }

    /// Run every phase and return this peer's results.
    ///
    /// Picks the coordinator or worker role from the communicator's rank.
    /// The returned results line up one-to-one with `batch`.
    pub async fn run<I, O, F>(&self, batch: &[I], transform: &F) -> Result<RoundOutcome<O>>
    where
        I: Item,
        O: Item,
        F: Transform<I, O>,
    {
        info!(
            rank = self.comm.rank(),
            size = self.comm.size(),
            items = batch.len(),
            "Starting round trip"
        );
        debug!(rank = self.comm.rank(), ?batch, "Local batch");

        let outcome = if self.comm.is_coordinator() {
            let mut role = CoordinatorRole::<I, O>::new(&self.config);
            self.drive(&mut role, batch, transform).await
        } else {
            let mut role = WorkerRole::new(&self.config);
            self.drive(&mut role, batch, transform).await
        };

        match &outcome {
            Ok(outcome) => info!(
                rank = outcome.rank,
                processed = outcome.processed,
                returned = outcome.results.len(),
                elapsed_ms = outcome.elapsed().as_millis() as u64,
                "Round trip complete"
            ),
            Err(e) => error!(rank = self.comm.rank(), error = %e, "Round trip failed"),
        }
        outcome
    }

    async fn drive<I, O, F, P>(&self, role: &mut P, batch: &[I], transform: &F) -> Result<RoundOutcome<O>>
    where
        I: Item,
        O: Item,
        F: Transform<I, O>,
        P: PhaseSequence<I, O>,
    {
        let comm = self.comm;
        let rank = comm.rank();
        let mut timings = Vec::with_capacity(6);

        let started = Instant::now();
        role.collect_counts(comm, batch.len()).await?;
        timings.push(self.finish_phase("collect_counts", started));

        let started = Instant::now();
        role.consolidate(comm, batch).await?;
        timings.push(self.finish_phase("consolidate", started));

        let started = Instant::now();
        let chunk = role.redistribute(comm).await?;
        timings.push(self.finish_phase("redistribute", started));
        debug!(rank, ?chunk, "Task chunk");

        let started = Instant::now();
        let results = transform_chunk(rank, &chunk, transform)?;
        timings.push(self.finish_phase("transform", started));
        info!(rank, items = chunk.len(), "Task chunk transformed");

        let started = Instant::now();
        role.consolidate_results(comm, &results).await?;
        timings.push(self.finish_phase("consolidate_results", started));

        let started = Instant::now();
        let returned = role.return_results(comm, batch.len()).await?;
        timings.push(self.finish_phase("return_results", started));
        debug!(rank, results = ?returned, "Final results");

        Ok(RoundOutcome {
            rank,
            results: returned,
            processed: chunk.len(),
            total_items: role.total_items(),
            phase_timings: timings,
        })
    }

    fn finish_phase(&self, phase: &'static str, started: Instant) -> (&'static str, std::time::Duration) {
        let elapsed = started.elapsed();
        self.comm.metrics().record_phase(phase, elapsed);
        (phase, elapsed)
    }
}

/// Run the round trip with `config` on `comm`.
pub async fn run_round_trip<T, I, O, F>(
    comm: &Communicator<T>,
    batch: &[I],
    transform: &F,
    config: &ProtocolConfig,
) -> Result<RoundOutcome<O>>
where
    T: Transport,
    I: Item,
    O: Item,
    F: Transform<I, O>,
{
    RoundTrip::new(comm, config.clone()).run(batch, transform).await
}
