//! Worker side of the round trip.

use crate::collective::Communicator;
use crate::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::network::transport::Transport;
use crate::rebalancing::round_trip::{PhaseSequence, RoundState};
use crate::types::Item;
use async_trait::async_trait;
use tracing::debug;

/// State held by a non-coordinator peer: only its own balanced count.
#[derive(Debug, Clone)]
pub struct WorkerRole {
    state: RoundState,
    explicit_barriers: bool,
    balanced_count: Option<usize>,
}

impl WorkerRole {
    /// Create a fresh worker role.
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            state: RoundState::Pending,
            explicit_barriers: config.explicit_barriers,
            balanced_count: None,
        }
    }

    /// Number of items this worker was assigned, once known.
    pub fn balanced_count(&self) -> Option<usize> {
        self.balanced_count
    }
}

#[async_trait]
impl<I: Item, O: Item> PhaseSequence<I, O> for WorkerRole {
    fn state(&self) -> RoundState {
        self.state
    }

    async fn collect_counts<T: Transport>(
        &mut self,
        comm: &Communicator<T>,
        local_len: usize,
    ) -> Result<()> {
        self.state.require(RoundState::Pending, "collect_counts")?;

        if comm.collect_scalar(local_len as u64).await?.is_some() {
            return Err(Error::Internal("worker received the count vector".to_string()));
        }

        self.state = RoundState::CountsCollected;
        Ok(())
    }

    async fn consolidate<T: Transport>(&mut self, comm: &Communicator<T>, batch: &[I]) -> Result<()> {
        self.state.require(RoundState::CountsCollected, "consolidate")?;

        if self.explicit_barriers {
            comm.barrier().await?;
        }
        comm.collect_variable(batch, None).await?;

        self.state = RoundState::Consolidated;
        Ok(())
    }

    async fn redistribute<T: Transport>(&mut self, comm: &Communicator<T>) -> Result<Vec<I>> {
        self.state.require(RoundState::Consolidated, "redistribute")?;

        let count = comm.broadcast_scalar(None).await? as usize;
        debug!(rank = comm.rank(), count, "Received balanced count");

        if self.explicit_barriers {
            comm.barrier().await?;
        }

        let chunk = comm.distribute_variable(None, count).await?;

        self.balanced_count = Some(count);
        self.state = RoundState::Redistributed;
        Ok(chunk)
    }

    async fn consolidate_results<T: Transport>(
        &mut self,
        comm: &Communicator<T>,
        results: &[O],
    ) -> Result<()> {
        self.state.require(RoundState::Redistributed, "consolidate_results")?;

        comm.collect_variable(results, None).await?;

        self.state = RoundState::ResultsConsolidated;
        Ok(())
    }

    async fn return_results<T: Transport>(
        &mut self,
        comm: &Communicator<T>,
        local_len: usize,
    ) -> Result<Vec<O>> {
        self.state.require(RoundState::ResultsConsolidated, "return_results")?;

        if self.explicit_barriers {
            comm.barrier().await?;
        }
        let results = comm.distribute_variable(None, local_len).await?;

        self.state = RoundState::Complete;
        Ok(results)
    }
}
