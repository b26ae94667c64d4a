//! Coordinator side of the round trip.
//!
//! The coordinator is the only peer that sees the whole group. Its buffers
//! and plans live in [`CoordinatorRole`], which only exists for the duration
//! of one round trip on the coordinator's stack.

use crate::collective::Communicator;
use crate::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::network::transport::Transport;
use crate::partitioning::Partition;
use crate::rebalancing::round_trip::{PhaseSequence, RoundState};
use crate::types::Item;
use async_trait::async_trait;
use tracing::{debug, info};

/// Group-wide state held by the coordinator for one round trip.
#[derive(Debug)]
pub struct CoordinatorRole<I, O> {
    state: RoundState,
    explicit_barriers: bool,

    /// Where each peer's items sit in the consolidated buffers.
    origin: Option<Partition>,

    /// The balanced split used to hand out work and gather results.
    plan: Option<Partition>,

    /// All input items, in rank order. Emptied once handed out.
    consolidated: Vec<I>,

    /// All results, positioned like the inputs were under `plan`.
    results: Vec<O>,
}

impl<I: Item, O: Item> CoordinatorRole<I, O> {
    /// Create a fresh coordinator role.
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            state: RoundState::Pending,
            explicit_barriers: config.explicit_barriers,
            origin: None,
            plan: None,
            consolidated: Vec::new(),
            results: Vec::new(),
        }
    }

    /// The origin layout, once counts are gathered.
    pub fn origin(&self) -> Option<&Partition> {
        self.origin.as_ref()
    }

    /// The balanced plan, once computed.
    pub fn plan(&self) -> Option<&Partition> {
        self.plan.as_ref()
    }

    fn origin_or_err(&self) -> Result<&Partition> {
        self.origin
            .as_ref()
            .ok_or_else(|| Error::Internal("origin layout missing".to_string()))
    }

    fn plan_or_err(&self) -> Result<&Partition> {
        self.plan
            .as_ref()
            .ok_or_else(|| Error::Internal("balanced plan missing".to_string()))
    }
}

#[async_trait]
impl<I: Item, O: Item> PhaseSequence<I, O> for CoordinatorRole<I, O> {
    fn state(&self) -> RoundState {
        self.state
    }

    fn total_items(&self) -> Option<usize> {
        self.origin.as_ref().map(Partition::total)
    }

    async fn collect_counts<T: Transport>(
        &mut self,
        comm: &Communicator<T>,
        local_len: usize,
    ) -> Result<()> {
        self.state.require(RoundState::Pending, "collect_counts")?;

        let counts = comm
            .collect_scalar(local_len as u64)
            .await?
            .ok_or_else(|| Error::Internal("coordinator received no counts".to_string()))?;
        // A count too wide for this platform saturates, so the sum or span checks reject it.
        let counts: Vec<usize> = counts
            .into_iter()
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .collect();
        let origin = Partition::from_counts(counts)?;

        info!(
            rank = comm.rank(),
            total = origin.total(),
            counts = ?origin.counts(),
            "Gathered item counts"
        );

        self.origin = Some(origin);
        self.state = RoundState::CountsCollected;
        Ok(())
    }

    async fn consolidate<T: Transport>(&mut self, comm: &Communicator<T>, batch: &[I]) -> Result<()> {
        self.state.require(RoundState::CountsCollected, "consolidate")?;

        if self.explicit_barriers {
            comm.barrier().await?;
        }

        let origin = self.origin_or_err()?;
        let consolidated = comm
            .collect_variable(batch, Some(origin))
            .await?
            .ok_or_else(|| Error::Internal("coordinator received no items".to_string()))?;

        debug!(rank = comm.rank(), items = ?consolidated, "Consolidated items");

        self.consolidated = consolidated;
        self.state = RoundState::Consolidated;
        Ok(())
    }

    async fn redistribute<T: Transport>(&mut self, comm: &Communicator<T>) -> Result<Vec<I>> {
        self.state.require(RoundState::Consolidated, "redistribute")?;

        let plan = Partition::balanced(self.consolidated.len(), comm.size())
            .ok_or_else(|| Error::Config("group has no peers".to_string()))?;

        info!(
            rank = comm.rank(),
            balanced = ?plan.counts(),
            "Computed balanced plan"
        );

        let counts: Vec<u64> = plan.counts().iter().map(|&n| n as u64).collect();
        let own = comm.broadcast_scalar(Some(&counts)).await? as usize;

        if self.explicit_barriers {
            comm.barrier().await?;
        }

        let chunk = comm
            .distribute_variable(Some((self.consolidated.as_slice(), &plan)), own)
            .await?;

        self.consolidated = Vec::new();
        self.plan = Some(plan);
        self.state = RoundState::Redistributed;
        Ok(chunk)
    }

    async fn consolidate_results<T: Transport>(
        &mut self,
        comm: &Communicator<T>,
        results: &[O],
    ) -> Result<()> {
        self.state.require(RoundState::Redistributed, "consolidate_results")?;

        let plan = self.plan_or_err()?;
        let gathered = comm
            .collect_variable(results, Some(plan))
            .await?
            .ok_or_else(|| Error::Internal("coordinator received no results".to_string()))?;

        debug!(rank = comm.rank(), results = ?gathered, "Consolidated results");

        self.results = gathered;
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

        let origin = self.origin_or_err()?;
        let own = comm
            .distribute_variable(Some((self.results.as_slice(), origin)), local_len)
            .await?;

        self.results = Vec::new();
        self.state = RoundState::Complete;
        Ok(own)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExchangeError;
    use crate::network::local::local_group;

    fn single_peer() -> Communicator<crate::network::LocalTransport> {
        Communicator::new(local_group(1, 0).pop().unwrap())
    }

    #[tokio::test]
    async fn test_phases_advance_state_and_plans() {
        let comm = single_peer();
        let mut role = CoordinatorRole::<i32, i32>::new(&ProtocolConfig::default());

        role.collect_counts(&comm, 5).await.unwrap();
        assert_eq!(PhaseSequence::<i32, i32>::state(&role), RoundState::CountsCollected);
        assert_eq!(role.origin().unwrap().counts(), &[5]);
        assert_eq!(PhaseSequence::<i32, i32>::total_items(&role), Some(5));

        role.consolidate(&comm, &[1, 2, 3, 4, 5]).await.unwrap();
        let chunk = role.redistribute(&comm).await.unwrap();
        assert_eq!(chunk, vec![1, 2, 3, 4, 5]);
        assert_eq!(role.plan().unwrap().counts(), &[5]);

        let doubled: Vec<i32> = chunk.iter().map(|x| x * 2).collect();
        role.consolidate_results(&comm, &doubled).await.unwrap();
        let returned = role.return_results(&comm, 5).await.unwrap();
        assert_eq!(returned, vec![2, 4, 6, 8, 10]);
        assert_eq!(PhaseSequence::<i32, i32>::state(&role), RoundState::Complete);
    }

    #[tokio::test]
    async fn test_out_of_order_phase_rejected() {
        let comm = single_peer();
        let mut role = CoordinatorRole::<i32, i32>::new(&ProtocolConfig::default());

        let result = role.redistribute(&comm).await;
        assert!(matches!(
            result,
            Err(Error::Exchange(ExchangeError::OutOfOrder {
                phase: "redistribute",
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_overflowing_counts_rejected() {
        let mut peers = local_group(2, 0).into_iter().map(Communicator::new);
        let coordinator = peers.next().unwrap();
        let worker = peers.next().unwrap();

        let rogue = tokio::spawn(async move {
            // Claims every item there could ever be.
            worker.collect_scalar(u64::MAX).await
        });

        let mut role = CoordinatorRole::<i32, i32>::new(&ProtocolConfig::default());
        let result = role.collect_counts(&coordinator, 1).await;
        assert!(matches!(
            result,
            Err(Error::Exchange(ExchangeError::SizeMismatch { rank: 1, .. }))
        ));
        assert!(role.origin().is_none());
        assert_eq!(PhaseSequence::<i32, i32>::state(&role), RoundState::Pending);
        assert!(rogue.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_count_mismatch_with_batch() {
        let comm = single_peer();
        let mut role = CoordinatorRole::<i32, i32>::new(&ProtocolConfig::default());

        role.collect_counts(&comm, 3).await.unwrap();
        let result = role.consolidate(&comm, &[1, 2]).await;
        assert!(matches!(
            result,
            Err(Error::Exchange(ExchangeError::SizeMismatch {
                rank: 0,
                expected: 3,
                actual: 2,
                ..
            }))
        ));
    }
}
