//! Point-to-point transport seam beneath the collectives.

use crate::error::Result;
use crate::network::rpc::Envelope;
use crate::types::Rank;
use async_trait::async_trait;

/// Moves envelopes between the peers of a fixed-size group.
///
/// Implementations must deliver envelopes on each `(from, to)` link in the
/// order they were sent. The collectives only ever use links between the
/// coordinator and a worker.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// This peer's rank.
    fn rank(&self) -> Rank;

    /// Number of peers in the group.
    fn size(&self) -> usize;

    /// Rank of the coordinator.
    fn coordinator(&self) -> Rank;

    /// Whether this peer is the coordinator.
    fn is_coordinator(&self) -> bool {
        self.rank() == self.coordinator()
    }

    /// Send an envelope to a peer.
    async fn send(&self, to: Rank, envelope: Envelope) -> Result<()>;

    /// Receive the next envelope from a specific peer.
    async fn recv(&self, from: Rank) -> Result<Envelope>;
}
