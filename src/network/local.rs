//! In-process transport connecting a group of peers with channels.

use crate::error::{NetworkError, Result};
use crate::network::rpc::Envelope;
use crate::network::transport::Transport;
use crate::types::Rank;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

/// Create `size` connected transports, one per rank.
///
/// Every ordered pair of ranks gets its own unbounded FIFO channel. Dropping
/// a transport closes its links, so peers waiting on it fail instead of
/// hanging.
pub fn local_group(size: usize, coordinator: Rank) -> Vec<LocalTransport> {
    let mut outboxes: Vec<Vec<Option<mpsc::UnboundedSender<Envelope>>>> =
        (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
    let mut inboxes: Vec<Vec<Option<Mutex<mpsc::UnboundedReceiver<Envelope>>>>> =
        (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

    for from in 0..size {
        for to in 0..size {
            if from == to {
                continue;
            }
            let (tx, rx) = mpsc::unbounded_channel();
            outboxes[from][to] = Some(tx);
            inboxes[to][from] = Some(Mutex::new(rx));
        }
    }

    outboxes
        .into_iter()
        .zip(inboxes)
        .enumerate()
        .map(|(rank, (outboxes, inboxes))| LocalTransport {
            rank,
            size,
            coordinator,
            outboxes,
            inboxes,
        })
        .collect()
}

/// One peer's end of an in-process group.
pub struct LocalTransport {
    rank: Rank,
    size: usize,
    coordinator: Rank,
    /// Indexed by destination rank.
    outboxes: Vec<Option<mpsc::UnboundedSender<Envelope>>>,
    /// Indexed by source rank.
    inboxes: Vec<Option<Mutex<mpsc::UnboundedReceiver<Envelope>>>>,
}

#[async_trait]
impl Transport for LocalTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn coordinator(&self) -> Rank {
        self.coordinator
    }

    async fn send(&self, to: Rank, envelope: Envelope) -> Result<()> {
        let outbox = self
            .outboxes
            .get(to)
            .and_then(Option::as_ref)
            .ok_or(NetworkError::NoRoute(to))?;

        trace!(from = self.rank, to, op = %envelope.op, seq = envelope.seq, "local send");
        outbox
            .send(envelope)
            .map_err(|_| NetworkError::ConnectionClosed(to))?;
        Ok(())
    }

    async fn recv(&self, from: Rank) -> Result<Envelope> {
        let inbox = self
            .inboxes
            .get(from)
            .and_then(Option::as_ref)
            .ok_or(NetworkError::NoRoute(from))?;

        let envelope = inbox
            .lock()
            .await
            .recv()
            .await
            .ok_or(NetworkError::ConnectionClosed(from))?;

        trace!(to = self.rank, from, op = %envelope.op, seq = envelope.seq, "local recv");
        Ok(envelope)
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::network::rpc::Payload;
    use crate::types::CollectiveOp;

    fn envelope(from: Rank, seq: u64) -> Envelope {
        Envelope::new(CollectiveOp::CollectScalar, seq, from, Payload::Scalar(seq))
    }

    #[tokio::test]
    async fn test_links_are_fifo() {
        let mut group = local_group(2, 0);
        let worker = group.pop().unwrap();
        let coordinator = group.pop().unwrap();
        assert!(coordinator.is_coordinator());
        assert!(!worker.is_coordinator());

        for seq in 0..5 {
            worker.send(0, envelope(1, seq)).await.unwrap();
        }
        for seq in 0..5 {
            let received = coordinator.recv(1).await.unwrap();
            assert_eq!(received.seq, seq);
        }
    }

    #[tokio::test]
    async fn test_no_self_route() {
        let group = local_group(3, 0);
        let result = group[1].send(1, envelope(1, 0)).await;
        assert!(matches!(result, Err(Error::Network(NetworkError::NoRoute(1)))));

        let result = group[1].recv(7).await;
        assert!(matches!(result, Err(Error::Network(NetworkError::NoRoute(7)))));
    }

    #[tokio::test]
    async fn test_dropped_peer_closes_link() {
        let mut group = local_group(2, 0);
        let worker = group.pop().unwrap();
        let coordinator = group.pop().unwrap();
        drop(worker);

        let result = coordinator.recv(1).await;
        assert!(matches!(
            result,
            Err(Error::Network(NetworkError::ConnectionClosed(1)))
        ));

        let result = coordinator.send(1, envelope(0, 0)).await;
        assert!(matches!(
            result,
            Err(Error::Network(NetworkError::ConnectionClosed(1)))
        ));
    }
}
