//! Rooted collectives over a point-to-point transport.

use crate::error::{Error, ExchangeError, Result};
use crate::metrics::ProtocolMetrics;
use crate::network::rpc::{Envelope, Payload};
use crate::network::transport::Transport;
use crate::partitioning::Partition;
use crate::types::{CollectiveOp, Item, Rank};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Runs the group's collectives for one peer.
///
/// Every peer of the group must enter the same collectives in the same
/// order. Each call takes the next sequence number, and every envelope is
/// tagged with its operation and sequence so a peer that strays from the
/// common order is reported as a [`ExchangeError::PhaseMismatch`] rather
/// than pairing the wrong data.
pub struct Communicator<T: Transport> {
    transport: T,
    next_seq: AtomicU64,
    metrics: Arc<ProtocolMetrics>,
}

impl<T: Transport> Communicator<T> {
    /// Create a communicator with its own metrics.
    pub fn new(transport: T) -> Self {
        Self::with_metrics(transport, Arc::new(ProtocolMetrics::new()))
    }

    /// Create a communicator recording into shared metrics.
    pub fn with_metrics(transport: T, metrics: Arc<ProtocolMetrics>) -> Self {
        Self {
            transport,
            next_seq: AtomicU64::new(0),
            metrics,
        }
    }

    /// This peer's rank.
    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }

    /// Number of peers in the group.
    pub fn size(&self) -> usize {
        self.transport.size()
    }

    /// Rank of the coordinator.
    pub fn coordinator(&self) -> Rank {
        self.transport.coordinator()
    }

    /// Whether this peer is the coordinator.
    pub fn is_coordinator(&self) -> bool {
        self.transport.is_coordinator()
    }

    /// Metrics recorded by this communicator.
    pub fn metrics(&self) -> &Arc<ProtocolMetrics> {
        &self.metrics
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn begin(&self, op: CollectiveOp) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.metrics.record_collective(op);
        debug!(rank = self.rank(), %op, seq, "Entering collective");
        seq
    }

    fn workers(&self) -> impl Iterator<Item = Rank> {
        let coordinator = self.coordinator();
        (0..self.size()).filter(move |&rank| rank != coordinator)
    }

    async fn send(&self, to: Rank, op: CollectiveOp, seq: u64, payload: Payload) -> Result<()> {
        self.metrics.record_sent(payload.item_count(), payload.byte_len());
        self.transport
            .send(to, Envelope::new(op, seq, self.rank(), payload))
            .await
    }

    async fn recv(&self, from: Rank, op: CollectiveOp, seq: u64) -> Result<Payload> {
        let envelope = self.transport.recv(from).await?;
        if envelope.op != op || envelope.seq != seq {
            return Err(ExchangeError::PhaseMismatch {
                from,
                expected: op,
                expected_seq: seq,
                actual: envelope.op,
                actual_seq: envelope.seq,
            }
            .into());
        }
        self.metrics
            .record_received(envelope.payload.item_count(), envelope.payload.byte_len());
        Ok(envelope.payload)
    }

    fn expect_len(op: CollectiveOp, rank: Rank, expected: usize, actual: usize) -> Result<()> {
        if expected != actual {
            return Err(ExchangeError::SizeMismatch {
                op,
                rank,
                expected,
                actual,
            }
            .into());
        }
        Ok(())
    }

    /// Fixed-size gather: every peer contributes one scalar.
    ///
    /// The coordinator gets the rank-ordered vector; workers get `None`.
    pub async fn collect_scalar(&self, value: u64) -> Result<Option<Vec<u64>>> {
        let op = CollectiveOp::CollectScalar;
        let seq = self.begin(op);

        if !self.is_coordinator() {
            self.send(self.coordinator(), op, seq, Payload::Scalar(value))
                .await?;
            return Ok(None);
        }

        let mut values = Vec::with_capacity(self.size());
        for rank in 0..self.size() {
            if rank == self.rank() {
                values.push(value);
            } else {
                values.push(self.recv(rank, op, seq).await?.into_scalar()?);
            }
        }
        Ok(Some(values))
    }

    /// Variable-length gather: every peer contributes a span.
    ///
    /// The coordinator supplies the layout and receives a buffer in which
    /// peer `i`'s span starts at `layout.offset(i)`. Workers pass `None` and
    /// get `None`. A span whose length differs from the layout is a
    /// [`ExchangeError::SizeMismatch`].
    pub async fn collect_variable<I: Item>(
        &self,
        local: &[I],
        layout: Option<&Partition>,
    ) -> Result<Option<Vec<I>>> {
        let op = CollectiveOp::CollectVariable;
        let seq = self.begin(op);

        if !self.is_coordinator() {
            self.send(self.coordinator(), op, seq, Payload::span(local)?)
                .await?;
            return Ok(None);
        }

        let layout = layout.ok_or(ExchangeError::MissingCoordinatorInput(op))?;
        if layout.peers() != self.size() {
            return Err(ExchangeError::LayoutMismatch {
                op,
                expected: self.size(),
                actual: layout.peers(),
            }
            .into());
        }

        // Sized by what arrives, never by the layout total.
        let mut buffer = Vec::new();
        for rank in 0..self.size() {
            let span = if rank == self.rank() {
                local.to_vec()
            } else {
                self.recv(rank, op, seq).await?.into_items::<I>()?
            };
            Self::expect_len(op, rank, layout.count(rank), span.len())?;
            if buffer.len() != layout.offset(rank) {
                return Err(Error::Internal(format!(
                    "rank {} span would land at {}, layout offset is {}",
                    rank,
                    buffer.len(),
                    layout.offset(rank)
                )));
            }
            buffer.extend(span);
        }

        Ok(Some(buffer))
    }

    /// Fixed-size scatter: the coordinator hands one scalar to each peer.
    ///
    /// The coordinator passes one value per rank and gets its own entry
    /// back; workers pass `None`.
    pub async fn broadcast_scalar(&self, values: Option<&[u64]>) -> Result<u64> {
        let op = CollectiveOp::BroadcastScalar;
        let seq = self.begin(op);

        if !self.is_coordinator() {
            return self.recv(self.coordinator(), op, seq).await?.into_scalar();
        }

        let values = values.ok_or(ExchangeError::MissingCoordinatorInput(op))?;
        if values.len() != self.size() {
            return Err(ExchangeError::LayoutMismatch {
                op,
                expected: self.size(),
                actual: values.len(),
            }
            .into());
        }

        for rank in self.workers() {
            self.send(rank, op, seq, Payload::Scalar(values[rank])).await?;
        }
        Ok(values[self.rank()])
    }

    /// Variable-length scatter: the coordinator hands each peer its span.
    ///
    /// The coordinator passes the buffer and its layout; workers pass
    /// `None`. Every peer states how many items it expects and gets a
    /// [`ExchangeError::SizeMismatch`] if the span differs.
    pub async fn distribute_variable<I: Item>(
        &self,
        source: Option<(&[I], &Partition)>,
        expected: usize,
    ) -> Result<Vec<I>> {
        let op = CollectiveOp::DistributeVariable;
        let seq = self.begin(op);

        if !self.is_coordinator() {
            let span = self
                .recv(self.coordinator(), op, seq)
                .await?
                .into_items::<I>()?;
            Self::expect_len(op, self.rank(), expected, span.len())?;
            return Ok(span);
        }

        let (buffer, layout) = source.ok_or(ExchangeError::MissingCoordinatorInput(op))?;
        layout.check(op, self.rank(), self.size(), buffer.len())?;

        for rank in self.workers() {
            let payload = Payload::span(layout.slice(buffer, rank))?;
            self.send(rank, op, seq, payload).await?;
        }

        let own = layout.slice(buffer, self.rank()).to_vec();
        Self::expect_len(op, self.rank(), expected, own.len())?;
        Ok(own)
    }

    /// Full-group synchronization point.
    ///
    /// Returns only after every peer has entered the same barrier.
    pub async fn barrier(&self) -> Result<()> {
        let op = CollectiveOp::Barrier;
        let seq = self.begin(op);

        if !self.is_coordinator() {
            self.send(self.coordinator(), op, seq, Payload::Empty).await?;
            self.recv(self.coordinator(), op, seq).await?;
            return Ok(());
        }

        for rank in self.workers() {
            self.recv(rank, op, seq).await?;
        }
        for rank in self.workers() {
            self.send(rank, op, seq, Payload::Empty).await?;
        }
        Ok(())
    }
}

impl<T: Transport> std::fmt::Debug for Communicator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("rank", &self.rank())
            .field("size", &self.size())
            .field("coordinator", &self.coordinator())
            .field("next_seq", &self.next_seq.load(Ordering::Relaxed))
            .finish()
    }
}
