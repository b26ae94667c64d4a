//! Contiguous partitions of a rank-ordered buffer.

use crate::error::ExchangeError;
use crate::types::{CollectiveOp, Rank};
use std::ops::Range;

/// What a partition describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    /// Where each peer's original items sit in the consolidated buffer.
    Origin,
    /// The near-equal split used to hand out work.
    Balanced,
}

/// Per-peer `(count, offset)` layout over a buffer of `total` items.
///
/// Offsets are always the exclusive prefix sum of the counts in ascending
/// rank order, so the spans tile `[0, total)` with no gaps or overlaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    kind: PartitionKind,
    counts: Vec<usize>,
    offsets: Vec<usize>,
    total: usize,
}

impl Partition {
    /// Build the origin layout from the gathered per-peer counts.
    ///
    /// Counts come from peers and are not trusted: a set whose sum does not
    /// fit in `usize` is a [`ExchangeError::SizeMismatch`] naming the first
    /// rank that overflows it.
    pub fn from_counts(counts: Vec<usize>) -> Result<Self, ExchangeError> {
        let mut total: usize = 0;
        for (rank, &count) in counts.iter().enumerate() {
            total = total
                .checked_add(count)
                .ok_or(ExchangeError::SizeMismatch {
                    op: CollectiveOp::CollectScalar,
                    rank,
                    expected: usize::MAX - total,
                    actual: count,
                })?;
        }
        Ok(Self::with_kind(PartitionKind::Origin, counts))
    }

    /// Split `total` items across `peers` so that counts differ by at most one.
    ///
    /// The first `total % peers` ranks take the extra item. Returns `None`
    /// for an empty group.
    pub fn balanced(total: usize, peers: usize) -> Option<Self> {
        if peers == 0 {
            return None;
        }

        let base = total / peers;
        let remainder = total % peers;
        let counts = (0..peers)
            .map(|rank| base + usize::from(rank < remainder))
            .collect();

        Some(Self::with_kind(PartitionKind::Balanced, counts))
    }

    fn with_kind(kind: PartitionKind, counts: Vec<usize>) -> Self {
        let mut offsets = Vec::with_capacity(counts.len());
        let mut total = 0;
        for &count in &counts {
            offsets.push(total);
            total += count;
        }

        Self {
            kind,
            counts,
            offsets,
            total,
        }
    }

    /// Get the partition kind.
    pub fn kind(&self) -> PartitionKind {
        self.kind
    }

    /// Number of peers covered.
    pub fn peers(&self) -> usize {
        self.counts.len()
    }

    /// Total items across all spans.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Per-peer item counts.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Per-peer starting offsets.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Item count for a rank, zero if out of range.
    pub fn count(&self, rank: Rank) -> usize {
        self.counts.get(rank).copied().unwrap_or(0)
    }

    /// Starting offset for a rank, `total` if out of range.
    pub fn offset(&self, rank: Rank) -> usize {
        self.offsets.get(rank).copied().unwrap_or(self.total)
    }

    /// Buffer range owned by a rank.
    pub fn span(&self, rank: Rank) -> Range<usize> {
        let start = self.offset(rank);
        start..start + self.count(rank)
    }

    /// Difference between the largest and smallest count.
    pub fn spread(&self) -> usize {
        match (self.counts.iter().max(), self.counts.iter().min()) {
            (Some(max), Some(min)) => max - min,
            _ => 0,
        }
    }

    /// Borrow a rank's span out of `buffer`.
    pub fn slice<'a, T>(&self, buffer: &'a [T], rank: Rank) -> &'a [T] {
        &buffer[self.span(rank)]
    }

    /// Check this layout against a group size and the buffer `rank` holds.
    pub fn check(
        &self,
        op: CollectiveOp,
        rank: Rank,
        peers: usize,
        buffer_len: usize,
    ) -> Result<(), ExchangeError> {
        if self.peers() != peers {
            return Err(ExchangeError::LayoutMismatch {
                op,
                expected: peers,
                actual: self.peers(),
            });
        }
        if self.total != buffer_len {
            return Err(ExchangeError::SizeMismatch {
                op,
                rank,
                expected: self.total,
                actual: buffer_len,
            });
        }
        Ok(())
    }
}
