//! Error types for the round-trip protocol.

use crate::types::{CollectiveOp, Rank};
use std::io;
use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the round-trip protocol.
#[derive(Error, Debug)]
pub enum Error {
    /// Collective exchange errors (sizes, layouts, phase ordering).
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    /// Network communication errors.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// The per-item transform failed on a peer.
    #[error("transform failed on rank {rank} at item {index}: {source}")]
    TransformFailed {
        rank: Rank,
        index: usize,
        #[source]
        source: TransformError,
    },

    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised by the collective exchanges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// A span or buffer does not have the length its layout declares.
    #[error("{op} size mismatch for rank {rank}: expected {expected} items, got {actual}")]
    SizeMismatch {
        op: CollectiveOp,
        rank: Rank,
        expected: usize,
        actual: usize,
    },

    /// A layout does not cover the group.
    #[error("{op} layout covers {actual} peers, group has {expected}")]
    LayoutMismatch {
        op: CollectiveOp,
        expected: usize,
        actual: usize,
    },

    /// The coordinator did not supply the layout or values a collective needs.
    #[error("{0} requires coordinator input")]
    MissingCoordinatorInput(CollectiveOp),

    /// A peer received a message for a different collective than the one it is in.
    #[error("phase mismatch from rank {from}: expected {expected} #{expected_seq}, got {actual} #{actual_seq}")]
    PhaseMismatch {
        from: Rank,
        expected: CollectiveOp,
        expected_seq: u64,
        actual: CollectiveOp,
        actual_seq: u64,
    },

    /// A protocol phase was invoked out of order.
    #[error("phase {phase} invoked in state {state}")]
    OutOfOrder {
        phase: &'static str,
        state: &'static str,
    },
}

/// Network communication errors.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection failed.
    #[error("connection failed to {addr}: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    /// Connection was closed.
    #[error("connection to rank {0} closed")]
    ConnectionClosed(Rank),

    /// No link exists between this peer and the target rank.
    #[error("no route to rank {0}")]
    NoRoute(Rank),

    /// Handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Frame exceeds the configured maximum size.
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised by a per-item transform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// The transform produced a value outside its codomain.
    #[error("non-finite result for input {0}")]
    NonFinite(String),

    /// The input is outside the transform's domain.
    #[error("input out of domain: {0}")]
    OutOfDomain(String),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Network(NetworkError::Serialization(e.to_string()))
    }
}
