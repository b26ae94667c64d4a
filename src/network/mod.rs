//! Network communication layer.
//!
//! Collectives are built on a small point-to-point [`Transport`] seam with
//! two implementations:
//!
//! - [`LocalTransport`]: peers in one process, linked by tokio channels;
//! - [`TcpTransport`]: peers in separate processes, linked in a star around
//!   the coordinator with length-prefixed bincode frames.
//!
//! ```text
//!            ┌──────────────┐
//!     ┌─────▶│ coordinator  │◀─────┐
//!     │      │   (rank 0)   │      │
//!     │      └──────────────┘      │
//!     ▼              ▲             ▼
//! ┌────────┐         │        ┌────────┐
//! │ rank 1 │         ▼        │ rank 3 │
//! └────────┘     ┌────────┐   └────────┘
//!                │ rank 2 │
//!                └────────┘
//! ```

pub mod local;
pub mod rpc;
pub mod tcp;
pub mod transport;

pub use local::{local_group, LocalTransport};
pub use rpc::{Envelope, HelloRequest, HelloResponse, Message, Payload};
pub use tcp::TcpTransport;
pub use transport::Transport;
