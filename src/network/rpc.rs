//! Wire message types for collective exchanges.

use crate::error::{Error, Result};
use crate::types::{CollectiveOp, Item, Rank};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Network message wrapper for all communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// First frame a worker sends after connecting.
    Hello(HelloRequest),

    /// Coordinator's answer to a hello.
    HelloAck(HelloResponse),

    /// One leg of a collective exchange.
    Exchange(Envelope),
}

/// Worker introduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloRequest {
    /// Sender's rank.
    pub rank: Rank,

    /// Group size the sender was configured with.
    pub size: usize,
}

/// Coordinator's verdict on a hello.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloResponse {
    /// Whether the worker was admitted.
    pub accepted: bool,

    /// Reason for rejection.
    pub reason: Option<String>,
}

impl HelloResponse {
    /// Admit the worker.
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    /// Reject the worker.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

/// A tagged payload belonging to one collective call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Collective this payload belongs to.
    pub op: CollectiveOp,

    /// Per-communicator sequence number of the collective call.
    pub seq: u64,

    /// Sender's rank.
    pub from: Rank,

    /// The data.
    pub payload: Payload,
}

impl Envelope {
    /// Create a new envelope.
    pub fn new(op: CollectiveOp, seq: u64, from: Rank, payload: Payload) -> Self {
        Self {
            op,
            seq,
            from,
            payload,
        }
    }
}

/// Data carried by an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// A single count.
    Scalar(u64),

    /// A span of encoded items.
    Span {
        /// Number of items encoded in `data`.
        count: u64,
        /// bincode-encoded `Vec<T>`.
        data: Bytes,
    },

    /// No data; used by barriers.
    Empty,
}

impl Payload {
    /// Encode a span of items.
    pub fn span<T: Item>(items: &[T]) -> Result<Self> {
        let data = bincode::serialize(items)?;
        Ok(Payload::Span {
            count: items.len() as u64,
            data: Bytes::from(data),
        })
    }

    /// Decode a span back into items.
    pub fn into_items<T: Item>(self) -> Result<Vec<T>> {
        match self {
            Payload::Span { count, data } => {
                let items: Vec<T> = bincode::deserialize(&data)?;
                if items.len() as u64 != count {
                    return Err(Error::Internal(format!(
                        "span header declares {} items, body holds {}",
                        count,
                        items.len()
                    )));
                }
                Ok(items)
            }
            other => Err(Error::Internal(format!("expected span payload, got {:?}", other))),
        }
    }

    /// Extract a scalar.
    pub fn into_scalar(self) -> Result<u64> {
        match self {
            Payload::Scalar(value) => Ok(value),
            other => Err(Error::Internal(format!("expected scalar payload, got {:?}", other))),
        }
    }

    /// Number of items this payload carries.
    pub fn item_count(&self) -> u64 {
        match self {
            Payload::Scalar(_) => 1,
            Payload::Span { count, .. } => *count,
            Payload::Empty => 0,
        }
    }

    /// Approximate payload size in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Payload::Scalar(_) => std::mem::size_of::<u64>(),
            Payload::Span { data, .. } => data.len(),
            Payload::Empty => 0,
        }
    }
}

/// Encode a message to bytes.
pub fn encode_message(msg: &Message) -> std::result::Result<Vec<u8>, bincode::Error> {
    bincode::serialize(msg)
}

/// Decode a message from bytes.
pub fn decode_message(data: &[u8]) -> std::result::Result<Message, bincode::Error> {
    bincode::deserialize(data)
}

/// Frame a message with a length prefix for TCP transmission.
pub fn frame_message(msg: &Message) -> std::result::Result<Vec<u8>, bincode::Error> {
    let data = encode_message(msg)?;
    let len = data.len() as u32;

    let mut framed = Vec::with_capacity(4 + data.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&data);

    Ok(framed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_payload() {
        let payload = Payload::span(&[3i32, 4, 5]).unwrap();
        assert_eq!(payload.item_count(), 3);
        assert!(payload.byte_len() > 0);

        let items: Vec<i32> = payload.into_items().unwrap();
        assert_eq!(items, vec![3, 4, 5]);
    }

    #[test]
    fn test_empty_span_payload() {
        let payload = Payload::span::<f32>(&[]).unwrap();
        assert_eq!(payload.item_count(), 0);
        let items: Vec<f32> = payload.into_items().unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_span_count_mismatch() {
        let data = Bytes::from(bincode::serialize(&vec![1i32, 2]).unwrap());
        let payload = Payload::Span { count: 3, data };
        assert!(matches!(payload.into_items::<i32>(), Err(Error::Internal(_))));
    }

    #[test]
    fn test_wrong_payload_kind() {
        assert!(Payload::Empty.into_scalar().is_err());
        assert!(Payload::Scalar(1).into_items::<i32>().is_err());
        assert_eq!(Payload::Scalar(9).into_scalar().unwrap(), 9);
    }

    #[test]
    fn test_frame_message() {
        let msg = Message::Exchange(Envelope::new(
            CollectiveOp::CollectScalar,
            1,
            2,
            Payload::Scalar(5),
        ));

        let framed = frame_message(&msg).unwrap();

        // First 4 bytes should be length
        let len = u32::from_be_bytes([framed[0], framed[1], framed[2], framed[3]]) as usize;
        assert_eq!(len, framed.len() - 4);

        let decoded = decode_message(&framed[4..]).unwrap();
        if let Message::Exchange(envelope) = decoded {
            assert_eq!(envelope.op, CollectiveOp::CollectScalar);
            assert_eq!(envelope.seq, 1);
            assert_eq!(envelope.from, 2);
            assert_eq!(envelope.payload, Payload::Scalar(5));
        } else {
            panic!("Wrong message type");
        }
    }
}
