//! The purchase-intent queue contract.
//!
//! The queue decouples purchase *requests* from purchase *execution*: the
//! gateway publishes an intent and returns immediately; the fulfillment
//! consumer drains the stream and runs the sell transaction. Delivery is
//! at-least-once with no ordering guarantee — consumers must tolerate
//! duplicates (the engine does so via the intent id carried in the payload)
//! and must bound the age of redelivered work.

use crate::types::{EventId, IntentId, TicketId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Queue-assigned identifier for a published message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random `MessageId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The queued request to sell one specific ticket to one user.
///
/// Serialized as JSON into the message payload. The `intent_id` is the
/// idempotency key: it ends up on the purchase record, so a redelivery of
/// the same intent can be recognised and dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseIntent {
    /// Idempotency key minted by the gateway.
    pub intent_id: IntentId,
    /// The event to sell from.
    pub event_id: EventId,
    /// The ticket to sell.
    pub ticket_id: TicketId,
    /// The purchasing user.
    pub user_id: UserId,
}

/// A delivered message: opaque payload plus queue-assigned metadata.
///
/// `published_at` is the *original* publish instant and survives
/// redelivery — it is what the fulfillment processor's retry-age guard
/// inspects.
#[derive(Clone, Debug)]
pub struct IntentEnvelope {
    /// Queue-assigned message id.
    pub message_id: MessageId,
    /// When the message was first published.
    pub published_at: DateTime<Utc>,
    /// Serialized [`PurchaseIntent`].
    pub payload: Vec<u8>,
}

/// Failures surfaced by queue operations.
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    /// The message could not be published.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// The subscription could not be established.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// The queue has shut down; no further messages will arrive.
    #[error("queue closed")]
    Closed,
}

/// Stream of delivered intent envelopes.
pub type IntentStream = Pin<Box<dyn Stream<Item = Result<IntentEnvelope, QueueError>> + Send>>;

/// At-least-once message queue carrying purchase intents.
///
/// Implementations must be `Send + Sync`; the gateway and the consumer hold
/// the same queue handle from different tasks.
#[async_trait]
pub trait IntentQueue: Send + Sync {
    /// Publishes a payload, returning the queue-assigned message id.
    ///
    /// The queue stamps the publish time; callers serialize the intent
    /// before handing it over.
    ///
    /// # Errors
    ///
    /// [`QueueError::PublishFailed`] when the message cannot be accepted.
    async fn publish(&self, payload: Vec<u8>) -> Result<MessageId, QueueError>;

    /// Opens the consumer stream.
    ///
    /// # Errors
    ///
    /// [`QueueError::SubscribeFailed`] when the subscription cannot be
    /// established (for single-consumer queues, when it already was).
    async fn subscribe(&self) -> Result<IntentStream, QueueError>;
}

impl PurchaseIntent {
    /// Serializes the intent to its JSON wire form.
    ///
    /// # Errors
    ///
    /// [`QueueError::PublishFailed`] when serialization fails.
    pub fn to_payload(&self) -> Result<Vec<u8>, QueueError> {
        serde_json::to_vec(self).map_err(|e| QueueError::PublishFailed(e.to_string()))
    }

    /// Decodes an intent from a delivered payload.
    ///
    /// Returns `None` for payloads that are not valid intents; the consumer
    /// logs and drops those rather than failing the stream.
    #[must_use]
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        serde_json::from_slice(payload).ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn intent_round_trips_through_json() {
        let intent = PurchaseIntent {
            intent_id: IntentId::new(),
            event_id: EventId::new(),
            ticket_id: TicketId::new(),
            user_id: UserId::new(),
        };
        let payload = intent.to_payload().unwrap();
        assert_eq!(PurchaseIntent::from_payload(&payload), Some(intent));
    }

    #[test]
    fn garbage_payload_decodes_to_none() {
        assert_eq!(PurchaseIntent::from_payload(b"not json"), None);
        assert_eq!(PurchaseIntent::from_payload(b"{\"eventId\":1}"), None);
    }
}
