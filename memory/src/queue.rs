//! In-memory [`IntentQueue`] over an unbounded channel.
//!
//! Single consumer, at-least-once: a delivered envelope can be fed back with
//! [`MemoryQueue::requeue`] to model broker redelivery. The original
//! `published_at` stamp travels with the envelope, so redelivered messages
//! age the way the fulfillment processor's retry guard expects.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use ticketline_core::environment::Clock;
use ticketline_core::queue::{IntentEnvelope, IntentQueue, IntentStream, MessageId, QueueError};
use tokio::sync::mpsc;

/// In-memory purchase-intent queue.
pub struct MemoryQueue {
    clock: Arc<dyn Clock>,
    sender: mpsc::UnboundedSender<IntentEnvelope>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<IntentEnvelope>>>,
}

impl MemoryQueue {
    /// Creates a queue that stamps publish times from the given clock.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            clock,
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Redelivers an envelope exactly as it was first delivered.
    ///
    /// The message id and original publish stamp are preserved, which is
    /// what an at-least-once broker does on redelivery.
    ///
    /// # Errors
    ///
    /// [`QueueError::Closed`] when the consumer side is gone.
    pub fn requeue(&self, envelope: IntentEnvelope) -> Result<(), QueueError> {
        tracing::debug!(message_id = %envelope.message_id, "requeueing envelope");
        self.sender.send(envelope).map_err(|_| QueueError::Closed)
    }
}

#[async_trait]
impl IntentQueue for MemoryQueue {
    async fn publish(&self, payload: Vec<u8>) -> Result<MessageId, QueueError> {
        let envelope = IntentEnvelope {
            message_id: MessageId::new(),
            published_at: self.clock.now(),
            payload,
        };
        let message_id = envelope.message_id;
        tracing::debug!(%message_id, published_at = %envelope.published_at, "publishing intent");
        self.sender
            .send(envelope)
            .map_err(|_| QueueError::PublishFailed("queue closed".into()))?;
        Ok(message_id)
    }

    async fn subscribe(&self) -> Result<IntentStream, QueueError> {
        let receiver = self
            .receiver
            .lock()
            .map_err(|_| QueueError::SubscribeFailed("queue lock poisoned".into()))?
            .take()
            .ok_or_else(|| QueueError::SubscribeFailed("already subscribed".into()))?;
        Ok(Box::pin(Deliveries { receiver }))
    }
}

struct Deliveries {
    receiver: mpsc::UnboundedReceiver<IntentEnvelope>,
}

impl Stream for Deliveries {
    type Item = Result<IntentEnvelope, QueueError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx).map(|envelope| envelope.map(Ok))
    }
}
