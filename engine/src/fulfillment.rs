//! Asynchronous execution of purchase intents.
//!
//! The queue is at-least-once, so the processor is written to make every
//! delivery safe to repeat:
//!
//! 1. intents older than the retry-age cap are dropped, bounding how long a
//!    stuck message can keep re-entering the pipeline;
//! 2. payloads that do not decode are dropped;
//! 3. an intent whose purchase already exists is recognised by its intent id
//!    and dropped as a duplicate;
//! 4. the sell transaction itself commits against the versions of the ticket
//!    and event it read, so two racing deliveries resolve to one sale — the
//!    loser conflicts, re-runs, and lands in the duplicate check.

use crate::retry::{RetryPolicy, retry_transient};
use futures::StreamExt;
use std::sync::Arc;
use ticketline_core::queue::{IntentEnvelope, IntentQueue, PurchaseIntent};
use ticketline_core::store::{Precondition, TicketStore, Write, WriteBatch};
use ticketline_core::types::{PurchaseId, PurchaseRecord, PurchaseStatus};
use ticketline_core::{Clock, EngineError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How the processor disposed of one delivered intent.
#[derive(Debug)]
pub enum FulfillmentOutcome {
    /// The sale went through; this purchase record was created.
    Purchased(PurchaseRecord),
    /// A purchase for this intent already exists; the delivery was dropped.
    Duplicate(PurchaseId),
    /// The intent was older than the retry-age cap and was dropped.
    Stale,
    /// The payload did not decode to an intent and was dropped.
    Unreadable,
    /// A business rule refused the sale; the intent is spent.
    Rejected(EngineError),
}

/// Executes purchase intents against the store.
pub struct FulfillmentProcessor {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    max_age: chrono::Duration,
    retry: RetryPolicy,
}

impl FulfillmentProcessor {
    /// Creates a processor that drops intents older than `max_age`.
    pub fn new(
        store: Arc<dyn TicketStore>,
        clock: Arc<dyn Clock>,
        max_age: chrono::Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            max_age,
            retry,
        }
    }

    /// Processes one delivered envelope.
    ///
    /// Every terminal disposition — including business-rule refusals — comes
    /// back as an [`FulfillmentOutcome`], so an `Ok` means the envelope is
    /// dealt with and must not be redelivered.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] when the store stays unavailable or contended
    /// past the retry budget; the envelope may be redelivered then.
    pub async fn process(
        &self,
        envelope: &IntentEnvelope,
    ) -> Result<FulfillmentOutcome, EngineError> {
        let age = self.clock.now() - envelope.published_at;
        if age > self.max_age {
            warn!(
                message_id = %envelope.message_id,
                age_secs = age.num_seconds(),
                "dropping stale purchase intent"
            );
            return Ok(FulfillmentOutcome::Stale);
        }

        let Some(intent) = PurchaseIntent::from_payload(&envelope.payload) else {
            warn!(
                message_id = %envelope.message_id,
                "dropping unreadable purchase intent payload"
            );
            return Ok(FulfillmentOutcome::Unreadable);
        };

        match retry_transient(&self.retry, || self.try_fulfill(&intent)).await {
            Ok(outcome) => Ok(outcome),
            Err(err) if !err.is_transient() => {
                warn!(
                    intent_id = %intent.intent_id,
                    ticket_id = %intent.ticket_id,
                    error = %err,
                    "purchase intent rejected"
                );
                Ok(FulfillmentOutcome::Rejected(err))
            }
            Err(err) => Err(err),
        }
    }

    async fn try_fulfill(
        &self,
        intent: &PurchaseIntent,
    ) -> Result<FulfillmentOutcome, EngineError> {
        if let Some(existing) = self
            .store
            .find_purchase_by_intent(intent.user_id, intent.intent_id)
            .await?
        {
            info!(
                intent_id = %intent.intent_id,
                purchase_id = %existing.doc.id,
                "duplicate delivery, purchase already recorded"
            );
            return Ok(FulfillmentOutcome::Duplicate(existing.doc.id));
        }

        if self.store.get_user(intent.user_id).await?.is_none() {
            return Err(EngineError::UserNotFound(intent.user_id));
        }

        let event = self
            .store
            .get_event(intent.event_id)
            .await?
            .ok_or(EngineError::EventNotFound(intent.event_id))?;
        // A missing ticket is unsellable, same as one observed off-state.
        let ticket = self
            .store
            .get_ticket(intent.event_id, intent.ticket_id)
            .await?
            .ok_or(EngineError::TicketNotAvailable(intent.ticket_id))?;

        let mut ticket_doc = ticket.doc;
        ticket_doc.sell()?;

        let mut event_doc = event.doc;
        event_doc.available_tickets = event_doc
            .available_tickets
            .checked_sub(1)
            .ok_or(EngineError::SoldOut(intent.event_id))?;

        let purchase = PurchaseRecord {
            id: PurchaseId::new(),
            event_id: intent.event_id,
            ticket_id: intent.ticket_id,
            status: PurchaseStatus::Active,
            purchase_time: self.clock.now(),
            cancellation_time: None,
            intent_id: intent.intent_id,
        };

        let mut batch = WriteBatch::new();
        batch
            .require(Precondition::TicketVersion(
                intent.event_id,
                intent.ticket_id,
                ticket.version,
            ))
            .require(Precondition::EventVersion(intent.event_id, event.version))
            .push(Write::PutTicket(ticket_doc))
            .push(Write::PutEvent(event_doc.clone()))
            .push(Write::PutPurchase {
                user_id: intent.user_id,
                purchase: purchase.clone(),
            });
        self.store.commit(batch).await?;

        info!(
            purchase_id = %purchase.id,
            event_id = %intent.event_id,
            ticket_id = %intent.ticket_id,
            user_id = %intent.user_id,
            remaining = event_doc.available_tickets,
            "ticket sold"
        );
        Ok(FulfillmentOutcome::Purchased(purchase))
    }
}

/// Background task draining the intent queue into the processor.
pub struct FulfillmentConsumer {
    name: String,
    queue: Arc<dyn IntentQueue>,
    processor: Arc<FulfillmentProcessor>,
    retry_delay: std::time::Duration,
}

impl FulfillmentConsumer {
    /// Creates a named consumer; the name appears in every log line.
    pub fn new(
        name: impl Into<String>,
        queue: Arc<dyn IntentQueue>,
        processor: Arc<FulfillmentProcessor>,
        retry_delay: std::time::Duration,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            processor,
            retry_delay,
        }
    }

    /// Spawns the consume loop, running until the shutdown signal fires.
    ///
    /// Lost subscriptions and ended streams are re-established after
    /// `retry_delay`; processing errors are logged and never stop the loop.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(consumer = %self.name, "fulfillment consumer started");

            'run: loop {
                match self.queue.subscribe().await {
                    Ok(mut stream) => {
                        info!(consumer = %self.name, "subscribed to purchase intents");

                        loop {
                            tokio::select! {
                                next = stream.next() => match next {
                                    Some(Ok(envelope)) => {
                                        match self.processor.process(&envelope).await {
                                            Ok(outcome) => debug!(
                                                consumer = %self.name,
                                                message_id = %envelope.message_id,
                                                ?outcome,
                                                "intent processed"
                                            ),
                                            Err(err) => error!(
                                                consumer = %self.name,
                                                message_id = %envelope.message_id,
                                                error = %err,
                                                "intent processing failed"
                                            ),
                                        }
                                    }
                                    Some(Err(err)) => {
                                        error!(
                                            consumer = %self.name,
                                            error = %err,
                                            "error receiving purchase intent"
                                        );
                                    }
                                    None => {
                                        warn!(consumer = %self.name, "intent stream ended");
                                        break;
                                    }
                                },
                                _ = shutdown.recv() => break 'run,
                            }
                        }
                    }
                    Err(err) => {
                        error!(consumer = %self.name, error = %err, "subscribe failed");
                    }
                }

                tokio::select! {
                    () = tokio::time::sleep(self.retry_delay) => {}
                    _ = shutdown.recv() => break 'run,
                }
            }

            info!(consumer = %self.name, "fulfillment consumer stopped");
        })
    }
}
