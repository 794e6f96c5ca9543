//! The synchronous half of the purchase flow.
//!
//! The gateway validates a raw purchase request, mints the intent's
//! idempotency key and publishes the intent to the queue. Nothing is read
//! from or written to the store here — availability is only decided by the
//! fulfillment transaction, so a gateway acceptance is an enqueue receipt,
//! not a sale.

use std::str::FromStr;
use std::sync::Arc;
use ticketline_core::queue::{IntentQueue, MessageId, PurchaseIntent};
use ticketline_core::types::{EventId, IntentId, TicketId, UserId};
use ticketline_core::EngineError;
use tracing::info;

/// A raw purchase request as received from a caller.
///
/// Fields are untyped strings on purpose: validation happens here, before
/// anything reaches the queue.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    /// The event to buy from.
    pub event_id: String,
    /// The ticket to buy.
    pub ticket_id: String,
    /// The buying user.
    pub user_id: String,
}

/// Receipt for an accepted purchase request.
#[derive(Debug, Clone, Copy)]
pub struct PurchaseReceipt {
    /// The idempotency key the resulting purchase will carry.
    pub intent_id: IntentId,
    /// The queue's id for the published message.
    pub message_id: MessageId,
}

/// Validates purchase requests and publishes purchase intents.
pub struct PurchaseGateway {
    queue: Arc<dyn IntentQueue>,
}

impl PurchaseGateway {
    /// Creates a gateway publishing to the given queue.
    pub fn new(queue: Arc<dyn IntentQueue>) -> Self {
        Self { queue }
    }

    /// Accepts a purchase request for asynchronous fulfillment.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidPayload`] when a field is empty or not a valid
    ///   id. Nothing is published in that case.
    /// - [`EngineError::Queue`] when the queue rejects the publish.
    pub async fn submit(&self, request: &PurchaseRequest) -> Result<PurchaseReceipt, EngineError> {
        let event_id: EventId = parse_field("eventId", &request.event_id)?;
        let ticket_id: TicketId = parse_field("ticketId", &request.ticket_id)?;
        let user_id: UserId = parse_field("userId", &request.user_id)?;

        let intent = PurchaseIntent {
            intent_id: IntentId::new(),
            event_id,
            ticket_id,
            user_id,
        };
        let message_id = self.queue.publish(intent.to_payload()?).await?;

        info!(
            intent_id = %intent.intent_id,
            %message_id,
            %event_id,
            %ticket_id,
            %user_id,
            "purchase intent published"
        );
        Ok(PurchaseReceipt {
            intent_id: intent.intent_id,
            message_id,
        })
    }
}

fn parse_field<T: FromStr>(name: &str, raw: &str) -> Result<T, EngineError> {
    if raw.trim().is_empty() {
        return Err(EngineError::InvalidPayload(format!(
            "{name} must be a non-empty string"
        )));
    }
    raw.parse()
        .map_err(|_| EngineError::InvalidPayload(format!("{name} is not a valid id: {raw}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn field_parsing_rejects_empty_and_malformed() {
        assert!(matches!(
            parse_field::<EventId>("eventId", ""),
            Err(EngineError::InvalidPayload(msg)) if msg.contains("eventId")
        ));
        assert!(matches!(
            parse_field::<EventId>("eventId", "   "),
            Err(EngineError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_field::<TicketId>("ticketId", "not-a-uuid"),
            Err(EngineError::InvalidPayload(_))
        ));

        let id = UserId::new();
        assert_eq!(
            parse_field::<UserId>("userId", &id.to_string()).unwrap(),
            id
        );
    }
}
