//! Synchronous purchase cancellation.
//!
//! Cancellation is the inverse of the sell transaction and runs in the
//! caller's request, not through the queue: the active purchase is marked
//! `Cancelled`, the ticket returns to `Available`, and the event's inventory
//! counter is re-incremented — all in one commit preconditioned on the
//! versions of the three documents read.

use crate::retry::{RetryPolicy, retry_transient};
use std::sync::Arc;
use ticketline_core::store::{Precondition, TicketStore, Write, WriteBatch};
use ticketline_core::types::{EventId, PurchaseRecord, PurchaseStatus, TicketId, UserId};
use ticketline_core::{Clock, EngineError};
use tracing::info;

/// Reverses active purchases.
pub struct CancelService {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl CancelService {
    /// Creates a cancellation service.
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            retry,
        }
    }

    /// Cancels the user's active purchase of the given ticket.
    ///
    /// Returns the purchase record as cancelled. Repeating the call fails
    /// with [`EngineError::PurchaseNotFound`]: the first cancellation left no
    /// active purchase to find.
    ///
    /// # Errors
    ///
    /// - [`EngineError::PurchaseNotFound`] when the user holds no active
    ///   purchase for the (event, ticket) pair.
    /// - [`EngineError::TicketNotSold`] when the ticket's status disagrees
    ///   with the purchase record.
    /// - [`EngineError::Store`] when the store stays unavailable or contended
    ///   past the retry budget.
    pub async fn cancel(
        &self,
        user_id: UserId,
        event_id: EventId,
        ticket_id: TicketId,
    ) -> Result<PurchaseRecord, EngineError> {
        retry_transient(&self.retry, || self.try_cancel(user_id, event_id, ticket_id)).await
    }

    async fn try_cancel(
        &self,
        user_id: UserId,
        event_id: EventId,
        ticket_id: TicketId,
    ) -> Result<PurchaseRecord, EngineError> {
        let purchase = self
            .store
            .find_active_purchase(user_id, event_id, ticket_id)
            .await?
            .ok_or(EngineError::PurchaseNotFound)?;
        let ticket = self
            .store
            .get_ticket(event_id, ticket_id)
            .await?
            .ok_or(EngineError::TicketNotFound {
                event_id,
                ticket_id,
            })?;
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(EngineError::EventNotFound(event_id))?;

        let mut ticket_doc = ticket.doc;
        ticket_doc.release_sold()?;

        let mut event_doc = event.doc;
        event_doc.available_tickets = event_doc.available_tickets.saturating_add(1);

        let mut purchase_doc = purchase.doc;
        purchase_doc.status = PurchaseStatus::Cancelled;
        purchase_doc.cancellation_time = Some(self.clock.now());

        let mut batch = WriteBatch::new();
        batch
            .require(Precondition::PurchaseVersion(
                user_id,
                purchase_doc.id,
                purchase.version,
            ))
            .require(Precondition::TicketVersion(event_id, ticket_id, ticket.version))
            .require(Precondition::EventVersion(event_id, event.version))
            .push(Write::PutPurchase {
                user_id,
                purchase: purchase_doc.clone(),
            })
            .push(Write::PutTicket(ticket_doc))
            .push(Write::PutEvent(event_doc.clone()));
        self.store.commit(batch).await?;

        info!(
            purchase_id = %purchase_doc.id,
            %event_id,
            %ticket_id,
            %user_id,
            remaining = event_doc.available_tickets,
            "purchase cancelled"
        );
        Ok(purchase_doc)
    }
}
