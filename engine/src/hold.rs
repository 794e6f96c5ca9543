//! Placing holds on tickets.

use crate::retry::{RetryPolicy, retry_transient};
use std::sync::Arc;
use ticketline_core::store::{Precondition, TicketStore, Write, WriteBatch};
use ticketline_core::ticket::TicketRecord;
use ticketline_core::{Clock, EngineError};
use ticketline_core::types::{EventId, TicketId, UserId};
use tracing::info;

/// Places time-limited holds on tickets.
///
/// A hold succeeds when the ticket is `Available`, or when it carries a hold
/// that has already lapsed — lapsed holds are overtaken in place without
/// waiting for the sweeper. The transition commits against the version of the
/// ticket that was read, so two users racing for the same ticket resolve to
/// exactly one winner.
pub struct HoldManager {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    retry: RetryPolicy,
}

impl HoldManager {
    /// Creates a hold manager with the given hold TTL.
    pub fn new(
        store: Arc<dyn TicketStore>,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            ttl,
            retry,
        }
    }

    /// Holds a ticket for a user until the TTL lapses.
    ///
    /// Returns the ticket as written, carrying the hold expiry.
    ///
    /// # Errors
    ///
    /// - [`EngineError::TicketNotFound`] when the ticket does not exist.
    /// - [`EngineError::NotAvailable`] when the ticket is sold or carries an
    ///   unexpired hold.
    /// - [`EngineError::Store`] when the store stays unavailable or contended
    ///   past the retry budget.
    pub async fn place_hold(
        &self,
        event_id: EventId,
        ticket_id: TicketId,
        user_id: UserId,
    ) -> Result<TicketRecord, EngineError> {
        retry_transient(&self.retry, || {
            self.try_place_hold(event_id, ticket_id, user_id)
        })
        .await
    }

    async fn try_place_hold(
        &self,
        event_id: EventId,
        ticket_id: TicketId,
        user_id: UserId,
    ) -> Result<TicketRecord, EngineError> {
        let ticket = self
            .store
            .get_ticket(event_id, ticket_id)
            .await?
            .ok_or(EngineError::TicketNotFound {
                event_id,
                ticket_id,
            })?;

        let mut doc = ticket.doc;
        doc.place_hold(user_id, self.clock.now(), self.ttl)?;

        let mut batch = WriteBatch::new();
        batch
            .require(Precondition::TicketVersion(event_id, ticket_id, ticket.version))
            .push(Write::PutTicket(doc.clone()));
        self.store.commit(batch).await?;

        info!(
            %event_id,
            %ticket_id,
            %user_id,
            expires_at = ?doc.hold_expires_at,
            "hold placed"
        );
        Ok(doc)
    }
}
