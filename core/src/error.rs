//! Error taxonomy for the engine.
//!
//! The split that matters operationally is terminal vs. transient:
//!
//! - Business-rule failures (`NotAvailable`, `SoldOut`, `PurchaseNotFound`,
//!   ...) and `InvalidPayload` are terminal. They are reported to the caller
//!   and never retried automatically.
//! - [`StoreError::Conflict`] and [`StoreError::Unavailable`] are transient:
//!   the transaction that hit them is re-run a bounded number of times before
//!   the failure surfaces.

use crate::queue::QueueError;
use crate::store::StoreError;
use crate::types::{EventId, TicketId, UserId};
use thiserror::Error;

/// Failures produced by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The referenced event does not exist.
    #[error("event {0} not found")]
    EventNotFound(EventId),

    /// The referenced ticket does not exist under the given event.
    #[error("ticket {ticket_id} not found for event {event_id}")]
    TicketNotFound {
        /// The event the ticket was looked up under.
        event_id: EventId,
        /// The missing ticket.
        ticket_id: TicketId,
    },

    /// The referenced user does not exist.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// The ticket cannot be held: it is sold, or carries an unexpired hold.
    #[error("ticket {0} is not available for holding")]
    NotAvailable(TicketId),

    /// The ticket cannot be sold: it is missing, or its observed status is
    /// not `Available`.
    #[error("ticket {0} is not available for purchase")]
    TicketNotAvailable(TicketId),

    /// The ticket cannot be released: its observed status is not `Sold`.
    #[error("ticket {0} is not marked as sold")]
    TicketNotSold(TicketId),

    /// The event has no remaining inventory.
    #[error("event {0} is sold out")]
    SoldOut(EventId),

    /// No `Active` purchase matches the (event, ticket) pair for the user.
    #[error("no active purchase found for the specified ticket and event")]
    PurchaseNotFound,

    /// The caller-supplied payload is missing or malformed.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The store rejected or failed the operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The purchase-intent queue rejected or failed the operation.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl EngineError {
    /// Whether re-running the failed transaction can succeed.
    ///
    /// Only store contention and store unavailability qualify; every other
    /// variant is a terminal, caller-visible outcome.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Conflict { .. } | StoreError::Unavailable(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(EngineError::Store(StoreError::Unavailable("down".into())).is_transient());
        assert!(
            EngineError::Store(StoreError::Conflict {
                detail: "version".into()
            })
            .is_transient()
        );
        assert!(!EngineError::PurchaseNotFound.is_transient());
        assert!(!EngineError::SoldOut(EventId::new()).is_transient());
        assert!(!EngineError::InvalidPayload("missing userId".into()).is_transient());
        assert!(!EngineError::Store(StoreError::BatchTooLarge { size: 501 }).is_transient());
        assert!(!EngineError::Queue(QueueError::Closed).is_transient());
    }
}
