//! Domain types for the ticket inventory system.
//!
//! All identifiers are UUID-backed newtypes so that an event id can never be
//! handed to an API expecting a ticket id. Records mirror the persisted
//! document layout: `events/{eventId}`, `events/{eventId}/tickets/{ticketId}`,
//! `users/{userId}/purchases/{purchaseId}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for a ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TicketId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for a purchase record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PurchaseId(Uuid);

impl PurchaseId {
    /// Creates a new random `PurchaseId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PurchaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Idempotency key for a purchase intent.
///
/// Minted once by the purchase gateway and carried through the queue onto the
/// resulting purchase record. A redelivered intent is recognised by finding a
/// purchase that already carries its `IntentId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntentId(Uuid);

impl IntentId {
    /// Creates a new random `IntentId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IntentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents.
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents.
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Records
// ============================================================================

/// An event document: `events/{eventId}`.
///
/// `available_tickets` is the inventory counter. It is decremented only
/// atomically with a ticket's `Available → Sold` transition and re-incremented
/// on cancellation; the `u32` type keeps it non-negative by construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event identifier.
    pub id: EventId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// When the event starts.
    pub start_time: DateTime<Utc>,
    /// When the event ends.
    pub end_time: DateTime<Utc>,
    /// Count of tickets still sellable.
    pub available_tickets: u32,
    /// Unit price for every ticket of this event.
    pub ticket_price: Money,
}

/// Status of a purchase record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseStatus {
    /// The purchase stands; the ticket is sold to this user.
    Active,
    /// The purchase was reversed; the ticket went back to the pool.
    Cancelled,
}

/// A purchase document: `users/{userId}/purchases/{purchaseId}`.
///
/// Created only by the fulfillment processor when a ticket transitions to
/// `Sold`; mutated to `Cancelled` only by the cancellation transaction. The
/// ticket and event are referenced by id only — no cascading deletion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    /// Purchase identifier.
    pub id: PurchaseId,
    /// The event the ticket belongs to.
    pub event_id: EventId,
    /// The ticket that was sold.
    pub ticket_id: TicketId,
    /// Whether this purchase is still in force.
    pub status: PurchaseStatus,
    /// When the sale was executed.
    pub purchase_time: DateTime<Utc>,
    /// When the purchase was cancelled, if it was.
    pub cancellation_time: Option<DateTime<Utc>>,
    /// The intent that produced this purchase (idempotency key).
    pub intent_id: IntentId,
}

impl PurchaseRecord {
    /// Whether this purchase is `Active`.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, PurchaseStatus::Active)
    }
}

/// A user document: `users/{userId}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_strings() {
        let id = EventId::new();
        let parsed: EventId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        assert!("not-a-uuid".parse::<TicketId>().is_err());
        assert!("".parse::<UserId>().is_err());
    }

    #[test]
    fn money_formats_cents() {
        assert_eq!(Money::from_cents(2550).to_string(), "$25.50");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(2550).cents(), 2550);
    }
}
