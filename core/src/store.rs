//! The transactional document store contract.
//!
//! The store is the single shared mutable resource in the system. Every
//! state transition is expressed as read-verify-write:
//!
//! 1. read the documents involved, capturing their [`Version`]s;
//! 2. evaluate guards and build the new document states in memory;
//! 3. [`commit`](TicketStore::commit) a [`WriteBatch`] whose
//!    [`Precondition`]s pin the captured versions.
//!
//! If any precondition no longer holds at commit time — a concurrent writer
//! got there first — the commit fails with [`StoreError::Conflict`] and the
//! caller re-runs the whole transaction against fresh reads. This is
//! optimistic concurrency: there are no locks to hold across I/O, and the
//! store's atomic check-then-apply is the only serialization point.
//!
//! A batch is atomic as a whole (all writes or none) and bounded at
//! [`MAX_WRITE_BATCH`] operations, mirroring the atomic-write-group limit of
//! the backing document store.

use crate::ticket::TicketRecord;
use crate::types::{EventId, EventRecord, IntentId, PurchaseId, PurchaseRecord, TicketId, UserId, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Maximum number of writes in one atomic batch.
pub const MAX_WRITE_BATCH: usize = 500;

/// Monotonic per-document revision number assigned by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub u64);

/// A document together with the version it was read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The document contents.
    pub doc: T,
    /// The revision this read observed.
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Pairs a document with its observed version.
    pub const fn new(doc: T, version: Version) -> Self {
        Self { doc, version }
    }
}

/// Failures surfaced by store operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// A commit precondition no longer held: a concurrent transaction won.
    #[error("transaction conflict: {detail}")]
    Conflict {
        /// Which precondition failed.
        detail: String,
    },

    /// The batch exceeds the store's atomic-write-group limit.
    #[error("write batch of {size} operations exceeds the limit of {MAX_WRITE_BATCH}")]
    BatchTooLarge {
        /// Number of writes in the rejected batch.
        size: usize,
    },

    /// The store could not serve the request; retrying may succeed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A single document write.
#[derive(Clone, Debug)]
pub enum Write {
    /// Create or replace an event document.
    PutEvent(EventRecord),
    /// Create or replace a ticket document under its event.
    PutTicket(TicketRecord),
    /// Create or replace a user document.
    PutUser(UserRecord),
    /// Create or replace a purchase document under a user.
    PutPurchase {
        /// The owning user.
        user_id: UserId,
        /// The purchase document.
        purchase: PurchaseRecord,
    },
}

/// A commit-time assertion about a previously read document.
#[derive(Clone, Debug)]
pub enum Precondition {
    /// The event document is still at the given version.
    EventVersion(EventId, Version),
    /// The ticket document is still at the given version.
    TicketVersion(EventId, TicketId, Version),
    /// The purchase document is still at the given version.
    PurchaseVersion(UserId, PurchaseId, Version),
}

/// An atomic group of preconditions and writes.
///
/// Preconditions pin the versions of the transaction's read set; writes are
/// applied only if every precondition still holds. Writes do not count
/// against preconditions: a sweep batch of 500 resets carries 500 writes and
/// 500 preconditions and is still one atomic group.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    /// Assertions checked before any write is applied.
    pub preconditions: Vec<Precondition>,
    /// Writes applied atomically when all preconditions hold.
    pub writes: Vec<Write>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            preconditions: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Adds a precondition.
    pub fn require(&mut self, precondition: Precondition) -> &mut Self {
        self.preconditions.push(precondition);
        self
    }

    /// Adds a write.
    pub fn push(&mut self, write: Write) -> &mut Self {
        self.writes.push(write);
        self
    }

    /// Number of writes in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether the batch carries no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Whether another write would exceed [`MAX_WRITE_BATCH`].
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.writes.len() >= MAX_WRITE_BATCH
    }
}

/// Durable, transactional document store for the ticket inventory.
///
/// Reads return documents paired with versions; [`commit`](Self::commit) is
/// the single atomic mutation primitive. Implementations must be `Send +
/// Sync`: the sweeper, the fulfillment consumer and request handlers all
/// share one store handle.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Reads `events/{id}`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when the store cannot serve the read.
    async fn get_event(&self, id: EventId) -> Result<Option<Versioned<EventRecord>>, StoreError>;

    /// Reads `events/{event_id}/tickets/{ticket_id}`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when the store cannot serve the read.
    async fn get_ticket(
        &self,
        event_id: EventId,
        ticket_id: TicketId,
    ) -> Result<Option<Versioned<TicketRecord>>, StoreError>;

    /// Reads `users/{id}`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when the store cannot serve the read.
    async fn get_user(&self, id: UserId) -> Result<Option<Versioned<UserRecord>>, StoreError>;

    /// Lists events ordered by start time, then id, starting after the given
    /// cursor event if provided.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when the store cannot serve the read.
    async fn list_events(
        &self,
        limit: usize,
        start_after: Option<EventId>,
    ) -> Result<Vec<Versioned<EventRecord>>, StoreError>;

    /// Lists all tickets of an event.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when the store cannot serve the read.
    async fn list_tickets(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Versioned<TicketRecord>>, StoreError>;

    /// Queries, across all events, tickets with `hold_status == true` and
    /// `hold_expires_at < now`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when the store cannot serve the read.
    async fn expired_holds(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Versioned<TicketRecord>>, StoreError>;

    /// Finds the user's `Active` purchase for the (event, ticket) pair, if
    /// any. At most one can exist at a time.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when the store cannot serve the read.
    async fn find_active_purchase(
        &self,
        user_id: UserId,
        event_id: EventId,
        ticket_id: TicketId,
    ) -> Result<Option<Versioned<PurchaseRecord>>, StoreError>;

    /// Finds the user's purchase carrying the given intent id, if any.
    /// Used by the fulfillment processor to recognise redelivered intents.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when the store cannot serve the read.
    async fn find_purchase_by_intent(
        &self,
        user_id: UserId,
        intent_id: IntentId,
    ) -> Result<Option<Versioned<PurchaseRecord>>, StoreError>;

    /// Atomically applies a batch: checks every precondition, then applies
    /// every write, or does nothing at all.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`] when a precondition no longer holds.
    /// - [`StoreError::BatchTooLarge`] when the batch exceeds
    ///   [`MAX_WRITE_BATCH`] writes.
    /// - [`StoreError::Unavailable`] on transient store failure.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
