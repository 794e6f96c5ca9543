//! In-memory [`TicketStore`] with optimistic concurrency.
//!
//! Documents live in ordered maps behind one mutex; every document carries a
//! version drawn from a store-wide counter. [`MemoryStore::commit`] is
//! check-all-then-apply under the lock, which gives write batches exactly
//! the atomicity and conflict semantics the contract asks for. The lock is
//! never held across an await point.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ticketline_core::store::{
    MAX_WRITE_BATCH, Precondition, StoreError, TicketStore, Version, Versioned, Write, WriteBatch,
};
use ticketline_core::ticket::TicketRecord;
use ticketline_core::types::{
    EventId, EventRecord, IntentId, PurchaseId, PurchaseRecord, TicketId, UserId, UserRecord,
};

#[derive(Default)]
struct Inner {
    events: BTreeMap<EventId, Versioned<EventRecord>>,
    tickets: BTreeMap<(EventId, TicketId), Versioned<TicketRecord>>,
    users: BTreeMap<UserId, Versioned<UserRecord>>,
    purchases: BTreeMap<(UserId, PurchaseId), Versioned<PurchaseRecord>>,
    next_version: u64,
}

impl Inner {
    fn next_version(&mut self) -> Version {
        self.next_version += 1;
        Version(self.next_version)
    }

    fn check(&self, precondition: &Precondition) -> Result<(), StoreError> {
        let (held, expected, what) = match precondition {
            Precondition::EventVersion(id, version) => (
                self.events.get(id).map(|v| v.version),
                *version,
                format!("event {id}"),
            ),
            Precondition::TicketVersion(event_id, ticket_id, version) => (
                self.tickets.get(&(*event_id, *ticket_id)).map(|v| v.version),
                *version,
                format!("ticket {ticket_id}"),
            ),
            Precondition::PurchaseVersion(user_id, purchase_id, version) => (
                self.purchases
                    .get(&(*user_id, *purchase_id))
                    .map(|v| v.version),
                *version,
                format!("purchase {purchase_id}"),
            ),
        };
        match held {
            Some(current) if current == expected => Ok(()),
            Some(current) => Err(StoreError::Conflict {
                detail: format!(
                    "{what} moved from version {} to {}",
                    expected.0, current.0
                ),
            }),
            None => Err(StoreError::Conflict {
                detail: format!("{what} no longer exists"),
            }),
        }
    }

    fn apply(&mut self, write: Write) {
        let version = self.next_version();
        match write {
            Write::PutEvent(event) => {
                self.events.insert(event.id, Versioned::new(event, version));
            }
            Write::PutTicket(ticket) => {
                self.tickets
                    .insert((ticket.event_id, ticket.id), Versioned::new(ticket, version));
            }
            Write::PutUser(user) => {
                self.users.insert(user.id, Versioned::new(user, version));
            }
            Write::PutPurchase { user_id, purchase } => {
                self.purchases
                    .insert((user_id, purchase.id), Versioned::new(purchase, version));
            }
        }
    }
}

/// In-memory document store.
///
/// Cloneable via `Arc`; all handles share the same documents. Tests can
/// inject transient failure with [`fail_next_commits`](Self::fail_next_commits).
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    failing_commits: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with [`StoreError::Unavailable`].
    ///
    /// Models store outage for sweeper/retry tests.
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn get_event(&self, id: EventId) -> Result<Option<Versioned<EventRecord>>, StoreError> {
        Ok(self.lock()?.events.get(&id).cloned())
    }

    async fn get_ticket(
        &self,
        event_id: EventId,
        ticket_id: TicketId,
    ) -> Result<Option<Versioned<TicketRecord>>, StoreError> {
        Ok(self.lock()?.tickets.get(&(event_id, ticket_id)).cloned())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<Versioned<UserRecord>>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn list_events(
        &self,
        limit: usize,
        start_after: Option<EventId>,
    ) -> Result<Vec<Versioned<EventRecord>>, StoreError> {
        let inner = self.lock()?;
        let mut events: Vec<_> = inner.events.values().cloned().collect();
        events.sort_by_key(|event| (event.doc.start_time, event.doc.id));

        // A cursor naming an unknown event is ignored, like a deleted
        // pagination anchor.
        let cursor = start_after
            .and_then(|id| inner.events.get(&id))
            .map(|event| (event.doc.start_time, event.doc.id));
        let page = events
            .into_iter()
            .filter(|event| cursor.is_none_or(|after| (event.doc.start_time, event.doc.id) > after))
            .take(limit)
            .collect();
        Ok(page)
    }

    async fn list_tickets(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Versioned<TicketRecord>>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .tickets
            .iter()
            .filter(|((owner, _), _)| *owner == event_id)
            .map(|(_, ticket)| ticket.clone())
            .collect())
    }

    async fn expired_holds(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Versioned<TicketRecord>>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .tickets
            .values()
            .filter(|ticket| {
                ticket.doc.hold_status
                    && ticket.doc.hold_expires_at.is_some_and(|expires| expires < now)
            })
            .cloned()
            .collect())
    }

    async fn find_active_purchase(
        &self,
        user_id: UserId,
        event_id: EventId,
        ticket_id: TicketId,
    ) -> Result<Option<Versioned<PurchaseRecord>>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .purchases
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|(_, purchase)| purchase)
            .find(|purchase| {
                purchase.doc.is_active()
                    && purchase.doc.event_id == event_id
                    && purchase.doc.ticket_id == ticket_id
            })
            .cloned())
    }

    async fn find_purchase_by_intent(
        &self,
        user_id: UserId,
        intent_id: IntentId,
    ) -> Result<Option<Versioned<PurchaseRecord>>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .purchases
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|(_, purchase)| purchase)
            .find(|purchase| purchase.doc.intent_id == intent_id)
            .cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.writes.len() > MAX_WRITE_BATCH {
            return Err(StoreError::BatchTooLarge {
                size: batch.writes.len(),
            });
        }

        if self.failing_commits.load(Ordering::SeqCst) > 0 {
            self.failing_commits.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }

        let mut inner = self.lock()?;
        for precondition in &batch.preconditions {
            inner.check(precondition)?;
        }
        for write in batch.writes {
            inner.apply(write);
        }
        Ok(())
    }
}
