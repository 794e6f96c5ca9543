//! Creating and reading events and users.

use std::mem;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use ticketline_core::store::{TicketStore, Write, WriteBatch};
use ticketline_core::ticket::TicketRecord;
use ticketline_core::types::{
    EventId, EventRecord, Money, TicketId, UserId, UserRecord,
};
use ticketline_core::EngineError;
use tracing::info;

/// Input for creating an event and its ticket pool.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// When the event starts.
    pub start_time: DateTime<Utc>,
    /// When the event ends.
    pub end_time: DateTime<Utc>,
    /// How many tickets to mint.
    pub ticket_count: u32,
    /// Unit price for every ticket.
    pub ticket_price: Money,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
}

/// One page of an event listing.
#[derive(Debug, Clone)]
pub struct EventPage {
    /// The events on this page, ordered by start time.
    pub events: Vec<EventRecord>,
    /// Cursor for the next page, when this page filled up.
    pub next_cursor: Option<EventId>,
}

/// CRUD surface for events and users.
pub struct Directory {
    store: Arc<dyn TicketStore>,
}

impl Directory {
    /// Creates a directory over the given store.
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Creates an event and mints its ticket pool.
    ///
    /// The event document and its tickets are written in atomic batches of at
    /// most the store's write limit; the inventory counter starts at
    /// `ticket_count`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidPayload`] for an empty name, a non-positive
    ///   ticket count, or an end time not after the start time.
    /// - [`EngineError::Store`] when a commit fails.
    pub async fn create_event(&self, input: NewEvent) -> Result<EventRecord, EngineError> {
        if input.name.trim().is_empty() {
            return Err(EngineError::InvalidPayload(
                "name must be a non-empty string".into(),
            ));
        }
        if input.ticket_count == 0 {
            return Err(EngineError::InvalidPayload(
                "ticketCount must be at least 1".into(),
            ));
        }
        if input.end_time <= input.start_time {
            return Err(EngineError::InvalidPayload(
                "endTime must be after startTime".into(),
            ));
        }

        let event = EventRecord {
            id: EventId::new(),
            name: input.name,
            description: input.description,
            start_time: input.start_time,
            end_time: input.end_time,
            available_tickets: input.ticket_count,
            ticket_price: input.ticket_price,
        };

        let mut batch = WriteBatch::new();
        batch.push(Write::PutEvent(event.clone()));
        for _ in 0..input.ticket_count {
            if batch.is_full() {
                self.store.commit(mem::take(&mut batch)).await?;
            }
            batch.push(Write::PutTicket(TicketRecord::new(
                TicketId::new(),
                event.id,
                event.ticket_price,
            )));
        }
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }

        info!(
            event_id = %event.id,
            name = %event.name,
            tickets = input.ticket_count,
            "event created"
        );
        Ok(event)
    }

    /// Creates a user.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidPayload`] for an empty name or an email that
    ///   does not look like an address.
    /// - [`EngineError::Store`] when the commit fails.
    pub async fn create_user(&self, input: NewUser) -> Result<UserRecord, EngineError> {
        if input.name.trim().is_empty() {
            return Err(EngineError::InvalidPayload(
                "name must be a non-empty string".into(),
            ));
        }
        if !email_is_valid(&input.email) {
            return Err(EngineError::InvalidPayload(format!(
                "invalid email address: {}",
                input.email
            )));
        }

        let user = UserRecord {
            id: UserId::new(),
            name: input.name,
            email: input.email,
        };

        let mut batch = WriteBatch::new();
        batch.push(Write::PutUser(user.clone()));
        self.store.commit(batch).await?;

        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// Reads an event together with all its tickets.
    ///
    /// # Errors
    ///
    /// - [`EngineError::EventNotFound`] when the event does not exist.
    /// - [`EngineError::Store`] when a read fails.
    pub async fn get_event_with_tickets(
        &self,
        event_id: EventId,
    ) -> Result<(EventRecord, Vec<TicketRecord>), EngineError> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(EngineError::EventNotFound(event_id))?;
        let tickets = self
            .store
            .list_tickets(event_id)
            .await?
            .into_iter()
            .map(|ticket| ticket.doc)
            .collect();
        Ok((event.doc, tickets))
    }

    /// Lists events by start time, `limit` per page.
    ///
    /// Pass the previous page's `next_cursor` to continue; a `None` cursor in
    /// the result means the listing is exhausted.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] when the read fails.
    pub async fn list_events(
        &self,
        limit: usize,
        start_after: Option<EventId>,
    ) -> Result<EventPage, EngineError> {
        let events: Vec<EventRecord> = self
            .store
            .list_events(limit, start_after)
            .await?
            .into_iter()
            .map(|event| event.doc)
            .collect();

        let next_cursor = if events.len() == limit {
            events.last().map(|event| event.id)
        } else {
            None
        };
        Ok(EventPage {
            events,
            next_cursor,
        })
    }
}

/// Shallow shape check on an email address: one `@`, non-empty local part,
/// and a domain with an interior dot.
fn email_is_valid(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.split_once('.') {
        Some((host, rest)) => !host.is_empty() && !rest.is_empty() && !rest.ends_with('.'),
        None => false,
    }
}
