//! Event and user creation, and paginated listings.
#![allow(clippy::unwrap_used)]

mod support;

use support::Harness;
use ticketline_core::environment::Clock;
use ticketline_core::store::{MAX_WRITE_BATCH, TicketStore};
use ticketline_core::types::Money;
use ticketline_core::{EngineError, TicketStatus};
use ticketline_engine::{NewEvent, NewUser};

fn event_input(harness: &Harness, name: &str, ticket_count: u32) -> NewEvent {
    let start = harness.clock.now() + chrono::Duration::days(1);
    NewEvent {
        name: name.into(),
        description: String::new(),
        start_time: start,
        end_time: start + chrono::Duration::hours(2),
        ticket_count,
        ticket_price: Money::from_cents(1000),
    }
}

#[tokio::test]
async fn create_event_mints_the_full_pool() {
    let harness = Harness::new();
    let event = harness
        .directory()
        .create_event(event_input(&harness, "Concert", 25))
        .await
        .unwrap();

    assert_eq!(event.available_tickets, 25);

    let (stored, tickets) = harness
        .directory()
        .get_event_with_tickets(event.id)
        .await
        .unwrap();
    assert_eq!(stored, event);
    assert_eq!(tickets.len(), 25);
    assert!(tickets.iter().all(|t| t.status == TicketStatus::Available));
    assert!(tickets.iter().all(|t| t.price == event.ticket_price));
}

#[tokio::test]
async fn pools_larger_than_one_batch_are_written_in_chunks() {
    let harness = Harness::new();
    #[allow(clippy::cast_possible_truncation)]
    let count = (MAX_WRITE_BATCH + 50) as u32;
    let event = harness
        .directory()
        .create_event(event_input(&harness, "Stadium Show", count))
        .await
        .unwrap();

    let tickets = harness.store.list_tickets(event.id).await.unwrap();
    assert_eq!(tickets.len(), MAX_WRITE_BATCH + 50);
    assert_eq!(event.available_tickets, count);
}

#[tokio::test]
async fn event_input_is_validated() {
    let harness = Harness::new();
    let directory = harness.directory();

    let err = directory
        .create_event(NewEvent {
            name: "  ".into(),
            ..event_input(&harness, "x", 1)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPayload(_)));

    let err = directory
        .create_event(event_input(&harness, "Concert", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPayload(_)));

    let mut backwards = event_input(&harness, "Concert", 1);
    backwards.end_time = backwards.start_time - chrono::Duration::hours(1);
    let err = directory.create_event(backwards).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidPayload(_)));
}

#[tokio::test]
async fn user_creation_validates_the_email() {
    let harness = Harness::new();
    let directory = harness.directory();

    let user = directory
        .create_user(NewUser {
            name: "Ada".into(),
            email: "ada@example.com".into(),
        })
        .await
        .unwrap();
    let stored = harness.store.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(stored.doc, user);

    let err = directory
        .create_user(NewUser {
            name: "Ada".into(),
            email: "not-an-email".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPayload(_)));
}

#[tokio::test]
async fn listing_pages_through_events_by_start_time() {
    let harness = Harness::new();
    let directory = harness.directory();

    // Five events starting a day apart, created out of order.
    let mut ids = Vec::new();
    for offset in [3i64, 1, 5, 2, 4] {
        let start = harness.clock.now() + chrono::Duration::days(offset);
        let event = directory
            .create_event(NewEvent {
                name: format!("Event {offset}"),
                description: String::new(),
                start_time: start,
                end_time: start + chrono::Duration::hours(2),
                ticket_count: 1,
                ticket_price: Money::from_cents(500),
            })
            .await
            .unwrap();
        ids.push((offset, event.id));
    }
    ids.sort_by_key(|(offset, _)| *offset);

    let first = directory.list_events(2, None).await.unwrap();
    assert_eq!(
        first.events.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![ids[0].1, ids[1].1]
    );
    let cursor = first.next_cursor.unwrap();
    assert_eq!(cursor, ids[1].1);

    let second = directory.list_events(2, Some(cursor)).await.unwrap();
    assert_eq!(
        second.events.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![ids[2].1, ids[3].1]
    );

    let last = directory
        .list_events(2, second.next_cursor)
        .await
        .unwrap();
    assert_eq!(last.events.len(), 1);
    assert_eq!(last.events[0].id, ids[4].1);
    assert_eq!(last.next_cursor, None);
}
