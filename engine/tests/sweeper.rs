//! Expiry sweeps: matching, batching, and failure isolation.
#![allow(clippy::unwrap_used)]

mod support;

use support::Harness;
use ticketline_core::environment::Clock;
use ticketline_core::store::{MAX_WRITE_BATCH, TicketStore, Write, WriteBatch};
use ticketline_core::types::UserId;
use ticketline_core::TicketStatus;

#[tokio::test]
async fn sweep_with_nothing_expired_is_a_no_op() {
    let harness = Harness::new();
    let (event, tickets) = harness.seed_event(2).await;

    harness
        .holds()
        .place_hold(event.id, tickets[0].id, UserId::new())
        .await
        .unwrap();

    let report = harness.sweeper().run_once().await.unwrap();
    assert_eq!(report.matched, 0);
    assert_eq!(report.released, 0);
    assert_eq!(report.failed_batches, 0);
}

#[tokio::test]
async fn hold_expiring_exactly_now_is_not_swept() {
    let harness = Harness::new();
    let (event, tickets) = harness.seed_event(1).await;

    harness
        .holds()
        .place_hold(event.id, tickets[0].id, UserId::new())
        .await
        .unwrap();

    // The query is strict: `hold_expires_at < now`, so the boundary instant
    // still counts as held.
    harness.clock.advance(chrono::Duration::minutes(20));
    let report = harness.sweeper().run_once().await.unwrap();
    assert_eq!(report.matched, 0);

    harness.clock.advance(chrono::Duration::seconds(1));
    let report = harness.sweeper().run_once().await.unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(report.released, 1);
}

#[tokio::test]
async fn only_lapsed_holds_are_released() {
    let harness = Harness::new();
    let (event, tickets) = harness.seed_event(3).await;
    let holds = harness.holds();

    holds
        .place_hold(event.id, tickets[0].id, UserId::new())
        .await
        .unwrap();
    harness.clock.advance(chrono::Duration::minutes(15));
    holds
        .place_hold(event.id, tickets[1].id, UserId::new())
        .await
        .unwrap();

    // First hold lapses at +20, the second at +35.
    harness.clock.advance(chrono::Duration::minutes(10));
    let report = harness.sweeper().run_once().await.unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(report.released, 1);

    let first = harness
        .store
        .get_ticket(event.id, tickets[0].id)
        .await
        .unwrap()
        .unwrap();
    let second = harness
        .store
        .get_ticket(event.id, tickets[1].id)
        .await
        .unwrap()
        .unwrap();
    let untouched = harness
        .store
        .get_ticket(event.id, tickets[2].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.doc.status, TicketStatus::Available);
    assert_eq!(second.doc.status, TicketStatus::Onhold);
    assert_eq!(untouched.doc.status, TicketStatus::Available);
}

#[tokio::test]
async fn failed_batch_is_isolated_and_retried_next_cycle() {
    let harness = Harness::new();
    let over_limit = MAX_WRITE_BATCH + 100;
    #[allow(clippy::cast_possible_truncation)]
    let (event, tickets) = harness.seed_event(over_limit as u32).await;

    // Lapse a hold on every ticket by writing the held state directly.
    let user_id = UserId::new();
    let now = harness.clock.now();
    for chunk in tickets.chunks(MAX_WRITE_BATCH) {
        let mut batch = WriteBatch::new();
        for ticket in chunk {
            let mut doc = ticket.clone();
            doc.place_hold(user_id, now, chrono::Duration::minutes(20))
                .unwrap();
            batch.push(Write::PutTicket(doc));
        }
        harness.store.commit(batch).await.unwrap();
    }
    harness.clock.advance(chrono::Duration::minutes(21));

    // First commit of the sweep fails; the second batch must still land.
    harness.store.fail_next_commits(1);
    let sweeper = harness.sweeper();
    let report = sweeper.run_once().await.unwrap();
    assert_eq!(report.matched, over_limit);
    assert_eq!(report.failed_batches, 1);
    assert_eq!(report.released, over_limit - MAX_WRITE_BATCH);

    // The skipped batch is picked up by the next cycle.
    let report = sweeper.run_once().await.unwrap();
    assert_eq!(report.matched, MAX_WRITE_BATCH);
    assert_eq!(report.released, MAX_WRITE_BATCH);
    assert_eq!(report.failed_batches, 0);

    let remaining = harness.store.expired_holds(harness.clock.now()).await.unwrap();
    assert!(remaining.is_empty());
}
