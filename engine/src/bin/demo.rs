//! End-to-end demo of the engine against the in-memory store and queue.
//!
//! Creates a user and an event, places a hold, buys a ticket through the
//! gateway → queue → fulfillment pipeline, inspects the inventory, cancels
//! the purchase, and shuts everything down.

use std::sync::Arc;
use ticketline_core::environment::{Clock, SystemClock};
use ticketline_core::{EngineError, Money};
use ticketline_engine::{
    CancelService, Directory, EngineConfig, ExpirySweeper, FulfillmentConsumer,
    FulfillmentProcessor, HoldManager, NewEvent, NewUser, PurchaseGateway, PurchaseRequest,
};
use ticketline_memory::{MemoryQueue, MemoryStore};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "ticketline_engine=info,ticketline_memory=info,ticketline_demo=info".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting ticketline demo");

    let config = EngineConfig::from_env();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new(clock.clone()));

    let directory = Directory::new(store.clone());
    let holds = HoldManager::new(
        store.clone(),
        clock.clone(),
        config.hold_ttl(),
        config.retry_policy(),
    );
    let gateway = PurchaseGateway::new(queue.clone());
    let cancels = CancelService::new(store.clone(), clock.clone(), config.retry_policy());

    // Background services with a shared shutdown channel.
    let (shutdown, _) = broadcast::channel(1);
    let sweeper = Arc::new(ExpirySweeper::new(
        store.clone(),
        clock.clone(),
        config.sweep_interval(),
    ));
    let sweeper_handle = sweeper.spawn(shutdown.subscribe());
    let processor = Arc::new(FulfillmentProcessor::new(
        store.clone(),
        clock.clone(),
        config.max_intent_age(),
        config.retry_policy(),
    ));
    let consumer_handle = FulfillmentConsumer::new(
        "fulfillment-1",
        queue.clone(),
        processor,
        config.consumer_retry_delay(),
    )
    .spawn(shutdown.subscribe());

    // Seed a user and an event with a small ticket pool.
    let user = directory
        .create_user(NewUser {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
        })
        .await?;
    let event = directory
        .create_event(NewEvent {
            name: "Analytical Engine Live".into(),
            description: "One night only".into(),
            start_time: clock.now() + chrono::Duration::days(30),
            end_time: clock.now() + chrono::Duration::days(30) + chrono::Duration::hours(3),
            ticket_count: 5,
            ticket_price: Money::from_cents(2500),
        })
        .await?;

    let (_, tickets) = directory.get_event_with_tickets(event.id).await?;
    let held_ticket = tickets
        .first()
        .ok_or_else(|| EngineError::InvalidPayload("event has no tickets".into()))?
        .id;
    let bought_ticket = tickets
        .get(1)
        .ok_or_else(|| EngineError::InvalidPayload("event has one ticket".into()))?
        .id;

    // Hold one ticket, buy another through the async pipeline.
    let held = holds.place_hold(event.id, held_ticket, user.id).await?;
    info!(ticket_id = %held.id, expires_at = ?held.hold_expires_at, "ticket held");

    let receipt = gateway
        .submit(&PurchaseRequest {
            event_id: event.id.to_string(),
            ticket_id: bought_ticket.to_string(),
            user_id: user.id.to_string(),
        })
        .await?;
    info!(intent_id = %receipt.intent_id, "purchase submitted");

    // Give the consumer a moment to fulfill.
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;

    let (after_sale, tickets) = directory.get_event_with_tickets(event.id).await?;
    info!(
        available = after_sale.available_tickets,
        statuses = ?tickets.iter().map(|t| t.status).collect::<Vec<_>>(),
        "inventory after sale"
    );

    let cancelled = cancels.cancel(user.id, event.id, bought_ticket).await?;
    info!(purchase_id = %cancelled.id, "purchase cancelled");

    let (after_cancel, _) = directory.get_event_with_tickets(event.id).await?;
    info!(available = after_cancel.available_tickets, "inventory after cancellation");

    // Shut the background services down.
    let _ = shutdown.send(());
    sweeper_handle.await?;
    consumer_handle.await?;

    info!("demo complete");
    Ok(())
}
