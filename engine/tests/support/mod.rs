//! Shared harness for engine integration tests: in-memory store and queue,
//! a manual clock, and pre-wired services.
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;
use ticketline_core::environment::Clock;
use ticketline_core::queue::{IntentEnvelope, MessageId, PurchaseIntent};
use ticketline_core::store::TicketStore;
use ticketline_core::ticket::TicketRecord;
use ticketline_core::types::{EventRecord, IntentId, Money, UserRecord};
use ticketline_engine::{
    CancelService, Directory, EngineConfig, ExpirySweeper, FulfillmentProcessor, HoldManager,
    PurchaseGateway, RetryPolicy,
};
use ticketline_memory::{ManualClock, MemoryQueue, MemoryStore};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub queue: Arc<MemoryQueue>,
    pub config: EngineConfig,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new());
        let queue_clock: Arc<dyn Clock> = clock.clone();
        let queue = Arc::new(MemoryQueue::new(queue_clock));
        Self {
            store,
            clock,
            queue,
            config: EngineConfig::default(),
        }
    }

    /// Tight backoff so conflict-retry tests stay fast.
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.transaction_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            multiplier: 2.0,
        }
    }

    pub fn directory(&self) -> Directory {
        Directory::new(self.store.clone())
    }

    pub fn holds(&self) -> HoldManager {
        HoldManager::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.hold_ttl(),
            self.retry(),
        )
    }

    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.sweep_interval(),
        )
    }

    pub fn gateway(&self) -> PurchaseGateway {
        PurchaseGateway::new(self.queue.clone())
    }

    pub fn processor(&self) -> FulfillmentProcessor {
        FulfillmentProcessor::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.max_intent_age(),
            self.retry(),
        )
    }

    pub fn cancels(&self) -> CancelService {
        CancelService::new(self.store.clone(), self.clock.clone(), self.retry())
    }

    pub async fn seed_user(&self) -> UserRecord {
        self.directory()
            .create_user(ticketline_engine::NewUser {
                name: "Test User".into(),
                email: "user@example.com".into(),
            })
            .await
            .unwrap()
    }

    pub async fn seed_event(&self, ticket_count: u32) -> (EventRecord, Vec<TicketRecord>) {
        let start = self.clock.now() + chrono::Duration::days(7);
        let event = self
            .directory()
            .create_event(ticketline_engine::NewEvent {
                name: "Test Event".into(),
                description: "seeded".into(),
                start_time: start,
                end_time: start + chrono::Duration::hours(2),
                ticket_count,
                ticket_price: Money::from_cents(1500),
            })
            .await
            .unwrap();
        let tickets = self
            .store
            .list_tickets(event.id)
            .await
            .unwrap()
            .into_iter()
            .map(|ticket| ticket.doc)
            .collect();
        (event, tickets)
    }

    /// Builds a delivered envelope for an intent, stamped at the current
    /// clock instant, without going through the queue.
    pub fn envelope_for(&self, intent: &PurchaseIntent) -> IntentEnvelope {
        IntentEnvelope {
            message_id: MessageId::new(),
            published_at: self.clock.now(),
            payload: intent.to_payload().unwrap(),
        }
    }

    pub fn intent(
        &self,
        event: &EventRecord,
        ticket: &TicketRecord,
        user: &UserRecord,
    ) -> PurchaseIntent {
        PurchaseIntent {
            intent_id: IntentId::new(),
            event_id: event.id,
            ticket_id: ticket.id,
            user_id: user.id,
        }
    }
}
