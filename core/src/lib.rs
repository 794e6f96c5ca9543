//! # Ticketline Core
//!
//! Domain model and external contracts for the ticket inventory and
//! purchase transaction engine.
//!
//! This crate defines:
//!
//! - **Domain types**: events, tickets, users, purchases, typed identifiers
//! - **Ticket state machine**: `Available → Onhold → Available → Sold → Available`,
//!   with every transition guarded and expressed as a fallible method
//! - **Error taxonomy**: terminal business-rule failures vs. transient store
//!   failures, so callers can decide what to retry
//! - **Store contract**: a transactional document store with versioned reads
//!   and preconditioned write batches (optimistic concurrency)
//! - **Queue contract**: an at-least-once purchase-intent queue
//! - **Environment**: the `Clock` trait for injectable time
//!
//! # Architecture Principles
//!
//! - All inventory mutations go through a single atomic commit whose
//!   preconditions capture the versions of every document read beforehand.
//!   The store aborts the commit if any read document changed concurrently;
//!   the caller re-runs the whole transaction.
//! - No component holds an in-process lock across a store call. Correctness
//!   depends entirely on the store's commit-time precondition checks.
//! - Dependencies (store, queue, clock) are injected as `Arc<dyn Trait>`,
//!   enabling test doubles and avoiding global mutable state.

pub use chrono::{DateTime, Utc};

pub mod environment;
pub mod error;
pub mod queue;
pub mod store;
pub mod ticket;
pub mod types;

pub use environment::{Clock, SystemClock};
pub use error::EngineError;
pub use queue::{IntentEnvelope, IntentQueue, IntentStream, MessageId, PurchaseIntent, QueueError};
pub use store::{Precondition, StoreError, TicketStore, Version, Versioned, Write, WriteBatch};
pub use ticket::{TicketRecord, TicketStatus};
pub use types::{
    EventId, EventRecord, IntentId, Money, PurchaseId, PurchaseRecord, PurchaseStatus, TicketId,
    UserId, UserRecord,
};
