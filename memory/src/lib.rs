//! # Ticketline Memory
//!
//! In-memory implementations of the engine's external contracts:
//!
//! - [`MemoryStore`] — a versioned document store with preconditioned,
//!   size-bounded atomic write batches
//! - [`MemoryQueue`] — a single-consumer, at-least-once purchase-intent
//!   queue with explicit redelivery support
//! - [`ManualClock`] — a clock that only moves when told to
//!
//! These back the demo binary and every integration test. They implement
//! the contracts faithfully enough to exercise the engine's concurrency
//! behaviour: commits really do conflict under contention, batches really
//! are rejected past the 500-write limit, and the queue really can deliver
//! the same envelope twice.

pub mod clock;
pub mod queue;
pub mod store;

pub use clock::ManualClock;
pub use queue::MemoryQueue;
pub use store::MemoryStore;
