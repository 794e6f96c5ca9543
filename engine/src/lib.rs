//! # Ticketline Engine
//!
//! The services that make up the ticket inventory and purchase transaction
//! engine:
//!
//! - [`Directory`] — creates events (minting their ticket pools in bounded
//!   atomic batches) and users, and serves reads
//! - [`HoldManager`] — places time-limited holds on tickets
//! - [`ExpirySweeper`] — periodically returns lapsed holds to the pool
//! - [`PurchaseGateway`] — validates purchase requests and publishes intents
//! - [`FulfillmentProcessor`] / [`FulfillmentConsumer`] — execute intents
//!   from the at-least-once queue, idempotently
//! - [`CancelService`] — reverses active purchases synchronously
//!
//! Every mutation is an optimistic transaction: read versioned documents,
//! decide in memory, commit with version preconditions, and re-run on
//! conflict via [`retry::retry_transient`].

pub mod cancel;
pub mod config;
pub mod directory;
pub mod fulfillment;
pub mod gateway;
pub mod hold;
pub mod retry;
pub mod sweeper;

pub use cancel::CancelService;
pub use config::EngineConfig;
pub use directory::{Directory, EventPage, NewEvent, NewUser};
pub use fulfillment::{FulfillmentConsumer, FulfillmentOutcome, FulfillmentProcessor};
pub use gateway::{PurchaseGateway, PurchaseReceipt, PurchaseRequest};
pub use hold::HoldManager;
pub use retry::RetryPolicy;
pub use sweeper::{ExpirySweeper, SweepReport};
