//! Background release of lapsed holds.
//!
//! The sweeper periodically queries for tickets whose hold expiry has passed
//! and resets them to `Available` in atomic batches of at most
//! [`MAX_WRITE_BATCH`] writes. Each reset is preconditioned on the ticket
//! version the query observed, so a ticket that was purchased or re-held
//! mid-sweep fails its batch rather than being clobbered; the failed batch is
//! simply left for the next cycle.

use std::sync::Arc;
use ticketline_core::store::{MAX_WRITE_BATCH, Precondition, TicketStore, Write, WriteBatch};
use ticketline_core::{Clock, EngineError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Outcome of one sweep cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Tickets the expiry query matched.
    pub matched: usize,
    /// Tickets actually reset to `Available`.
    pub released: usize,
    /// Batches skipped because their commit failed.
    pub failed_batches: usize,
}

/// Periodic task that returns lapsed holds to the pool.
pub struct ExpirySweeper {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    interval: std::time::Duration,
}

impl ExpirySweeper {
    /// Creates a sweeper that runs every `interval`.
    pub fn new(
        store: Arc<dyn TicketStore>,
        clock: Arc<dyn Clock>,
        interval: std::time::Duration,
    ) -> Self {
        Self {
            store,
            clock,
            interval,
        }
    }

    /// Runs one sweep cycle.
    ///
    /// Batches are isolated: a failed commit skips its batch and moves on, so
    /// one contended ticket cannot block the release of hundreds of others.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] when the expiry query itself fails. Commit
    /// failures are absorbed into the report instead.
    pub async fn run_once(&self) -> Result<SweepReport, EngineError> {
        let now = self.clock.now();
        let expired = self.store.expired_holds(now).await?;

        let mut report = SweepReport {
            matched: expired.len(),
            ..SweepReport::default()
        };

        for chunk in expired.chunks(MAX_WRITE_BATCH) {
            let mut batch = WriteBatch::new();
            for ticket in chunk {
                let mut doc = ticket.doc.clone();
                doc.release_hold();
                batch
                    .require(Precondition::TicketVersion(doc.event_id, doc.id, ticket.version))
                    .push(Write::PutTicket(doc));
            }

            match self.store.commit(batch).await {
                Ok(()) => report.released += chunk.len(),
                Err(err) => {
                    report.failed_batches += 1;
                    warn!(
                        error = %err,
                        batch_size = chunk.len(),
                        "sweep batch failed, leaving it for the next cycle"
                    );
                }
            }
        }

        if report.matched > 0 {
            info!(
                matched = report.matched,
                released = report.released,
                failed_batches = report.failed_batches,
                "expiry sweep complete"
            );
        }
        Ok(report)
    }

    /// Spawns the sweep loop, running until the shutdown signal fires.
    pub fn spawn(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "expiry sweeper started");

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of `interval` fires immediately; consume it so
            // the first sweep happens one full interval after startup.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.run_once().await {
                            error!(error = %err, "expiry sweep failed");
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("expiry sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }
}
