//! The ticket state machine.
//!
//! ```text
//!              place_hold                release_hold (expired)
//!  Available ─────────────▶ Onhold ───────────────────────▶ Available
//!      │                                                        ▲
//!      │ sell                                     release_sold  │
//!      └──────────────────▶ Sold ───────────────────────────────┘
//! ```
//!
//! A hold is an advisory reservation, not a sale prerequisite: `sell` races
//! directly against `Available`. No other transitions are valid; an attempt
//! from any other observed state fails with the matching guard error.
//!
//! The record keeps the persisted hold fields (`hold_status`,
//! `hold_expires_at`, `holding_user_id`) alongside `status`. Invariant:
//! `hold_status == true` and `hold_expires_at != None` iff
//! `status == Onhold`. Every transition method maintains it; callers never
//! touch the fields directly.

use crate::error::EngineError;
use crate::types::{EventId, Money, TicketId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    /// In the pool, sellable and holdable.
    Available,
    /// Reserved by a user until the hold expires.
    Onhold,
    /// Sold; an `Active` purchase record exists for it.
    Sold,
}

/// A ticket document: `events/{eventId}/tickets/{ticketId}`.
///
/// Created `Available` when its event is created; never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Ticket identifier.
    pub id: TicketId,
    /// The owning event.
    pub event_id: EventId,
    /// Unit price.
    pub price: Money,
    /// Current lifecycle status.
    pub status: TicketStatus,
    /// Whether a hold is recorded on this ticket.
    pub hold_status: bool,
    /// When the recorded hold lapses.
    pub hold_expires_at: Option<DateTime<Utc>>,
    /// Who placed the recorded hold.
    pub holding_user_id: Option<UserId>,
}

impl TicketRecord {
    /// Creates a fresh `Available` ticket for an event.
    #[must_use]
    pub const fn new(id: TicketId, event_id: EventId, price: Money) -> Self {
        Self {
            id,
            event_id,
            price,
            status: TicketStatus::Available,
            hold_status: false,
            hold_expires_at: None,
            holding_user_id: None,
        }
    }

    /// Whether the ticket carries a hold that has not yet lapsed at `now`.
    #[must_use]
    pub fn has_active_hold(&self, now: DateTime<Utc>) -> bool {
        self.hold_status && self.hold_expires_at.is_some_and(|expires| expires >= now)
    }

    /// Checks the hold-field invariant.
    ///
    /// `hold_status`, `hold_expires_at` and `holding_user_id` are set iff the
    /// status is `Onhold`.
    #[must_use]
    pub const fn hold_fields_consistent(&self) -> bool {
        let on_hold = matches!(self.status, TicketStatus::Onhold);
        on_hold
            == (self.hold_status
                && self.hold_expires_at.is_some()
                && self.holding_user_id.is_some())
            && (on_hold || (!self.hold_status && self.hold_expires_at.is_none()))
    }

    /// `Available → Onhold` (or stale-hold override).
    ///
    /// Allowed when the ticket is `Available`, or `Onhold` with a hold that
    /// already lapsed before `now` — a stale hold the sweeper has not yet
    /// reclaimed is overridable by the next caller.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotAvailable`] when the ticket is `Sold` or carries an
    /// unexpired hold.
    pub fn place_hold(
        &mut self,
        user_id: UserId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), EngineError> {
        let holdable = match self.status {
            TicketStatus::Available => true,
            TicketStatus::Onhold => !self.has_active_hold(now),
            TicketStatus::Sold => false,
        };
        if !holdable {
            return Err(EngineError::NotAvailable(self.id));
        }

        self.status = TicketStatus::Onhold;
        self.hold_status = true;
        self.hold_expires_at = Some(now + ttl);
        self.holding_user_id = Some(user_id);
        Ok(())
    }

    /// `Onhold → Available`, unconditionally clearing the hold fields.
    ///
    /// The expiry guard lives in the sweeper's query; once a ticket is
    /// selected for release the reset itself is unconditional.
    pub const fn release_hold(&mut self) {
        self.status = TicketStatus::Available;
        self.hold_status = false;
        self.hold_expires_at = None;
        self.holding_user_id = None;
    }

    /// `Available → Sold`.
    ///
    /// # Errors
    ///
    /// [`EngineError::TicketNotAvailable`] when the observed status is not
    /// `Available`.
    pub const fn sell(&mut self) -> Result<(), EngineError> {
        match self.status {
            TicketStatus::Available => {
                self.status = TicketStatus::Sold;
                Ok(())
            }
            TicketStatus::Onhold | TicketStatus::Sold => {
                Err(EngineError::TicketNotAvailable(self.id))
            }
        }
    }

    /// `Sold → Available` (cancellation).
    ///
    /// The ticket re-enters the pool as plain `Available`, immediately
    /// purchasable or holdable by anyone; no hold state is restored.
    ///
    /// # Errors
    ///
    /// [`EngineError::TicketNotSold`] when the observed status is not `Sold`.
    pub const fn release_sold(&mut self) -> Result<(), EngineError> {
        match self.status {
            TicketStatus::Sold => {
                self.status = TicketStatus::Available;
                Ok(())
            }
            TicketStatus::Available | TicketStatus::Onhold => {
                Err(EngineError::TicketNotSold(self.id))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn ticket() -> TicketRecord {
        TicketRecord::new(TicketId::new(), EventId::new(), Money::from_cents(2500))
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap()
    }

    fn ttl() -> Duration {
        Duration::minutes(20)
    }

    #[test]
    fn new_ticket_is_available_and_consistent() {
        let t = ticket();
        assert_eq!(t.status, TicketStatus::Available);
        assert!(!t.hold_status);
        assert!(t.hold_fields_consistent());
    }

    #[test]
    fn hold_sets_all_fields() {
        let mut t = ticket();
        let user = UserId::new();
        t.place_hold(user, at(0), ttl()).unwrap();

        assert_eq!(t.status, TicketStatus::Onhold);
        assert!(t.hold_status);
        assert_eq!(t.hold_expires_at, Some(at(20)));
        assert_eq!(t.holding_user_id, Some(user));
        assert!(t.hold_fields_consistent());
    }

    #[test]
    fn unexpired_hold_blocks_second_hold() {
        let mut t = ticket();
        t.place_hold(UserId::new(), at(0), ttl()).unwrap();

        let err = t.place_hold(UserId::new(), at(10), ttl()).unwrap_err();
        assert!(matches!(err, EngineError::NotAvailable(_)));
    }

    #[test]
    fn stale_hold_is_overridable() {
        let mut t = ticket();
        let first = UserId::new();
        let second = UserId::new();
        t.place_hold(first, at(0), ttl()).unwrap();

        // 21 minutes later the first hold has lapsed.
        t.place_hold(second, at(21), ttl()).unwrap();
        assert_eq!(t.holding_user_id, Some(second));
        assert_eq!(t.hold_expires_at, Some(at(41)));
    }

    #[test]
    fn hold_expiring_exactly_now_is_still_active() {
        let mut t = ticket();
        t.place_hold(UserId::new(), at(0), ttl()).unwrap();
        assert!(t.has_active_hold(at(20)));
        assert!(!t.has_active_hold(at(21)));
    }

    #[test]
    fn sell_requires_available() {
        let mut t = ticket();
        t.sell().unwrap();
        assert_eq!(t.status, TicketStatus::Sold);

        let err = t.sell().unwrap_err();
        assert!(matches!(err, EngineError::TicketNotAvailable(_)));
    }

    #[test]
    fn held_ticket_cannot_be_sold() {
        let mut t = ticket();
        t.place_hold(UserId::new(), at(0), ttl()).unwrap();
        assert!(matches!(
            t.sell(),
            Err(EngineError::TicketNotAvailable(_))
        ));
    }

    #[test]
    fn sold_ticket_cannot_be_held() {
        let mut t = ticket();
        t.sell().unwrap();
        assert!(matches!(
            t.place_hold(UserId::new(), at(0), ttl()),
            Err(EngineError::NotAvailable(_))
        ));
    }

    #[test]
    fn release_hold_resets_everything() {
        let mut t = ticket();
        t.place_hold(UserId::new(), at(0), ttl()).unwrap();
        t.release_hold();

        assert_eq!(t.status, TicketStatus::Available);
        assert!(!t.hold_status);
        assert_eq!(t.hold_expires_at, None);
        assert_eq!(t.holding_user_id, None);
        assert!(t.hold_fields_consistent());
    }

    #[test]
    fn release_sold_only_from_sold() {
        let mut t = ticket();
        assert!(matches!(
            t.release_sold(),
            Err(EngineError::TicketNotSold(_))
        ));

        t.sell().unwrap();
        t.release_sold().unwrap();
        assert_eq!(t.status, TicketStatus::Available);

        // Cancelled ticket is immediately holdable again.
        t.place_hold(UserId::new(), at(0), ttl()).unwrap();
        assert!(t.hold_fields_consistent());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Hold(u32),
        ReleaseHold,
        Sell,
        ReleaseSold,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..120).prop_map(Op::Hold),
            Just(Op::ReleaseHold),
            Just(Op::Sell),
            Just(Op::ReleaseSold),
        ]
    }

    proptest! {
        /// Any interleaving of transition attempts preserves the hold-field
        /// invariant; failed attempts leave the record untouched.
        #[test]
        fn hold_fields_stay_consistent(ops in prop::collection::vec(op_strategy(), 1..64)) {
            let mut t = ticket();
            for op in ops {
                let before = t.clone();
                let result = match op {
                    Op::Hold(minute) => t.place_hold(UserId::new(), at(minute % 60), ttl()),
                    Op::ReleaseHold => {
                        t.release_hold();
                        Ok(())
                    }
                    Op::Sell => t.sell(),
                    Op::ReleaseSold => t.release_sold(),
                };
                prop_assert!(t.hold_fields_consistent());
                if result.is_err() {
                    prop_assert_eq!(&t, &before);
                }
            }
        }
    }
}
