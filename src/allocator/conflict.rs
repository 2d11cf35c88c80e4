use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::{Holder, SlotKey, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Ledger {
    Booking,
    FriendlyMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub ledger: Ledger,
    pub entity_id: String,
    pub stadium_name: String,
    pub slot_time: String,
    pub date: chrono::NaiveDate,
}

impl Conflict {
    /// Human-readable reason, phrased for the ledger that holds the slot.
    pub fn reason(&self) -> String {
        self.to_match_error().to_string()
    }

    /// The refusal a friendly-match creation reports for this conflict.
    pub fn to_match_error(&self) -> Error {
        let stadium = self.stadium_name.clone();
        let time = self.slot_time.clone();
        let date = self.date;
        match self.ledger {
            Ledger::Booking => Error::StadiumBooked {
                stadium,
                time,
                date,
            },
            Ledger::FriendlyMatch => Error::SlotTaken {
                stadium,
                time,
                date,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Availability {
    Available,
    Conflict(Conflict),
}

/// Read-only check of both ledgers for one slot.
///
/// The store's slot index is the write-side guarantee; this check exists so a
/// refusal can name who holds the slot before anything is written.
#[derive(Clone)]
pub struct ConflictChecker {
    store: Arc<dyn Store>,
}

impl ConflictChecker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn check(&self, slot: &SlotKey) -> Result<Availability> {
        let (booking, friendly) = tokio::try_join!(
            self.store.booking_at(slot),
            self.store.active_match_at(slot)
        )?;
        let holder = match (booking, friendly) {
            (Some(b), _) => Holder::Booking(b.id),
            (None, Some(m)) => Holder::Match(m.id),
            (None, None) => return Ok(Availability::Available),
        };
        Ok(Availability::Conflict(self.describe(slot, holder).await))
    }

    /// Build a [`Conflict`] for a holder reported by the store.
    pub async fn describe(&self, slot: &SlotKey, holder: Holder) -> Conflict {
        let stadium_name = match self.store.stadium(&slot.stadium_id).await {
            Ok(Some(s)) => s.name,
            _ => slot.stadium_id.clone(),
        };
        let (ledger, entity_id) = match holder {
            Holder::Booking(id) => (Ledger::Booking, id),
            Holder::Match(id) => (Ledger::FriendlyMatch, id),
        };
        Conflict {
            ledger,
            entity_id,
            stadium_name,
            slot_time: slot.time.clone(),
            date: slot.date,
        }
    }
}
