//! Reservation allocator: catalog, both ledgers, the conflict checker they share
//! and the expiry sweeper.

pub mod bookings;
pub mod catalog;
pub mod conflict;
pub mod matches;
pub mod sweeper;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{Role, Sport, Stadium, User};
use crate::store::{Store, StoreResult};

pub use bookings::BookingLedger;
pub use catalog::Catalog;
pub use conflict::{Availability, ConflictChecker};
pub use matches::MatchLedger;
pub use sweeper::ExpirySweeper;

/// Every allocator component wired to one store.
#[derive(Clone)]
pub struct Allocator {
    pub catalog: Catalog,
    pub conflicts: ConflictChecker,
    pub bookings: BookingLedger,
    pub matches: MatchLedger,
    store: Arc<dyn Store>,
}

impl Allocator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let conflicts = ConflictChecker::new(Arc::clone(&store));
        Self {
            catalog: Catalog::new(Arc::clone(&store)),
            bookings: BookingLedger::new(Arc::clone(&store), conflicts.clone()),
            matches: MatchLedger::new(Arc::clone(&store), conflicts.clone()),
            conflicts,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}

/// Resolve one enrichment sub-read. Misses and failures degrade to `None` so a
/// single broken reference never fails the list it belongs to.
pub(crate) fn settle<T>(kind: &str, id: &str, res: StoreResult<Option<T>>) -> Option<T> {
    match res {
        Ok(Some(v)) => Some(v),
        Ok(None) => {
            debug!("Enrichment: {} {} no longer exists", kind, id);
            None
        }
        Err(e) => {
            warn!("Enrichment: {} {} lookup failed: {}", kind, id, e);
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StadiumSummary {
    pub id: String,
    pub name: String,
    pub sport_id: Sport,
    pub capacity: u32,
}

impl From<Stadium> for StadiumSummary {
    fn from(s: Stadium) -> Self {
        Self {
            id: s.id,
            name: s.name,
            sport_id: s.sport_id,
            capacity: s.capacity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub club_name: String,
    pub student_id: String,
}

impl From<User> for UserSummary {
    fn from(u: User) -> Self {
        Self {
            name: u.display_name().to_string(),
            id: u.id,
            username: u.username,
            full_name: u.full_name,
            email: u.email,
            role: u.role,
            club_name: u.club_name,
            student_id: u.student_id,
        }
    }
}
