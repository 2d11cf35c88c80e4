//! Persistence boundary for the catalog, the user directory and both ledgers.
//!
//! The store owns the unique slot index: a `(stadium, date, time)` triple may be
//! claimed by one booking or one non-cancelled friendly match. Inserts that would
//! violate it fail atomically with [`StoreError::Occupied`], so the ledgers never
//! depend on their own read-then-write check for correctness.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::error::Error;
use crate::models::{
    Booking, FriendlyMatch, Period, Sport, Stadium, StorageConfig, TimeSlot, User,
};

pub use memory::MemoryStore;

/// Open the configured store: snapshot-backed when a path is set, otherwise
/// purely in memory.
pub fn open(config: &StorageConfig) -> StoreResult<Arc<dyn Store>> {
    let store = match &config.snapshot {
        Some(path) => MemoryStore::open(path)?,
        None => MemoryStore::new(),
    };
    Ok(Arc::new(store))
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The unit of exclusivity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub stadium_id: String,
    pub date: NaiveDate,
    /// Normalised `HH:MM`.
    pub time: String,
}

impl SlotKey {
    pub fn new(stadium_id: impl Into<String>, date: NaiveDate, time: impl Into<String>) -> Self {
        Self {
            stadium_id: stadium_id.into(),
            date,
            time: time.into(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} {}", self.stadium_id, self.date, self.time)
    }
}

/// Entity currently claiming a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Holder {
    Booking(String),
    Match(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("slot {slot} is held by {holder:?}")]
    Occupied { slot: SlotKey, holder: Holder },

    #[error("time slot {0} already exists")]
    DuplicateTime(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("snapshot i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding: {0}")]
    Json(#[from] serde_json::Error),

    /// A [`MatchEdit`] refused the change; nothing was written.
    #[error(transparent)]
    Rejected(Error),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Occupied { .. } => Error::AlreadyBooked,
            StoreError::DuplicateTime(time) => Error::DuplicateTime(time),
            StoreError::NotFound { kind, id } => Error::NotFound { kind, id },
            StoreError::Rejected(inner) => inner,
            other @ (StoreError::Io(_) | StoreError::Json(_)) => Error::Upstream(other.to_string()),
        }
    }
}

/// AND-combined equality predicates over bookings.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub user_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub stadium_id: Option<String>,
}

impl BookingFilter {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        self.user_id.as_ref().map_or(true, |u| *u == booking.user_id)
            && self.date.map_or(true, |d| d == booking.date)
            && self
                .stadium_id
                .as_ref()
                .map_or(true, |s| *s == booking.stadium_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookingPatch {
    pub user_id: Option<String>,
    pub stadium_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub time_slot_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StadiumPatch {
    pub name: Option<String>,
    pub sport_id: Option<Sport>,
    pub capacity: Option<u32>,
    pub enabled: Option<bool>,
    pub location: Option<String>,
    pub facilities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct TimeSlotPatch {
    pub enabled: Option<bool>,
    pub period: Option<Period>,
    pub duration_minutes: Option<u32>,
}

/// Mutation applied to a match while the store holds it exclusively.
pub type MatchEdit = Box<dyn FnOnce(&mut FriendlyMatch) -> Result<(), Error> + Send>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn stadiums(&self) -> StoreResult<Vec<Stadium>>;
    async fn stadium(&self, id: &str) -> StoreResult<Option<Stadium>>;
    async fn insert_stadium(&self, stadium: Stadium) -> StoreResult<Stadium>;
    async fn update_stadium(&self, id: &str, patch: StadiumPatch) -> StoreResult<Stadium>;
    async fn delete_stadium(&self, id: &str) -> StoreResult<bool>;

    async fn time_slots(&self) -> StoreResult<Vec<TimeSlot>>;
    async fn time_slot(&self, id: &str) -> StoreResult<Option<TimeSlot>>;
    /// Fails with [`StoreError::DuplicateTime`] when another slot has the same time.
    async fn insert_time_slot(&self, slot: TimeSlot) -> StoreResult<TimeSlot>;
    async fn update_time_slot(&self, id: &str, patch: TimeSlotPatch) -> StoreResult<TimeSlot>;
    async fn delete_time_slot(&self, id: &str) -> StoreResult<bool>;

    async fn users(&self) -> StoreResult<Vec<User>>;
    async fn user(&self, id: &str) -> StoreResult<Option<User>>;
    async fn upsert_user(&self, user: User) -> StoreResult<()>;

    async fn booking(&self, id: &str) -> StoreResult<Option<Booking>>;
    async fn bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>>;
    async fn booking_at(&self, slot: &SlotKey) -> StoreResult<Option<Booking>>;
    /// Claims the booking's slot atomically. The time is resolved from its time slot
    /// and stored on the booking, so the claim outlives the time slot.
    async fn insert_booking(&self, booking: Booking) -> StoreResult<Booking>;
    /// Admin override: moves the booking even onto an occupied slot.
    async fn update_booking(&self, id: &str, patch: BookingPatch) -> StoreResult<Booking>;
    async fn delete_booking(&self, id: &str) -> StoreResult<bool>;
    async fn delete_bookings_before(&self, date: NaiveDate) -> StoreResult<usize>;

    async fn friendly_match(&self, id: &str) -> StoreResult<Option<FriendlyMatch>>;
    async fn friendly_matches(&self, host_id: Option<&str>) -> StoreResult<Vec<FriendlyMatch>>;
    async fn active_match_at(&self, slot: &SlotKey) -> StoreResult<Option<FriendlyMatch>>;
    async fn insert_match(&self, friendly: FriendlyMatch) -> StoreResult<FriendlyMatch>;
    /// Applies `edit` atomically; a cancelled result releases the slot.
    async fn modify_match(&self, id: &str, edit: MatchEdit) -> StoreResult<FriendlyMatch>;
    async fn delete_match(&self, id: &str) -> StoreResult<bool>;
}
