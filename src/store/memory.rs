use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use super::{
    BookingFilter, BookingPatch, Holder, MatchEdit, SlotKey, StadiumPatch, Store, StoreError,
    StoreResult, TimeSlotPatch,
};
use crate::models::{Booking, FriendlyMatch, Stadium, TimeSlot, User};

/// Snapshot document layout. Every record is strictly typed; a record missing a
/// required field fails the whole load.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tables {
    #[serde(default)]
    stadiums: BTreeMap<String, Stadium>,
    #[serde(default)]
    time_slots: BTreeMap<String, TimeSlot>,
    #[serde(default)]
    users: BTreeMap<String, User>,
    #[serde(default)]
    bookings: BTreeMap<String, Booking>,
    #[serde(default)]
    friendly_matches: BTreeMap<String, FriendlyMatch>,
}

impl Tables {
    fn slot_time(&self, time_slot_id: &str) -> Option<String> {
        self.time_slots.get(time_slot_id).map(|ts| ts.time.clone())
    }

    /// The booking's own time wins; snapshots written before bookings carried
    /// one fall back to the time slot.
    fn booking_slot(&self, booking: &Booking) -> Option<SlotKey> {
        let time = if booking.time.is_empty() {
            self.slot_time(&booking.time_slot_id)?
        } else {
            booking.time.clone()
        };
        Some(SlotKey::new(&booking.stadium_id, booking.date, time))
    }
}

fn match_slot(friendly: &FriendlyMatch) -> SlotKey {
    SlotKey::new(&friendly.stadium_id, friendly.date, &friendly.time)
}

/// Unique composite index over `(stadium, date, time)`.
///
/// Normally each slot has at most one holder. Admin overrides and legacy
/// snapshots may stack several; the first one is reported as the occupant.
#[derive(Debug, Default, Clone)]
struct SlotIndex {
    holders: HashMap<SlotKey, Vec<Holder>>,
    keys: HashMap<Holder, SlotKey>,
}

impl SlotIndex {
    fn occupant(&self, slot: &SlotKey) -> Option<&Holder> {
        self.holders.get(slot).and_then(|list| list.first())
    }

    fn find(&self, slot: &SlotKey, pred: impl Fn(&Holder) -> bool) -> Option<&Holder> {
        self.holders
            .get(slot)
            .and_then(|list| list.iter().find(|h| pred(h)))
    }

    fn claim(&mut self, slot: SlotKey, holder: Holder) -> StoreResult<()> {
        if let Some(existing) = self.occupant(&slot) {
            if *existing != holder {
                return Err(StoreError::Occupied {
                    slot,
                    holder: existing.clone(),
                });
            }
        }
        self.force(slot, holder);
        Ok(())
    }

    fn force(&mut self, slot: SlotKey, holder: Holder) {
        self.release(&holder);
        self.holders
            .entry(slot.clone())
            .or_default()
            .push(holder.clone());
        self.keys.insert(holder, slot);
    }

    fn release(&mut self, holder: &Holder) {
        if let Some(slot) = self.keys.remove(holder) {
            if let Some(list) = self.holders.get_mut(&slot) {
                list.retain(|h| h != holder);
                if list.is_empty() {
                    self.holders.remove(&slot);
                }
            }
        }
    }

    fn rebuild(tables: &Tables) -> Self {
        let mut index = Self::default();
        for booking in tables.bookings.values() {
            let Some(slot) = tables.booking_slot(booking) else {
                warn!(
                    "Snapshot: booking {} has no time and references missing time slot {}, not indexed",
                    booking.id, booking.time_slot_id
                );
                continue;
            };
            let holder = Holder::Booking(booking.id.clone());
            if let Err(e) = index.claim(slot.clone(), holder.clone()) {
                warn!("Snapshot: double allocation kept as-is: {}", e);
                index.force(slot, holder);
            }
        }
        for friendly in tables.friendly_matches.values() {
            if !friendly.status.holds_slot() {
                continue;
            }
            let slot = match_slot(friendly);
            let holder = Holder::Match(friendly.id.clone());
            if let Err(e) = index.claim(slot.clone(), holder.clone()) {
                warn!("Snapshot: double allocation kept as-is: {}", e);
                index.force(slot, holder);
            }
        }
        index
    }
}

struct Inner {
    tables: Tables,
    index: SlotIndex,
}

/// State before a mutation, restored when the snapshot cannot be written.
struct Backup {
    tables: Tables,
    index: SlotIndex,
}

/// In-process store. Every operation runs under one mutex, which is what makes
/// the slot index a real uniqueness constraint under concurrent requests.
///
/// With a snapshot configured each mutation rewrites the whole document before
/// the lock is released, so writes cost O(records). A failed write undoes the
/// mutation and surfaces as [`StoreError::Io`].
pub struct MemoryStore {
    inner: Mutex<Inner>,
    snapshot: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                tables: Tables::default(),
                index: SlotIndex::default(),
            }),
            snapshot: None,
        }
    }

    /// Load `path` if it exists and keep it updated after every mutation.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let tables: Tables = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Tables::default(),
            Err(e) => return Err(e.into()),
        };
        let index = SlotIndex::rebuild(&tables);
        info!(
            "Store: loaded {} stadiums, {} time slots, {} bookings, {} matches from {}",
            tables.stadiums.len(),
            tables.time_slots.len(),
            tables.bookings.len(),
            tables.friendly_matches.len(),
            path.display()
        );
        Ok(Self {
            inner: Mutex::new(Inner { tables, index }),
            snapshot: Some(path),
        })
    }

    async fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().await
    }

    /// Copy of the state to restore if the next [`commit`](Self::commit) fails.
    /// Purely in-memory stores cannot fail to commit and skip the copy.
    fn backup(&self, inner: &Inner) -> Option<Backup> {
        self.snapshot.as_ref().map(|_| Backup {
            tables: inner.tables.clone(),
            index: inner.index.clone(),
        })
    }

    async fn commit(&self, inner: &mut Inner, backup: Option<Backup>) -> StoreResult<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let result = match serde_json::to_string_pretty(&inner.tables) {
            Ok(json) => write_replace(path, &json).await.map_err(StoreError::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &result {
            error!("Failed to save store snapshot to {}: {}", path.display(), e);
            if let Some(backup) = backup {
                inner.tables = backup.tables;
                inner.index = backup.index;
            }
        }
        result
    }
}

async fn write_replace(path: &Path, contents: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(tmp, path).await
}

fn not_found(kind: &'static str, id: &str) -> StoreError {
    StoreError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn stadiums(&self) -> StoreResult<Vec<Stadium>> {
        Ok(self.lock().await.tables.stadiums.values().cloned().collect())
    }

    async fn stadium(&self, id: &str) -> StoreResult<Option<Stadium>> {
        Ok(self.lock().await.tables.stadiums.get(id).cloned())
    }

    async fn insert_stadium(&self, stadium: Stadium) -> StoreResult<Stadium> {
        let mut inner = self.lock().await;
        let backup = self.backup(&inner);
        inner
            .tables
            .stadiums
            .insert(stadium.id.clone(), stadium.clone());
        self.commit(&mut inner, backup).await?;
        Ok(stadium)
    }

    async fn update_stadium(&self, id: &str, patch: StadiumPatch) -> StoreResult<Stadium> {
        let mut inner = self.lock().await;
        let backup = self.backup(&inner);
        let stadium = inner
            .tables
            .stadiums
            .get_mut(id)
            .ok_or_else(|| not_found("Stadium", id))?;
        if let Some(name) = patch.name {
            stadium.name = name;
        }
        if let Some(sport) = patch.sport_id {
            stadium.sport_id = sport;
        }
        if let Some(capacity) = patch.capacity {
            stadium.capacity = capacity;
        }
        if let Some(enabled) = patch.enabled {
            stadium.enabled = enabled;
        }
        if let Some(location) = patch.location {
            stadium.location = Some(location);
        }
        if let Some(facilities) = patch.facilities {
            stadium.facilities = facilities;
        }
        stadium.updated_at = Utc::now();
        let updated = stadium.clone();
        self.commit(&mut inner, backup).await?;
        Ok(updated)
    }

    async fn delete_stadium(&self, id: &str) -> StoreResult<bool> {
        let mut inner = self.lock().await;
        let backup = self.backup(&inner);
        let removed = inner.tables.stadiums.remove(id).is_some();
        if removed {
            self.commit(&mut inner, backup).await?;
        }
        Ok(removed)
    }

    async fn time_slots(&self) -> StoreResult<Vec<TimeSlot>> {
        let mut slots: Vec<TimeSlot> = self
            .lock()
            .await
            .tables
            .time_slots
            .values()
            .cloned()
            .collect();
        slots.sort_by(|a, b| a.time.cmp(&b.time));
        Ok(slots)
    }

    async fn time_slot(&self, id: &str) -> StoreResult<Option<TimeSlot>> {
        Ok(self.lock().await.tables.time_slots.get(id).cloned())
    }

    async fn insert_time_slot(&self, slot: TimeSlot) -> StoreResult<TimeSlot> {
        let mut inner = self.lock().await;
        if inner
            .tables
            .time_slots
            .values()
            .any(|ts| ts.time == slot.time && ts.id != slot.id)
        {
            return Err(StoreError::DuplicateTime(slot.time));
        }
        let backup = self.backup(&inner);
        inner
            .tables
            .time_slots
            .insert(slot.id.clone(), slot.clone());
        self.commit(&mut inner, backup).await?;
        Ok(slot)
    }

    async fn update_time_slot(&self, id: &str, patch: TimeSlotPatch) -> StoreResult<TimeSlot> {
        let mut inner = self.lock().await;
        let backup = self.backup(&inner);
        let slot = inner
            .tables
            .time_slots
            .get_mut(id)
            .ok_or_else(|| not_found("Time slot", id))?;
        if let Some(enabled) = patch.enabled {
            slot.enabled = enabled;
        }
        if let Some(period) = patch.period {
            slot.period = period;
        }
        if let Some(minutes) = patch.duration_minutes {
            slot.duration_minutes = Some(minutes);
        }
        let updated = slot.clone();
        self.commit(&mut inner, backup).await?;
        Ok(updated)
    }

    async fn delete_time_slot(&self, id: &str) -> StoreResult<bool> {
        let mut inner = self.lock().await;
        let backup = self.backup(&inner);
        let removed = inner.tables.time_slots.remove(id).is_some();
        if removed {
            self.commit(&mut inner, backup).await?;
        }
        Ok(removed)
    }

    async fn users(&self) -> StoreResult<Vec<User>> {
        Ok(self.lock().await.tables.users.values().cloned().collect())
    }

    async fn user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().await.tables.users.get(id).cloned())
    }

    async fn upsert_user(&self, user: User) -> StoreResult<()> {
        let mut inner = self.lock().await;
        let backup = self.backup(&inner);
        inner.tables.users.insert(user.id.clone(), user);
        self.commit(&mut inner, backup).await
    }

    async fn booking(&self, id: &str) -> StoreResult<Option<Booking>> {
        Ok(self.lock().await.tables.bookings.get(id).cloned())
    }

    async fn bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        Ok(self
            .lock()
            .await
            .tables
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect())
    }

    async fn booking_at(&self, slot: &SlotKey) -> StoreResult<Option<Booking>> {
        let inner = self.lock().await;
        let found = inner
            .index
            .find(slot, |h| matches!(h, Holder::Booking(_)))
            .and_then(|h| match h {
                Holder::Booking(id) => inner.tables.bookings.get(id).cloned(),
                Holder::Match(_) => None,
            });
        Ok(found)
    }

    async fn insert_booking(&self, mut booking: Booking) -> StoreResult<Booking> {
        let mut guard = self.lock().await;
        let inner = &mut *guard;
        booking.time = inner
            .tables
            .slot_time(&booking.time_slot_id)
            .ok_or_else(|| not_found("Time slot", &booking.time_slot_id))?;
        let slot = SlotKey::new(&booking.stadium_id, booking.date, &booking.time);
        let backup = self.backup(inner);
        inner
            .index
            .claim(slot, Holder::Booking(booking.id.clone()))?;
        inner
            .tables
            .bookings
            .insert(booking.id.clone(), booking.clone());
        self.commit(inner, backup).await?;
        Ok(booking)
    }

    async fn update_booking(&self, id: &str, patch: BookingPatch) -> StoreResult<Booking> {
        let mut guard = self.lock().await;
        let inner = &mut *guard;
        let mut updated = inner
            .tables
            .bookings
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("Booking", id))?;
        if let Some(user_id) = patch.user_id {
            updated.user_id = user_id;
        }
        if let Some(stadium_id) = patch.stadium_id {
            updated.stadium_id = stadium_id;
        }
        if let Some(date) = patch.date {
            updated.date = date;
        }
        if let Some(time_slot_id) = patch.time_slot_id {
            updated.time_slot_id = time_slot_id;
            updated.time = String::new();
        }
        if updated.time.is_empty() {
            updated.time = inner
                .tables
                .slot_time(&updated.time_slot_id)
                .ok_or_else(|| not_found("Time slot", &updated.time_slot_id))?;
        }
        let slot = SlotKey::new(&updated.stadium_id, updated.date, &updated.time);
        updated.updated_at = Utc::now();

        let holder = Holder::Booking(id.to_string());
        if let Some(existing) = inner.index.occupant(&slot).filter(|h| *h != &holder) {
            warn!(
                "Admin override moves booking {} onto {} already held by {:?}",
                id, slot, existing
            );
        }
        let backup = self.backup(inner);
        inner.index.force(slot, holder);
        inner.tables.bookings.insert(id.to_string(), updated.clone());
        self.commit(inner, backup).await?;
        Ok(updated)
    }

    async fn delete_booking(&self, id: &str) -> StoreResult<bool> {
        let mut guard = self.lock().await;
        let inner = &mut *guard;
        let backup = self.backup(inner);
        let removed = inner.tables.bookings.remove(id).is_some();
        if removed {
            inner.index.release(&Holder::Booking(id.to_string()));
            self.commit(inner, backup).await?;
        }
        Ok(removed)
    }

    async fn delete_bookings_before(&self, date: NaiveDate) -> StoreResult<usize> {
        let mut guard = self.lock().await;
        let inner = &mut *guard;
        let expired: Vec<String> = inner
            .tables
            .bookings
            .values()
            .filter(|b| b.date < date)
            .map(|b| b.id.clone())
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }
        let backup = self.backup(inner);
        for id in &expired {
            inner.tables.bookings.remove(id);
            inner.index.release(&Holder::Booking(id.clone()));
        }
        self.commit(inner, backup).await?;
        Ok(expired.len())
    }

    async fn friendly_match(&self, id: &str) -> StoreResult<Option<FriendlyMatch>> {
        Ok(self.lock().await.tables.friendly_matches.get(id).cloned())
    }

    async fn friendly_matches(&self, host_id: Option<&str>) -> StoreResult<Vec<FriendlyMatch>> {
        Ok(self
            .lock()
            .await
            .tables
            .friendly_matches
            .values()
            .filter(|m| host_id.map_or(true, |h| m.host_id == h))
            .cloned()
            .collect())
    }

    async fn active_match_at(&self, slot: &SlotKey) -> StoreResult<Option<FriendlyMatch>> {
        let inner = self.lock().await;
        let found = inner
            .index
            .find(slot, |h| matches!(h, Holder::Match(_)))
            .and_then(|h| match h {
                Holder::Match(id) => inner.tables.friendly_matches.get(id).cloned(),
                Holder::Booking(_) => None,
            })
            .filter(|m| m.status.holds_slot());
        Ok(found)
    }

    async fn insert_match(&self, friendly: FriendlyMatch) -> StoreResult<FriendlyMatch> {
        let mut guard = self.lock().await;
        let inner = &mut *guard;
        let backup = self.backup(inner);
        if friendly.status.holds_slot() {
            inner
                .index
                .claim(match_slot(&friendly), Holder::Match(friendly.id.clone()))?;
        }
        inner
            .tables
            .friendly_matches
            .insert(friendly.id.clone(), friendly.clone());
        self.commit(inner, backup).await?;
        Ok(friendly)
    }

    async fn modify_match(&self, id: &str, edit: MatchEdit) -> StoreResult<FriendlyMatch> {
        let mut guard = self.lock().await;
        let inner = &mut *guard;
        let current = inner
            .tables
            .friendly_matches
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("Match", id))?;
        let mut next = current.clone();
        edit(&mut next).map_err(StoreError::Rejected)?;
        debug_assert!(
            next.roster_is_consistent(),
            "edit left match {id} with an inconsistent roster"
        );

        let backup = self.backup(inner);
        if current.status.holds_slot() && !next.status.holds_slot() {
            inner.index.release(&Holder::Match(id.to_string()));
        }
        inner
            .tables
            .friendly_matches
            .insert(id.to_string(), next.clone());
        self.commit(inner, backup).await?;
        Ok(next)
    }

    async fn delete_match(&self, id: &str) -> StoreResult<bool> {
        let mut guard = self.lock().await;
        let inner = &mut *guard;
        let backup = self.backup(inner);
        let removed = inner.tables.friendly_matches.remove(id).is_some();
        if removed {
            inner.index.release(&Holder::Match(id.to_string()));
            self.commit(inner, backup).await?;
        }
        Ok(removed)
    }
}
