use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::conflict::{Availability, ConflictChecker};
use super::{settle, StadiumSummary, UserSummary};
use crate::error::{Error, Result};
use crate::models::{Booking, Period};
use crate::store::{BookingFilter, BookingPatch, SlotKey, Store, StoreError};
use crate::validation::{self, Checks};

/// Reservation request as received from a client.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub user_id: Option<String>,
    pub stadium_id: Option<String>,
    pub date: Option<String>,
    pub time_slot_id: Option<String>,
    /// Informational; the slot time comes from the time slot record.
    pub time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: String,
    pub stadium_id: String,
    pub date: NaiveDate,
    pub time_slot_id: String,
}

impl BookingRequest {
    pub fn validate(self) -> Result<NewBooking> {
        let mut checks = Checks::new();
        let user_id = checks.required("userId", self.user_id.as_deref(), "User ID is required");
        let stadium_id =
            checks.required("stadiumId", self.stadium_id.as_deref(), "Stadium ID is required");
        let time_slot_id = checks.required(
            "timeSlotId",
            self.time_slot_id.as_deref(),
            "Time slot ID is required",
        );
        let date = checks.date("date", self.date.as_deref());
        if self.time.is_some() {
            checks.time("time", self.time.as_deref());
        }
        checks.finish()?;
        match (user_id, stadium_id, date, time_slot_id) {
            (Some(user_id), Some(stadium_id), Some(date), Some(time_slot_id)) => Ok(NewBooking {
                user_id,
                stadium_id,
                date,
                time_slot_id,
            }),
            _ => Err(Error::Validation(vec!["Invalid data format".to_string()])),
        }
    }
}

/// Admin override of a booking's fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingUpdate {
    pub user_id: Option<String>,
    pub stadium_id: Option<String>,
    pub date: Option<String>,
    pub time_slot_id: Option<String>,
}

impl BookingUpdate {
    fn validate(self) -> Result<BookingPatch> {
        let mut checks = Checks::new();
        let date = match self.date.as_deref() {
            Some(d) => checks.date("date", Some(d)),
            None => None,
        };
        let mut non_empty = |field: &str, value: Option<String>| match value {
            Some(v) => checks.required(field, Some(v.as_str()), "must not be empty"),
            None => None,
        };
        let user_id = non_empty("userId", self.user_id);
        let stadium_id = non_empty("stadiumId", self.stadium_id);
        let time_slot_id = non_empty("timeSlotId", self.time_slot_id);
        checks.finish()?;
        Ok(BookingPatch {
            user_id,
            stadium_id,
            date,
            time_slot_id,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotSummary {
    pub time: String,
    pub period: Period,
}

/// Booking joined with catalog and user display data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub stadium: Option<StadiumSummary>,
    pub time_slot: Option<TimeSlotSummary>,
    pub user: Option<UserSummary>,
}

#[derive(Clone)]
pub struct BookingLedger {
    store: Arc<dyn Store>,
    conflicts: ConflictChecker,
}

impl BookingLedger {
    pub fn new(store: Arc<dyn Store>, conflicts: ConflictChecker) -> Self {
        Self { store, conflicts }
    }

    pub async fn create(&self, req: NewBooking) -> Result<Booking> {
        let (stadium, time_slot) = tokio::try_join!(
            self.store.stadium(&req.stadium_id),
            self.store.time_slot(&req.time_slot_id)
        )?;
        let stadium = stadium.ok_or_else(|| Error::not_found("Stadium", &req.stadium_id))?;
        let time_slot = time_slot.ok_or_else(|| Error::not_found("Time slot", &req.time_slot_id))?;
        if !stadium.enabled {
            return Err(Error::invalid("stadiumId", "Stadium is not available for booking"));
        }
        if !time_slot.enabled {
            return Err(Error::invalid("timeSlotId", "Time slot is not available for booking"));
        }

        let slot = SlotKey::new(&stadium.id, req.date, &time_slot.time);
        if let Availability::Conflict(conflict) = self.conflicts.check(&slot).await? {
            info!(
                "Booking refused for {} on {}: {}",
                req.user_id,
                slot,
                conflict.reason()
            );
            return Err(Error::AlreadyBooked);
        }

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            user_id: req.user_id,
            stadium_id: req.stadium_id,
            date: req.date,
            time_slot_id: req.time_slot_id,
            time: time_slot.time.clone(),
            created_at: now,
            updated_at: now,
        };
        match self.store.insert_booking(booking).await {
            Ok(booking) => {
                info!("Booked {} for {} ({})", slot, booking.user_id, booking.id);
                Ok(booking)
            }
            Err(StoreError::Occupied { holder, .. }) => {
                info!("Booking lost the race for {} to {:?}", slot, holder);
                Err(Error::AlreadyBooked)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A user's bookings, newest date first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<BookingView>> {
        self.list_all(BookingFilter::for_user(user_id)).await
    }

    pub async fn list_all(&self, filter: BookingFilter) -> Result<Vec<BookingView>> {
        let mut bookings = self.store.bookings(&filter).await?;
        bookings.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.created_at.cmp(&b.created_at)));
        Ok(join_all(bookings.into_iter().map(|b| self.enrich(b))).await)
    }

    async fn enrich(&self, booking: Booking) -> BookingView {
        let (stadium, time_slot, user) = tokio::join!(
            self.store.stadium(&booking.stadium_id),
            self.store.time_slot(&booking.time_slot_id),
            self.store.user(&booking.user_id),
        );
        BookingView {
            stadium: settle("stadium", &booking.stadium_id, stadium).map(Into::into),
            time_slot: settle("time slot", &booking.time_slot_id, time_slot).map(|ts| {
                TimeSlotSummary {
                    time: ts.time,
                    period: ts.period,
                }
            }),
            user: settle("user", &booking.user_id, user).map(Into::into),
            booking,
        }
    }

    /// Admin override. Exclusivity is not re-checked; the store logs when the
    /// new slot is already held.
    pub async fn update(&self, id: &str, update: BookingUpdate) -> Result<Booking> {
        let patch = update.validate()?;
        if let Some(stadium_id) = &patch.stadium_id {
            if self.store.stadium(stadium_id).await?.is_none() {
                return Err(Error::not_found("Stadium", stadium_id));
            }
        }
        let booking = self.store.update_booking(id, patch).await?;
        info!("Booking {} updated by admin", id);
        Ok(booking)
    }

    /// Cancel or remove. Deleting an unknown booking is a no-op; the flag
    /// reports whether anything was removed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.store.delete_booking(id).await?;
        if removed {
            info!("Booking {} deleted", id);
        }
        Ok(removed)
    }
}

/// Parse the optional `date` filter of a listing query.
pub fn parse_date_filter(date: Option<&str>) -> Result<Option<NaiveDate>> {
    match date.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => validation::parse_date(d)
            .map(Some)
            .ok_or_else(|| Error::invalid("date", "Date must be in YYYY-MM-DD format")),
        None => Ok(None),
    }
}
