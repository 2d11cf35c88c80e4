use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::allocator::bookings::{parse_date_filter, BookingRequest, BookingUpdate, BookingView};
use crate::allocator::Availability;
use crate::models::Booking;
use crate::store::{BookingFilter, SlotKey};
use crate::validation::Checks;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BookingQuery {
    user_id: Option<String>,
    date: Option<String>,
    #[serde(alias = "stadiumId")]
    stadium: Option<String>,
}

pub(super) async fn list_bookings(
    State(state): State<AppState>,
    query: Result<Query<BookingQuery>, QueryRejection>,
) -> Result<Json<Vec<BookingView>>, ApiError> {
    let Query(query) = query?;
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let filter = BookingFilter {
        date: parse_date_filter(query.date.as_deref())?,
        user_id: non_empty(query.user_id),
        stadium_id: non_empty(query.stadium),
    };
    Ok(Json(state.allocator.bookings.list_all(filter).await?))
}

pub(super) async fn create_booking(
    State(state): State<AppState>,
    body: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let Json(req) = body?;
    let booking = state.allocator.bookings.create(req.validate()?).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub(super) async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<BookingUpdate>, JsonRejection>,
) -> Result<Json<Booking>, ApiError> {
    let Json(update) = body?;
    Ok(Json(state.allocator.bookings.update(&id, update).await?))
}

pub(super) async fn delete_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.allocator.bookings.delete(&id).await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AvailabilityQuery {
    stadium_id: Option<String>,
    date: Option<String>,
    time: Option<String>,
}

pub(super) async fn availability(
    State(state): State<AppState>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<Json<Availability>, ApiError> {
    let Query(query) = query?;
    let mut checks = Checks::new();
    let stadium_id =
        checks.required("stadiumId", query.stadium_id.as_deref(), "Stadium ID is required");
    let date = checks.date("date", query.date.as_deref());
    let time = checks.time("time", query.time.as_deref());
    checks.finish()?;
    let (Some(stadium_id), Some(date), Some(time)) = (stadium_id, date, time) else {
        return Err(crate::error::Error::Validation(vec!["Invalid data format".into()]).into());
    };
    let slot = SlotKey::new(stadium_id, date, time);
    Ok(Json(state.allocator.conflicts.check(&slot).await?))
}
