use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::allocator::catalog::{StadiumRequest, StadiumUpdate, TimeSlotRequest, TimeSlotUpdate};
use crate::allocator::UserSummary;
use crate::error::Error;
use crate::models::{Stadium, TimeSlot};

pub(super) async fn list_stadiums(
    State(state): State<AppState>,
) -> Result<Json<Vec<Stadium>>, ApiError> {
    Ok(Json(state.allocator.catalog.stadiums().await?))
}

pub(super) async fn create_stadium(
    State(state): State<AppState>,
    body: Result<Json<StadiumRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Stadium>), ApiError> {
    let Json(req) = body?;
    let stadium = state.allocator.catalog.create_stadium(req).await?;
    Ok((StatusCode::CREATED, Json(stadium)))
}

pub(super) async fn update_stadium(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<StadiumUpdate>, JsonRejection>,
) -> Result<Json<Stadium>, ApiError> {
    let Json(req) = body?;
    Ok(Json(state.allocator.catalog.update_stadium(&id, req).await?))
}

pub(super) async fn delete_stadium(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.allocator.catalog.delete_stadium(&id).await? {
        return Err(Error::not_found("Stadium", id).into());
    }
    Ok(Json(json!({ "success": true })))
}

pub(super) async fn list_time_slots(
    State(state): State<AppState>,
) -> Result<Json<Vec<TimeSlot>>, ApiError> {
    Ok(Json(state.allocator.catalog.time_slots().await?))
}

pub(super) async fn create_time_slot(
    State(state): State<AppState>,
    body: Result<Json<TimeSlotRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TimeSlot>), ApiError> {
    let Json(req) = body?;
    let slot = state.allocator.catalog.create_time_slot(req).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

pub(super) async fn update_time_slot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TimeSlotUpdate>, JsonRejection>,
) -> Result<Json<TimeSlot>, ApiError> {
    let Json(req) = body?;
    Ok(Json(state.allocator.catalog.update_time_slot(&id, req).await?))
}

pub(super) async fn delete_time_slot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.allocator.catalog.delete_time_slot(&id).await? {
        return Err(Error::not_found("Time slot", id).into());
    }
    Ok(Json(json!({ "success": true })))
}

pub(super) async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    Ok(Json(state.allocator.catalog.users().await?))
}
