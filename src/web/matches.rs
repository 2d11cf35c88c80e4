use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::allocator::matches::{MatchRequest, MatchUpdate, MatchView};
use crate::error::Error;
use crate::models::FriendlyMatch;

/// Identity forwarded by the authenticating proxy.
const REQUESTER_HEADER: &str = "x-user-id";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MatchQuery {
    user_id: Option<String>,
    match_id: Option<String>,
}

pub(super) async fn list_matches(
    State(state): State<AppState>,
    query: Result<Query<MatchQuery>, QueryRejection>,
) -> Result<Json<Vec<MatchView>>, ApiError> {
    let Query(query) = query?;
    let user_id = query.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty());
    Ok(Json(state.allocator.matches.list_all(user_id).await?))
}

pub(super) async fn create_match(
    State(state): State<AppState>,
    body: Result<Json<MatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FriendlyMatch>), ApiError> {
    let Json(req) = body?;
    let created = state.allocator.matches.create(req.validate()?).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(super) async fn update_match(
    State(state): State<AppState>,
    body: Result<Json<MatchUpdate>, JsonRejection>,
) -> Result<Json<FriendlyMatch>, ApiError> {
    let Json(update) = body?;
    Ok(Json(state.allocator.matches.apply(update).await?))
}

pub(super) async fn delete_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<MatchQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let Some(match_id) = query.match_id.filter(|m| !m.trim().is_empty()) else {
        return Err(Error::invalid("matchId", "Match ID is required").into());
    };
    let requester = headers
        .get(REQUESTER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|r| !r.is_empty());
    let deleted = state.allocator.matches.delete(&match_id, requester).await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}
