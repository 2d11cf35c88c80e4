use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::Error;

/// Anything a handler can fail with, rendered as `{ error, details? }`.
#[derive(Debug)]
pub(crate) enum ApiError {
    Allocator(Error),
    Body(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Allocator(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Body(rejection.body_text())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Allocator(err) => match err {
                Error::NotFound { .. } => StatusCode::NOT_FOUND,
                Error::Forbidden(_) => StatusCode::FORBIDDEN,
                Error::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Body(message) => ErrorBody {
                error: "Invalid data format".to_string(),
                details: Some(vec![message]),
            },
            Self::Allocator(Error::Validation(details)) => ErrorBody {
                error: "Validation failed".to_string(),
                details: Some(details),
            },
            Self::Allocator(err @ Error::Upstream(_)) => {
                error!("Request failed: {}", err);
                ErrorBody {
                    error: "Internal server error".to_string(),
                    details: None,
                }
            }
            Self::Allocator(err) => ErrorBody {
                error: err.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let (status, body) = render(Error::Full.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Match is full. Cannot join.");
        assert!(body.get("details").is_none());

        let (status, _) = render(Error::not_found("Match", "m1").into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = render(Error::Forbidden("delete this match".into()).into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_validation_lists_details() {
        let err = Error::Validation(vec!["date: Date must be in YYYY-MM-DD format".into()]);
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"][0], "date: Date must be in YYYY-MM-DD format");
    }

    #[tokio::test]
    async fn test_upstream_is_generic() {
        let (status, body) = render(Error::Upstream("disk full".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }
}
