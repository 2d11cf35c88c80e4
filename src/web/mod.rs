pub mod bookings;
pub mod catalog;
pub mod dashboard;
pub mod error;
pub mod matches;
pub mod views;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::allocator::{Allocator, ExpirySweeper};
use crate::config::parse_timezone;
use crate::models::Config;
use crate::rate_limit::{self, RateLimiter};
use crate::store;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) allocator: Allocator,
    pub(crate) sweeper: ExpirySweeper,
}

pub(crate) fn router(state: AppState, limiter: RateLimiter) -> Router {
    Router::new()
        .route("/", get(dashboard::dashboard_handler))
        .route("/availability", get(bookings::availability))
        .route(
            "/stadiums",
            get(catalog::list_stadiums).post(catalog::create_stadium),
        )
        .route(
            "/stadiums/{id}",
            patch(catalog::update_stadium).delete(catalog::delete_stadium),
        )
        .route(
            "/time-slots",
            get(catalog::list_time_slots).post(catalog::create_time_slot),
        )
        .route(
            "/time-slots/{id}",
            patch(catalog::update_time_slot).delete(catalog::delete_time_slot),
        )
        .route("/users", get(catalog::list_users))
        .route(
            "/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route(
            "/bookings/{id}",
            patch(bookings::update_booking).delete(bookings::delete_booking),
        )
        .route(
            "/friendly-matches",
            get(matches::list_matches)
                .post(matches::create_match)
                .put(matches::update_match)
                .delete(matches::delete_match),
        )
        .layer(from_fn_with_state(limiter, rate_limit::limit_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config, addr: &str) -> Result<()> {
    let store = store::open(&config.storage).context("Failed to open the allocator store")?;
    let allocator = Allocator::new(store.clone());
    allocator
        .catalog
        .seed(&config)
        .await
        .context("Failed to seed the catalog")?;

    let tz = parse_timezone(&config.sweeper.timezone)?;
    let sweeper = ExpirySweeper::new(
        store,
        tz,
        Duration::from_secs(config.sweeper.interval_secs),
    );
    let limiter = RateLimiter::new(config.rate_limit.clone());
    let sweeper_handle = sweeper.start();
    let limiter_handle = limiter.start();

    let app = router(AppState { allocator, sweeper }, limiter);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Stadium allocator listening on http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper_handle.stop();
    limiter_handle.stop();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        return;
    }
    info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use chrono_tz::Tz;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::models::RateLimitConfig;
    use crate::testing::seeded_store;

    async fn app() -> Router {
        let store = seeded_store().await;
        let sweeper = ExpirySweeper::new(store.clone(), Tz::UTC, Duration::from_secs(3600));
        let state = AppState {
            allocator: Allocator::new(store),
            sweeper,
        };
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 1000,
            booking_max_requests: 1000,
            ..RateLimitConfig::default()
        });
        router(state, limiter)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send_as(app, method, uri, body, None).await
    }

    async fn send_as(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
        user: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn booking_body(user: &str) -> Value {
        json!({
            "userId": user,
            "stadiumId": "s1",
            "date": "2025-06-01",
            "timeSlotId": "t16",
            "time": "16:00"
        })
    }

    fn match_body(host: &str, time: &str, max_players: i64) -> Value {
        json!({
            "hostId": host,
            "stadiumId": "s1",
            "date": "2025-06-01",
            "time": time,
            "team1": "Informatique FC",
            "sportId": "football",
            "maxPlayers": max_players
        })
    }

    #[tokio::test]
    async fn test_booking_then_conflicts() {
        let app = app().await;

        let (status, body) = send(&app, Method::POST, "/bookings", Some(booking_body("alice"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["userId"], "alice");

        let (status, body) = send(&app, Method::POST, "/bookings", Some(booking_body("bob"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "This time slot is already booked for this stadium");

        let (status, body) = send(
            &app,
            Method::POST,
            "/friendly-matches",
            Some(match_body("bob", "16:00", 6)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Stadium \"Stadium s1\" is already booked at 16:00 on 2025-06-01"
        );

        let (status, body) = send(&app, Method::GET, "/bookings?userId=alice", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["stadium"]["name"], "Stadium s1");
        assert_eq!(body[0]["timeSlot"]["time"], "16:00");
        assert_eq!(body[0]["user"]["fullName"], "ALICE Student");

        let (_, body) = send(&app, Method::GET, "/bookings?stadium=s1&date=2025-06-02", None).await;
        assert_eq!(body, json!([]));

        let (status, _) = send(&app, Method::GET, "/bookings?date=June", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_validation_and_malformed_bodies() {
        let app = app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/bookings",
            Some(json!({ "userId": "alice", "date": "2025-13-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"].as_array().unwrap().len(), 3);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/friendly-matches")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_match_roster_over_http() {
        let app = app().await;
        let (status, created) = send(
            &app,
            Method::POST,
            "/friendly-matches",
            Some(match_body("alice", "18:00", 2)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, joined) = send(
            &app,
            Method::PUT,
            "/friendly-matches",
            Some(json!({ "matchId": id, "guestId": "bob", "action": "join" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(joined["currentPlayers"], 2);
        assert_eq!(joined["status"], "confirmed");

        let (status, body) = send(
            &app,
            Method::PUT,
            "/friendly-matches",
            Some(json!({ "matchId": id, "guestId": "carol", "action": "join" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Match is full. Cannot join.");

        let (_, listed) = send(&app, Method::GET, "/friendly-matches?userId=alice", None).await;
        assert_eq!(listed[0]["host"]["name"], "ALICE Student");
        assert_eq!(listed[0]["guest"]["id"], "bob");

        let (status, _) = send(&app, Method::GET, "/friendly-matches?userId=nobody", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_match_delete_rules() {
        let app = app().await;
        let (_, created) = send(
            &app,
            Method::POST,
            "/friendly-matches",
            Some(match_body("bob", "18:00", 4)),
        )
        .await;
        let uri = format!("/friendly-matches?matchId={}", created["id"].as_str().unwrap());

        let (status, _) = send(&app, Method::DELETE, "/friendly-matches", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_as(&app, Method::DELETE, &uri, None, Some("carol")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send_as(&app, Method::DELETE, &uri, None, Some("bob")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], true);

        let (status, body) = send_as(&app, Method::DELETE, &uri, None, Some("bob")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], false);
    }

    #[tokio::test]
    async fn test_catalog_routes() {
        let app = app().await;
        let (status, slot) = send(
            &app,
            Method::POST,
            "/time-slots",
            Some(json!({ "time": "10:00", "duration": 60 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(slot["period"], "morning");

        let (status, body) = send(&app, Method::POST, "/time-slots", Some(json!({ "time": "16:00" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Time slot 16:00 already exists");

        let (status, patched) = send(
            &app,
            Method::PATCH,
            "/time-slots/t16",
            Some(json!({ "enabled": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patched["enabled"], false);

        let (status, body) = send(&app, Method::POST, "/bookings", Some(booking_body("alice"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");

        let (status, _) = send(&app, Method::DELETE, "/stadiums/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::PATCH, "/bookings/missing", Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::DELETE, "/bookings/missing", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, users) = send(&app, Method::GET, "/users", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(users.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_availability_and_dashboard() {
        let app = app().await;
        let uri = "/availability?stadiumId=s1&date=2025-06-01&time=16:00";
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "available");

        send(&app, Method::POST, "/bookings", Some(booking_body("alice"))).await;
        let (_, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(body["status"], "conflict");
        assert_eq!(body["ledger"], "booking");

        let request = Request::builder()
            .uri("/?date=2025-06-01")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(html.to_vec()).unwrap();
        assert!(html.contains("Stadium s1"));
        assert!(html.contains("Booked: ALICE Student"));
    }
}
