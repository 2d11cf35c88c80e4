//! Fixed-window request limiter keyed by client and request class.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::RateLimitConfig;

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitClass {
    General,
    /// Writes to either ledger.
    Booking,
}

impl LimitClass {
    pub fn for_request(method: &Method, path: &str) -> Self {
        let ledger = path.starts_with("/bookings") || path.starts_with("/friendly-matches");
        if ledger && *method != Method::GET && *method != Method::HEAD {
            Self::Booking
        } else {
            Self::General
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub retry_after: Duration,
}

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Arc<Mutex<HashMap<(LimitClass, String), Window>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn limit(&self, class: LimitClass) -> u32 {
        match class {
            LimitClass::General => self.config.max_requests,
            LimitClass::Booking => self.config.booking_max_requests,
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_secs)
    }

    pub fn check(&self, class: LimitClass, client: &str) -> Decision {
        self.check_at(class, client, Instant::now())
    }

    pub fn check_at(&self, class: LimitClass, client: &str, now: Instant) -> Decision {
        let limit = self.limit(class);
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = windows
            .entry((class, client.to_string()))
            .or_insert_with(|| Window {
                count: 0,
                reset_at: now + self.window(),
            });
        if now > entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window();
        }

        let allowed = entry.count < limit;
        if allowed {
            entry.count += 1;
        }
        Decision {
            allowed,
            limit,
            remaining: limit.saturating_sub(entry.count),
            retry_after: entry.reset_at.saturating_duration_since(now),
        }
    }

    /// Drop expired windows. Returns how many were removed.
    pub fn cleanup_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, w| now <= w.reset_at);
        before - windows.len()
    }

    pub fn tracked(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn start(&self) -> RateLimiterHandle {
        let limiter = self.clone();
        let every = Duration::from_secs(self.config.cleanup_secs.max(1));
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.cleanup_at(Instant::now());
                if removed > 0 {
                    debug!("Rate limiter: dropped {} expired windows", removed);
                }
            }
        });
        info!(
            "Rate limiter started ({}/{} requests per {}s)",
            self.config.max_requests, self.config.booking_max_requests, self.config.window_secs
        );
        RateLimiterHandle { task }
    }
}

pub struct RateLimiterHandle {
    task: JoinHandle<()>,
}

impl RateLimiterHandle {
    pub fn stop(self) {
        self.task.abort();
        info!("Rate limiter cleanup stopped");
    }
}

/// First `x-forwarded-for` entry, then the peer address.
fn client_id(req: &Request) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn limit_requests(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let class = LimitClass::for_request(req.method(), req.uri().path());
    let client = client_id(&req);
    let decision = limiter.check(class, &client);

    if !decision.allowed {
        warn!(
            "Rate limit exceeded for {} on {} {} ({:?})",
            client,
            req.method(),
            req.uri().path(),
            class
        );
        let retry_after = decision.retry_after.as_secs().max(1);
        let body = json!({
            "error": "Too Many Requests",
            "message": "Rate limit exceeded. Please try again later.",
            "retryAfter": retry_after,
            "remaining": decision.remaining,
            "limit": decision.limit,
        });
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        set_headers(&mut response, &decision);
        return response;
    }

    let mut response = next.run(req).await;
    set_headers(&mut response, &decision);
    response
}

fn set_headers(response: &mut Response, decision: &Decision) {
    let headers = response.headers_mut();
    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn config(general: u32, booking: u32) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: general,
            booking_max_requests: booking,
            window_secs: 60,
            cleanup_secs: 30,
        }
    }

    #[test]
    fn test_request_classes() {
        assert_eq!(
            LimitClass::for_request(&Method::POST, "/bookings"),
            LimitClass::Booking
        );
        assert_eq!(
            LimitClass::for_request(&Method::DELETE, "/friendly-matches"),
            LimitClass::Booking
        );
        assert_eq!(
            LimitClass::for_request(&Method::GET, "/bookings"),
            LimitClass::General
        );
        assert_eq!(
            LimitClass::for_request(&Method::POST, "/stadiums"),
            LimitClass::General
        );
    }

    #[test]
    fn test_window_limits_and_resets() {
        let limiter = RateLimiter::new(config(100, 2));
        let t0 = Instant::now();

        let first = limiter.check_at(LimitClass::Booking, "1.2.3.4", t0);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert!(limiter.check_at(LimitClass::Booking, "1.2.3.4", t0).allowed);

        let refused = limiter.check_at(LimitClass::Booking, "1.2.3.4", t0 + Duration::from_secs(10));
        assert!(!refused.allowed);
        assert_eq!(refused.remaining, 0);
        assert_eq!(refused.retry_after, Duration::from_secs(50));

        // other clients and other classes have their own windows
        assert!(limiter.check_at(LimitClass::Booking, "5.6.7.8", t0).allowed);
        assert!(limiter.check_at(LimitClass::General, "1.2.3.4", t0).allowed);

        let later = t0 + Duration::from_secs(61);
        assert!(limiter.check_at(LimitClass::Booking, "1.2.3.4", later).allowed);
    }

    #[test]
    fn test_cleanup_drops_expired_windows() {
        let limiter = RateLimiter::new(config(10, 10));
        let t0 = Instant::now();
        limiter.check_at(LimitClass::General, "a", t0);
        limiter.check_at(LimitClass::General, "b", t0 + Duration::from_secs(30));
        assert_eq!(limiter.tracked(), 2);

        assert_eq!(limiter.cleanup_at(t0 + Duration::from_secs(61)), 1);
        assert_eq!(limiter.tracked(), 1);
    }

    #[tokio::test]
    async fn test_middleware_refuses_with_429() {
        let limiter = RateLimiter::new(config(100, 1));
        let app = Router::new()
            .route("/bookings", post(|| async { "ok" }).get(|| async { "list" }))
            .layer(axum::middleware::from_fn_with_state(
                limiter.clone(),
                limit_requests,
            ));
        let request = || {
            Request::builder()
                .method(Method::POST)
                .uri("/bookings")
                .header("x-forwarded-for", "10.0.0.1, 172.16.0.1")
                .body(Body::empty())
                .unwrap()
        };

        let ok = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers()["x-ratelimit-limit"], "1");
        assert_eq!(ok.headers()["x-ratelimit-remaining"], "0");

        let refused = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(refused.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(refused.headers().contains_key(RETRY_AFTER));
        let body = axum::body::to_bytes(refused.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Too Many Requests");
        assert_eq!(body["limit"], 1);

        // reads use the general window
        let list = Request::builder()
            .uri("/bookings")
            .header("x-forwarded-for", "10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let listed = app.oneshot(list).await.unwrap();
        assert_eq!(listed.status(), StatusCode::OK);
        assert_eq!(listed.headers()["x-ratelimit-limit"], "100");
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let limiter = RateLimiter::new(config(1, 1));
        let handle = limiter.start();
        assert!(limiter.check(LimitClass::General, "a").allowed);
        assert!(!limiter.check(LimitClass::General, "a").allowed);
        handle.stop();
    }
}
