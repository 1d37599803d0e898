//! End-to-end middleware tests over an in-memory facility.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use sw_domain::config::CookieParams;
use sw_domain::error::{Error, Result};
use sw_guard::{FacilityStatus, MemoryFacility, OpenOptions, SessionFacility};
use sw_http::{session_middleware, GetRequestStrategy, Session, SessionMiddleware};

fn session_app(mw: SessionMiddleware) -> Router {
    Router::new()
        .route("/user", get(read_user).post(write_user))
        .route("/close", post(close_session))
        .route("/logout", post(destroy_session))
        .layer(axum::middleware::from_fn_with_state(mw, session_middleware))
}

async fn read_user(session: Session) -> Response {
    match session.get("user").await {
        Ok(value) => Json(json!({ "user": value })).into_response(),
        Err(err) => error_for(err),
    }
}

async fn write_user(session: Session) -> Response {
    match session.set("user", "ada").await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_for(err),
    }
}

async fn close_session(session: Session) -> Response {
    match session.close().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_for(err),
    }
}

async fn destroy_session(session: Session) -> Response {
    match session.destroy().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_for(err),
    }
}

fn error_for(err: Error) -> Response {
    let status = match err {
        Error::AccessViolation(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn get_requests_run_read_only() {
    let facility = Arc::new(MemoryFacility::default());
    let mw = SessionMiddleware::new(facility.clone()).with_strategy(GetRequestStrategy);
    let app = session_app(mw);

    let response = app
        .oneshot(request(Method::GET, "/user"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "user": null }));

    // The read went through a read-and-close snapshot.
    assert_eq!(
        facility.last_open(),
        Some(OpenOptions {
            read_and_close: true
        })
    );
}

#[tokio::test]
async fn write_through_read_only_session_is_forbidden() {
    let facility = Arc::new(MemoryFacility::default());
    // Every request read-only.
    let mw = SessionMiddleware::new(facility.clone())
        .with_strategy(|_request: &Request<Body>| true);
    let app = session_app(mw);

    let response = app
        .oneshot(request(Method::POST, "/user"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The refusal happened before any facility activity.
    assert_eq!(facility.open_count(), 0);
    assert_eq!(facility.write_close_count(), 0);
}

#[tokio::test]
async fn writes_persist_across_requests() {
    let facility = Arc::new(MemoryFacility::default());
    let mw = SessionMiddleware::new(facility.clone()).with_strategy(GetRequestStrategy);
    let app = session_app(mw);

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/user"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    // The middleware closed the guard, flushing the write.
    assert_eq!(facility.write_close_count(), 1);
    assert_eq!(facility.status(), FacilityStatus::Inactive);

    let response = app
        .oneshot(request(Method::GET, "/user"))
        .await
        .unwrap();
    assert_eq!(json_body(response).await, json!({ "user": "ada" }));
}

#[tokio::test]
async fn read_only_requests_never_write_back() {
    let facility = Arc::new(MemoryFacility::default());
    let mw = SessionMiddleware::new(facility.clone()).with_strategy(GetRequestStrategy);
    let app = session_app(mw);

    let response = app
        .oneshot(request(Method::GET, "/user"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(facility.write_close_count(), 0);
}

#[tokio::test]
async fn foreign_active_session_is_a_plain_500() {
    let facility = Arc::new(MemoryFacility::default());
    // Something outside the middleware opened the facility.
    facility.open(OpenOptions::default()).await.unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let handler_hits = hits.clone();
    let mw = SessionMiddleware::new(facility.clone());
    let app = Router::new()
        .route(
            "/user",
            get(move || {
                let hits = handler_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "ok"
                }
            }),
        )
        .layer(axum::middleware::from_fn_with_state(mw, session_middleware));

    let response = app
        .oneshot(request(Method::GET, "/user"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "failed to start session" })
    );
    // The handler never ran.
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn builder_settings_reach_the_facility() {
    let facility = Arc::new(MemoryFacility::default());
    let mw = SessionMiddleware::new(facility.clone())
        .with_recommended_settings()
        .with_setting("session.gc_maxlifetime", "1440");
    let app = session_app(mw);

    let response = app
        .oneshot(request(Method::GET, "/user"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        facility.setting("session.strict_mode").as_deref(),
        Some("1")
    );
    assert_eq!(
        facility.setting("session.gc_maxlifetime").as_deref(),
        Some("1440")
    );
}

/// Wraps the memory facility and records, at `open` time, whether the
/// strict-mode setting had already been applied.
struct SettingOrderFacility {
    inner: MemoryFacility,
    strict_mode_at_open: AtomicBool,
}

#[async_trait]
impl SessionFacility for SettingOrderFacility {
    fn status(&self) -> FacilityStatus {
        self.inner.status()
    }

    async fn open(&self, options: OpenOptions) -> Result<()> {
        self.strict_mode_at_open.store(
            self.inner.setting("session.strict_mode").is_some(),
            Ordering::SeqCst,
        );
        self.inner.open(options).await
    }

    async fn regenerate_id(&self) -> Result<()> {
        self.inner.regenerate_id().await
    }

    async fn destroy(&self) -> Result<()> {
        self.inner.destroy().await
    }

    async fn write_close(&self) -> Result<()> {
        self.inner.write_close().await
    }

    fn cookie_params(&self) -> CookieParams {
        self.inner.cookie_params()
    }

    fn expire_cookie(&self, params: &CookieParams, expires_at: DateTime<Utc>) {
        self.inner.expire_cookie(params, expires_at);
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value) {
        self.inner.set(key, value);
    }

    fn remove(&self, key: &str) {
        self.inner.remove(key);
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn apply_setting(&self, name: &str, value: &str) {
        self.inner.apply_setting(name, value);
    }
}

#[tokio::test]
async fn settings_are_applied_before_the_session_opens() {
    let facility = Arc::new(SettingOrderFacility {
        inner: MemoryFacility::default(),
        strict_mode_at_open: AtomicBool::new(false),
    });
    let mw = SessionMiddleware::new(facility.clone())
        .with_recommended_settings()
        .with_lazy_load(false);
    let app = session_app(mw);

    let response = app
        .oneshot(request(Method::GET, "/user"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Eager mode: the facility opened inside the middleware, and strict
    // mode was already in place by then.
    assert_eq!(facility.inner.open_count(), 1);
    assert!(facility.strict_mode_at_open.load(Ordering::SeqCst));
}

#[tokio::test]
async fn first_matching_strategy_short_circuits() {
    let facility = Arc::new(MemoryFacility::default());
    let mw = SessionMiddleware::new(facility.clone())
        .with_strategy(|_request: &Request<Body>| true)
        .with_strategy(|_request: &Request<Body>| -> bool {
            panic!("second strategy must not be consulted")
        });
    let app = session_app(mw);

    let response = app
        .oneshot(request(Method::GET, "/user"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn handler_may_close_the_session_itself() {
    let facility = Arc::new(MemoryFacility::default());
    let mw = SessionMiddleware::new(facility.clone());
    let app = session_app(mw);

    let response = app
        .oneshot(request(Method::POST, "/close"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    // Lazy guard, never touched: closing is silent and writes nothing.
    assert_eq!(facility.write_close_count(), 0);
}

#[tokio::test]
async fn destroyed_sessions_skip_the_automatic_close() {
    let facility = Arc::new(MemoryFacility::default());
    let mw = SessionMiddleware::new(facility.clone());
    let app = session_app(mw);

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/user"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request(Method::POST, "/logout"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(facility.destroy_count(), 1);
    assert_eq!(facility.expired_cookies().len(), 1);
    // Only the first request flushed; destroy leaves nothing to write back.
    assert_eq!(facility.write_close_count(), 1);
}

#[tokio::test]
async fn extractor_without_middleware_is_a_500() {
    let app = Router::new().route("/user", get(read_user));

    let response = app
        .oneshot(request(Method::GET, "/user"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "session middleware not installed" })
    );
}

#[tokio::test]
async fn from_config_honors_lazy_load_and_settings() {
    let config = sw_domain::config::SessionConfig {
        lazy_load: false,
        settings: std::collections::HashMap::from([(
            "session.strict_mode".to_string(),
            "1".to_string(),
        )]),
        cookie: sw_domain::config::CookieParams::default(),
    };

    let facility = Arc::new(MemoryFacility::default());
    let mw = SessionMiddleware::from_config(&config, facility.clone());
    let app = session_app(mw);

    let response = app
        .oneshot(request(Method::GET, "/user"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // Eager load: the facility opened even though the handler only read.
    assert_eq!(facility.open_count(), 1);
    assert_eq!(
        facility.setting("session.strict_mode").as_deref(),
        Some("1")
    );
}
