//! Reference server for SessionWarden.
//!
//! A small visit-counter / login app showing the intended wiring: one
//! in-memory facility, the GET-is-read-only strategy, recommended settings,
//! and handlers that only ever see the guarded session.
//!
//! Routes:
//!
//! - `GET  /`        — route overview
//! - `GET  /visits`  — read the visit counter (read-only session)
//! - `POST /visits`  — bump the visit counter
//! - `POST /login`   — store the user and rotate the session id
//! - `GET  /me`      — who is logged in
//! - `POST /logout`  — destroy the session and expire its cookie
//!
//! Usage:
//!   sw-demo --config warden.toml
//!   RUST_LOG=debug sw-demo --port 8080

use std::sync::Arc;

use anyhow::Context;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use sw_domain::config::Config;
use sw_domain::error::Error;
use sw_guard::MemoryFacility;
use sw_http::{session_middleware, GetRequestStrategy, Session, SessionMiddleware};

#[derive(Debug, Parser)]
#[command(name = "sw-demo", version, about = "SessionWarden reference server")]
struct Cli {
    /// Path to the TOML config file. Missing file means built-in defaults.
    #[arg(long, default_value = "warden.toml")]
    config: String,

    /// Override the configured port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sw_demo=debug")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let facility = Arc::new(MemoryFacility::new(config.session.cookie.clone()));
    let mw = SessionMiddleware::from_config(&config.session, facility)
        .with_strategy(GetRequestStrategy)
        .with_recommended_settings();

    let app = Router::new()
        .route("/", get(index))
        .route("/visits", get(read_visits).post(bump_visits))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
        .layer(axum::middleware::from_fn_with_state(mw, session_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(tower::limit::ConcurrencyLimitLayer::new(256));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "sw-demo listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum server error")?;

    tracing::info!("server stopped");
    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {path}: {e}"))
    } else {
        tracing::info!(path, "config file not found, using defaults");
        Ok(Config::default())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("ctrl-c handler unavailable, running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "sw-demo",
        "routes": ["/visits", "/login", "/me", "/logout"],
    }))
}

async fn read_visits(session: Session) -> Response {
    match session.get_or("visits", serde_json::json!(0)).await {
        Ok(visits) => Json(serde_json::json!({ "visits": visits })).into_response(),
        Err(err) => session_error(err),
    }
}

async fn bump_visits(session: Session) -> Response {
    let visits = match session.get_as::<u64>("visits").await {
        Ok(visits) => visits.unwrap_or(0) + 1,
        Err(err) => return session_error(err),
    };
    match session.set("visits", visits).await {
        Ok(()) => Json(serde_json::json!({ "visits": visits })).into_response(),
        Err(err) => session_error(err),
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    user: String,
}

async fn login(session: Session, Json(body): Json<LoginRequest>) -> Response {
    let outcome = async {
        session.set("user", &body.user).await?;
        session.set("logged_in_at", Utc::now()).await?;
        // Fresh id on privilege change.
        session.regenerate().await
    }
    .await;

    match outcome {
        Ok(()) => {
            tracing::info!(user = %body.user, "user logged in");
            Json(serde_json::json!({ "user": body.user })).into_response()
        }
        Err(err) => session_error(err),
    }
}

async fn me(session: Session) -> Response {
    let user = match session.get("user").await {
        Ok(user) => user,
        Err(err) => return session_error(err),
    };
    match user {
        Some(user) => {
            let logged_in_at = match session.get("logged_in_at").await {
                Ok(at) => at,
                Err(err) => return session_error(err),
            };
            Json(serde_json::json!({ "user": user, "logged_in_at": logged_in_at }))
                .into_response()
        }
        None => api_error(StatusCode::UNAUTHORIZED, "not logged in"),
    }
}

async fn logout(session: Session) -> Response {
    match session.destroy().await {
        Ok(()) => {
            tracing::info!("session destroyed");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => session_error(err),
    }
}

/// Map a session error onto the HTTP surface: access violations are the
/// caller's fault, everything else is ours.
fn session_error(err: Error) -> Response {
    match err {
        Error::AccessViolation(_) => api_error(StatusCode::FORBIDDEN, err.to_string()),
        _ => {
            tracing::error!(error = %err, "session operation failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "session operation failed")
        }
    }
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}
