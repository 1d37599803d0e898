//! Per-request session middleware.
//!
//! Builds one [`SessionGuard`] per request: decides read-only-ness via the
//! configured strategies, applies runtime settings, starts the guard, and
//! stores it as a request extension for handlers. After the handler ran, a
//! guard left open is closed so read-write sessions flush.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use sw_domain::config::SessionConfig;
use sw_domain::error::Error;
use sw_guard::{SessionFacility, SessionGuard};

use crate::strategy::ReadOnlyStrategy;

/// Settings every deployment should apply unless it has a reason not to.
///
/// `session.strict_mode` makes the facility reject uninitialized session
/// identifiers supplied by the client instead of adopting them.
pub const RECOMMENDED_SETTINGS: &[(&str, &str)] = &[("session.strict_mode", "1")];

/// State for [`session_middleware`]. Cheap to clone; attach per router via
/// `axum::middleware::from_fn_with_state`.
#[derive(Clone)]
pub struct SessionMiddleware {
    facility: Arc<dyn SessionFacility>,
    strategies: Vec<Arc<dyn ReadOnlyStrategy>>,
    settings: Vec<(String, String)>,
    lazy_load: bool,
}

impl SessionMiddleware {
    /// A middleware with no strategies (every session read-write), no
    /// settings, and lazy load on.
    pub fn new(facility: Arc<dyn SessionFacility>) -> Self {
        Self {
            facility,
            strategies: Vec::new(),
            settings: Vec::new(),
            lazy_load: true,
        }
    }

    /// Build from configuration. Settings from the config table are applied
    /// in sorted key order so runs are deterministic.
    pub fn from_config(config: &SessionConfig, facility: Arc<dyn SessionFacility>) -> Self {
        let mut settings: Vec<(String, String)> = config
            .settings
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        settings.sort();
        Self {
            facility,
            strategies: Vec::new(),
            settings,
            lazy_load: config.lazy_load,
        }
    }

    /// Add a read-only strategy. Strategies are consulted in insertion
    /// order and the first hit wins.
    pub fn with_strategy(mut self, strategy: impl ReadOnlyStrategy + 'static) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    /// Queue one runtime setting, applied before every session start.
    pub fn with_setting(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.push((name.into(), value.into()));
        self
    }

    /// Queue [`RECOMMENDED_SETTINGS`].
    pub fn with_recommended_settings(mut self) -> Self {
        for (name, value) in RECOMMENDED_SETTINGS {
            self.settings
                .push(((*name).to_string(), (*value).to_string()));
        }
        self
    }

    pub fn with_lazy_load(mut self, lazy_load: bool) -> Self {
        self.lazy_load = lazy_load;
        self
    }

    fn wants_read_only(&self, request: &Request<Body>) -> bool {
        self.strategies
            .iter()
            .any(|strategy| strategy.is_read_only(request))
    }
}

/// Axum middleware that owns the session lifecycle for one request.
///
/// Start failures never reach the handler: the request is answered with a
/// plain 500 and the error detail stays in the logs.
pub async fn session_middleware(
    State(mw): State<SessionMiddleware>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let read_only = mw.wants_read_only(&req);

    for (name, value) in &mw.settings {
        mw.facility.apply_setting(name, value);
    }

    let guard = Arc::new(SessionGuard::new(mw.facility.clone(), mw.lazy_load));
    if let Err(err) = guard.start(read_only).await {
        match &err {
            Error::InvalidMethodCall(_) | Error::UnexpectedActiveSession(_) => {
                tracing::warn!(error = %err, "session start refused");
            }
            _ => {
                tracing::error!(error = %err, "session start failed");
            }
        }
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to start session");
    }
    tracing::debug!(read_only, "session attached to request");

    req.extensions_mut().insert(guard.clone());
    let response = next.run(req).await;

    // Handlers may close or destroy the session themselves.
    if !guard.is_closed() {
        if let Err(err) = guard.close().await {
            tracing::warn!(error = %err, "session close after handler failed");
        }
    }

    response
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
