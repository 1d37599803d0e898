//! The `Session` Axum extractor.
//!
//! Handlers opt in by adding `session: Session` to their parameter list.

use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Json;

use sw_guard::SessionGuard;

/// Axum extractor for the guard installed by
/// [`session_middleware`](crate::middleware::session_middleware).
///
/// Rejects with a 500 when the middleware is not on the route.
#[derive(Clone)]
pub struct Session(pub Arc<SessionGuard>);

impl Deref for Session {
    type Target = SessionGuard;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Arc<SessionGuard>>() {
            Some(guard) => Ok(Session(guard.clone())),
            None => {
                tracing::error!("Session extractor used on a route without session middleware");
                Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "session middleware not installed" })),
                ))
            }
        }
    }
}
