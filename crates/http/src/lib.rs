//! Axum integration for SessionWarden.
//!
//! [`session_middleware`] opens one [`SessionGuard`](sw_guard::SessionGuard)
//! per request, read-only when any configured strategy says so, and closes
//! it after the handler ran. Handlers reach the guard through the
//! [`Session`] extractor.

pub mod extract;
pub mod middleware;
pub mod strategy;

pub use extract::Session;
pub use middleware::{session_middleware, SessionMiddleware, RECOMMENDED_SETTINGS};
pub use strategy::{GetRequestStrategy, ReadOnlyStrategy, SafeMethodsStrategy};
