//! Read-only decision strategies.
//!
//! Strategies inspect the incoming request before the session starts and
//! vote on whether it should open read-only. The middleware consults them
//! in insertion order and the first `true` wins; when none match, the
//! session opens read-write.

use axum::body::Body;
use axum::http::{Method, Request};

/// A predicate over the incoming request, consulted before session start.
pub trait ReadOnlyStrategy: Send + Sync {
    /// `true` when this request should get a read-only session.
    fn is_read_only(&self, request: &Request<Body>) -> bool;
}

/// Plain closures work as strategies.
impl<F> ReadOnlyStrategy for F
where
    F: Fn(&Request<Body>) -> bool + Send + Sync,
{
    fn is_read_only(&self, request: &Request<Body>) -> bool {
        self(request)
    }
}

/// Marks every GET request read-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetRequestStrategy;

impl ReadOnlyStrategy for GetRequestStrategy {
    fn is_read_only(&self, request: &Request<Body>) -> bool {
        request.method() == Method::GET
    }
}

/// Marks every safe method (GET, HEAD, OPTIONS) read-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeMethodsStrategy;

impl ReadOnlyStrategy for SafeMethodsStrategy {
    fn is_read_only(&self, request: &Request<Body>) -> bool {
        let method = request.method();
        method == Method::GET || method == Method::HEAD || method == Method::OPTIONS
    }
}
