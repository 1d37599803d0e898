/// Shared error type used across all SessionWarden crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Guard used out of its valid lifecycle order: `start` called twice,
    /// `close` without a start in eager mode, or any call after `Closed`.
    #[error("invalid method call: {0}")]
    InvalidMethodCall(String),

    /// The underlying facility already has an active session that this
    /// guard did not open.
    #[error("unexpected active session: {0}")]
    UnexpectedActiveSession(String),

    /// A mutating operation was attempted on a read-only session.
    #[error("access violation: {0}")]
    AccessViolation(String),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reported by a session facility implementation.
    #[error("facility: {0}")]
    Facility(String),
}

pub type Result<T> = std::result::Result<T, Error>;
