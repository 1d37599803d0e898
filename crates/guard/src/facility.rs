//! The session facility port.
//!
//! The guard never talks to a concrete session runtime directly. It drives
//! this trait, which models the narrow surface such a runtime exposes: a
//! status flag, open/close/destroy on the persisted record, identifier
//! rotation, transport-cookie attributes, and the live key-value table that
//! `open` loads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use sw_domain::config::CookieParams;
use sw_domain::error::Result;

/// Whether the facility currently holds an open read-write handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilityStatus {
    Inactive,
    Active,
}

/// Options for [`SessionFacility::open`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Load the snapshot and release the handle immediately: the session is
    /// readable for the rest of the request but nothing is written back,
    /// and no lock is held on the record.
    pub read_and_close: bool,
}

/// A recorded instruction to expire the session's transport cookie.
///
/// Cookie transport itself is outside the facility; implementations queue
/// the instruction for whatever layer emits response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredCookie {
    pub expires_at: DateTime<Utc>,
    pub params: CookieParams,
}

/// Abstraction over the host runtime's native session mechanism.
///
/// `open`, `regenerate_id`, `destroy` and `write_close` are async because
/// real backends do store I/O there. The rest are queries or edits of the
/// in-memory live table and never block. Callers are expected to check
/// [`SessionFacility::status`] before `open`; implementations need not
/// defend against a second open.
#[async_trait]
pub trait SessionFacility: Send + Sync {
    /// Whether a read-write handle is currently open.
    fn status(&self) -> FacilityStatus;

    /// Load the persisted record into the live table. With `read_and_close`
    /// the handle is released as soon as the snapshot is loaded and the
    /// status stays [`FacilityStatus::Inactive`].
    async fn open(&self, options: OpenOptions) -> Result<()>;

    /// Mint a new session identifier, invalidating the old one. Stored data
    /// carries over to the new identifier.
    async fn regenerate_id(&self) -> Result<()>;

    /// Discard the persisted record and release the handle. The live table
    /// is left to the caller.
    async fn destroy(&self) -> Result<()>;

    /// Persist the live table and release the handle.
    async fn write_close(&self) -> Result<()>;

    /// The configured transport-cookie attributes.
    fn cookie_params(&self) -> CookieParams;

    /// Record an instruction to expire the transport cookie at `expires_at`.
    fn expire_cookie(&self, params: &CookieParams, expires_at: DateTime<Utc>);

    /// Read a value from the live table.
    fn get(&self, key: &str) -> Option<Value>;

    /// Write a value into the live table.
    fn set(&self, key: &str, value: Value);

    /// Remove a key from the live table. Missing keys are a no-op.
    fn remove(&self, key: &str);

    /// Clear the live table.
    fn clear(&self);

    /// Apply one runtime setting by name. Unknown names are recorded or
    /// ignored, never an error.
    fn apply_setting(&self, name: &str, value: &str);
}
