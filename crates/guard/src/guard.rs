//! The session guard state machine.
//!
//! One guard per request. `start` records the access mode, the facility is
//! opened on first use (or eagerly when lazy load is off), accessors enforce
//! read-only mode, and `close` flushes read-write sessions back through the
//! facility. Every transition checks the current [`GuardState`] and returns
//! a typed error on misuse instead of panicking.

use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use sw_domain::error::{Error, Result};

use crate::facility::{FacilityStatus, OpenOptions, SessionFacility};

/// How far in the past an expired session cookie is backdated. Must exceed
/// any plausible client clock skew.
const EXPIRE_BACKDATE_SECS: i64 = 42_000;

/// Lifecycle states of a [`SessionGuard`].
///
/// `Closed` is terminal. A request that needs the session again gets a new
/// guard, never a reopened one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Created, `start` not called yet.
    Idle,
    /// `start` recorded the access mode; the facility is untouched.
    StartedLazy,
    /// The facility snapshot has been loaded.
    Active,
    /// Closed or destroyed.
    Closed,
}

struct GuardFlags {
    state: GuardState,
    read_only: bool,
}

/// Guarded accessor over a [`SessionFacility`].
///
/// The guard has one logical owner (the request that created it), so the
/// internal lock only makes flag reads and writes atomic. It is never held
/// across facility calls.
pub struct SessionGuard {
    facility: Arc<dyn SessionFacility>,
    lazy_load: bool,
    flags: Mutex<GuardFlags>,
}

impl SessionGuard {
    /// `lazy_load` defers facility activation until the first accessor call.
    pub fn new(facility: Arc<dyn SessionFacility>, lazy_load: bool) -> Self {
        Self {
            facility,
            lazy_load,
            flags: Mutex::new(GuardFlags {
                state: GuardState::Idle,
                read_only: false,
            }),
        }
    }

    pub fn state(&self) -> GuardState {
        self.flags.lock().state
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.lock().read_only
    }

    pub fn is_active(&self) -> bool {
        self.state() == GuardState::Active
    }

    pub fn is_closed(&self) -> bool {
        self.state() == GuardState::Closed
    }

    /// Record the access mode and, unless lazy load is on, open the facility
    /// immediately. Valid only once, on a fresh guard.
    pub async fn start(&self, read_only: bool) -> Result<()> {
        {
            let mut flags = self.flags.lock();
            if flags.state != GuardState::Idle {
                return Err(Error::InvalidMethodCall(
                    "start called although session was already started".into(),
                ));
            }
            if self.facility.status() == FacilityStatus::Active {
                return Err(Error::UnexpectedActiveSession(
                    "facility reports an active session this guard did not open".into(),
                ));
            }
            flags.read_only = read_only;
            flags.state = GuardState::StartedLazy;
        }
        if !self.lazy_load {
            self.ensure_init().await?;
        }
        tracing::debug!(read_only, lazy = self.lazy_load, "session guard started");
        Ok(())
    }

    /// Read a stored value. Allowed in both modes; triggers lazy init.
    ///
    /// A stored JSON `null` is a present value and comes back as
    /// `Some(Value::Null)`, never `None`.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.ensure_init().await?;
        Ok(self.facility.get(key))
    }

    /// Read a stored value, falling back to `default` only when the key is
    /// absent. A stored `null` counts as present and is returned as-is.
    pub async fn get_or(&self, key: &str, default: Value) -> Result<Value> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Read and deserialize a stored value.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store a value under `key`.
    pub async fn set(&self, key: &str, value: impl Serialize) -> Result<()> {
        self.check_writable("set")?;
        let value = serde_json::to_value(value)?;
        self.ensure_init().await?;
        self.facility.set(key, value);
        Ok(())
    }

    /// Remove `key`. Missing keys are a no-op.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.check_writable("delete")?;
        self.ensure_init().await?;
        self.facility.remove(key);
        Ok(())
    }

    /// Remove every stored entry.
    pub async fn delete_all(&self) -> Result<()> {
        self.check_writable("delete_all")?;
        self.ensure_init().await?;
        self.facility.clear();
        Ok(())
    }

    /// Ask the facility for a fresh session identifier, invalidating the old
    /// one.
    pub async fn regenerate(&self) -> Result<()> {
        self.check_writable("regenerate")?;
        self.ensure_init().await?;
        self.facility.regenerate_id().await?;
        tracing::debug!("session id regenerated");
        Ok(())
    }

    /// Wipe the session: clear the live table, expire the transport cookie,
    /// and discard the persisted record. The guard is `Closed` afterwards.
    pub async fn destroy(&self) -> Result<()> {
        self.check_writable("destroy")?;
        if self.is_closed() {
            return Err(Error::InvalidMethodCall(
                "session accessed after close".into(),
            ));
        }
        self.facility.clear();
        let params = self.facility.cookie_params();
        let expires_at = Utc::now() - Duration::seconds(EXPIRE_BACKDATE_SECS);
        self.facility.expire_cookie(&params, expires_at);
        self.ensure_init().await?;
        self.facility.destroy().await?;
        self.flags.lock().state = GuardState::Closed;
        tracing::debug!("session destroyed");
        Ok(())
    }

    /// Release the session. Read-write sessions flush through the facility;
    /// read-only sessions just close (their handle was released at open
    /// time). A guard that never activated closes silently under lazy load
    /// and errors otherwise.
    pub async fn close(&self) -> Result<()> {
        let (state, read_only) = {
            let flags = self.flags.lock();
            (flags.state, flags.read_only)
        };
        match state {
            GuardState::Idle | GuardState::StartedLazy => {
                if self.lazy_load {
                    self.flags.lock().state = GuardState::Closed;
                    Ok(())
                } else {
                    Err(Error::InvalidMethodCall(
                        "close called although session was never started".into(),
                    ))
                }
            }
            GuardState::Active => {
                if !read_only {
                    self.facility.write_close().await?;
                }
                self.flags.lock().state = GuardState::Closed;
                tracing::debug!(read_only, "session closed");
                Ok(())
            }
            GuardState::Closed => Err(Error::InvalidMethodCall("close called twice".into())),
        }
    }

    /// Open the facility if this guard has not done so yet.
    ///
    /// Accessors may run before `start`; the session initializes read-write
    /// in that case.
    async fn ensure_init(&self) -> Result<()> {
        let read_only = {
            let flags = self.flags.lock();
            match flags.state {
                GuardState::Active => return Ok(()),
                GuardState::Closed => {
                    return Err(Error::InvalidMethodCall(
                        "session accessed after close".into(),
                    ))
                }
                GuardState::Idle | GuardState::StartedLazy => {
                    if self.facility.status() == FacilityStatus::Active {
                        return Err(Error::UnexpectedActiveSession(
                            "facility reports an active session this guard did not open".into(),
                        ));
                    }
                    flags.read_only
                }
            }
        };
        self.facility
            .open(OpenOptions {
                read_and_close: read_only,
            })
            .await?;
        self.flags.lock().state = GuardState::Active;
        tracing::debug!(read_only, "session opened");
        Ok(())
    }

    fn check_writable(&self, op: &str) -> Result<()> {
        if self.flags.lock().read_only {
            return Err(Error::AccessViolation(format!(
                "{op} called on read-only session"
            )));
        }
        Ok(())
    }
}
