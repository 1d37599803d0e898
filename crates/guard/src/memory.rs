//! In-memory session facility.
//!
//! Models a single logical session: a persisted `store` table keyed by the
//! current identifier and the `live` table that `open` loads from it. Used
//! by the test suites and the demo server; production backends implement
//! [`SessionFacility`] over a real store instead.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use sw_domain::config::CookieParams;
use sw_domain::error::Result;

use crate::facility::{ExpiredCookie, FacilityStatus, OpenOptions, SessionFacility};

struct MemoryInner {
    status: FacilityStatus,
    session_id: String,
    store: HashMap<String, Value>,
    live: HashMap<String, Value>,
    settings: HashMap<String, String>,
    expired_cookies: Vec<ExpiredCookie>,
    open_count: usize,
    write_close_count: usize,
    destroy_count: usize,
    last_open: Option<OpenOptions>,
}

pub struct MemoryFacility {
    cookie: CookieParams,
    inner: Mutex<MemoryInner>,
}

impl MemoryFacility {
    pub fn new(cookie: CookieParams) -> Self {
        Self {
            cookie,
            inner: Mutex::new(MemoryInner {
                status: FacilityStatus::Inactive,
                session_id: Uuid::new_v4().to_string(),
                store: HashMap::new(),
                live: HashMap::new(),
                settings: HashMap::new(),
                expired_cookies: Vec::new(),
                open_count: 0,
                write_close_count: 0,
                destroy_count: 0,
                last_open: None,
            }),
        }
    }

    // ── inspection surface ──

    pub fn session_id(&self) -> String {
        self.inner.lock().session_id.clone()
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().open_count
    }

    pub fn write_close_count(&self) -> usize {
        self.inner.lock().write_close_count
    }

    pub fn destroy_count(&self) -> usize {
        self.inner.lock().destroy_count
    }

    pub fn last_open(&self) -> Option<OpenOptions> {
        self.inner.lock().last_open
    }

    pub fn expired_cookies(&self) -> Vec<ExpiredCookie> {
        self.inner.lock().expired_cookies.clone()
    }

    pub fn setting(&self, name: &str) -> Option<String> {
        self.inner.lock().settings.get(name).cloned()
    }
}

impl Default for MemoryFacility {
    fn default() -> Self {
        Self::new(CookieParams::default())
    }
}

#[async_trait]
impl SessionFacility for MemoryFacility {
    fn status(&self) -> FacilityStatus {
        self.inner.lock().status
    }

    async fn open(&self, options: OpenOptions) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.live = inner.store.clone();
        inner.status = if options.read_and_close {
            FacilityStatus::Inactive
        } else {
            FacilityStatus::Active
        };
        inner.open_count += 1;
        inner.last_open = Some(options);
        tracing::debug!(
            session_id = %inner.session_id,
            read_and_close = options.read_and_close,
            "memory facility opened"
        );
        Ok(())
    }

    async fn regenerate_id(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let old_id = std::mem::replace(&mut inner.session_id, Uuid::new_v4().to_string());
        tracing::debug!(old_id = %old_id, new_id = %inner.session_id, "session id regenerated");
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.store.clear();
        inner.status = FacilityStatus::Inactive;
        inner.destroy_count += 1;
        tracing::debug!(session_id = %inner.session_id, "memory facility destroyed");
        Ok(())
    }

    async fn write_close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.store = inner.live.clone();
        inner.status = FacilityStatus::Inactive;
        inner.write_close_count += 1;
        Ok(())
    }

    fn cookie_params(&self) -> CookieParams {
        self.cookie.clone()
    }

    fn expire_cookie(&self, params: &CookieParams, expires_at: DateTime<Utc>) {
        self.inner.lock().expired_cookies.push(ExpiredCookie {
            expires_at,
            params: params.clone(),
        });
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().live.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.inner.lock().live.insert(key.to_owned(), value);
    }

    fn remove(&self, key: &str) {
        self.inner.lock().live.remove(key);
    }

    fn clear(&self) {
        self.inner.lock().live.clear();
    }

    fn apply_setting(&self, name: &str, value: &str) {
        self.inner
            .lock()
            .settings
            .insert(name.to_owned(), value.to_owned());
    }
}
