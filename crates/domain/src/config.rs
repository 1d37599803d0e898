use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_4117")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: 4117,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session-guard configuration: lazy activation, runtime settings applied
/// to the facility before each request's guard starts, and the transport
/// cookie attributes the facility reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Defer opening the underlying session until the first accessor call.
    /// Read-only requests that never touch the session then cost nothing.
    #[serde(default = "d_true")]
    pub lazy_load: bool,

    /// Runtime settings applied to the facility before the guard starts
    /// (e.g. `"session.strict_mode" = "1"`).
    #[serde(default)]
    pub settings: HashMap<String, String>,

    /// Transport-cookie attributes for the session identifier.
    #[serde(default)]
    pub cookie: CookieParams,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lazy_load: true,
            settings: HashMap::new(),
            cookie: CookieParams::default(),
        }
    }
}

/// Attributes of the session's transport cookie.
///
/// The facility owns cookie transport; these parameters are what it reports
/// via `cookie_params()` and what a destroy records on the expiration
/// instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieParams {
    #[serde(default = "d_cookie_name")]
    pub name: String,
    #[serde(default = "d_root_path")]
    pub path: String,
    #[serde(default)]
    pub domain: Option<String>,
    /// Only send the cookie over HTTPS.
    #[serde(default)]
    pub secure: bool,
    /// Hide the cookie from client-side scripts.
    #[serde(default = "d_true")]
    pub http_only: bool,
    /// Cookie lifetime in seconds; `None` means a browser-session cookie.
    #[serde(default)]
    pub lifetime_secs: Option<u32>,
}

impl Default for CookieParams {
    fn default() -> Self {
        Self {
            name: d_cookie_name(),
            path: d_root_path(),
            domain: None,
            secure: false,
            http_only: true,
            lifetime_secs: None,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_4117() -> u16 {
    4117
}
fn d_true() -> bool {
    true
}
fn d_cookie_name() -> String {
    "warden_sid".into()
}
fn d_root_path() -> String {
    "/".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
