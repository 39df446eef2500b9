//! Backend, cache and logging settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Backend REST client settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Whole-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Environment variable the bearer token is read from.
    pub token_env: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_ms: 15_000,
            connect_timeout_ms: 5_000,
            token_env: "MEETSYNC_TOKEN".to_string(),
        }
    }
}

/// Persisted cache settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Database path, relative to `~/.meetsync` unless absolute.
    pub db_path: String,
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            db_path: "cache.db".to_string(),
            ttl_secs: 300,
        }
    }
}

/// Logging configuration. `RUST_LOG` still wins when set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Emit JSON lines.
    pub json: bool,
    /// Per-module level overrides keyed by target.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}
