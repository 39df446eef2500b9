//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`MeetsyncSettings::default()`]
//! 2. If `~/.meetsync/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `MEETSYNC_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::MeetsyncSettings;

/// Resolve the settings directory (`~/.meetsync`).
pub fn settings_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".meetsync")
}

/// Resolve the path to the settings file (`~/.meetsync/settings.json`).
pub fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

/// Resolve a possibly relative data path against the settings directory.
pub fn resolve_data_path(path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        settings_dir().join(p)
    }
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<MeetsyncSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<MeetsyncSettings> {
    let defaults = serde_json::to_value(MeetsyncSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: MeetsyncSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Integers must parse and fall within range; booleans accept
/// `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`. Anything else is
/// ignored with a warning.
pub fn apply_env_overrides(settings: &mut MeetsyncSettings) {
    // ── API ─────────────────────────────────────────────────────────
    if let Some(v) = read_env_string("MEETSYNC_BASE_URL") {
        settings.api.base_url = v;
    }
    if let Some(v) = read_env_u64("MEETSYNC_TIMEOUT_MS", 100, 600_000) {
        settings.api.timeout_ms = v;
    }

    // ── Cache ───────────────────────────────────────────────────────
    if let Some(v) = read_env_string("MEETSYNC_CACHE_DB") {
        settings.cache.db_path = v;
    }
    if let Some(v) = read_env_u64("MEETSYNC_CACHE_TTL_SECS", 1, 86_400) {
        settings.cache.ttl_secs = v;
    }

    // ── Sync ────────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("MEETSYNC_POLL_INTERVAL_SECS", 5, 86_400) {
        settings.sync.poll_interval_secs = v;
    }
    if let Some(v) = read_env_u64("MEETSYNC_FETCH_FLOOR_SECS", 0, 86_400) {
        settings.sync.fetch_floor_secs = v;
    }
    if let Some(v) = read_env_u64("MEETSYNC_NO_CHANGE_THRESHOLD", 1, 100) {
        settings.sync.no_change_threshold = v as u32;
    }

    // ── Watcher ─────────────────────────────────────────────────────
    if let Some(v) = read_env_bool("MEETSYNC_WATCHER_ENABLED") {
        settings.watcher.enabled = v;
    }
    if let Some(v) = read_env_u64("MEETSYNC_WATCHER_INTERVAL_SECS", 5, 3_600) {
        settings.watcher.interval_secs = v;
    }

    // ── Room ────────────────────────────────────────────────────────
    if let Some(v) = read_env_string("MEETSYNC_ROOM_SCRIPT_URL") {
        settings.room.script_url = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("MEETSYNC_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("MEETSYNC_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}
