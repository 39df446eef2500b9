//! Settings type definitions.
//!
//! All types use camelCase JSON keys and implement [`Default`] with the
//! production values, so a partial settings file only needs the keys it
//! changes.

mod engine;
mod service;

pub use engine::*;
pub use service::*;

use serde::{Deserialize, Serialize};

use crate::SettingsError;

/// Root settings type.
///
/// ```json
/// {
///   "api": { "baseUrl": "https://app.example.com/api" },
///   "sync": { "fetchFloorSecs": 120 },
///   "logging": { "level": "debug", "modules": { "meetsync_room": "trace" } }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeetsyncSettings {
    /// Backend REST client.
    pub api: ApiSettings,
    /// Persisted session cache.
    pub cache: CacheSettings,
    /// Sync scheduler thresholds.
    pub sync: SyncSettings,
    /// Started-session change watcher.
    pub watcher: WatcherSettings,
    /// Room provider client.
    pub room: RoomSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl MeetsyncSettings {
    /// Reject combinations the engine cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        let nonzero = [
            ("api.timeoutMs", self.api.timeout_ms),
            ("cache.ttlSecs", self.cache.ttl_secs),
            ("sync.pollIntervalSecs", self.sync.poll_interval_secs),
            ("sync.highFrequencyIntervalSecs", self.sync.high_frequency_interval_secs),
            ("watcher.intervalSecs", self.watcher.interval_secs),
        ];
        if let Some((field, _)) = nonzero.into_iter().find(|(_, value)| *value == 0) {
            return Err(SettingsError::NotPositive { field });
        }
        let urls = [
            ("api.baseUrl", &self.api.base_url),
            ("room.scriptUrl", &self.room.script_url),
        ];
        for (field, value) in urls {
            if !is_http_url(value) {
                return Err(SettingsError::InvalidUrl {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.len() > scheme.len() && value.starts_with(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_roundtrip_through_json() {
        let settings = MeetsyncSettings::default();
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["sync"]["noChangeThreshold"], 3);
        assert_eq!(json["room"]["scriptUrl"], "https://meet.jit.si/external_api.js");
        let back: MeetsyncSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut settings = MeetsyncSettings::default();
        assert!(settings.validate().is_ok());
        settings.watcher.interval_secs = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("watcher.intervalSecs"));
    }

    #[test]
    fn validate_rejects_blank_base_url() {
        let mut settings = MeetsyncSettings::default();
        settings.api.base_url = "  ".into();
        let err = settings.validate().unwrap_err();
        assert_eq!(err.field(), Some("api.baseUrl"));
    }

    #[test]
    fn validate_rejects_schemeless_script_url() {
        let mut settings = MeetsyncSettings::default();
        settings.room.script_url = "meet.jit.si/external_api.js".into();
        let err = settings.validate().unwrap_err();
        assert!(matches!(
            err,
            SettingsError::InvalidUrl { field: "room.scriptUrl", .. }
        ));
    }

    #[test]
    fn validate_reports_first_zero_field() {
        let mut settings = MeetsyncSettings::default();
        settings.cache.ttl_secs = 0;
        settings.watcher.interval_secs = 0;
        assert!(matches!(
            settings.validate().unwrap_err(),
            SettingsError::NotPositive { field: "cache.ttlSecs" }
        ));
    }
}
