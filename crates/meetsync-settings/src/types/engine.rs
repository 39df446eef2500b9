//! Sync scheduler, change watcher and room settings.

use serde::{Deserialize, Serialize};

/// Sync scheduler thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Regular tick interval.
    pub poll_interval_secs: u64,
    /// Minimum gap between physical fetches on regular ticks.
    pub fetch_floor_secs: u64,
    /// Sessions further out than this are eligible for backoff.
    pub far_future_minutes: u64,
    /// Unchanged fetches before backoff engages.
    pub no_change_threshold: u32,
    /// While backing off, fetch anyway after this long.
    pub backoff_refresh_secs: u64,
    /// How far in the past a start time may be and still qualify.
    pub recent_past_minutes: u64,
    /// High-frequency polling engages this close to the start.
    pub high_frequency_window_minutes: u64,
    /// High-frequency tick interval.
    pub high_frequency_interval_secs: u64,
    /// Minimum gap between fetches on high-frequency ticks.
    pub high_frequency_floor_secs: u64,
    /// Dedup cool-down for ordinary keys.
    pub dedup_cooldown_ms: u64,
    /// Dedup cool-down for session-update keys.
    pub update_cooldown_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            fetch_floor_secs: 300,
            far_future_minutes: 60,
            no_change_threshold: 3,
            backoff_refresh_secs: 1_800,
            recent_past_minutes: 60,
            high_frequency_window_minutes: 10,
            high_frequency_interval_secs: 30,
            high_frequency_floor_secs: 60,
            dedup_cooldown_ms: 1_000,
            update_cooldown_ms: 3_000,
        }
    }
}

/// Started-session change watcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatcherSettings {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
        }
    }
}

/// Room provider client settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    /// Where the provider client library is loaded from.
    pub script_url: String,
    /// Application name shown inside the room.
    pub app_name: String,
    /// Provider name shown inside the room.
    pub provider_name: String,
    /// Toolbar buttons enabled by default.
    pub toolbar_buttons: Vec<String>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            script_url: "https://meet.jit.si/external_api.js".to_string(),
            app_name: "SaaS Platform Meeting".to_string(),
            provider_name: "SaaS Platform".to_string(),
            toolbar_buttons: [
                "microphone",
                "camera",
                "closedcaptions",
                "desktop",
                "fullscreen",
                "fodeviceselection",
                "hangup",
                "profile",
                "chat",
                "recording",
                "livestreaming",
                "etherpad",
                "sharedvideo",
                "settings",
                "raisehand",
                "videoquality",
                "filmstrip",
                "invite",
                "feedback",
                "stats",
                "shortcuts",
                "tileview",
                "videobackgroundblur",
                "download",
                "help",
                "mute-everyone",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}
