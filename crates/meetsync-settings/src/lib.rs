//! # meetsync-settings
//!
//! Layered configuration for the meetsync engine.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`MeetsyncSettings::default()`]
//! 2. **User file**: `~/.meetsync/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `MEETSYNC_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, resolve_data_path,
    settings_dir, settings_path,
};
pub use types::*;
