//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The settings file is not JSON.
    #[error("{} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Merged values do not fit the settings schema (wrong type for a key).
    #[error("settings have the wrong shape: {0}")]
    Shape(#[from] serde_json::Error),
    /// An interval, timeout or TTL that must be positive is zero.
    #[error("{field} must be > 0")]
    NotPositive { field: &'static str },
    /// An endpoint that must be an http(s) URL.
    #[error("{field} must be an http(s) URL, got {value:?}")]
    InvalidUrl { field: &'static str, value: String },
}

impl SettingsError {
    /// Settings key the error is about, for the ones tied to a single value.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::NotPositive { field } | Self::InvalidUrl { field, .. } => Some(*field),
            Self::Read { .. } | Self::Parse { .. } | Self::Shape(_) => None,
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
