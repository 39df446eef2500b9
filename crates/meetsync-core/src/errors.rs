use std::time::Duration;

/// Typed error hierarchy for backend REST calls.
/// Classifies failures as transient (retry on the next tick), authentication
/// (credentials must be refreshed elsewhere) or permanent.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    // Authentication: owned by the auth collaborator
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    // Permanent for this request
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("could not decode response: {0}")]
    Decode(String),

    // Transient
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Network(_) | Self::Timeout(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Decode(_) => "decode",
            Self::Server { .. } => "server_error",
            Self::Network(_) => "network_error",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized(body),
            404 => Self::NotFound(body),
            400 | 409 | 422 => Self::InvalidRequest(body),
            500..=599 => Self::Server { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }

    /// Message suitable for showing to the user in a dismissible banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized(_) => "Your session has expired. Please sign in again.".into(),
            Self::NotFound(_) => "The meeting could not be found.".into(),
            Self::InvalidRequest(body) | Self::Server { body, .. } => {
                backend_message(body).unwrap_or_else(|| "The server could not process the request.".into())
            }
            Self::Decode(_) => "Received an unexpected response from the server.".into(),
            Self::Network(_) | Self::Timeout(_) => {
                "Unable to reach the server. Check your connection; we will keep trying.".into()
            }
        }
    }
}

/// Pull a `message` or `error` field out of a JSON error body.
fn backend_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(|v| v.as_str())
        .map(str::to_owned)
}
