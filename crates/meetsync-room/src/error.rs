use meetsync_core::ApiError;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("failed to load room client library: {0}")]
    ScriptLoad(String),

    #[error("failed to load meeting configuration: {0}")]
    Config(#[from] ApiError),

    #[error("failed to initialize video conference: {0}")]
    Provider(String),

    #[error("room controller is unmounted")]
    Unmounted,

    #[error("initialization superseded by a newer attempt")]
    Superseded,
}

impl RoomError {
    /// The controller went away or restarted; not a failure of the room itself.
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Unmounted | Self::Superseded)
    }

    /// Message for the failure banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::ScriptLoad(_) => "Failed to load the video conference client".into(),
            Self::Config(ApiError::InvalidRequest(body) | ApiError::Server { body, .. }) => {
                backend_error(body).unwrap_or_else(|| "Failed to load meeting configuration".into())
            }
            Self::Config(ApiError::NotFound(_)) => "The meeting room could not be found".into(),
            Self::Config(e) => e.user_message(),
            Self::Provider(_) => "Failed to initialize video conference".into(),
            Self::Unmounted | Self::Superseded => "The meeting view was closed".into(),
        }
    }
}

fn backend_error(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("error")?.as_str().map(str::to_owned)
}
