use meetsync_core::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Another update for the same session is still in flight or cooling down.
    #[error("an update for this session is already in progress")]
    Busy,

    #[error("{0}")]
    Unavailable(String),
}

impl ActionError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::Busy => "Please wait, the previous request is still being processed.".into(),
            Self::Unavailable(msg) => msg.clone(),
        }
    }
}
