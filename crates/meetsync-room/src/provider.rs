use meetsync_core::UserInfo;
use secrecy::SecretString;
use serde_json::Value;

use crate::error::RoomError;
use crate::state::ProviderSignal;

/// Listener callback registered on a provider client.
pub type EventCallback = Box<dyn Fn(Value) + Send + Sync>;

/// Events the controller subscribes to on every provider client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderEventName {
    VideoConferenceJoined,
    VideoConferenceLeft,
    ParticipantJoined,
    ParticipantLeft,
    ReadyToClose,
    ErrorOccurred,
}

impl ProviderEventName {
    pub const ALL: [ProviderEventName; 6] = [
        Self::VideoConferenceJoined,
        Self::VideoConferenceLeft,
        Self::ParticipantJoined,
        Self::ParticipantLeft,
        Self::ReadyToClose,
        Self::ErrorOccurred,
    ];

    /// Name used by the provider's listener API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VideoConferenceJoined => "videoConferenceJoined",
            Self::VideoConferenceLeft => "videoConferenceLeft",
            Self::ParticipantJoined => "participantJoined",
            Self::ParticipantLeft => "participantLeft",
            Self::ReadyToClose => "readyToClose",
            Self::ErrorOccurred => "errorOccurred",
        }
    }

    /// Normalize a callback payload into a signal.
    pub fn to_signal(self, payload: &Value) -> ProviderSignal {
        match self {
            Self::VideoConferenceJoined => ProviderSignal::Joined,
            Self::VideoConferenceLeft => ProviderSignal::Left,
            Self::ParticipantJoined => ProviderSignal::ParticipantJoined,
            Self::ParticipantLeft => ProviderSignal::ParticipantLeft,
            Self::ReadyToClose => ProviderSignal::ReadyToClose,
            Self::ErrorOccurred => ProviderSignal::Error(error_message(payload)),
        }
    }
}

fn error_message(payload: &Value) -> String {
    payload
        .get("message")
        .or_else(|| payload.get("name"))
        .or_else(|| payload.get("type"))
        .and_then(Value::as_str)
        .or_else(|| payload.as_str())
        .unwrap_or("Unknown error")
        .to_string()
}

/// Options handed to the provider constructor.
#[derive(Clone, Debug)]
pub struct RoomOptions {
    pub room_name: String,
    pub user_info: UserInfo,
    pub config_overwrite: Value,
    pub interface_config_overwrite: Value,
    pub jwt: Option<SecretString>,
}

/// Factory for provider clients. Construction is synchronous; the client
/// reports progress through its event listeners.
pub trait RoomProvider: Send + Sync {
    fn create(&self, domain: &str, options: RoomOptions) -> Result<Box<dyn RoomClient>, RoomError>;
}

/// One live provider handle.
pub trait RoomClient: Send + Sync {
    fn add_event_listener(&self, event: ProviderEventName, callback: EventCallback);

    fn execute_command(&self, command: &str, argument: Value) -> Result<(), RoomError>;

    fn dispose(&self) -> Result<(), RoomError>;
}
