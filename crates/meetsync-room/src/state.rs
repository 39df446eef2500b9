use serde::Serialize;

/// Connection state of one room controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Idle,
    ScriptLoading,
    ConfigFetching,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl RoomState {
    pub const ALL: [RoomState; 7] = [
        Self::Idle,
        Self::ScriptLoading,
        Self::ConfigFetching,
        Self::Connecting,
        Self::Connected,
        Self::Disconnected,
        Self::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ScriptLoading => "script_loading",
            Self::ConfigFetching => "config_fetching",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        }
    }

    /// Initialization still in progress.
    pub fn is_loading(self) -> bool {
        matches!(self, Self::ScriptLoading | Self::ConfigFetching | Self::Connecting)
    }

    /// A provider handle exists and may emit events.
    fn has_session(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider event, normalized from the callback payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderSignal {
    Joined,
    Left,
    ReadyToClose,
    ParticipantJoined,
    ParticipantLeft,
    Error(String),
}

/// Side effect the controller fires after applying a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Joined,
    MeetingEnded,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub state: RoomState,
    pub participants: u32,
    pub effect: Option<Effect>,
}

impl Transition {
    fn stay(state: RoomState, participants: u32) -> Self {
        Self {
            state,
            participants,
            effect: None,
        }
    }
}

/// Apply one provider signal. Signals that make no sense in the current state
/// leave it untouched, so a duplicate `Joined` never re-enters `Connected`.
pub fn on_signal(state: RoomState, participants: u32, signal: &ProviderSignal) -> Transition {
    match signal {
        ProviderSignal::Joined if state == RoomState::Connecting => Transition {
            state: RoomState::Connected,
            participants,
            effect: Some(Effect::Joined),
        },
        ProviderSignal::Left | ProviderSignal::ReadyToClose if state.has_session() => Transition {
            state: RoomState::Disconnected,
            participants: 0,
            effect: Some(Effect::MeetingEnded),
        },
        ProviderSignal::ParticipantJoined if state.has_session() => {
            Transition::stay(state, participants.saturating_add(1))
        }
        ProviderSignal::ParticipantLeft if state.has_session() => {
            Transition::stay(state, participants.saturating_sub(1))
        }
        ProviderSignal::Error(message) if state.has_session() => Transition {
            state: RoomState::Failed,
            participants,
            effect: Some(Effect::Failed(format!("Meeting error: {message}"))),
        },
        _ => Transition::stay(state, participants),
    }
}
