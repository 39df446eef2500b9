use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Backend-authoritative lifecycle status of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Confirmed,
    Rescheduled,
    Started,
    Completed,
    Cancelled,
    Expired,
}

impl SessionStatus {
    /// Statuses the scheduler will surface as the user's current session.
    pub fn is_live_candidate(self) -> bool {
        matches!(self, Self::Confirmed | Self::Rescheduled | Self::Started)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rescheduled => "rescheduled",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "rescheduled" => Ok(Self::Rescheduled),
            "started" => Ok(Self::Started),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// One side of a session (the booking client or the host).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: u64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl Participant {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

/// Read-mostly client copy of a backend session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    /// Minutes.
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub timezone: String,
    pub status: SessionStatus,
    #[serde(default, rename = "meeting_url", skip_serializing_if = "Option::is_none")]
    pub room_url: Option<String>,
    /// The initiating client.
    #[serde(default, rename = "user", skip_serializing_if = "Option::is_none")]
    pub client: Option<Participant>,
    /// The counterpart hosting the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        id: SessionId,
        title: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        status: SessionStatus,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            scheduled_at,
            duration: 30,
            timezone: "UTC".into(),
            status,
            room_url: None,
            client: None,
            host: None,
            goals: None,
            notes: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_room(mut self, url: impl Into<String>) -> Self {
        self.room_url = Some(url.into());
        self
    }

    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Identity comparison used to decide whether consumers need an update:
    /// id, status and room endpoint.
    pub fn same_identity(&self, other: &Session) -> bool {
        self.id == other.id && self.status == other.status && self.room_url == other.room_url
    }

    pub fn has_room(&self) -> bool {
        self.room_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "Consultation Meeting"
        } else {
            &self.title
        }
    }
}

/// Compare two optional sessions by identity.
pub fn identity_changed(current: Option<&Session>, next: Option<&Session>) -> bool {
    match (current, next) {
        (None, None) => false,
        (Some(a), Some(b)) => !a.same_identity(b),
        _ => true,
    }
}
