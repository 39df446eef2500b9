use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meetsync_core::{ApiError, RoomConfig, Session, SessionId};

/// Body of `POST /sessions/check-availability`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AvailabilityRequest {
    pub scheduled_at: DateTime<Utc>,
    pub timezone: String,
    /// Minutes.
    pub duration: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Availability {
    pub available: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// New slot for a rescheduled session.
#[derive(Clone, Debug, PartialEq)]
pub struct RescheduleRequest {
    pub scheduled_at: DateTime<Utc>,
    pub timezone: String,
}

/// Backend operations the engine depends on.
#[async_trait]
pub trait SessionsApi: Send + Sync {
    /// `GET /sessions/active`.
    async fn active_sessions(&self) -> Result<Vec<Session>, ApiError>;

    /// `GET /rooms/config/{id}`.
    async fn room_config(&self, id: SessionId) -> Result<RoomConfig, ApiError>;

    /// `PUT /sessions/{id}/start`.
    async fn start_session(&self, id: SessionId) -> Result<Session, ApiError>;

    /// `PUT /sessions/{id}/end`.
    async fn end_session(&self, id: SessionId) -> Result<Session, ApiError>;

    /// `PUT /sessions/{id}` with status `cancelled`.
    async fn cancel_session(&self, id: SessionId) -> Result<Session, ApiError>;

    /// `PUT /sessions/{id}` with the new slot and status `rescheduled`.
    async fn reschedule_session(
        &self,
        id: SessionId,
        request: &RescheduleRequest,
    ) -> Result<Session, ApiError>;

    /// `POST /sessions/check-availability`.
    async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<Availability, ApiError>;
}
