use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use meetsync_core::{ApiError, RoomConfig, Session, SessionId, SessionStatus};

use crate::client::{Availability, AvailabilityRequest, RescheduleRequest, SessionsApi};

/// In-memory backend for deterministic tests.
///
/// Holds a mutable session list; mutations edit it in place. Queued errors are
/// returned by the next call of any endpoint, and an optional delay is awaited
/// before every call so concurrent callers can overlap.
#[derive(Default)]
pub struct MockSessionsApi {
    sessions: Mutex<Vec<Session>>,
    room_config: Mutex<Option<Result<RoomConfig, ApiError>>>,
    availability: Mutex<Availability>,
    errors: Mutex<VecDeque<ApiError>>,
    delay: Mutex<Option<Duration>>,
    active_calls: AtomicUsize,
    room_config_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
    availability_calls: AtomicUsize,
}

impl MockSessionsApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: Vec<Session>) -> Self {
        let api = Self::default();
        api.set_sessions(sessions);
        api
    }

    pub fn set_sessions(&self, sessions: Vec<Session>) {
        *self.sessions.lock() = sessions;
    }

    /// Replace one session by id, or append it.
    pub fn upsert(&self, session: Session) {
        let mut sessions = self.sessions.lock();
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(slot) => *slot = session,
            None => sessions.push(session),
        }
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.lock().clone()
    }

    pub fn set_room_config(&self, result: Result<RoomConfig, ApiError>) {
        *self.room_config.lock() = Some(result);
    }

    pub fn set_availability(&self, availability: Availability) {
        *self.availability.lock() = availability;
    }

    pub fn fail_next(&self, error: ApiError) {
        self.errors.lock().push_back(error);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn active_calls(&self) -> usize {
        self.active_calls.load(Ordering::Relaxed)
    }

    pub fn room_config_calls(&self) -> usize {
        self.room_config_calls.load(Ordering::Relaxed)
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::Relaxed)
    }

    pub fn availability_calls(&self) -> usize {
        self.availability_calls.load(Ordering::Relaxed)
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<(), ApiError> {
        let _ = counter.fetch_add(1, Ordering::Relaxed);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.errors.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn mutate(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut Session),
    ) -> Result<Session, ApiError> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ApiError::NotFound(format!("session {id}")))?;
        f(session);
        Ok(session.clone())
    }
}

#[async_trait]
impl SessionsApi for MockSessionsApi {
    async fn active_sessions(&self) -> Result<Vec<Session>, ApiError> {
        self.enter(&self.active_calls).await?;
        Ok(self.sessions.lock().clone())
    }

    async fn room_config(&self, id: SessionId) -> Result<RoomConfig, ApiError> {
        self.enter(&self.room_config_calls).await?;
        self.room_config
            .lock()
            .clone()
            .unwrap_or_else(|| Err(ApiError::NotFound(format!("room config for {id}"))))
    }

    async fn start_session(&self, id: SessionId) -> Result<Session, ApiError> {
        self.enter(&self.mutation_calls).await?;
        self.mutate(id, |s| s.status = SessionStatus::Started)
    }

    async fn end_session(&self, id: SessionId) -> Result<Session, ApiError> {
        self.enter(&self.mutation_calls).await?;
        self.mutate(id, |s| s.status = SessionStatus::Completed)
    }

    async fn cancel_session(&self, id: SessionId) -> Result<Session, ApiError> {
        self.enter(&self.mutation_calls).await?;
        self.mutate(id, |s| s.status = SessionStatus::Cancelled)
    }

    async fn reschedule_session(
        &self,
        id: SessionId,
        request: &RescheduleRequest,
    ) -> Result<Session, ApiError> {
        self.enter(&self.mutation_calls).await?;
        self.mutate(id, |s| {
            s.status = SessionStatus::Rescheduled;
            s.scheduled_at = request.scheduled_at;
            s.timezone = request.timezone.clone();
        })
    }

    async fn check_availability(
        &self,
        _request: &AvailabilityRequest,
    ) -> Result<Availability, ApiError> {
        self.enter(&self.availability_calls).await?;
        Ok(self.availability.lock().clone())
    }
}
