use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use meetsync_api::{Availability, AvailabilityRequest, RescheduleRequest, SessionsApi};
use meetsync_core::{ApiError, Session, SessionId};

use crate::dedup::{Deduplicator, RequestKey};
use crate::error::ActionError;
use crate::scheduler::SyncScheduler;

const SLOT_TAKEN: &str = "You already have a meeting scheduled at this time";

/// Session mutations. Each goes through the deduplicator under the
/// session's update key and writes its response through the scheduler.
pub struct SessionActions {
    api: Arc<dyn SessionsApi>,
    dedup: Deduplicator,
    scheduler: Arc<SyncScheduler>,
}

impl SessionActions {
    pub fn new(api: Arc<dyn SessionsApi>, dedup: Deduplicator, scheduler: Arc<SyncScheduler>) -> Self {
        Self { api, dedup, scheduler }
    }

    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn start(&self, id: SessionId) -> Result<Session, ActionError> {
        self.update(id, self.api.start_session(id)).await
    }

    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn end(&self, id: SessionId) -> Result<Session, ActionError> {
        self.update(id, self.api.end_session(id)).await
    }

    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn cancel(&self, id: SessionId) -> Result<Session, ActionError> {
        self.update(id, self.api.cancel_session(id)).await
    }

    /// Move a session to a new slot after confirming the slot is free.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn reschedule(
        &self,
        id: SessionId,
        duration: u32,
        scheduled_at: DateTime<Utc>,
        timezone: &str,
    ) -> Result<Session, ActionError> {
        let availability = self
            .check_availability(&AvailabilityRequest {
                scheduled_at,
                timezone: timezone.to_string(),
                duration,
            })
            .await?;
        if !availability.available {
            return Err(ActionError::Unavailable(
                availability.message.unwrap_or_else(|| SLOT_TAKEN.to_string()),
            ));
        }

        let request = RescheduleRequest {
            scheduled_at,
            timezone: timezone.to_string(),
        };
        self.update(id, self.api.reschedule_session(id, &request)).await
    }

    pub async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<Availability, ActionError> {
        self.dedup
            .run_exclusive(RequestKey::Availability, self.api.check_availability(request))
            .await?
            .ok_or(ActionError::Busy)
    }

    async fn update<F>(&self, id: SessionId, op: F) -> Result<Session, ActionError>
    where
        F: Future<Output = Result<Session, ApiError>>,
    {
        let session = self
            .dedup
            .run_exclusive(RequestKey::SessionUpdate(id), op)
            .await?
            .ok_or(ActionError::Busy)?;
        info!(session_id = %session.id, status = %session.status, "session updated");
        let _ = self.scheduler.apply_mutation(session.clone());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::{TimeDelta, TimeZone};
    use meetsync_api::mock::MockSessionsApi;
    use meetsync_core::{ManualClock, SessionStatus, VisibilityFlag};
    use meetsync_store::{Database, TtlCache, DEFAULT_TTL};

    use crate::scheduler::{SyncConfig, TickKind};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn setup() -> (SessionActions, Arc<MockSessionsApi>, Arc<SyncScheduler>) {
        let session = Session::new(
            SessionId::new(3),
            "Review",
            t0() + TimeDelta::minutes(20),
            SessionStatus::Confirmed,
        )
        .with_room("https://meet.jit.si/review-3");
        let api = Arc::new(MockSessionsApi::with_sessions(vec![session]));
        let clock = Arc::new(ManualClock::new(t0()));
        let dedup = Deduplicator::default();
        let scheduler = Arc::new(SyncScheduler::new(
            api.clone(),
            TtlCache::new(Database::in_memory().unwrap(), DEFAULT_TTL, clock.clone()),
            dedup.clone(),
            clock,
            Arc::new(VisibilityFlag::default()),
            SyncConfig::default(),
        ));
        let actions = SessionActions::new(api.clone(), dedup, scheduler.clone());
        (actions, api, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn start_writes_through_to_scheduler() {
        let (actions, _, scheduler) = setup();
        let _ = scheduler.tick(TickKind::Forced).await;
        let mut rx = scheduler.subscribe();

        let started = actions.start(SessionId::new(3)).await.unwrap();
        assert_eq!(started.status, SessionStatus::Started);
        assert!(rx.has_changed().unwrap());
        assert_eq!(scheduler.current().unwrap().status, SessionStatus::Started);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_update_within_cooldown_is_busy() {
        let (actions, api, _) = setup();
        let _ = actions.start(SessionId::new(3)).await.unwrap();
        let second = actions.end(SessionId::new(3)).await;
        assert!(matches!(second, Err(ActionError::Busy)));
        assert_eq!(api.mutation_calls(), 1);

        tokio::time::sleep(Duration::from_millis(3_100)).await;
        let ended = actions.end(SessionId::new(3)).await.unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_clears_current_session() {
        let (actions, _, scheduler) = setup();
        let _ = scheduler.tick(TickKind::Forced).await;
        let _ = actions.cancel(SessionId::new(3)).await.unwrap();
        assert!(scheduler.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_checks_availability_first() {
        let (actions, api, _) = setup();
        api.set_availability(Availability {
            available: false,
            message: None,
        });

        let err = actions
            .reschedule(SessionId::new(3), 30, t0() + TimeDelta::days(1), "UTC")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), SLOT_TAKEN);
        assert_eq!(api.availability_calls(), 1);
        assert_eq!(api.mutation_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_moves_session() {
        let (actions, api, scheduler) = setup();
        api.set_availability(Availability {
            available: true,
            message: None,
        });
        let at = t0() + TimeDelta::days(1);

        let updated = actions
            .reschedule(SessionId::new(3), 30, at, "Europe/Paris")
            .await
            .unwrap();
        assert_eq!(updated.status, SessionStatus::Rescheduled);
        assert_eq!(updated.scheduled_at, at);
        assert_eq!(scheduler.current().unwrap().timezone, "Europe/Paris");
    }

    #[tokio::test(start_paused = true)]
    async fn api_errors_surface_with_user_message() {
        let (actions, api, _) = setup();
        api.fail_next(ApiError::from_status(409, r#"{"message":"Session already ended"}"#.into()));
        let err = actions.start(SessionId::new(3)).await.unwrap_err();
        assert!(matches!(err, ActionError::Api(ApiError::InvalidRequest(_))));
        assert_eq!(err.user_message(), "Session already ended");
    }
}
