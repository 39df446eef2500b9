use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use meetsync_api::SessionsApi;
use meetsync_core::{ApiError, Clock, Session, SessionId, SessionStatus};
use meetsync_settings::WatcherSettings;

use crate::dedup::{Deduplicator, RequestKey};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatcherConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
        }
    }
}

impl From<&WatcherSettings> for WatcherConfig {
    fn from(s: &WatcherSettings) -> Self {
        Self {
            enabled: s.enabled,
            interval: Duration::from_secs(s.interval_secs),
        }
    }
}

/// Prompt raised when a session has just been started by its host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartedNotice {
    pub session_id: SessionId,
    pub title: String,
    pub room_url: Option<String>,
}

impl From<&Session> for StartedNotice {
    fn from(s: &Session) -> Self {
        Self {
            session_id: s.id,
            title: s.display_title().to_string(),
            room_url: s.room_url.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WatchOutcome {
    Raised(StartedNotice),
    /// A started session was found but a notice is already pending.
    Suppressed,
    NoChange,
    Coalesced,
    Failed(ApiError),
}

/// Fixed-interval poll that notices sessions moving into `started`.
pub struct ChangeWatcher {
    api: Arc<dyn SessionsApi>,
    dedup: Deduplicator,
    clock: Arc<dyn Clock>,
    config: WatcherConfig,
    watermark: Mutex<DateTime<Utc>>,
    notice: watch::Sender<Option<StartedNotice>>,
}

impl ChangeWatcher {
    /// The watermark starts at construction time, so sessions started
    /// earlier do not raise a notice.
    pub fn new(
        api: Arc<dyn SessionsApi>,
        dedup: Deduplicator,
        clock: Arc<dyn Clock>,
        config: WatcherConfig,
    ) -> Self {
        let watermark = Mutex::new(clock.now());
        let (notice, _) = watch::channel(None);
        Self {
            api,
            dedup,
            clock,
            config,
            watermark,
            notice,
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        *self.watermark.lock()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StartedNotice>> {
        self.notice.subscribe()
    }

    pub fn pending(&self) -> Option<StartedNotice> {
        self.notice.borrow().clone()
    }

    /// Take the pending notice, e.g. when the user chooses to join.
    pub fn accept(&self) -> Option<StartedNotice> {
        let mut taken = None;
        let _ = self.notice.send_if_modified(|n| {
            taken = n.take();
            taken.is_some()
        });
        taken
    }

    pub fn dismiss(&self) {
        let _ = self.notice.send_if_modified(|n| n.take().is_some());
    }

    pub async fn check(&self) -> WatchOutcome {
        let now = self.clock.now();
        let result = self
            .dedup
            .run_exclusive(RequestKey::StartedWatch, self.api.active_sessions())
            .await;

        let sessions = match result {
            Ok(Some(sessions)) => sessions,
            Ok(None) => return WatchOutcome::Coalesced,
            Err(e) => {
                warn!(error = %e, "started-session check failed");
                return WatchOutcome::Failed(e);
            }
        };

        let since = std::mem::replace(&mut *self.watermark.lock(), now);
        let Some(started) = sessions.iter().find(|s| {
            s.status == SessionStatus::Started && s.updated_at.is_some_and(|at| at > since)
        }) else {
            return WatchOutcome::NoChange;
        };

        let notice = StartedNotice::from(started);
        let raised = self.notice.send_if_modified(|pending| {
            if pending.is_some() {
                return false;
            }
            *pending = Some(notice.clone());
            true
        });
        if raised {
            info!(session_id = %notice.session_id, "session started");
            WatchOutcome::Raised(notice)
        } else {
            debug!(session_id = %notice.session_id, "notice already pending");
            WatchOutcome::Suppressed
        }
    }
}
