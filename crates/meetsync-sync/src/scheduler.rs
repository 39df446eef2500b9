//! Adaptive polling for the user's current session.
//!
//! One [`SyncScheduler::tick`] entry point decides per call whether to serve
//! from cache, skip, or fetch. Cadence adapts to visibility, how far away
//! the session is, how often fetches come back unchanged and whether the
//! session is about to start.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use meetsync_api::SessionsApi;
use meetsync_core::session::identity_changed;
use meetsync_core::{ApiError, Clock, Session, SessionStatus, Visibility};
use meetsync_settings::SyncSettings;
use meetsync_store::{TtlCache, ACTIVE_SESSION_KEY};

use crate::dedup::{Deduplicator, RequestKey};
use crate::format::format_time_until;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Minimum gap between physical fetches on regular ticks.
    pub fetch_floor: Duration,
    /// Sessions further out than this may back off.
    pub far_future: Duration,
    /// Unchanged fetches before backoff engages.
    pub no_change_threshold: u32,
    /// Backoff never holds longer than this since the last fetch.
    pub backoff_refresh: Duration,
    /// Oldest start time still considered current.
    pub recent_past: Duration,
    pub high_frequency_window: Duration,
    pub high_frequency_interval: Duration,
    /// Cache freshness and fetch gap on high-frequency ticks.
    pub high_frequency_floor: Duration,
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_floor: Duration::from_secs(5 * 60),
            far_future: Duration::from_secs(60 * 60),
            no_change_threshold: 3,
            backoff_refresh: Duration::from_secs(30 * 60),
            recent_past: Duration::from_secs(60 * 60),
            high_frequency_window: Duration::from_secs(10 * 60),
            high_frequency_interval: Duration::from_secs(30),
            high_frequency_floor: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(s: &SyncSettings) -> Self {
        Self {
            fetch_floor: Duration::from_secs(s.fetch_floor_secs),
            far_future: Duration::from_secs(s.far_future_minutes * 60),
            no_change_threshold: s.no_change_threshold,
            backoff_refresh: Duration::from_secs(s.backoff_refresh_secs),
            recent_past: Duration::from_secs(s.recent_past_minutes * 60),
            high_frequency_window: Duration::from_secs(s.high_frequency_window_minutes * 60),
            high_frequency_interval: Duration::from_secs(s.high_frequency_interval_secs),
            high_frequency_floor: Duration::from_secs(s.high_frequency_floor_secs),
            poll_interval: Duration::from_secs(s.poll_interval_secs),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickKind {
    Regular,
    HighFrequency,
    /// Initial load or explicit refresh.
    Forced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Hidden,
    FetchFloor,
    Backoff,
    HighFrequencyInactive,
    HighFrequencyFloor,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    /// Served from a fresh cache entry; no network call.
    FromCache { changed: bool },
    Fetched { changed: bool },
    /// Another caller holds the fetch; nothing was issued.
    Coalesced,
    Failed(ApiError),
}

impl TickOutcome {
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Fetched { .. } | Self::Failed(_))
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    last_fetch_at: Option<DateTime<Utc>>,
    last_high_frequency_fetch_at: Option<DateTime<Utc>>,
    no_change_count: u32,
    last_error: Option<String>,
}

/// Owns the polling decision for the user's current session.
pub struct SyncScheduler {
    api: Arc<dyn SessionsApi>,
    cache: TtlCache,
    dedup: Deduplicator,
    clock: Arc<dyn Clock>,
    visibility: Arc<dyn Visibility>,
    config: SyncConfig,
    state: Mutex<SchedulerState>,
    current: watch::Sender<Option<Session>>,
}

impl SyncScheduler {
    pub fn new(
        api: Arc<dyn SessionsApi>,
        cache: TtlCache,
        dedup: Deduplicator,
        clock: Arc<dyn Clock>,
        visibility: Arc<dyn Visibility>,
        config: SyncConfig,
    ) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            api,
            cache,
            dedup,
            clock,
            visibility,
            config,
            state: Mutex::new(SchedulerState::default()),
            current,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Receiver notified whenever the current session's identity changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    pub fn current(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    pub fn no_change_count(&self) -> u32 {
        self.state.lock().no_change_count
    }

    pub fn last_fetch_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_fetch_at
    }

    pub fn last_high_frequency_fetch_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_high_frequency_fetch_at
    }

    /// Message from the most recent failed fetch, until a fetch succeeds or
    /// it is dismissed.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn dismiss_error(&self) {
        self.state.lock().last_error = None;
    }

    pub fn time_until_start(&self) -> Option<String> {
        let now = self.clock.now();
        self.current
            .borrow()
            .as_ref()
            .map(|s| format_time_until(s.scheduled_at, now))
    }

    /// Whether the current session is close enough to poll at high frequency.
    pub fn high_frequency_active(&self) -> bool {
        let now = self.clock.now();
        let window = delta(self.config.high_frequency_window);
        self.current.borrow().as_ref().is_some_and(|s| {
            let observed_live = s.status == SessionStatus::Started && s.has_room();
            s.scheduled_at - now <= window && !observed_live
        })
    }

    pub async fn tick(&self, kind: TickKind) -> TickOutcome {
        let now = self.clock.now();

        if kind != TickKind::Forced && !self.visibility.is_visible() {
            return TickOutcome::Skipped(SkipReason::Hidden);
        }
        if kind == TickKind::HighFrequency && !self.high_frequency_active() {
            return TickOutcome::Skipped(SkipReason::HighFrequencyInactive);
        }

        let cached: Option<Session> = match kind {
            TickKind::HighFrequency => self
                .cache
                .read_within(ACTIVE_SESSION_KEY, self.config.high_frequency_floor),
            _ => self.cache.read_fresh(ACTIVE_SESSION_KEY),
        };
        if let Some(session) = cached {
            let changed = self.publish(Some(session));
            if changed {
                debug!("adopted session from cache");
            }
            return TickOutcome::FromCache { changed };
        }

        if let Some(reason) = self.gate(kind, now) {
            debug!(?kind, ?reason, "tick skipped");
            return TickOutcome::Skipped(reason);
        }

        self.fetch(kind, now).await
    }

    fn gate(&self, kind: TickKind, now: DateTime<Utc>) -> Option<SkipReason> {
        let state = self.state.lock();
        let since_fetch = state.last_fetch_at.map(|at| now - at);
        match kind {
            TickKind::Forced => None,
            TickKind::HighFrequency => since_fetch
                .filter(|gap| *gap < delta(self.config.high_frequency_floor))
                .map(|_| SkipReason::HighFrequencyFloor),
            TickKind::Regular => {
                if since_fetch.is_some_and(|gap| gap < delta(self.config.fetch_floor)) {
                    return Some(SkipReason::FetchFloor);
                }
                let far_future = self
                    .current
                    .borrow()
                    .as_ref()
                    .is_some_and(|s| s.scheduled_at - now > delta(self.config.far_future));
                let backing_off = far_future
                    && state.no_change_count >= self.config.no_change_threshold
                    && since_fetch.is_some_and(|gap| gap < delta(self.config.backoff_refresh));
                backing_off.then_some(SkipReason::Backoff)
            }
        }
    }

    async fn fetch(&self, kind: TickKind, now: DateTime<Utc>) -> TickOutcome {
        let result = self
            .dedup
            .run_exclusive(RequestKey::ActiveSessions, async {
                {
                    let mut state = self.state.lock();
                    state.last_fetch_at = Some(now);
                    if kind == TickKind::HighFrequency {
                        state.last_high_frequency_fetch_at = Some(now);
                    }
                }
                self.api.active_sessions().await
            })
            .await;

        match result {
            Ok(None) => TickOutcome::Coalesced,
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "session fetch failed");
                self.state.lock().last_error = Some(e.user_message());
                TickOutcome::Failed(e)
            }
            Ok(Some(sessions)) => {
                let selected = select_current(sessions, now, delta(self.config.recent_past));
                let changed = self.apply(selected);
                let mut state = self.state.lock();
                state.last_error = None;
                if changed {
                    state.no_change_count = 0;
                } else {
                    state.no_change_count = state.no_change_count.saturating_add(1);
                }
                TickOutcome::Fetched { changed }
            }
        }
    }

    /// Run a mutation response through the same selection, comparison and
    /// cache write as a fetch. The response only sees one session, so when it
    /// moves or removes the current one the cache is dropped and the next
    /// regular tick refetches.
    pub fn apply_mutation(&self, session: Session) -> bool {
        let now = self.clock.now();
        let recent_past = delta(self.config.recent_past);
        let current = self.current.borrow().clone();

        match current {
            Some(current) if current.id == session.id => {
                let moved = current.scheduled_at != session.scheduled_at;
                let selectable = select_current(vec![session.clone()], now, recent_past).is_some();
                if selectable && !moved {
                    return self.apply(Some(session));
                }
                debug!(session_id = %session.id, moved, selectable, "current session changed by mutation, refetch required");
                let changed = self.publish(selectable.then_some(session));
                self.require_refetch();
                changed
            }
            current => {
                let candidates = current.into_iter().chain([session.clone()]).collect();
                match select_current(candidates, now, recent_past) {
                    Some(selected) if selected.id == session.id => self.apply(Some(session)),
                    _ => false,
                }
            }
        }
    }

    fn require_refetch(&self) {
        if let Err(e) = self.cache.invalidate(ACTIVE_SESSION_KEY) {
            warn!(error = %e, "failed to invalidate session cache");
        }
        self.state.lock().last_fetch_at = None;
    }

    /// Write the selection to the cache and publish it.
    fn apply(&self, selected: Option<Session>) -> bool {
        let write = match &selected {
            Some(session) => self.cache.write(ACTIVE_SESSION_KEY, session),
            None => self.cache.invalidate(ACTIVE_SESSION_KEY),
        };
        if let Err(e) = write {
            warn!(error = %e, "failed to update session cache");
        }
        self.publish(selected)
    }

    /// Replace the current session. Consumers are notified only when the
    /// identity (id, status, room endpoint) changed.
    fn publish(&self, next: Option<Session>) -> bool {
        self.current.send_if_modified(|current| {
            if identity_changed(current.as_ref(), next.as_ref()) {
                if let Some(s) = &next {
                    info!(session_id = %s.id, status = %s.status, has_room = s.has_room(), "current session changed");
                } else {
                    info!("no current session");
                }
                *current = next;
                true
            } else {
                *current = next;
                false
            }
        })
    }
}

/// Earliest session in a live status starting in the future or within
/// `recent_past`.
pub fn select_current(sessions: Vec<Session>, now: DateTime<Utc>, recent_past: TimeDelta) -> Option<Session> {
    sessions
        .into_iter()
        .filter(|s| s.status.is_live_candidate() && s.scheduled_at >= now - recent_past)
        .min_by_key(|s| s.scheduled_at)
}

fn delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}
