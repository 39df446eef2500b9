use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use meetsync_core::SessionId;
use meetsync_settings::SyncSettings;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Typed key space for deduplicated backend calls.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum RequestKey {
    /// Scheduler fetch of the active session list.
    ActiveSessions,
    /// Change-watcher poll of the same endpoint.
    StartedWatch,
    /// Mutation of one session (start, end, cancel, reschedule).
    SessionUpdate(SessionId),
    Availability,
}

impl RequestKey {
    pub fn is_session_update(&self) -> bool {
        matches!(self, Self::SessionUpdate(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DedupConfig {
    pub cooldown: Duration,
    /// Cool-down for [`RequestKey::SessionUpdate`] keys.
    pub update_cooldown: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(1),
            update_cooldown: Duration::from_secs(3),
        }
    }
}

impl From<&SyncSettings> for DedupConfig {
    fn from(s: &SyncSettings) -> Self {
        Self {
            cooldown: Duration::from_millis(s.dedup_cooldown_ms),
            update_cooldown: Duration::from_millis(s.update_cooldown_ms),
        }
    }
}

#[derive(Debug)]
struct InFlightMarker {
    started_at: Instant,
}

struct Inner {
    active: DashMap<RequestKey, InFlightMarker>,
    config: DedupConfig,
}

/// Advisory in-flight registry. Clones share the same registry.
///
/// While a key is marked, further callers are told to back off instead of
/// issuing the same request. The marker outlives the operation by a
/// cool-down so a burst of callers right after completion is absorbed too.
#[derive(Clone)]
pub struct Deduplicator {
    inner: Arc<Inner>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                active: DashMap::new(),
                config,
            }),
        }
    }

    pub fn is_active(&self, key: &RequestKey) -> bool {
        self.inner.active.contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.len()
    }

    /// Run `op` unless `key` is already marked.
    ///
    /// Returns `Ok(None)` without polling `op` when another caller holds the
    /// key. Errors from `op` reach only this caller. The marker is released
    /// after the cool-down whether `op` succeeds, fails or is dropped.
    pub async fn run_exclusive<T, E, F>(&self, key: RequestKey, op: F) -> Result<Option<T>, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let Some(guard) = self.try_acquire(&key) else {
            debug!(key = ?key, "request already in flight, coalescing");
            return Ok(None);
        };
        let result = op.await;
        drop(guard);
        result.map(Some)
    }

    fn try_acquire(&self, key: &RequestKey) -> Option<MarkerGuard> {
        match self.inner.active.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let _ = slot.insert(InFlightMarker {
                    started_at: Instant::now(),
                });
                Some(MarkerGuard {
                    inner: Arc::clone(&self.inner),
                    key: key.clone(),
                })
            }
        }
    }
}

/// Schedules release of a marker when the operation settles.
struct MarkerGuard {
    inner: Arc<Inner>,
    key: RequestKey,
}

impl Drop for MarkerGuard {
    fn drop(&mut self) {
        let cooldown = if self.key.is_session_update() {
            self.inner.config.update_cooldown
        } else {
            self.inner.config.cooldown
        };

        let key = self.key.clone();
        let handle = tokio::runtime::Handle::try_current();
        match handle {
            Ok(handle) if !cooldown.is_zero() => {
                let inner = Arc::clone(&self.inner);
                drop(handle.spawn(async move {
                    tokio::time::sleep(cooldown).await;
                    release(&inner, &key);
                }));
            }
            _ => release(&self.inner, &key),
        }
    }
}

fn release(inner: &Inner, key: &RequestKey) {
    if let Some((_, marker)) = inner.active.remove(key) {
        trace!(key = ?key, held_ms = marker.started_at.elapsed().as_millis() as u64, "in-flight marker released");
    }
}
