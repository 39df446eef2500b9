use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use meetsync_core::Clock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::database::Database;
use crate::error::StoreError;
use crate::slots::SlotRepo;

/// Slot holding the user's current session.
pub const ACTIVE_SESSION_KEY: &str = "active_session";

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Stored form of a cached value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub value: T,
    /// Epoch milliseconds.
    pub written_at: i64,
}

/// Result of a cache read, fresh or not.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheRead<T> {
    pub value: T,
    pub written_at: DateTime<Utc>,
    pub is_fresh: bool,
}

impl<T> CacheRead<T> {
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.written_at
    }
}

/// Persisted key/value cache with a time-to-live.
///
/// Reads never fail: storage errors and undecodable entries are logged and
/// reported as a miss, and an undecodable slot is cleared so it heals on the
/// next write.
#[derive(Clone)]
pub struct TtlCache {
    slots: SlotRepo,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(db: Database, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: SlotRepo::new(db),
            ttl: to_delta(ttl),
            clock,
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CacheRead<T>> {
        let row = match self.slots.get(key) {
            Ok(Some(row)) => row,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&row.payload) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "corrupt cache entry, clearing slot");
                if let Err(e) = self.slots.delete(key) {
                    warn!(key, error = %e, "failed to clear corrupt cache slot");
                }
                return None;
            }
        };

        let Some(written_at) = DateTime::from_timestamp_millis(entry.written_at) else {
            warn!(key, written_at = entry.written_at, "cache timestamp out of range, clearing slot");
            if let Err(e) = self.slots.delete(key) {
                warn!(key, error = %e, "failed to clear cache slot");
            }
            return None;
        };

        let is_fresh = self.clock.now() - written_at < self.ttl;
        Some(CacheRead {
            value: entry.value,
            written_at,
            is_fresh,
        })
    }

    /// Value only while younger than the TTL.
    pub fn read_fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read(key).filter(|r| r.is_fresh).map(|r| r.value)
    }

    /// Value only while younger than `max_age` (and the TTL).
    pub fn read_within<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
        let now = self.clock.now();
        let max_age = to_delta(max_age);
        self.read(key)
            .filter(|r| r.is_fresh && r.age(now) < max_age)
            .map(|r| r.value)
    }

    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let written_at = self.clock.now().timestamp_millis();
        let payload = serde_json::to_string(&CacheEntry { value, written_at })?;
        self.slots.put(key, &payload, written_at)?;
        debug!(key, written_at, "cache slot written");
        Ok(())
    }

    pub fn invalidate(&self, key: &str) -> Result<(), StoreError> {
        if self.slots.delete(key)? {
            debug!(key, "cache slot invalidated");
        }
        Ok(())
    }
}

fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}
