use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Source of wall-clock time. Injected so tests can simulate time deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Whether the consuming surface is currently in the foreground.
pub trait Visibility: Send + Sync {
    fn is_visible(&self) -> bool;
}

/// Settable visibility flag. Starts visible.
#[derive(Debug)]
pub struct VisibilityFlag(AtomicBool);

impl VisibilityFlag {
    pub fn new(visible: bool) -> Self {
        Self(AtomicBool::new(visible))
    }

    pub fn set(&self, visible: bool) {
        self.0.store(visible, Ordering::Relaxed);
    }
}

impl Default for VisibilityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Visibility for VisibilityFlag {
    fn is_visible(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
