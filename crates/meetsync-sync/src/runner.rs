use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::scheduler::{SyncScheduler, TickKind};
use crate::watcher::ChangeWatcher;

/// Handle to the background sync loops. Dropping it stops them.
pub struct RunnerHandle {
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunnerHandle {
    /// Request an immediate forced tick (explicit refresh, regained focus).
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop all loops and wait for them to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Drop for RunnerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the scheduler loop and, when given, the change-watcher loop.
///
/// The scheduler runs a forced tick immediately, then regular ticks every
/// `poll_interval` and high-frequency ticks every `high_frequency_interval`.
/// The watcher checks immediately and then every `interval`.
pub fn spawn_sync_loops(
    scheduler: Arc<SyncScheduler>,
    watcher: Option<Arc<ChangeWatcher>>,
    cancel: CancellationToken,
) -> RunnerHandle {
    let refresh = Arc::new(Notify::new());
    let mut tasks = vec![tokio::spawn(run_scheduler(
        scheduler,
        Arc::clone(&refresh),
        cancel.clone(),
    ))];
    if let Some(watcher) = watcher.filter(|w| w.config().enabled) {
        tasks.push(tokio::spawn(run_watcher(watcher, cancel.clone())));
    }
    RunnerHandle {
        cancel,
        refresh,
        tasks,
    }
}

async fn run_scheduler(scheduler: Arc<SyncScheduler>, refresh: Arc<Notify>, cancel: CancellationToken) {
    let config = scheduler.config().clone();
    let start = Instant::now();
    let mut regular = interval_at(start + config.poll_interval, config.poll_interval);
    regular.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut fast = interval_at(
        start + config.high_frequency_interval,
        config.high_frequency_interval,
    );
    fast.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut kind = TickKind::Forced;
    loop {
        let outcome = tokio::select! {
            () = cancel.cancelled() => break,
            outcome = scheduler.tick(kind) => outcome,
        };
        trace!(?kind, ?outcome, "sync tick");

        kind = tokio::select! {
            () = cancel.cancelled() => break,
            _ = regular.tick() => TickKind::Regular,
            _ = fast.tick() => TickKind::HighFrequency,
            () = refresh.notified() => TickKind::Forced,
        };
    }
    debug!("sync loop stopped");
}

async fn run_watcher(watcher: Arc<ChangeWatcher>, cancel: CancellationToken) {
    let period = watcher.config().interval;
    let mut ticker = interval_at(Instant::now(), period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let outcome = tokio::select! {
            () = cancel.cancelled() => break,
            outcome = watcher.check() => outcome,
        };
        trace!(?outcome, "started-session check");
    }
    debug!("watcher loop stopped");
}
