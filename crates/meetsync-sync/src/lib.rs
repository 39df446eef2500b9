//! Session synchronization: request dedup, the adaptive sync scheduler, the
//! started-session watcher, mutation actions and the tokio loops driving them.

pub mod actions;
pub mod dedup;
pub mod error;
pub mod format;
pub mod runner;
pub mod scheduler;
pub mod watcher;

pub use actions::SessionActions;
pub use dedup::{DedupConfig, Deduplicator, RequestKey};
pub use error::ActionError;
pub use format::format_time_until;
pub use runner::{spawn_sync_loops, RunnerHandle};
pub use scheduler::{SkipReason, SyncConfig, SyncScheduler, TickKind, TickOutcome};
pub use watcher::{ChangeWatcher, StartedNotice, WatchOutcome, WatcherConfig};
