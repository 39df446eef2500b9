//! # meetsync
//!
//! Command-line front end: wires settings, the cache, the backend client and
//! the sync engine together, and mounts a room for a started session.

#![deny(unsafe_code)]

mod console;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use meetsync_api::{AvailabilityRequest, HttpApiConfig, HttpSessionsApi, SessionsApi};
use meetsync_core::{Clock, Session, SessionId, SystemClock, VisibilityFlag};
use meetsync_room::{CallbacksFactory, RoomBridge, RoomCallbacks, RoomDeps, ScriptRegistry};
use meetsync_settings::{load_settings, load_settings_from_path, resolve_data_path, MeetsyncSettings};
use meetsync_store::{Database, TtlCache};
use meetsync_sync::{
    format_time_until, spawn_sync_loops, ChangeWatcher, DedupConfig, Deduplicator, SessionActions,
    SyncConfig, SyncScheduler, TickKind, TickOutcome, WatcherConfig,
};
use meetsync_telemetry::{init_telemetry, TelemetryConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::console::{ConsoleRoomProvider, HttpScriptLoader};

/// Keep the user's live meeting session in sync with the backend.
#[derive(Parser, Debug)]
#[command(name = "meetsync", about = "Live meeting session sync")]
struct Cli {
    /// Settings file (defaults to ~/.meetsync/settings.json).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Backend API base URL (overrides settings).
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync once and print the current session.
    Status,
    /// Keep syncing and report changes until Ctrl-C.
    Watch,
    /// Start a session.
    Start { id: SessionId },
    /// End a session.
    End { id: SessionId },
    /// Cancel a session.
    Cancel { id: SessionId },
    /// Move a session to a new slot.
    Reschedule {
        id: SessionId,
        /// New start time, RFC 3339.
        #[arg(long)]
        at: DateTime<Utc>,
        #[arg(long, default_value = "UTC")]
        timezone: String,
        /// Minutes.
        #[arg(long, default_value_t = 30)]
        duration: u32,
    },
    /// Check whether a slot is free.
    Availability {
        #[arg(long)]
        at: DateTime<Utc>,
        #[arg(long, default_value = "UTC")]
        timezone: String,
        #[arg(long, default_value_t = 30)]
        duration: u32,
    },
    /// Print the direct browser link for a session's room.
    RoomLink { id: SessionId },
}

struct Engine {
    api: Arc<dyn SessionsApi>,
    dedup: Deduplicator,
    clock: Arc<dyn Clock>,
    scheduler: Arc<SyncScheduler>,
}

impl Engine {
    fn build(settings: &MeetsyncSettings) -> Result<Self> {
        let api: Arc<dyn SessionsApi> = Arc::new(
            HttpSessionsApi::new(HttpApiConfig::from_settings(&settings.api))
                .context("Failed to build HTTP client")?,
        );

        let db_path = resolve_data_path(&settings.cache.db_path);
        ensure_parent_dir(&db_path)?;
        let db = Database::open(&db_path)
            .with_context(|| format!("Failed to open cache at {}", db_path.display()))?;
        info!(path = %db_path.display(), "cache opened");

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = TtlCache::new(
            db,
            Duration::from_secs(settings.cache.ttl_secs),
            Arc::clone(&clock),
        );
        let dedup = Deduplicator::new(DedupConfig::from(&settings.sync));
        let scheduler = Arc::new(SyncScheduler::new(
            Arc::clone(&api),
            cache,
            dedup.clone(),
            Arc::clone(&clock),
            Arc::new(VisibilityFlag::default()),
            SyncConfig::from(&settings.sync),
        ));
        Ok(Self {
            api,
            dedup,
            clock,
            scheduler,
        })
    }

    fn actions(&self) -> SessionActions {
        SessionActions::new(
            Arc::clone(&self.api),
            self.dedup.clone(),
            Arc::clone(&self.scheduler),
        )
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn load(cli: &Cli) -> Result<MeetsyncSettings> {
    let mut settings = match &cli.settings {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => load_settings().context("Failed to load settings")?,
    };
    if let Some(url) = &cli.base_url {
        settings.api.base_url = url.clone();
    }
    Ok(settings)
}

fn describe(session: &Session, now: DateTime<Utc>) -> String {
    let mut line = format!(
        "#{} {} [{}] {} ({})",
        session.id,
        session.display_title(),
        session.status,
        session.scheduled_at.to_rfc3339(),
        format_time_until(session.scheduled_at, now),
    );
    if let Some(url) = session.room_url.as_deref().filter(|u| !u.is_empty()) {
        line.push_str(&format!("\n  room: {url}"));
    }
    line
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;
    let _ = init_telemetry(&TelemetryConfig::from(&settings.logging));

    let engine = Engine::build(&settings)?;
    match cli.command {
        Command::Status => status(&engine).await,
        Command::Watch => watch(&engine, &settings).await,
        Command::Start { id } => print_update(engine.actions().start(id).await, &engine),
        Command::End { id } => print_update(engine.actions().end(id).await, &engine),
        Command::Cancel { id } => print_update(engine.actions().cancel(id).await, &engine),
        Command::Reschedule {
            id,
            at,
            timezone,
            duration,
        } => print_update(
            engine.actions().reschedule(id, duration, at, &timezone).await,
            &engine,
        ),
        Command::Availability {
            at,
            timezone,
            duration,
        } => {
            let request = AvailabilityRequest {
                scheduled_at: at,
                timezone,
                duration,
            };
            let availability = engine
                .actions()
                .check_availability(&request)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            if availability.available {
                println!("Slot is available");
            } else {
                println!(
                    "Slot is not available: {}",
                    availability
                        .message
                        .unwrap_or_else(|| "You already have a meeting scheduled at this time".into())
                );
            }
            Ok(())
        }
        Command::RoomLink { id } => room_link(&engine, id).await,
    }
}

async fn status(engine: &Engine) -> Result<()> {
    let outcome = engine.scheduler.tick(TickKind::Forced).await;
    if let TickOutcome::Failed(e) = &outcome {
        warn!(error = %e, "sync failed, showing cached data");
        eprintln!("{}", e.user_message());
    }
    match engine.scheduler.current() {
        Some(session) => println!("{}", describe(&session, engine.clock.now())),
        None => println!("No upcoming session"),
    }
    Ok(())
}

async fn watch(engine: &Engine, settings: &MeetsyncSettings) -> Result<()> {
    let watcher = Arc::new(ChangeWatcher::new(
        Arc::clone(&engine.api),
        engine.dedup.clone(),
        Arc::clone(&engine.clock),
        WatcherConfig::from(&settings.watcher),
    ));
    let mut sessions = engine.scheduler.subscribe();
    let mut notices = watcher.subscribe();
    let runner = spawn_sync_loops(
        Arc::clone(&engine.scheduler),
        Some(Arc::clone(&watcher)),
        CancellationToken::new(),
    );
    let bridge = spawn_room_bridge(engine, settings, runner.cancel_token().child_token())?;
    info!("watching for session changes");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = sessions.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = sessions.borrow_and_update().clone();
                match current {
                    Some(session) => println!("{}", describe(&session, engine.clock.now())),
                    None => println!("No upcoming session"),
                }
            }
            changed = notices.changed() => {
                if changed.is_err() {
                    break;
                }
                let notice = notices.borrow_and_update().clone();
                if notice.is_some() {
                    if let Some(notice) = watcher.accept() {
                        println!("Meeting started: {} (#{})", notice.title, notice.session_id);
                        if let Some(url) = notice.room_url {
                            println!("  join: {url}");
                        }
                    }
                }
            }
        }
    }

    info!("shutting down");
    bridge.shutdown().await;
    runner.shutdown().await;
    Ok(())
}

fn spawn_room_bridge(
    engine: &Engine,
    settings: &MeetsyncSettings,
    cancel: CancellationToken,
) -> Result<RoomBridge> {
    let loader = HttpScriptLoader::new(Duration::from_millis(settings.api.timeout_ms))
        .context("Failed to build script loader")?;
    let deps = RoomDeps {
        api: Arc::clone(&engine.api),
        provider: Arc::new(ConsoleRoomProvider),
        loader: Arc::new(loader),
        scripts: ScriptRegistry::global(),
    };
    let callbacks: CallbacksFactory = Arc::new(|session: &Session| {
        let id = session.id;
        RoomCallbacks::default()
            .on_meeting_end(move || println!("Meeting #{id} ended"))
            .on_error(move |message| eprintln!("Meeting #{id}: {message}"))
    });
    Ok(RoomBridge::spawn(
        engine.scheduler.subscribe(),
        deps,
        settings.room.clone(),
        callbacks,
        cancel,
    ))
}

fn print_update(
    result: Result<Session, meetsync_sync::ActionError>,
    engine: &Engine,
) -> Result<()> {
    let session = result.map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!("{}", describe(&session, engine.clock.now()));
    Ok(())
}

async fn room_link(engine: &Engine, id: SessionId) -> Result<()> {
    match engine.api.room_config(id).await {
        Ok(config) => {
            println!("{}", config.direct_url());
            Ok(())
        }
        Err(e) => {
            warn!(session_id = %id, error = %e, "room config unavailable, falling back to session link");
            let sessions = engine
                .api
                .active_sessions()
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            let url = sessions
                .into_iter()
                .find(|s| s.id == id)
                .and_then(|s| s.room_url)
                .filter(|u| !u.is_empty())
                .ok_or_else(|| anyhow::anyhow!(e.user_message()))?;
            println!("{url}");
            Ok(())
        }
    }
}
