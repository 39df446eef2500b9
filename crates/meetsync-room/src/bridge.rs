use std::sync::Arc;

use meetsync_core::{Session, SessionStatus};
use meetsync_settings::RoomSettings;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::controller::{RoomCallbacks, RoomController, RoomDeps};

/// Builds the host hooks for a newly mounted room.
pub type CallbacksFactory = Arc<dyn Fn(&Session) -> RoomCallbacks + Send + Sync>;

/// Keeps one [`RoomController`] mounted for the current session while it is
/// `started` with a room endpoint. Dropping the handle stops the bridge.
pub struct RoomBridge {
    rooms: watch::Receiver<Option<RoomController>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RoomBridge {
    /// Follow `sessions` (usually `SyncScheduler::subscribe()`) until the
    /// sender closes or `cancel` fires. Must be called inside a tokio runtime.
    pub fn spawn(
        sessions: watch::Receiver<Option<Session>>,
        deps: RoomDeps,
        settings: RoomSettings,
        callbacks: CallbacksFactory,
        cancel: CancellationToken,
    ) -> Self {
        let (rooms_tx, rooms) = watch::channel(None);
        let mount = Mount {
            deps,
            settings,
            callbacks,
            rooms: rooms_tx,
        };
        let task = tokio::spawn(run_bridge(sessions, mount, cancel.clone()));
        Self {
            rooms,
            cancel,
            task: Some(task),
        }
    }

    /// The mounted controller, if any.
    pub fn current(&self) -> Option<RoomController> {
        self.rooms.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<RoomController>> {
        self.rooms.clone()
    }

    /// Unmount the room and wait for the bridge to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RoomBridge {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn wants_room(session: &Session) -> bool {
    session.status == SessionStatus::Started && session.has_room()
}

struct Mount {
    deps: RoomDeps,
    settings: RoomSettings,
    callbacks: CallbacksFactory,
    rooms: watch::Sender<Option<RoomController>>,
}

impl Mount {
    fn sync(&self, session: Option<&Session>) {
        let wanted = session.filter(|s| wants_room(s));
        let mounted = self.rooms.borrow().as_ref().map(RoomController::session_id);
        if mounted.is_some() && mounted == wanted.map(|s| s.id) {
            return;
        }
        self.clear();

        let Some(session) = wanted else {
            return;
        };
        info!(session_id = %session.id, "mounting room");
        let room = RoomController::for_session(
            session,
            self.deps.clone(),
            self.settings.clone(),
            (self.callbacks)(session),
        );
        self.rooms.send_replace(Some(room.clone()));
        tokio::spawn(async move {
            if let Err(e) = room.initialize().await {
                debug!(session_id = %room.session_id(), error = %e, "room did not connect");
            }
        });
    }

    fn clear(&self) {
        if let Some(room) = self.rooms.send_replace(None) {
            info!(session_id = %room.session_id(), "unmounting room");
            room.unmount();
        }
    }
}

async fn run_bridge(
    mut sessions: watch::Receiver<Option<Session>>,
    mount: Mount,
    cancel: CancellationToken,
) {
    let initial = sessions.borrow_and_update().clone();
    mount.sync(initial.as_ref());
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            changed = sessions.changed() => {
                if changed.is_err() {
                    break;
                }
                let session = sessions.borrow_and_update().clone();
                mount.sync(session.as_ref());
            }
        }
    }
    mount.clear();
    debug!("room bridge stopped");
}
