use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use meetsync_api::SessionsApi;
use meetsync_core::{ConnectionId, RoomConfig, Session, SessionId};
use meetsync_settings::RoomSettings;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::RoomError;
use crate::options::build_options;
use crate::provider::{ProviderEventName, RoomClient, RoomProvider};
use crate::script::{ScriptLoader, ScriptRegistry};
use crate::state::{on_signal, Effect, ProviderSignal, RoomState};

const UPDATE_CAPACITY: usize = 64;

/// Collaborators a controller needs.
#[derive(Clone)]
pub struct RoomDeps {
    pub api: Arc<dyn SessionsApi>,
    pub provider: Arc<dyn RoomProvider>,
    pub loader: Arc<dyn ScriptLoader>,
    pub scripts: Arc<ScriptRegistry>,
}

type Callback = Box<dyn Fn() + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Host hooks fired after the corresponding transition is applied.
#[derive(Default)]
pub struct RoomCallbacks {
    on_joined: Option<Callback>,
    on_meeting_end: Option<Callback>,
    on_error: Option<ErrorCallback>,
}

impl RoomCallbacks {
    pub fn on_joined(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_joined = Some(Box::new(f));
        self
    }

    pub fn on_meeting_end(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_meeting_end = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoomUpdate {
    StateChanged { from: RoomState, to: RoomState },
    Participants(u32),
    Error(String),
}

/// Latest observable view of a controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub state: RoomState,
    pub participants: u32,
    pub error: Option<String>,
    pub connection_id: Option<ConnectionId>,
}

impl Default for RoomSnapshot {
    fn default() -> Self {
        Self {
            state: RoomState::Idle,
            participants: 0,
            error: None,
            connection_id: None,
        }
    }
}

impl RoomSnapshot {
    pub fn status_text(&self) -> String {
        match self.state {
            RoomState::Idle => "Not connected".into(),
            RoomState::ScriptLoading => "Loading video conference...".into(),
            RoomState::ConfigFetching => "Loading meeting configuration...".into(),
            RoomState::Connecting => "Connecting...".into(),
            RoomState::Connected => match self.participants {
                1 => "Connected (1 participant)".into(),
                n => format!("Connected ({n} participants)"),
            },
            RoomState::Disconnected => "Disconnected".into(),
            RoomState::Failed => self
                .error
                .clone()
                .unwrap_or_else(|| "Connection failed".into()),
        }
    }
}

struct Handle {
    id: ConnectionId,
    client: Box<dyn RoomClient>,
}

struct ControllerState {
    snapshot: RoomSnapshot,
    handle: Option<Handle>,
    config: Option<RoomConfig>,
}

struct Inner {
    session_id: SessionId,
    session_url: Option<String>,
    deps: RoomDeps,
    settings: RoomSettings,
    callbacks: RoomCallbacks,
    alive: AtomicBool,
    initialized: AtomicBool,
    attempt: AtomicU64,
    state: Mutex<ControllerState>,
    snapshot_tx: watch::Sender<RoomSnapshot>,
    updates: broadcast::Sender<RoomUpdate>,
    signals: mpsc::UnboundedSender<(ConnectionId, ProviderSignal)>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

/// Drives one embedded room for one session.
///
/// Provider callbacks are forwarded, tagged with the handle's connection id,
/// into a channel drained by a pump task; the pump drops events from disposed
/// handles and from unmounted controllers. Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct RoomController {
    inner: Arc<Inner>,
}

impl RoomController {
    pub fn new(
        session_id: SessionId,
        session_url: Option<String>,
        deps: RoomDeps,
        settings: RoomSettings,
        callbacks: RoomCallbacks,
    ) -> Self {
        let (signals, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(RoomSnapshot::default());
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let inner = Arc::new(Inner {
            session_id,
            session_url,
            deps,
            settings,
            callbacks,
            alive: AtomicBool::new(true),
            initialized: AtomicBool::new(false),
            attempt: AtomicU64::new(0),
            state: Mutex::new(ControllerState {
                snapshot: RoomSnapshot::default(),
                handle: None,
                config: None,
            }),
            snapshot_tx,
            updates,
            signals,
            pump: Mutex::new(None),
        });
        let pump = tokio::spawn(run_pump(Arc::downgrade(&inner), rx));
        *inner.pump.lock() = Some(pump);
        Self { inner }
    }

    pub fn for_session(
        session: &Session,
        deps: RoomDeps,
        settings: RoomSettings,
        callbacks: RoomCallbacks,
    ) -> Self {
        Self::new(session.id, session.room_url.clone(), deps, settings, callbacks)
    }

    pub fn session_id(&self) -> SessionId {
        self.inner.session_id
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        self.inner.state.lock().snapshot.clone()
    }

    pub fn state(&self) -> RoomState {
        self.inner.state.lock().snapshot.state
    }

    pub fn subscribe(&self) -> watch::Receiver<RoomSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn updates(&self) -> broadcast::Receiver<RoomUpdate> {
        self.inner.updates.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.is_alive()
    }

    /// Title echoed with the room configuration, once fetched.
    pub fn meeting_title(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .config
            .as_ref()
            .and_then(|c| c.meeting_title.clone())
    }

    /// URL that opens the room outside the embedded client.
    pub fn direct_link(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .config
            .as_ref()
            .map(RoomConfig::direct_url)
            .or_else(|| self.inner.session_url.clone())
    }

    /// Load the client library, fetch the room configuration and create the
    /// provider client. Runs once per instance; later calls return `Ok(())`.
    /// Failures leave the controller in `Failed` with a readable message.
    #[instrument(skip(self), fields(session_id = %self.inner.session_id))]
    pub async fn initialize(&self) -> Result<(), RoomError> {
        if !self.inner.is_alive() {
            return Err(RoomError::Unmounted);
        }
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            debug!("room already initialized");
            return Ok(());
        }
        let attempt = self.inner.attempt.load(Ordering::SeqCst);
        match self.connect(attempt).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_abandoned() => {
                debug!(error = %e, "room initialization abandoned");
                Err(e)
            }
            Err(e) => {
                error!(error = %e, "room initialization failed");
                self.inner.fail(e.user_message());
                Err(e)
            }
        }
    }

    async fn connect(&self, attempt: u64) -> Result<(), RoomError> {
        let inner = &self.inner;

        inner.set_state(RoomState::ScriptLoading);
        inner
            .deps
            .scripts
            .ensure_loaded(&inner.settings.script_url, Arc::clone(&inner.deps.loader))
            .await?;
        inner.check_current(attempt)?;

        inner.set_state(RoomState::ConfigFetching);
        let config = inner.deps.api.room_config(inner.session_id).await?;
        inner.check_current(attempt)?;

        inner.set_state(RoomState::Connecting);
        self.dispose();
        let options = build_options(&config, &inner.settings);
        let client = inner
            .deps
            .provider
            .create(&config.domain, options)
            .map_err(|e| match e {
                RoomError::Provider(message) => RoomError::Provider(message),
                other => RoomError::Provider(other.to_string()),
            })?;

        let id = ConnectionId::new();
        for event in ProviderEventName::ALL {
            let tx = inner.signals.clone();
            let connection = id.clone();
            client.add_event_listener(
                event,
                Box::new(move |payload| {
                    let _ = tx.send((connection.clone(), event.to_signal(&payload)));
                }),
            );
        }
        if let Err(e) =
            client.execute_command("displayName", json!(config.user_info.display_name))
        {
            debug!(error = %e, "provider rejected displayName");
        }

        let mut state = inner.state.lock();
        if let Err(e) = inner.check_current(attempt) {
            drop(state);
            if let Err(e) = client.dispose() {
                warn!(error = %e, "failed to dispose abandoned room client");
            }
            return Err(e);
        }
        info!(
            connection_id = %id,
            domain = %config.domain,
            room = %config.room,
            has_token = config.has_token(),
            "room client created"
        );
        state.snapshot.connection_id = Some(id.clone());
        state.handle = Some(Handle { id, client });
        state.config = Some(config);
        inner.snapshot_tx.send_replace(state.snapshot.clone());
        Ok(())
    }

    /// Release the provider handle. Safe to call any number of times.
    pub fn dispose(&self) {
        let handle = {
            let mut state = self.inner.state.lock();
            let handle = state.handle.take();
            if handle.is_some() {
                state.snapshot.connection_id = None;
                self.inner.snapshot_tx.send_replace(state.snapshot.clone());
            }
            handle
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.client.dispose() {
                warn!(connection_id = %handle.id, error = %e, "room client dispose failed");
            }
            info!(connection_id = %handle.id, "room client disposed");
        }
    }

    /// Tear down and start over from `ScriptLoading`.
    #[instrument(skip(self), fields(session_id = %self.inner.session_id))]
    pub async fn retry(&self) -> Result<(), RoomError> {
        if !self.inner.is_alive() {
            return Err(RoomError::Unmounted);
        }
        info!("retrying room connection");
        self.inner.attempt.fetch_add(1, Ordering::SeqCst);
        self.dispose();
        self.inner.reset();
        self.inner.initialized.store(false, Ordering::SeqCst);
        self.initialize().await
    }

    /// Detach from the host: stop handling events and release the handle.
    pub fn unmount(&self) {
        if !self.inner.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(pump) = self.inner.pump.lock().take() {
            pump.abort();
        }
        self.dispose();
        info!(session_id = %self.inner.session_id, "room controller unmounted");
    }
}

impl Inner {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn check_current(&self, attempt: u64) -> Result<(), RoomError> {
        if !self.is_alive() {
            return Err(RoomError::Unmounted);
        }
        if self.attempt.load(Ordering::SeqCst) != attempt {
            return Err(RoomError::Superseded);
        }
        Ok(())
    }

    fn emit(&self, update: RoomUpdate) {
        // No receivers is fine.
        let _ = self.updates.send(update);
    }

    fn set_state(&self, to: RoomState) {
        let mut state = self.state.lock();
        let from = state.snapshot.state;
        if from == to {
            return;
        }
        state.snapshot.state = to;
        self.snapshot_tx.send_replace(state.snapshot.clone());
        drop(state);
        debug!(%from, %to, "room state changed");
        self.emit(RoomUpdate::StateChanged { from, to });
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        let from = state.snapshot.state;
        state.snapshot = RoomSnapshot::default();
        state.config = None;
        self.snapshot_tx.send_replace(state.snapshot.clone());
        drop(state);
        if from != RoomState::Idle {
            self.emit(RoomUpdate::StateChanged {
                from,
                to: RoomState::Idle,
            });
        }
    }

    fn fail(&self, message: String) {
        if !self.is_alive() {
            return;
        }
        let mut state = self.state.lock();
        let from = state.snapshot.state;
        state.snapshot.state = RoomState::Failed;
        state.snapshot.error = Some(message.clone());
        self.snapshot_tx.send_replace(state.snapshot.clone());
        drop(state);
        if from != RoomState::Failed {
            self.emit(RoomUpdate::StateChanged {
                from,
                to: RoomState::Failed,
            });
        }
        self.emit(RoomUpdate::Error(message.clone()));
        if let Some(cb) = &self.callbacks.on_error {
            cb(&message);
        }
    }

    fn handle_signal(&self, id: &ConnectionId, signal: ProviderSignal) {
        if !self.is_alive() {
            return;
        }
        let (from, transition, count_changed) = {
            let mut state = self.state.lock();
            if state.handle.as_ref().map(|h| &h.id) != Some(id) {
                debug!(connection_id = %id, ?signal, "dropping event from stale connection");
                return;
            }
            let from = state.snapshot.state;
            let transition = on_signal(from, state.snapshot.participants, &signal);
            let count_changed = transition.participants != state.snapshot.participants;
            state.snapshot.state = transition.state;
            state.snapshot.participants = transition.participants;
            match &transition.effect {
                Some(Effect::Joined) => state.snapshot.error = None,
                Some(Effect::Failed(message)) => state.snapshot.error = Some(message.clone()),
                _ => {}
            }
            self.snapshot_tx.send_replace(state.snapshot.clone());
            (from, transition, count_changed)
        };

        if from != transition.state {
            info!(%from, to = %transition.state, ?signal, "room state changed");
            self.emit(RoomUpdate::StateChanged {
                from,
                to: transition.state,
            });
        }
        if count_changed {
            self.emit(RoomUpdate::Participants(transition.participants));
        }
        match transition.effect {
            Some(Effect::Joined) => {
                if let Some(cb) = &self.callbacks.on_joined {
                    cb();
                }
            }
            Some(Effect::MeetingEnded) => {
                if let Some(cb) = &self.callbacks.on_meeting_end {
                    cb();
                }
            }
            Some(Effect::Failed(message)) => {
                warn!(%message, "room reported an error");
                self.emit(RoomUpdate::Error(message.clone()));
                if let Some(cb) = &self.callbacks.on_error {
                    cb(&message);
                }
            }
            None => {}
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
        if let Some(handle) = self.state.get_mut().handle.take() {
            let _ = handle.client.dispose();
        }
    }
}

async fn run_pump(
    inner: Weak<Inner>,
    mut rx: mpsc::UnboundedReceiver<(ConnectionId, ProviderSignal)>,
) {
    while let Some((id, signal)) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_signal(&id, signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRoomClient, MockRoomProvider, MockScriptLoader};
    use meetsync_api::mock::MockSessionsApi;
    use meetsync_core::ApiError;
    use serde_json::Value;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const SESSION_URL: &str = "https://meet.jit.si/Kickoff-7-abc";

    fn room_config() -> RoomConfig {
        serde_json::from_str(
            r#"{
                "domain": "meet.example.org",
                "room": "Kickoff-7-abc",
                "userInfo": {"displayName": "Ada"},
                "meetingTitle": "Kickoff"
            }"#,
        )
        .unwrap()
    }

    struct Harness {
        api: Arc<MockSessionsApi>,
        provider: Arc<MockRoomProvider>,
        loader: Arc<MockScriptLoader>,
        scripts: Arc<ScriptRegistry>,
        joined: Arc<AtomicUsize>,
        ended: Arc<AtomicUsize>,
        errors: Arc<Mutex<Vec<String>>>,
        room: RoomController,
    }

    impl Harness {
        fn new() -> Self {
            let api = Arc::new(MockSessionsApi::new());
            api.set_room_config(Ok(room_config()));
            let provider = Arc::new(MockRoomProvider::default());
            let loader = Arc::new(MockScriptLoader::default());
            let scripts = Arc::new(ScriptRegistry::new());
            let joined = Arc::new(AtomicUsize::new(0));
            let ended = Arc::new(AtomicUsize::new(0));
            let errors = Arc::new(Mutex::new(Vec::new()));
            let room = Self::controller(&api, &provider, &loader, &scripts, &joined, &ended, &errors);
            Self {
                api,
                provider,
                loader,
                scripts,
                joined,
                ended,
                errors,
                room,
            }
        }

        fn controller(
            api: &Arc<MockSessionsApi>,
            provider: &Arc<MockRoomProvider>,
            loader: &Arc<MockScriptLoader>,
            scripts: &Arc<ScriptRegistry>,
            joined: &Arc<AtomicUsize>,
            ended: &Arc<AtomicUsize>,
            errors: &Arc<Mutex<Vec<String>>>,
        ) -> RoomController {
            let deps = RoomDeps {
                api: api.clone(),
                provider: provider.clone(),
                loader: loader.clone(),
                scripts: scripts.clone(),
            };
            let (j, e, errs) = (joined.clone(), ended.clone(), errors.clone());
            let callbacks = RoomCallbacks::default()
                .on_joined(move || {
                    j.fetch_add(1, Ordering::SeqCst);
                })
                .on_meeting_end(move || {
                    e.fetch_add(1, Ordering::SeqCst);
                })
                .on_error(move |m| errs.lock().push(m.to_string()));
            RoomController::new(
                SessionId::new(7),
                Some(SESSION_URL.into()),
                deps,
                RoomSettings::default(),
                callbacks,
            )
        }

        fn client(&self) -> Arc<MockRoomClient> {
            self.provider.last_client().unwrap()
        }
    }

    fn drain(rx: &mut broadcast::Receiver<RoomUpdate>) -> Vec<RoomUpdate> {
        let mut out = Vec::new();
        while let Ok(update) = rx.try_recv() {
            out.push(update);
        }
        out
    }

    fn changes(updates: &[RoomUpdate]) -> Vec<(RoomState, RoomState)> {
        updates
            .iter()
            .filter_map(|u| match u {
                RoomUpdate::StateChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_walks_the_lifecycle() {
        let h = Harness::new();
        let mut rx = h.room.updates();

        h.room.initialize().await.unwrap();
        assert_eq!(h.room.state(), RoomState::Connecting);
        assert_eq!(h.provider.created(), 1);

        let client = h.client();
        assert_eq!(client.domain, "meet.example.org");
        assert_eq!(client.options.room_name, "Kickoff-7-abc");
        assert_eq!(client.options.config_overwrite["prejoinPageEnabled"], false);
        for event in ProviderEventName::ALL {
            assert_eq!(client.listener_count(event), 1);
        }
        assert_eq!(
            client.commands(),
            vec![("displayName".to_string(), Value::from("Ada"))]
        );

        client.emit(ProviderEventName::VideoConferenceJoined, Value::Null);
        settle().await;

        let snap = h.room.snapshot();
        assert_eq!(snap.state, RoomState::Connected);
        assert!(snap.error.is_none());
        assert!(snap.connection_id.is_some());
        assert_eq!(h.joined.load(Ordering::SeqCst), 1);
        assert_eq!(
            changes(&drain(&mut rx)),
            vec![
                (RoomState::Idle, RoomState::ScriptLoading),
                (RoomState::ScriptLoading, RoomState::ConfigFetching),
                (RoomState::ConfigFetching, RoomState::Connecting),
                (RoomState::Connecting, RoomState::Connected),
            ]
        );
        assert_eq!(h.room.meeting_title().as_deref(), Some("Kickoff"));
    }

    #[tokio::test(start_paused = true)]
    async fn config_failure_then_retry() {
        let h = Harness::new();
        h.api
            .set_room_config(Err(ApiError::from_status(500, r#"{"error":"Room not ready"}"#.into())));

        let err = h.room.initialize().await.unwrap_err();
        assert!(matches!(err, RoomError::Config(_)));
        let snap = h.room.snapshot();
        assert_eq!(snap.state, RoomState::Failed);
        assert_eq!(snap.error.as_deref(), Some("Room not ready"));
        assert_eq!(*h.errors.lock(), vec!["Room not ready".to_string()]);
        assert_eq!(h.provider.created(), 0);

        h.room.dispose();
        h.room.dispose();
        assert_eq!(h.room.state(), RoomState::Failed);

        h.api.set_room_config(Ok(room_config()));
        let mut rx = h.room.updates();
        h.room.retry().await.unwrap();
        assert_eq!(
            changes(&drain(&mut rx)),
            vec![
                (RoomState::Failed, RoomState::Idle),
                (RoomState::Idle, RoomState::ScriptLoading),
                (RoomState::ScriptLoading, RoomState::ConfigFetching),
                (RoomState::ConfigFetching, RoomState::Connecting),
            ]
        );
        assert!(h.room.snapshot().error.is_none());
        assert_eq!(h.loader.calls(), 1);
        assert_eq!(h.api.room_config_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_join_does_not_reenter_connected() {
        let h = Harness::new();
        h.room.initialize().await.unwrap();
        let mut rx = h.room.updates();

        let client = h.client();
        client.emit(ProviderEventName::VideoConferenceJoined, Value::Null);
        client.emit(ProviderEventName::VideoConferenceJoined, Value::Null);
        settle().await;

        assert_eq!(
            changes(&drain(&mut rx)),
            vec![(RoomState::Connecting, RoomState::Connected)]
        );
        assert_eq!(h.joined.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn participants_and_meeting_end() {
        let h = Harness::new();
        h.room.initialize().await.unwrap();
        let client = h.client();
        client.emit(ProviderEventName::VideoConferenceJoined, Value::Null);
        client.emit(ProviderEventName::ParticipantJoined, Value::Null);
        client.emit(ProviderEventName::ParticipantJoined, Value::Null);
        settle().await;
        assert_eq!(h.room.snapshot().participants, 2);
        assert_eq!(h.room.snapshot().status_text(), "Connected (2 participants)");

        for _ in 0..3 {
            client.emit(ProviderEventName::ParticipantLeft, Value::Null);
        }
        settle().await;
        assert_eq!(h.room.snapshot().participants, 0);

        client.emit(ProviderEventName::ReadyToClose, Value::Null);
        client.emit(ProviderEventName::VideoConferenceLeft, Value::Null);
        settle().await;
        assert_eq!(h.room.state(), RoomState::Disconnected);
        assert_eq!(h.ended.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_error_fails_the_room() {
        let h = Harness::new();
        h.room.initialize().await.unwrap();
        h.client().emit(
            ProviderEventName::ErrorOccurred,
            serde_json::json!({"message": "conference.connectionError"}),
        );
        settle().await;

        let snap = h.room.snapshot();
        assert_eq!(snap.state, RoomState::Failed);
        assert_eq!(snap.error.as_deref(), Some("Meeting error: conference.connectionError"));
        assert_eq!(snap.status_text(), "Meeting error: conference.connectionError");
        assert_eq!(h.errors.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_disposes_old_handle_and_ignores_its_events() {
        let h = Harness::new();
        h.room.initialize().await.unwrap();
        let first = h.client();

        h.room.retry().await.unwrap();
        assert_eq!(h.provider.created(), 2);
        assert!(first.is_disposed());
        assert_eq!(first.dispose_calls(), 1);

        first.emit(ProviderEventName::VideoConferenceJoined, Value::Null);
        settle().await;
        assert_eq!(h.room.state(), RoomState::Connecting);
        assert_eq!(h.joined.load(Ordering::SeqCst), 0);

        h.client().emit(ProviderEventName::VideoConferenceJoined, Value::Null);
        settle().await;
        assert_eq!(h.room.state(), RoomState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_runs_once() {
        let h = Harness::new();
        h.room.initialize().await.unwrap();
        h.room.initialize().await.unwrap();
        assert_eq!(h.provider.created(), 1);
        assert_eq!(h.api.room_config_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_stops_everything() {
        let h = Harness::new();
        h.room.initialize().await.unwrap();
        let client = h.client();

        h.room.unmount();
        h.room.unmount();
        assert!(!h.room.is_mounted());
        assert_eq!(client.dispose_calls(), 1);

        client.emit(ProviderEventName::VideoConferenceJoined, Value::Null);
        settle().await;
        assert_eq!(h.room.state(), RoomState::Connecting);
        assert_eq!(h.room.initialize().await, Err(RoomError::Unmounted));
        assert_eq!(h.room.retry().await, Err(RoomError::Unmounted));
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_during_script_load_abandons_quietly() {
        let h = Harness::new();
        h.loader.set_delay(Duration::from_millis(100));

        let room = h.room.clone();
        let task = tokio::spawn(async move { room.initialize().await });
        settle().await;
        assert_eq!(h.room.state(), RoomState::ScriptLoading);

        h.room.unmount();
        assert_eq!(task.await.unwrap(), Err(RoomError::Unmounted));
        assert_eq!(h.room.state(), RoomState::ScriptLoading);
        assert_eq!(h.provider.created(), 0);
        assert!(h.errors.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn script_failure_then_retry_reloads() {
        let h = Harness::new();
        h.loader.fail_next(RoomError::ScriptLoad("blocked".into()));

        assert!(h.room.initialize().await.is_err());
        assert_eq!(h.room.state(), RoomState::Failed);
        assert_eq!(
            h.room.snapshot().error.as_deref(),
            Some("Failed to load the video conference client")
        );
        assert_eq!(h.api.room_config_calls(), 0);

        h.room.retry().await.unwrap();
        assert_eq!(h.loader.calls(), 2);
        assert_eq!(h.room.state(), RoomState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_construction_failure() {
        let h = Harness::new();
        h.provider.fail_next(RoomError::Provider("JitsiMeetExternalAPI missing".into()));

        assert!(matches!(h.room.initialize().await, Err(RoomError::Provider(_))));
        assert_eq!(h.room.state(), RoomState::Failed);
        assert_eq!(
            h.room.snapshot().error.as_deref(),
            Some("Failed to initialize video conference")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn direct_link_prefers_fetched_config() {
        let h = Harness::new();
        assert_eq!(h.room.direct_link().as_deref(), Some(SESSION_URL));
        h.room.initialize().await.unwrap();
        assert_eq!(
            h.room.direct_link().as_deref(),
            Some("https://meet.example.org/Kickoff-7-abc")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn controllers_share_one_script_load() {
        let h = Harness::new();
        let other = Harness::controller(
            &h.api, &h.provider, &h.loader, &h.scripts, &h.joined, &h.ended, &h.errors,
        );
        h.room.initialize().await.unwrap();
        other.initialize().await.unwrap();
        assert_eq!(h.loader.calls(), 1);
        assert_eq!(h.provider.created(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_watch_follows_state() {
        let h = Harness::new();
        let mut watch = h.room.subscribe();
        h.room.initialize().await.unwrap();
        h.client().emit(ProviderEventName::VideoConferenceJoined, Value::Null);

        let snap = tokio::time::timeout(
            Duration::from_secs(1),
            watch.wait_for(|s| s.state == RoomState::Connected),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(snap.status_text(), "Connected (0 participants)");
    }

    #[test]
    fn status_text_per_state() {
        let mut snap = RoomSnapshot::default();
        assert_eq!(snap.status_text(), "Not connected");
        snap.state = RoomState::Connected;
        snap.participants = 1;
        assert_eq!(snap.status_text(), "Connected (1 participant)");
        snap.state = RoomState::Failed;
        assert_eq!(snap.status_text(), "Connection failed");
    }
}
