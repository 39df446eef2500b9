use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::RoomError;
use crate::provider::{EventCallback, ProviderEventName, RoomClient, RoomOptions, RoomProvider};
use crate::script::ScriptLoader;

/// Script loader that records calls and can be told to fail or stall.
#[derive(Default)]
pub struct MockScriptLoader {
    calls: AtomicUsize,
    errors: Mutex<VecDeque<RoomError>>,
    delay: Mutex<Option<Duration>>,
}

impl MockScriptLoader {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn fail_next(&self, error: RoomError) {
        self.errors.lock().push_back(error);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }
}

#[async_trait]
impl ScriptLoader for MockScriptLoader {
    async fn load(&self, _url: &str) -> Result<(), RoomError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.errors.lock().pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Provider that hands out [`MockRoomClient`]s and keeps them for inspection.
#[derive(Default)]
pub struct MockRoomProvider {
    clients: Mutex<Vec<Arc<MockRoomClient>>>,
    errors: Mutex<VecDeque<RoomError>>,
}

impl MockRoomProvider {
    pub fn fail_next(&self, error: RoomError) {
        self.errors.lock().push_back(error);
    }

    pub fn created(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn client(&self, index: usize) -> Option<Arc<MockRoomClient>> {
        self.clients.lock().get(index).cloned()
    }

    pub fn last_client(&self) -> Option<Arc<MockRoomClient>> {
        self.clients.lock().last().cloned()
    }
}

impl RoomProvider for MockRoomProvider {
    fn create(&self, domain: &str, options: RoomOptions) -> Result<Box<dyn RoomClient>, RoomError> {
        if let Some(e) = self.errors.lock().pop_front() {
            return Err(e);
        }
        let client = Arc::new(MockRoomClient {
            domain: domain.to_string(),
            options,
            listeners: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            dispose_calls: AtomicUsize::new(0),
        });
        self.clients.lock().push(Arc::clone(&client));
        Ok(Box::new(client))
    }
}

/// Fake provider handle. Tests drive it with [`MockRoomClient::emit`].
/// Listeners survive `dispose()` so late events can still be fired.
pub struct MockRoomClient {
    pub domain: String,
    pub options: RoomOptions,
    listeners: Mutex<HashMap<ProviderEventName, Vec<EventCallback>>>,
    commands: Mutex<Vec<(String, Value)>>,
    disposed: AtomicBool,
    dispose_calls: AtomicUsize,
}

impl MockRoomClient {
    /// Invoke every listener registered for `event`.
    pub fn emit(&self, event: ProviderEventName, payload: Value) {
        let listeners = self.listeners.lock();
        for callback in listeners.get(&event).into_iter().flatten() {
            callback(payload.clone());
        }
    }

    pub fn listener_count(&self, event: ProviderEventName) -> usize {
        self.listeners.lock().get(&event).map_or(0, Vec::len)
    }

    pub fn commands(&self) -> Vec<(String, Value)> {
        self.commands.lock().clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Relaxed)
    }

    pub fn dispose_calls(&self) -> usize {
        self.dispose_calls.load(Ordering::Relaxed)
    }
}

impl RoomClient for Arc<MockRoomClient> {
    fn add_event_listener(&self, event: ProviderEventName, callback: EventCallback) {
        self.listeners.lock().entry(event).or_default().push(callback);
    }

    fn execute_command(&self, command: &str, argument: Value) -> Result<(), RoomError> {
        self.commands.lock().push((command.to_string(), argument));
        Ok(())
    }

    fn dispose(&self) -> Result<(), RoomError> {
        self.dispose_calls.fetch_add(1, Ordering::Relaxed);
        self.disposed.store(true, Ordering::Relaxed);
        Ok(())
    }
}
