use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::RoomError;

/// Loads the provider's client library from a URL.
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<(), RoomError>;
}

type LoadFuture = Shared<BoxFuture<'static, Result<(), RoomError>>>;

enum Slot {
    Loaded,
    Loading { generation: u64, future: LoadFuture },
}

/// Tracks which client libraries are loaded. Concurrent callers for the same
/// URL share one in-flight load; a failed load leaves no trace.
#[derive(Default)]
pub struct ScriptRegistry {
    slots: Mutex<HashMap<String, Slot>>,
    generation: AtomicU64,
}

static GLOBAL: OnceLock<Arc<ScriptRegistry>> = OnceLock::new();

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by every controller in the process.
    pub fn global() -> Arc<ScriptRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ScriptRegistry::new())))
    }

    pub fn is_loaded(&self, url: &str) -> bool {
        matches!(self.slots.lock().get(url), Some(Slot::Loaded))
    }

    pub async fn ensure_loaded(
        &self,
        url: &str,
        loader: Arc<dyn ScriptLoader>,
    ) -> Result<(), RoomError> {
        let (generation, future) = {
            let mut slots = self.slots.lock();
            match slots.get(url) {
                Some(Slot::Loaded) => return Ok(()),
                Some(Slot::Loading { generation, future }) => {
                    debug!(url, "joining in-flight script load");
                    (*generation, future.clone())
                }
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let owned = url.to_string();
                    let future = async move { loader.load(&owned).await }.boxed().shared();
                    slots.insert(
                        url.to_string(),
                        Slot::Loading {
                            generation,
                            future: future.clone(),
                        },
                    );
                    (generation, future)
                }
            }
        };

        let result = future.await;

        let mut slots = self.slots.lock();
        let ours = matches!(
            slots.get(url),
            Some(Slot::Loading { generation: g, .. }) if *g == generation
        );
        if ours {
            match &result {
                Ok(()) => {
                    info!(url, "room client library loaded");
                    slots.insert(url.to_string(), Slot::Loaded);
                }
                Err(e) => {
                    warn!(url, error = %e, "room client library failed to load");
                    slots.remove(url);
                }
            }
        }
        result
    }
}
