//! Lifecycle of an embedded third-party video room: client library loading,
//! configuration fetch, connection and event-driven state transitions.

pub mod bridge;
pub mod controller;
pub mod error;
pub mod mock;
pub mod options;
pub mod provider;
pub mod script;
pub mod state;

pub use bridge::{CallbacksFactory, RoomBridge};
pub use controller::{RoomCallbacks, RoomController, RoomDeps, RoomSnapshot, RoomUpdate};
pub use error::RoomError;
pub use options::build_options;
pub use provider::{EventCallback, ProviderEventName, RoomClient, RoomOptions, RoomProvider};
pub use script::{ScriptLoader, ScriptRegistry};
pub use state::{on_signal, Effect, ProviderSignal, RoomState, Transition};
