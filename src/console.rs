//! Headless room collaborators for the terminal: the client library is
//! fetched to confirm it is reachable, and the "room" is the join link.

use std::time::Duration;

use async_trait::async_trait;
use meetsync_room::{EventCallback, ProviderEventName, RoomClient, RoomError, RoomOptions, RoomProvider, ScriptLoader};
use serde_json::Value;
use tracing::{debug, info};

/// Fetches the provider script over HTTP.
pub struct HttpScriptLoader {
    client: reqwest::Client,
}

impl HttpScriptLoader {
    pub fn new(timeout: Duration) -> Result<Self, RoomError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RoomError::ScriptLoad(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ScriptLoader for HttpScriptLoader {
    async fn load(&self, url: &str) -> Result<(), RoomError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RoomError::ScriptLoad(e.to_string()))?;
        response
            .error_for_status()
            .map_err(|e| RoomError::ScriptLoad(e.to_string()))?;
        debug!(url, "room client library reachable");
        Ok(())
    }
}

/// Prints the join link instead of embedding a conference.
#[derive(Default)]
pub struct ConsoleRoomProvider;

impl RoomProvider for ConsoleRoomProvider {
    fn create(&self, domain: &str, options: RoomOptions) -> Result<Box<dyn RoomClient>, RoomError> {
        if domain.is_empty() || options.room_name.is_empty() {
            return Err(RoomError::Provider("room configuration has no domain or room".into()));
        }
        let link = join_link(domain, &options.room_name);
        println!("Room ready for {}: {link}", options.user_info.display_name);
        Ok(Box::new(ConsoleRoomClient { link }))
    }
}

fn join_link(domain: &str, room: &str) -> String {
    format!(
        "https://{}/{}",
        domain.trim_end_matches('/'),
        room.trim_start_matches('/')
    )
}

struct ConsoleRoomClient {
    link: String,
}

impl RoomClient for ConsoleRoomClient {
    fn add_event_listener(&self, event: ProviderEventName, _callback: EventCallback) {
        debug!(event = event.as_str(), "console room ignores provider events");
    }

    fn execute_command(&self, command: &str, argument: Value) -> Result<(), RoomError> {
        debug!(command, %argument, "console room command");
        Ok(())
    }

    fn dispose(&self) -> Result<(), RoomError> {
        info!(link = %self.link, "room closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetsync_core::UserInfo;

    fn options(room: &str) -> RoomOptions {
        RoomOptions {
            room_name: room.into(),
            user_info: serde_json::from_str::<UserInfo>(r#"{"displayName":"Ada"}"#).unwrap(),
            config_overwrite: Value::Null,
            interface_config_overwrite: Value::Null,
            jwt: None,
        }
    }

    #[test]
    fn join_link_normalizes_slashes() {
        assert_eq!(join_link("meet.example.org/", "/team"), "https://meet.example.org/team");
    }

    #[test]
    fn console_provider_hands_out_a_disposable_client() {
        let client = ConsoleRoomProvider.create("meet.example.org", options("team")).unwrap();
        client.execute_command("displayName", Value::from("Ada")).unwrap();
        client.dispose().unwrap();
        client.dispose().unwrap();
    }

    #[test]
    fn console_provider_rejects_empty_room() {
        let err = ConsoleRoomProvider
            .create("meet.example.org", options(""))
            .err()
            .unwrap();
        assert!(matches!(err, RoomError::Provider(_)));
    }
}
