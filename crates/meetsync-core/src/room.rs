use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Identity shown inside the room.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Room configuration returned by `GET /rooms/config/{sessionId}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    pub domain: String,
    pub room: String,
    pub user_info: UserInfo,
    #[serde(default = "empty_object")]
    pub config_overwrite: Value,
    #[serde(default = "empty_object")]
    pub interface_config_overwrite: Value,
    /// Signed room token, when the provider instance requires one.
    #[serde(default, alias = "jwt", deserialize_with = "secret_opt")]
    pub token: Option<SecretString>,
    #[serde(default)]
    pub meeting_url: Option<String>,
    #[serde(default)]
    pub meeting_title: Option<String>,
}

impl RoomConfig {
    /// URL that opens the room directly in a browser.
    pub fn direct_url(&self) -> String {
        format!(
            "https://{}/{}",
            self.domain.trim_end_matches('/'),
            self.room.trim_start_matches('/')
        )
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

fn secret_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(d)?
        .filter(|t| !t.is_empty())
        .map(SecretString::from))
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
