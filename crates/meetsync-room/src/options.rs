use meetsync_core::RoomConfig;
use meetsync_settings::RoomSettings;
use serde_json::{json, Map, Value};

use crate::provider::RoomOptions;

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn default_config() -> Map<String, Value> {
    into_object(json!({
        "startWithAudioMuted": false,
        "startWithVideoMuted": false,
        "enableWelcomePage": false,
        "enableClosePage": false,
        "prejoinPageEnabled": false,
        "disableDeepLinking": true,
        "disableAudioLevels": false,
        "channelLastN": -1,
        "enableInsecureRoomNameWarning": false,
        "enableEmailInStats": false,
        "enableDisplayNameInStats": false,
    }))
}

fn default_interface(settings: &RoomSettings) -> Map<String, Value> {
    into_object(json!({
        "SHOW_JITSI_WATERMARK": false,
        "SHOW_WATERMARK_FOR_GUESTS": false,
        "SHOW_BRAND_WATERMARK": false,
        "BRAND_WATERMARK_LINK": "",
        "SHOW_POWERED_BY": false,
        "APP_NAME": settings.app_name,
        "NATIVE_APP_NAME": settings.app_name,
        "PROVIDER_NAME": settings.provider_name,
        "TOOLBAR_BUTTONS": settings.toolbar_buttons,
    }))
}

/// Top-level keys of `overwrite` replace the defaults; nested objects are not merged.
fn spread(mut base: Map<String, Value>, overwrite: &Value) -> Value {
    if let Value::Object(fields) = overwrite {
        for (key, value) in fields {
            base.insert(key.clone(), value.clone());
        }
    }
    Value::Object(base)
}

/// Provider options for a fetched configuration, layered over the baseline:
/// no pre-join page, fixed toolbar, branding suppressed.
pub fn build_options(config: &RoomConfig, settings: &RoomSettings) -> RoomOptions {
    RoomOptions {
        room_name: config.room.clone(),
        user_info: config.user_info.clone(),
        config_overwrite: spread(default_config(), &config.config_overwrite),
        interface_config_overwrite: spread(
            default_interface(settings),
            &config.interface_config_overwrite,
        ),
        jwt: config.token.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn config(json: &str) -> RoomConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let cfg = config(r#"{"domain":"meet.jit.si","room":"r1","userInfo":{"displayName":"Ada"}}"#);
        let opts = build_options(&cfg, &RoomSettings::default());
        assert_eq!(opts.room_name, "r1");
        assert_eq!(opts.user_info.display_name, "Ada");
        assert_eq!(opts.config_overwrite["prejoinPageEnabled"], false);
        assert_eq!(opts.config_overwrite["channelLastN"], -1);
        assert_eq!(opts.interface_config_overwrite["SHOW_JITSI_WATERMARK"], false);
        assert_eq!(opts.interface_config_overwrite["APP_NAME"], "SaaS Platform Meeting");
        let buttons = opts.interface_config_overwrite["TOOLBAR_BUTTONS"].as_array().unwrap();
        assert!(buttons.iter().any(|b| b == "hangup"));
        assert!(opts.jwt.is_none());
    }

    #[test]
    fn backend_overrides_win_shallowly() {
        let cfg = config(
            r#"{
                "domain": "meet.jit.si",
                "room": "r1",
                "userInfo": {"displayName": "Ada"},
                "configOverwrite": {"startWithAudioMuted": true, "toolbarConfig": {"alwaysVisible": true}},
                "interfaceConfigOverwrite": {"TOOLBAR_BUTTONS": ["hangup"]},
                "jwt": "tok"
            }"#,
        );
        let opts = build_options(&cfg, &RoomSettings::default());
        assert_eq!(opts.config_overwrite["startWithAudioMuted"], true);
        assert_eq!(opts.config_overwrite["startWithVideoMuted"], false);
        assert_eq!(opts.config_overwrite["toolbarConfig"]["alwaysVisible"], true);
        assert_eq!(
            opts.interface_config_overwrite["TOOLBAR_BUTTONS"],
            serde_json::json!(["hangup"])
        );
        assert_eq!(opts.interface_config_overwrite["SHOW_POWERED_BY"], false);
        assert_eq!(opts.jwt.unwrap().expose_secret(), "tok");
    }

    #[test]
    fn settings_drive_branding() {
        let settings = RoomSettings {
            app_name: "Acme Meet".into(),
            provider_name: "Acme".into(),
            ..RoomSettings::default()
        };
        let cfg = config(r#"{"domain":"d","room":"r","userInfo":{"displayName":"x"}}"#);
        let opts = build_options(&cfg, &settings);
        assert_eq!(opts.interface_config_overwrite["NATIVE_APP_NAME"], "Acme Meet");
        assert_eq!(opts.interface_config_overwrite["PROVIDER_NAME"], "Acme");
    }
}
