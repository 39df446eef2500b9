use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use meetsync_core::{ApiError, RoomConfig, Session, SessionId};
use meetsync_settings::ApiSettings;

use crate::client::{Availability, AvailabilityRequest, RescheduleRequest, SessionsApi};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`HttpSessionsApi`].
#[derive(Clone, Debug)]
pub struct HttpApiConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub token: Option<SecretString>,
}

impl HttpApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            token: None,
        }
    }

    /// Build from settings, reading the bearer token from the configured env var.
    pub fn from_settings(settings: &ApiSettings) -> Self {
        let token = std::env::var(&settings.token_env)
            .ok()
            .filter(|t| !t.is_empty())
            .map(SecretString::from);
        Self {
            base_url: settings.base_url.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            token,
        }
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `GET /rooms/config/{id}` answers either with the configuration itself or
/// with it nested under `jitsi_config` next to the meeting metadata.
#[derive(Deserialize)]
#[serde(untagged)]
enum RoomConfigBody {
    Wrapped {
        jitsi_config: RoomConfig,
        #[serde(default)]
        meeting_url: Option<String>,
        #[serde(default)]
        meeting_title: Option<String>,
    },
    Flat(RoomConfig),
}

impl RoomConfigBody {
    fn into_config(self) -> RoomConfig {
        match self {
            Self::Flat(config) => config,
            Self::Wrapped {
                mut jitsi_config,
                meeting_url,
                meeting_title,
            } => {
                jitsi_config.meeting_url = jitsi_config.meeting_url.or(meeting_url);
                jitsi_config.meeting_title = jitsi_config.meeting_title.or(meeting_title);
                jitsi_config
            }
        }
    }
}

/// Bearer-authenticated JSON client for the sessions backend.
pub struct HttpSessionsApi {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
    timeout: Duration,
}

impl HttpSessionsApi {
    pub fn new(config: HttpApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "backend returned error status");
            return Err(ApiError::from_status(status.as_u16(), body));
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl SessionsApi for HttpSessionsApi {
    #[instrument(skip(self))]
    async fn active_sessions(&self) -> Result<Vec<Session>, ApiError> {
        let sessions: Option<Vec<Session>> =
            self.send(self.request(Method::GET, "/sessions/active")).await?;
        let sessions = sessions.unwrap_or_default();
        debug!(count = sessions.len(), "active sessions fetched");
        Ok(sessions)
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn room_config(&self, id: SessionId) -> Result<RoomConfig, ApiError> {
        let body: RoomConfigBody = self
            .send(self.request(Method::GET, &format!("/rooms/config/{id}")))
            .await?;
        Ok(body.into_config())
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn start_session(&self, id: SessionId) -> Result<Session, ApiError> {
        self.send(
            self.request(Method::PUT, &format!("/sessions/{id}/start"))
                .json(&json!({})),
        )
        .await
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn end_session(&self, id: SessionId) -> Result<Session, ApiError> {
        self.send(
            self.request(Method::PUT, &format!("/sessions/{id}/end"))
                .json(&json!({})),
        )
        .await
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn cancel_session(&self, id: SessionId) -> Result<Session, ApiError> {
        self.send(
            self.request(Method::PUT, &format!("/sessions/{id}"))
                .json(&json!({ "status": "cancelled" })),
        )
        .await
    }

    #[instrument(skip(self, request), fields(session_id = %id, scheduled_at = %request.scheduled_at))]
    async fn reschedule_session(
        &self,
        id: SessionId,
        request: &RescheduleRequest,
    ) -> Result<Session, ApiError> {
        let body = json!({
            "scheduled_at": request.scheduled_at,
            "timezone": request.timezone,
            "status": "rescheduled",
        });
        self.send(
            self.request(Method::PUT, &format!("/sessions/{id}"))
                .json(&body),
        )
        .await
    }

    #[instrument(skip(self, request), fields(scheduled_at = %request.scheduled_at))]
    async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<Availability, ApiError> {
        self.send(
            self.request(Method::POST, "/sessions/check-availability")
                .json(request),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use chrono::{TimeZone, Utc};
    use meetsync_core::SessionStatus;
    use serde_json::Value;

    fn session_json(id: u64, status: &str) -> Value {
        json!({
            "id": id,
            "title": "Kickoff",
            "scheduled_at": "2026-03-01T10:00:00Z",
            "duration": 30,
            "timezone": "UTC",
            "status": status,
            "meeting_url": "https://meet.jit.si/Kickoff-7",
        })
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "Bearer tok")
    }

    async fn spawn_backend(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    fn api(base_url: String) -> HttpSessionsApi {
        HttpSessionsApi::new(HttpApiConfig::new(base_url).with_token(SecretString::from("tok")))
            .unwrap()
    }

    fn backend() -> Router {
        Router::new()
            .route(
                "/api/sessions/active",
                get(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "expired"})));
                    }
                    (StatusCode::OK, Json(json!([session_json(7, "confirmed")])))
                }),
            )
            .route(
                "/api/sessions/{id}/start",
                put(|Path(id): Path<u64>| async move { Json(session_json(id, "started")) }),
            )
            .route(
                "/api/sessions/{id}",
                put(|Path(id): Path<u64>, Json(body): Json<Value>| async move {
                    let mut s = session_json(id, body["status"].as_str().unwrap_or("pending"));
                    if let Some(at) = body.get("scheduled_at") {
                        s["scheduled_at"] = at.clone();
                        s["timezone"] = body["timezone"].clone();
                    }
                    Json(s)
                }),
            )
            .route(
                "/api/sessions/check-availability",
                post(|Json(body): Json<Value>| async move {
                    let available = body["duration"].as_u64() == Some(30);
                    let message = (!available).then_some("Slot too long");
                    Json(json!({"available": available, "message": message}))
                }),
            )
            .route(
                "/api/rooms/config/{id}",
                get(|Path(id): Path<u64>| async move {
                    if id == 404 {
                        return (StatusCode::NOT_FOUND, Json(json!({"error": "no room"})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "jitsi_config": {
                                "domain": "meet.jit.si",
                                "room": format!("Kickoff-{id}"),
                                "userInfo": {"displayName": "Ada"},
                                "configOverwrite": {},
                                "interfaceConfigOverwrite": {},
                                "jwt": "signed"
                            },
                            "meeting_url": "https://meet.jit.si/Kickoff",
                            "meeting_title": "Kickoff",
                            "is_moderator": true
                        })),
                    )
                }),
            )
    }

    #[tokio::test]
    async fn active_sessions_sends_bearer_token() {
        let api = api(spawn_backend(backend()).await);
        let sessions = api.active_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, SessionId::new(7));
        assert_eq!(sessions[0].status, SessionStatus::Confirmed);
    }

    #[tokio::test]
    async fn missing_token_is_auth_error() {
        let base = spawn_backend(backend()).await;
        let api = HttpSessionsApi::new(HttpApiConfig::new(base)).unwrap();
        let err = api.active_sessions().await.unwrap_err();
        assert!(err.is_auth());
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn null_active_list_is_empty() {
        let app = Router::new().route("/api/sessions/active", get(|| async { Json(Value::Null) }));
        let api = api(spawn_backend(app).await);
        assert!(api.active_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn room_config_unwraps_envelope() {
        let api = api(spawn_backend(backend()).await);
        let config = api.room_config(SessionId::new(7)).await.unwrap();
        assert_eq!(config.room, "Kickoff-7");
        assert_eq!(config.meeting_url.as_deref(), Some("https://meet.jit.si/Kickoff"));
        assert_eq!(config.meeting_title.as_deref(), Some("Kickoff"));
        assert_eq!(config.token.as_ref().unwrap().expose_secret(), "signed");
    }

    #[tokio::test]
    async fn room_config_accepts_flat_body() {
        let app = Router::new().route(
            "/api/rooms/config/{id}",
            get(|| async {
                Json(json!({"domain": "meet.example.org", "room": "flat", "userInfo": {"displayName": "x"}}))
            }),
        );
        let api = api(spawn_backend(app).await);
        let config = api.room_config(SessionId::new(1)).await.unwrap();
        assert_eq!(config.direct_url(), "https://meet.example.org/flat");
    }

    #[tokio::test]
    async fn not_found_maps_to_permanent_error() {
        let api = api(spawn_backend(backend()).await);
        let err = api.room_config(SessionId::new(404)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(err.user_message(), "The meeting could not be found.");
    }

    #[tokio::test]
    async fn server_error_is_transient_with_backend_message() {
        let app = Router::new().route(
            "/api/sessions/active",
            get(|| async {
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({"error": "Room provider down"})),
                )
            }),
        );
        let api = api(spawn_backend(app).await);
        let err = api.active_sessions().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.user_message(), "Room provider down");
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let app = Router::new().route("/api/sessions/active", get(|| async { "[{\"id\":" }));
        let api = api(spawn_backend(app).await);
        let err = api.active_sessions().await.unwrap_err();
        assert_eq!(err.error_kind(), "decode");
    }

    #[tokio::test]
    async fn start_and_cancel_return_updated_session() {
        let api = api(spawn_backend(backend()).await);
        let started = api.start_session(SessionId::new(7)).await.unwrap();
        assert_eq!(started.status, SessionStatus::Started);
        let cancelled = api.cancel_session(SessionId::new(7)).await.unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
    }

    #[tokio::test]
    async fn reschedule_sends_new_slot() {
        let api = api(spawn_backend(backend()).await);
        let at = Utc.with_ymd_and_hms(2026, 4, 2, 15, 30, 0).unwrap();
        let updated = api
            .reschedule_session(
                SessionId::new(7),
                &RescheduleRequest {
                    scheduled_at: at,
                    timezone: "Europe/Paris".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, SessionStatus::Rescheduled);
        assert_eq!(updated.scheduled_at, at);
        assert_eq!(updated.timezone, "Europe/Paris");
    }

    #[tokio::test]
    async fn availability_round_trip() {
        let api = api(spawn_backend(backend()).await);
        let at = Utc.with_ymd_and_hms(2026, 4, 2, 15, 0, 0).unwrap();
        let ok = api
            .check_availability(&AvailabilityRequest {
                scheduled_at: at,
                timezone: "UTC".into(),
                duration: 30,
            })
            .await
            .unwrap();
        assert!(ok.available);

        let taken = api
            .check_availability(&AvailabilityRequest {
                scheduled_at: at,
                timezone: "UTC".into(),
                duration: 90,
            })
            .await
            .unwrap();
        assert!(!taken.available);
        assert_eq!(taken.message.as_deref(), Some("Slot too long"));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let app = Router::new().route(
            "/api/sessions/active",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!([]))
            }),
        );
        let base = spawn_backend(app).await;
        let api = HttpSessionsApi::new(
            HttpApiConfig::new(base).with_timeout(Duration::from_millis(200)),
        )
        .unwrap();
        let err = api.active_sessions().await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let api = api(format!("http://{addr}/api"));
        let err = api.active_sessions().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let api = HttpSessionsApi::new(HttpApiConfig::new("http://localhost:8000/api/")).unwrap();
        assert_eq!(api.base_url(), "http://localhost:8000/api");
    }
}
