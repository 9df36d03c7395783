//! Client for the external video-conferencing provider.
//!
//! Reserving a provider room is best effort.  Any failure (no API key,
//! network error, timeout, non-success status, unexpected body) yields a
//! deterministic fallback URL so call setup never blocks on the provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use huddle_shared::RoomKind;

use crate::config::ServerConfig;
use crate::error::ServerError;

/// Where a video room's URL came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservedRoom {
    /// The provider created the room.
    Provider(String),
    /// The provider was unavailable; the URL is synthesized locally.
    Fallback(String),
}

impl ReservedRoom {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn into_url(self) -> String {
        match self {
            Self::Provider(url) | Self::Fallback(url) => url,
        }
    }
}

/// Reasons a reservation fell back.  Never surfaced to API callers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("provider response carried no room URL")]
    MissingUrl,
}

#[derive(Serialize)]
struct CreateRoomRequest<'a> {
    name: &'a str,
    properties: RoomProperties,
}

#[derive(Serialize)]
struct RoomProperties {
    max_participants: u32,
    enable_screenshare: bool,
    enable_chat: bool,
    start_video_off: bool,
    start_audio_off: bool,
    /// Unix expiry time in seconds.
    exp: i64,
}

#[derive(Deserialize)]
struct CreateRoomResponse {
    url: Option<String>,
}

pub struct VideoProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    fallback_domain: String,
    max_participants: u32,
    room_ttl_secs: i64,
}

impl VideoProvider {
    pub fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .timeout(config.video_timeout)
            .build()
            .map_err(|e| ServerError::Internal(format!("Failed to build HTTP client: {e}")))?;

        if config.video_api_key.is_none() {
            warn!("VIDEO_API_KEY not set, video rooms will use fallback URLs");
        }

        Ok(Self {
            client,
            api_url: config.video_api_url.clone(),
            api_key: config.video_api_key.clone(),
            fallback_domain: config.video_fallback_domain.clone(),
            max_participants: config.video_max_participants,
            room_ttl_secs: config.video_room_ttl_secs,
        })
    }

    /// Reserve a provider room named `name`.  Always returns a URL.
    pub async fn reserve_room(&self, name: &str) -> ReservedRoom {
        match self.try_reserve(name).await {
            Ok(url) => {
                debug!(room = name, "provider room reserved");
                ReservedRoom::Provider(url)
            }
            Err(e) => {
                warn!(room = name, error = %e, "provider reservation failed, using fallback URL");
                ReservedRoom::Fallback(self.fallback_url(name))
            }
        }
    }

    pub fn fallback_url(&self, name: &str) -> String {
        format!("https://{}/{}", self.fallback_domain, name)
    }

    async fn try_reserve(&self, name: &str) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;

        let body = CreateRoomRequest {
            name,
            properties: RoomProperties {
                max_participants: self.max_participants,
                enable_screenshare: true,
                enable_chat: true,
                start_video_off: false,
                start_audio_off: false,
                exp: Utc::now().timestamp() + self.room_ttl_secs,
            },
        };

        let response = self
            .client
            .post(format!("{}/rooms", self.api_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let created: CreateRoomResponse = response.json().await?;
        created
            .url
            .filter(|url| !url.is_empty())
            .ok_or(ProviderError::MissingUrl)
    }
}

/// Room name derived from `base` (a client-chosen name or the chat name):
/// whitespace becomes dashes, other characters outside `[A-Za-z0-9_-]` are
/// dropped, and the media kind plus a millisecond timestamp keep names unique
/// per call.
pub fn room_name(base: &str, kind: RoomKind, at: DateTime<Utc>) -> String {
    let base = sanitize_room_name(base);
    let base = if base.is_empty() { "call".to_string() } else { base };
    format!("{}-{}-{}", base, kind.as_str(), at.timestamp_millis())
}

/// Make a client-supplied name safe to embed in a URL path.
pub fn sanitize_room_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use chrono::TimeZone;

    fn provider(api_url: &str, api_key: Option<&str>) -> VideoProvider {
        let config = ServerConfig {
            video_api_url: api_url.to_string(),
            video_api_key: api_key.map(str::to_string),
            video_fallback_domain: "fallback.example".to_string(),
            video_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        VideoProvider::new(&config).unwrap()
    }

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn spawn_provider(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn missing_key_falls_back() {
        let video = provider("http://127.0.0.1:9", None);
        let reserved = video.reserve_room("Team-video-1").await;
        assert_eq!(
            reserved,
            ReservedRoom::Fallback("https://fallback.example/Team-video-1".into())
        );
    }

    #[tokio::test]
    async fn unreachable_provider_falls_back() {
        // Nothing listens on the discard port.
        let video = provider("http://127.0.0.1:9", Some("key"));
        assert!(video.reserve_room("r").await.is_fallback());
    }

    #[tokio::test]
    async fn successful_reservation_uses_provider_url() {
        let router = Router::new().route(
            "/rooms",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers["authorization"], "Bearer key");
                assert_eq!(body["properties"]["max_participants"], 10);
                assert_eq!(body["properties"]["enable_screenshare"], true);
                let name = body["name"].as_str().unwrap().to_string();
                Json(serde_json::json!({ "url": format!("https://huddle.daily.co/{name}") }))
            }),
        );
        let base = spawn_provider(router).await;

        let reserved = provider(&base, Some("key")).reserve_room("abc").await;
        assert_eq!(
            reserved,
            ReservedRoom::Provider("https://huddle.daily.co/abc".into())
        );
    }

    #[tokio::test]
    async fn error_status_falls_back() {
        let router = Router::new().route(
            "/rooms",
            post(|| async { (StatusCode::BAD_REQUEST, "room name taken") }),
        );
        let base = spawn_provider(router).await;

        let reserved = provider(&base, Some("key")).reserve_room("abc").await;
        assert_eq!(reserved.into_url(), "https://fallback.example/abc");
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let router = Router::new().route(
            "/rooms",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(serde_json::json!({ "url": "https://late.example/x" }))
            }),
        );
        let base = spawn_provider(router).await;

        let reserved = provider(&base, Some("key")).reserve_room("x").await;
        assert!(reserved.is_fallback());
    }

    #[test]
    fn room_names_are_url_safe() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            room_name("Weekend  Plans!", RoomKind::Video, at),
            "Weekend-Plans-video-1700000000123"
        );
        assert_eq!(room_name("¿¿", RoomKind::Voice, at), "call-voice-1700000000123");
        assert_eq!(sanitize_room_name("../etc passwd"), "etc-passwd");
    }
}
