//! Deezer public API client
//!
//! Only the unauthenticated track endpoint is used:
//! `GET {base}/track/{id}` returns title, artist, album cover and the
//! 30-second preview URL.
//!
//! [`DeezerClient::get_track_info`] reports failures as [`DeezerError`]. The
//! scanner consumes the client through [`TrackMetadataSource`], which
//! swallows those errors (after logging them) and yields `None`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEEZER_API_BASE: &str = "https://api.deezer.com";
const USER_AGENT: &str = concat!("HitIt/", env!("CARGO_PKG_VERSION"));

/// Deezer client errors
#[derive(Debug, Error)]
pub enum DeezerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Track not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Track as returned by `/track/{id}`; unknown fields are ignored
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeezerTrack {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    /// 30-second MP3 preview
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub artist: Option<DeezerArtist>,
    #[serde(default)]
    pub album: Option<DeezerAlbum>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeezerArtist {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeezerAlbum {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cover_medium: Option<String>,
}

/// Error body Deezer sends with HTTP 200
#[derive(Debug, Deserialize)]
struct DeezerErrorBody {
    error: DeezerErrorDetail,
}

#[derive(Debug, Deserialize)]
struct DeezerErrorDetail {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<u32>,
}

/// "no data" error code
const DEEZER_NO_DATA: u32 = 800;

/// Track metadata the scanner needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TrackInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_cover_url: Option<String>,
    pub preview_url: Option<String>,
}

impl From<DeezerTrack> for TrackInfo {
    fn from(track: DeezerTrack) -> Self {
        Self {
            title: track.title,
            artist: track.artist.and_then(|artist| artist.name),
            album_cover_url: track.album.and_then(|album| album.cover_medium),
            preview_url: track.preview,
        }
    }
}

/// Metadata lookup as seen by playback and the scanner
///
/// Never fails: network and API problems surface as `None`.
#[async_trait]
pub trait TrackMetadataSource: Send + Sync {
    async fn track_info(&self, track_id: &str) -> Option<TrackInfo>;

    /// Preview URL of a track, if it has one
    async fn preview_url(&self, track_id: &str) -> Option<String> {
        self.track_info(track_id).await.and_then(|info| info.preview_url)
    }
}

/// Deezer API client
pub struct DeezerClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl DeezerClient {
    /// Client for the public Deezer API
    pub fn new() -> Result<Self, DeezerError> {
        Self::with_base_url(DEEZER_API_BASE)
    }

    /// Client for a Deezer-compatible API at `base_url` (tests, proxies)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DeezerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DeezerError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch track metadata
    pub async fn get_track_info(&self, track_id: &str) -> Result<DeezerTrack, DeezerError> {
        let url = format!("{}/track/{}", self.base_url, track_id);

        tracing::debug!(track_id = %track_id, url = %url, "Querying Deezer API");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| DeezerError::Network(e.to_string()))?;

        let status = response.status();

        if status == 404 {
            return Err(DeezerError::NotFound(track_id.to_string()));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DeezerError::Api(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DeezerError::Network(e.to_string()))?;

        let track = parse_track_response(track_id, &body)?;

        tracing::info!(
            track_id = %track_id,
            title = %track.title.as_deref().unwrap_or("Unknown"),
            "Retrieved track from Deezer"
        );

        Ok(track)
    }
}

/// Parse a `/track/{id}` body, mapping Deezer's in-band errors
fn parse_track_response(track_id: &str, body: &str) -> Result<DeezerTrack, DeezerError> {
    if let Ok(error_body) = serde_json::from_str::<DeezerErrorBody>(body) {
        let detail = error_body.error;
        if detail.code == Some(DEEZER_NO_DATA) {
            return Err(DeezerError::NotFound(track_id.to_string()));
        }
        return Err(DeezerError::Api(
            200,
            format!(
                "{}: {}",
                detail.kind.unwrap_or_default(),
                detail.message.unwrap_or_default()
            ),
        ));
    }

    serde_json::from_str(body).map_err(|e| DeezerError::Parse(e.to_string()))
}

#[async_trait]
impl TrackMetadataSource for DeezerClient {
    async fn track_info(&self, track_id: &str) -> Option<TrackInfo> {
        match self.get_track_info(track_id).await {
            Ok(track) => Some(track.into()),
            Err(e) => {
                tracing::warn!(track_id = %track_id, "Deezer lookup failed: {}", e);
                None
            }
        }
    }
}
