//! Card and track models
//!
//! A [`Card`] is the physical game card: its printed answer (title, artist,
//! year) plus the streaming track it was matched to. A [`Track`] is what the
//! scanner actually plays.

use serde::{Deserialize, Serialize};

/// Streaming service a track identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MusicServiceType {
    #[default]
    Deezer,
    Spotify,
    #[serde(rename = "youtube")]
    YouTube,
}

impl MusicServiceType {
    /// Display name of the service
    pub fn display_name(&self) -> &'static str {
        match self {
            MusicServiceType::Deezer => "Deezer",
            MusicServiceType::Spotify => "Spotify",
            MusicServiceType::YouTube => "YouTube",
        }
    }
}

/// A game card with its printed answer and optional linked Deezer track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Five-digit card number printed in the QR code URL
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Release year (the answer players guess)
    pub year: i32,
    #[serde(default)]
    pub deezer_id: Option<u64>,
    #[serde(default)]
    pub deezer_title: Option<String>,
    #[serde(default)]
    pub deezer_artist: Option<String>,
    #[serde(default)]
    pub deezer_album: Option<String>,
}

impl Card {
    /// Convert to a playable track.
    ///
    /// Returns `None` when the card has no linked Deezer track. Title and
    /// artist prefer the Deezer spelling and fall back to the printed one.
    pub fn to_track(&self) -> Option<Track> {
        self.deezer_id.map(|deezer_id| Track {
            id: deezer_id.to_string(),
            title: Some(self.deezer_title.clone().unwrap_or_else(|| self.title.clone())),
            artist: Some(self.deezer_artist.clone().unwrap_or_else(|| self.artist.clone())),
            year: Some(self.year),
            album_cover_url: None,
            service: MusicServiceType::Deezer,
        })
    }
}

/// A playable track on a streaming service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Service-specific track identifier
    pub id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub year: Option<i32>,
    pub album_cover_url: Option<String>,
    #[serde(default)]
    pub service: MusicServiceType,
}

impl Track {
    /// Track known only by its identifier (scanned from a streaming-service link)
    pub fn from_id(id: impl Into<String>, service: MusicServiceType) -> Self {
        Self {
            id: id.into(),
            title: None,
            artist: None,
            year: None,
            album_cover_url: None,
            service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(deezer_id: Option<u64>) -> Card {
        Card {
            id: "00002".to_string(),
            title: "You Can Call Me Al".to_string(),
            artist: "Paul Simon".to_string(),
            year: 1986,
            deezer_id,
            deezer_title: None,
            deezer_artist: Some("Paul Simon & Friends".to_string()),
            deezer_album: Some("The Essential Paul Simon".to_string()),
        }
    }

    #[test]
    fn test_to_track_prefers_deezer_metadata() {
        let track = card(Some(6599483)).to_track().unwrap();

        assert_eq!(track.id, "6599483");
        // No Deezer title: printed title is used
        assert_eq!(track.title.as_deref(), Some("You Can Call Me Al"));
        assert_eq!(track.artist.as_deref(), Some("Paul Simon & Friends"));
        assert_eq!(track.year, Some(1986));
        assert_eq!(track.service, MusicServiceType::Deezer);
        assert!(track.album_cover_url.is_none());
    }

    #[test]
    fn test_to_track_without_link() {
        assert!(card(None).to_track().is_none());
    }

    #[test]
    fn test_card_deserializes_without_optional_fields() {
        let json = r#"{"id":"00042","title":"Song","artist":"Band","year":1999}"#;
        let card: Card = serde_json::from_str(json).unwrap();

        assert_eq!(card.id, "00042");
        assert!(card.deezer_id.is_none());
        assert!(card.to_track().is_none());
    }

    #[test]
    fn test_service_serialization() {
        assert_eq!(serde_json::to_string(&MusicServiceType::YouTube).unwrap(), "\"youtube\"");
        assert_eq!(serde_json::to_string(&MusicServiceType::Deezer).unwrap(), "\"deezer\"");
        assert_eq!(MusicServiceType::Spotify.display_name(), "Spotify");
    }
}
