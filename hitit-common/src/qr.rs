//! QR code content classification
//!
//! Turns the raw text decoded from a QR code into a [`ScanResult`]. Patterns
//! are tried in a fixed order and the first match wins:
//!
//! 1. `hitstergame.com/<segment>/<digits>`: game card
//! 2. `deezer.com/[<segment>/]track/<digits>`: Deezer track
//! 3. `spotify.com/track/<alphanumeric>`: Spotify track
//! 4. `youtube.com/watch?v=<id>` or `youtu.be/<id>`: YouTube video
//! 5. anything starting with `http://` or `https://`: generic URL
//! 6. everything else: unknown
//!
//! Classification is pure and total: every input yields exactly one variant.

use serde::{Deserialize, Serialize};

/// Card ids are printed as five zero-padded digits
pub const CARD_ID_WIDTH: usize = 5;

const CARD_HOST: &str = "hitstergame.com/";
const DEEZER_HOST: &str = "deezer.com/";
const SPOTIFY_TRACK: &str = "spotify.com/track/";
const YOUTUBE_WATCH: &str = "youtube.com/watch?v=";
const YOUTUBE_SHORT: &str = "youtu.be/";

/// Result of classifying scanned QR content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanResult {
    /// Game card; `card_id` holds the digits exactly as printed
    Card { card_id: String },
    DeezerTrack { track_id: String },
    /// Recognized but not playable in this app
    SpotifyTrack { track_id: String },
    /// Recognized but not playable in this app
    #[serde(rename = "youtube_video")]
    YouTubeVideo { video_id: String },
    GenericUrl { url: String },
    Unknown { raw: String },
}

/// Classify raw QR code content
pub fn classify(content: &str) -> ScanResult {
    if let Some(card_id) = match_card(content) {
        return ScanResult::Card {
            card_id: card_id.to_string(),
        };
    }

    if let Some(track_id) = match_deezer_track(content) {
        return ScanResult::DeezerTrack {
            track_id: track_id.to_string(),
        };
    }

    if let Some(track_id) = find_after(content, SPOTIFY_TRACK, |rest| {
        leading(rest, |c| c.is_ascii_alphanumeric())
    }) {
        return ScanResult::SpotifyTrack {
            track_id: track_id.to_string(),
        };
    }

    if let Some(video_id) = match_youtube(content) {
        return ScanResult::YouTubeVideo {
            video_id: video_id.to_string(),
        };
    }

    if content.starts_with("http://") || content.starts_with("https://") {
        return ScanResult::GenericUrl {
            url: content.to_string(),
        };
    }

    ScanResult::Unknown {
        raw: content.to_string(),
    }
}

/// Normalize a card id to its printed five-digit form.
///
/// Left-pads with zeros, so `"1"` and `"00001"` both become `"00001"`.
/// Ids already five characters or longer are returned unchanged, which makes
/// the function idempotent.
pub fn normalize_card_id(card_id: &str) -> String {
    format!("{:0>width$}", card_id, width = CARD_ID_WIDTH)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Longest non-empty prefix of `s` whose chars satisfy `pred`
fn leading(s: &str, pred: impl Fn(char) -> bool) -> Option<&str> {
    let end = s.find(|c: char| !pred(c)).unwrap_or(s.len());
    if end == 0 {
        None
    } else {
        Some(&s[..end])
    }
}

/// Try `tail` after every occurrence of `anchor`, leftmost first.
///
/// Returns the byte offset of the anchor together with the capture.
fn find_after_at<'a>(
    content: &'a str,
    anchor: &str,
    tail: impl Fn(&'a str) -> Option<&'a str>,
) -> Option<(usize, &'a str)> {
    content
        .match_indices(anchor)
        .find_map(|(idx, _)| tail(&content[idx + anchor.len()..]).map(|capture| (idx, capture)))
}

fn find_after<'a>(
    content: &'a str,
    anchor: &str,
    tail: impl Fn(&'a str) -> Option<&'a str>,
) -> Option<&'a str> {
    find_after_at(content, anchor, tail).map(|(_, capture)| capture)
}

fn match_card(content: &str) -> Option<&str> {
    find_after(content, CARD_HOST, |rest| {
        let segment = leading(rest, is_word_char)?;
        let after = rest[segment.len()..].strip_prefix('/')?;
        leading(after, |c| c.is_ascii_digit())
    })
}

fn match_deezer_track(content: &str) -> Option<&str> {
    fn track_digits(s: &str) -> Option<&str> {
        leading(s.strip_prefix("track/")?, |c| c.is_ascii_digit())
    }

    find_after(content, DEEZER_HOST, |rest| {
        // Optional locale segment, e.g. deezer.com/de/track/123
        track_digits(rest).or_else(|| {
            let segment = leading(rest, is_word_char)?;
            track_digits(rest[segment.len()..].strip_prefix('/')?)
        })
    })
}

fn match_youtube(content: &str) -> Option<&str> {
    fn video_id(rest: &str) -> Option<&str> {
        leading(rest, |c| is_word_char(c) || c == '-')
    }

    let watch = find_after_at(content, YOUTUBE_WATCH, video_id);
    let short = find_after_at(content, YOUTUBE_SHORT, video_id);

    match (watch, short) {
        (Some(w), Some(s)) => Some(if w.0 <= s.0 { w.1 } else { s.1 }),
        (w, s) => w.or(s).map(|(_, id)| id),
    }
}
