use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a persisted image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverSource {
    Existing,
    Spotify,
    Deezer,
    Lastfm,
    Discogs,
    Musicbrainz,
    MusicbrainzArtist,
    Default,
}

impl CoverSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverSource::Existing => "existing",
            CoverSource::Spotify => "spotify",
            CoverSource::Deezer => "deezer",
            CoverSource::Lastfm => "lastfm",
            CoverSource::Discogs => "discogs",
            CoverSource::Musicbrainz => "musicbrainz",
            CoverSource::MusicbrainzArtist => "musicbrainz_artist",
            CoverSource::Default => "default",
        }
    }
}

impl fmt::Display for CoverSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of resolving one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Found,
    ArtistFound,
    Default,
}

impl Outcome {
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Outcome::Found | Outcome::ArtistFound => OutcomeStatus::Found,
            Outcome::Default => OutcomeStatus::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Found,
    Default,
    Error,
}

/// Per-album entry of the run summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub artist: String,
    pub album: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_image_path: Option<String>,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<CoverSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl OutputRecord {
    /// Path of whichever image was persisted
    pub fn image_path(&self) -> Option<&str> {
        self.cover_path
            .as_deref()
            .or(self.artist_image_path.as_deref())
    }
}
