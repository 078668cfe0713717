use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One input entry describing an artist/album pair to resolve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRecord {
    pub artist: String,
    pub album: String,
    #[serde(
        default,
        deserialize_with = "deserialize_year",
        skip_serializing_if = "Option::is_none"
    )]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default)]
    pub cover_src: Option<String>,
    // Anything else in the input entry is carried through untouched on write-back
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where an already-declared cover lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverRef {
    Remote(String),
    Local(PathBuf),
}

impl AlbumRecord {
    pub fn new(artist: String, album: String) -> Self {
        Self {
            artist,
            album,
            year: None,
            genre: None,
            cover_src: None,
            extra: Map::new(),
        }
    }

    pub fn with_year(mut self, year: String) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_genre(mut self, genre: String) -> Self {
        self.genre = Some(genre);
        self
    }

    pub fn with_cover_src(mut self, cover_src: String) -> Self {
        self.cover_src = Some(cover_src);
        self
    }

    /// Classify `coverSrc`. Blank values mean nothing was declared.
    pub fn declared_cover(&self) -> Option<CoverRef> {
        let src = self.cover_src.as_deref()?.trim();
        if src.is_empty() {
            return None;
        }

        let lower = src.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Some(CoverRef::Remote(src.to_string()))
        } else {
            Some(CoverRef::Local(PathBuf::from(src)))
        }
    }
}

impl CoverRef {
    /// Find a local cover on disk. Site-relative paths ("/bandcover/...") are
    /// tried against `base_dir` when they don't exist as given.
    pub fn existing_local_path(&self, base_dir: &Path) -> Option<PathBuf> {
        let CoverRef::Local(path) = self else {
            return None;
        };

        if path.is_file() {
            return Some(path.clone());
        }

        let relative = path.to_string_lossy();
        let candidate = base_dir.join(relative.trim_start_matches('/'));
        candidate.is_file().then_some(candidate)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YearValue {
    Text(String),
    Number(i64),
}

fn deserialize_year<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<YearValue>::deserialize(deserializer)?;
    Ok(match value {
        Some(YearValue::Text(text)) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Some(YearValue::Number(n)) => Some(n.to_string()),
        None => None,
    })
}
