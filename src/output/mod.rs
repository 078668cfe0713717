mod slug;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::WriteError;
use crate::images::ResolvedImage;
use crate::models::{AlbumRecord, Outcome, OutcomeStatus, OutputRecord};

pub use slug::slugify;


/// Cumulative per-album results, stored next to the genre folders
pub const SUMMARY_FILE: &str = "covers.json";

/// Unique key of a record in the summary. Slugs never contain `--`, so the
/// artist/album boundary stays unambiguous.
pub fn record_key(artist: &str, album: &str) -> String {
    format!("{}--{}", slugify(artist), slugify(album))
}

fn file_name(record: &AlbumRecord) -> String {
    format!("{}-{}.jpg", slugify(&record.artist), slugify(&record.album))
}

/// Writes covers under `<root>/<genre>/<artist>-<album>.jpg` and keeps the
/// summary keyed by artist+album, so reruns overwrite rather than append.
pub struct ResultWriter {
    root: PathBuf,
    summary: BTreeMap<String, OutputRecord>,
}

impl ResultWriter {
    /// Open `root`, picking up the summary of a previous run if there is one
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let summary = load_summary(&root.join(SUMMARY_FILE));
        Self { root, summary }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join(SUMMARY_FILE)
    }

    /// Destination of the image for `record` in bucket `genre`
    pub fn destination(&self, record: &AlbumRecord, genre: &str) -> PathBuf {
        self.root
            .join(slugify(genre))
            .join(file_name(record))
    }

    /// Write the image and upsert its summary entry
    pub fn save(
        &mut self,
        record: &AlbumRecord,
        genre: &str,
        image: &ResolvedImage,
        outcome: Outcome,
    ) -> Result<OutputRecord, WriteError> {
        let path = self.destination(record, genre);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| WriteError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(&path, &image.bytes).map_err(|source| WriteError::Io {
            path: path.clone(),
            source,
        })?;

        let path_str = path.to_string_lossy().into_owned();
        let (cover_path, artist_image_path) = match outcome {
            Outcome::ArtistFound => (None, Some(path_str)),
            Outcome::Found | Outcome::Default => (Some(path_str), None),
        };

        let output = OutputRecord {
            artist: record.artist.clone(),
            album: record.album.clone(),
            year: record.year.clone(),
            cover_path,
            artist_image_path,
            status: outcome.status(),
            source: Some(image.source),
            source_url: image.source_url.clone(),
            updated_at: Utc::now(),
        };

        tracing::debug!("Saved {} image to {}", image.source, path.display());
        self.upsert(output.clone());
        Ok(output)
    }

    /// Record that saving failed for `record`
    pub fn record_error(&mut self, record: &AlbumRecord) -> OutputRecord {
        let output = OutputRecord {
            artist: record.artist.clone(),
            album: record.album.clone(),
            year: record.year.clone(),
            cover_path: None,
            artist_image_path: None,
            status: OutcomeStatus::Error,
            source: None,
            source_url: None,
            updated_at: Utc::now(),
        };
        self.upsert(output.clone());
        output
    }

    fn upsert(&mut self, output: OutputRecord) {
        self.summary
            .insert(record_key(&output.artist, &output.album), output);
    }

    pub fn get(&self, artist: &str, album: &str) -> Option<&OutputRecord> {
        self.summary.get(&record_key(artist, album))
    }

    pub fn records(&self) -> impl Iterator<Item = &OutputRecord> {
        self.summary.values()
    }

    pub fn len(&self) -> usize {
        self.summary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }

    /// Persist the summary JSON
    pub fn flush(&self) -> Result<PathBuf, WriteError> {
        let path = self.summary_path();

        fs::create_dir_all(&self.root).map_err(|source| WriteError::Io {
            path: self.root.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(&self.summary)?;
        fs::write(&path, json).map_err(|source| WriteError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }
}

fn load_summary(path: &Path) -> BTreeMap<String, OutputRecord> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!("Could not read previous summary {}: {}", path.display(), e);
            return BTreeMap::new();
        }
    };

    match serde_json::from_str(&contents) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!(
                "Ignoring unreadable previous summary {}: {}",
                path.display(),
                e
            );
            BTreeMap::new()
        }
    }
}
