use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::Config;
use crate::error::{InputError, WriteError};
use crate::models::{AlbumRecord, CoverRef, Outcome, OutcomeStatus, OutputRecord};
use crate::output::ResultWriter;
use crate::resolver::CoverResolver;

/// Tally of one run, logged by the binary when it finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub found: usize,
    pub artist_found: usize,
    pub defaulted: usize,
    pub errors: usize,
}

impl RunSummary {
    fn count(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Found => self.found += 1,
            Outcome::ArtistFound => self.artist_found += 1,
            Outcome::Default => self.defaulted += 1,
        }
    }
}

/// Read the input JSON array
pub fn load_records(path: &Path) -> Result<Vec<AlbumRecord>, InputError> {
    let contents = fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&contents).map_err(|source| InputError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Genre bucket: the record's own genre, else the input file name
pub fn genre_for(record: &AlbumRecord, input_path: &Path) -> String {
    record
        .genre
        .as_deref()
        .map(str::trim)
        .filter(|genre| !genre.is_empty())
        .map(str::to_string)
        .or_else(|| {
            input_path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Resolve every record of `input_path` with the providers `config` enables
pub async fn run(input_path: &Path, config: &Config) -> Result<RunSummary> {
    let resolver = CoverResolver::from_config(config)?;
    tracing::info!(
        "Provider chain: {}",
        resolver
            .provider_sources()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let mut writer = ResultWriter::open(&config.output_dir);
    let summary = run_with(input_path, &resolver, &mut writer).await?;
    Ok(summary)
}

/// Walk the records one at a time. Only reading the input can fail the run;
/// per-record problems are logged and counted.
pub async fn run_with(
    input_path: &Path,
    resolver: &CoverResolver,
    writer: &mut ResultWriter,
) -> Result<RunSummary, InputError> {
    let mut records = load_records(input_path)?;
    let mut summary = RunSummary {
        total: records.len(),
        ..RunSummary::default()
    };

    tracing::info!(
        "Resolving covers for {} albums from {}",
        records.len(),
        input_path.display()
    );

    for (index, record) in records.iter_mut().enumerate() {
        tracing::info!(
            "[{}/{}] '{}' by '{}'",
            index + 1,
            summary.total,
            record.album,
            record.artist
        );

        let genre = genre_for(record, input_path);

        if let Some(previous) = previous_result(record, &genre, writer) {
            tracing::info!(
                "Keeping {} image already saved at {}",
                previous.source.map(|s| s.as_str()).unwrap_or("unknown"),
                previous.image_path().unwrap_or_default()
            );
            if previous.artist_image_path.is_some() {
                summary.artist_found += 1;
            } else {
                summary.found += 1;
            }
            continue;
        }

        let lookup = retry_candidate(record, writer);
        let resolution = resolver.resolve(&lookup).await;

        match writer.save(record, &genre, &resolution.image, resolution.outcome) {
            Ok(saved) => {
                summary.count(resolution.outcome);
                if let Some(path) = saved.image_path() {
                    record.cover_src = Some(site_path(Path::new(path)));
                }
            }
            Err(e) => {
                tracing::error!(
                    "Failed to save cover for '{}' by '{}': {}",
                    record.album,
                    record.artist,
                    e
                );
                writer.record_error(record);
                summary.errors += 1;
            }
        }
    }

    match writer.flush() {
        Ok(path) => tracing::info!("Wrote summary to {}", path.display()),
        Err(e) => tracing::error!("Failed to write summary: {}", e),
    }

    if let Err(e) = write_back(input_path, &mut records) {
        tracing::error!("Failed to update {}: {}", input_path.display(), e);
    }

    Ok(summary)
}

/// The summary entry of an earlier run, when `record` still points at the
/// file that run saved. Such records are left untouched so the provider and
/// outcome recorded the first time survive.
fn previous_result<'a>(
    record: &AlbumRecord,
    genre: &str,
    writer: &'a ResultWriter,
) -> Option<&'a OutputRecord> {
    let previous = writer.get(&record.artist, &record.album)?;
    if previous.status != OutcomeStatus::Found {
        return None;
    }

    let destination = writer.destination(record, genre);
    let saved_here = previous.image_path().map(Path::new) == Some(destination.as_path());
    let declared_here = record.cover_src.as_deref().map(str::trim)
        == Some(site_path(&destination).as_str());

    (saved_here && declared_here && destination.is_file()).then_some(previous)
}

/// A record whose last run ended on the placeholder points at that file;
/// drop the local reference so the providers get asked again.
fn retry_candidate(record: &AlbumRecord, writer: &ResultWriter) -> AlbumRecord {
    let defaulted = writer
        .get(&record.artist, &record.album)
        .is_some_and(|previous| previous.status == OutcomeStatus::Default);

    if defaulted && matches!(record.declared_cover(), Some(CoverRef::Local(_))) {
        let mut lookup = record.clone();
        lookup.cover_src = None;
        return lookup;
    }

    record.clone()
}

/// `coverSrc` form of an output path: site-relative with a leading `/`
fn site_path(path: &Path) -> String {
    let display = path.to_string_lossy().replace('\\', "/");
    if path.is_absolute() {
        display
    } else {
        format!("/{}", display.trim_start_matches("./"))
    }
}

fn write_back(input_path: &Path, records: &mut [AlbumRecord]) -> Result<PathBuf, WriteError> {
    for record in records.iter_mut() {
        if record.cover_src.is_none() {
            record.cover_src = Some(String::new());
        }
    }

    let json = serde_json::to_string_pretty(records)?;
    fs::write(input_path, json).map_err(|source| WriteError::Io {
        path: input_path.to_path_buf(),
        source,
    })?;

    Ok(input_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use tempfile::TempDir;

    use super::*;
    use crate::images::{CoverProvider, RateLimiter};
    use crate::models::CoverSource;
    use crate::output::SUMMARY_FILE;
    use crate::test_utils::{MockArtistProvider, MockFetcher, MockProvider, Scripted};

    fn write_input(dir: &TempDir, name: &str, value: Value) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
        path
    }

    fn discogs_only_resolver(dir: &TempDir) -> CoverResolver {
        let providers: Vec<Box<dyn CoverProvider>> = vec![
            Box::new(MockProvider::new(CoverSource::Spotify, Scripted::NotFound)),
            Box::new(MockProvider::new(
                CoverSource::Discogs,
                Scripted::Url("https://discogs/front.jpg".into()),
            )),
        ];

        CoverResolver::new(
            providers,
            Some(Box::new(MockArtistProvider::new(Scripted::NotFound))),
            Box::new(MockFetcher::new().serving("https://discogs/front.jpg")),
            Arc::new(RateLimiter::disabled()),
        )
        .with_base_dir(dir.path().to_path_buf())
    }

    fn failing_resolver(dir: &TempDir) -> CoverResolver {
        let providers: Vec<Box<dyn CoverProvider>> =
            vec![Box::new(MockProvider::new(CoverSource::Deezer, Scripted::Fail))];

        CoverResolver::new(
            providers,
            None,
            Box::new(MockFetcher::new()),
            Arc::new(RateLimiter::disabled()),
        )
        .with_base_dir(dir.path().to_path_buf())
    }

    #[test]
    fn test_genre_prefers_record_then_file_stem() {
        let input = Path::new("data/shoegaze.json");
        let tagged = AlbumRecord::new("Slowdive".into(), "Souvlaki".into())
            .with_genre("Dream Pop".into());
        let untagged = AlbumRecord::new("Slowdive".into(), "Souvlaki".into());
        let blank = untagged.clone().with_genre("  ".into());

        assert_eq!(genre_for(&tagged, input), "Dream Pop");
        assert_eq!(genre_for(&untagged, input), "shoegaze");
        assert_eq!(genre_for(&blank, input), "shoegaze");
    }

    #[test]
    fn test_site_path() {
        assert_eq!(
            site_path(Path::new("bandcover/rock/a-b.jpg")),
            "/bandcover/rock/a-b.jpg"
        );
        assert_eq!(
            site_path(Path::new("./bandcover/rock/a-b.jpg")),
            "/bandcover/rock/a-b.jpg"
        );
    }

    #[tokio::test]
    async fn test_missing_input_is_input_error() {
        let dir = TempDir::new().unwrap();
        let resolver = failing_resolver(&dir);
        let mut writer = ResultWriter::open(dir.path().join("out"));

        let result = run_with(&dir.path().join("absent.json"), &resolver, &mut writer).await;

        assert!(matches!(result, Err(InputError::Read { .. })));
    }

    #[tokio::test]
    async fn test_malformed_input_is_input_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "[{\"artist\": \"A\",").unwrap();
        let resolver = failing_resolver(&dir);
        let mut writer = ResultWriter::open(dir.path().join("out"));

        let result = run_with(&path, &resolver, &mut writer).await;

        assert!(matches!(result, Err(InputError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_run_saves_covers_and_rewrites_input() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            &dir,
            "electronic.json",
            json!([
                {"artist": "Burial", "album": "Untrue", "year": 2007, "rank": 1},
                {"artist": "Four Tet", "album": "Rounds", "coverSrc": "", "genre": "Folktronica"}
            ]),
        );
        let resolver = discogs_only_resolver(&dir);
        let mut writer = ResultWriter::open(dir.path().join("bandcover"));

        let summary = run_with(&input, &resolver, &mut writer).await.unwrap();

        assert_eq!(
            summary,
            RunSummary {
                total: 2,
                found: 2,
                ..RunSummary::default()
            }
        );

        let burial = writer.root().join("electronic").join("burial-untrue.jpg");
        let four_tet = writer.root().join("folktronica").join("four-tet-rounds.jpg");
        assert!(burial.is_file());
        assert!(four_tet.is_file());
        assert_eq!(
            writer.get("Burial", "Untrue").unwrap().source,
            Some(CoverSource::Discogs)
        );

        let rewritten: Value =
            serde_json::from_str(&fs::read_to_string(&input).unwrap()).unwrap();
        assert_eq!(rewritten[0]["rank"], json!(1));
        assert_eq!(rewritten[0]["year"], json!("2007"));
        assert_eq!(
            rewritten[0]["coverSrc"],
            json!(site_path(&burial))
        );
        assert_eq!(rewritten[1]["genre"], json!("Folktronica"));
    }

    #[tokio::test]
    async fn test_running_twice_keeps_one_entry_per_album() {
        let dir = TempDir::new().unwrap();
        let records = json!([
            {"artist": "Burial", "album": "Untrue"},
            {"artist": "Burial", "album": "Untrue"},
            {"artist": "Four Tet", "album": "Rounds"}
        ]);
        let input = write_input(&dir, "electronic.json", records);
        let root = dir.path().join("bandcover");
        let resolver = discogs_only_resolver(&dir);

        for _ in 0..2 {
            let mut writer = ResultWriter::open(&root);
            run_with(&input, &resolver, &mut writer).await.unwrap();
        }

        let summary: Value =
            serde_json::from_str(&fs::read_to_string(root.join(SUMMARY_FILE)).unwrap()).unwrap();
        let entries = summary.as_object().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains_key("burial--untrue"));
        assert!(entries.contains_key("four-tet--rounds"));

        let genre_dir: Vec<_> = fs::read_dir(root.join("electronic")).unwrap().collect();
        assert_eq!(genre_dir.len(), 2);
    }

    #[tokio::test]
    async fn test_rerun_keeps_recorded_provider() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "electronic.json", json!([{"artist": "Burial", "album": "Untrue"}]));
        let root = dir.path().join("bandcover");
        let spotify = MockProvider::new(CoverSource::Spotify, Scripted::NotFound);
        let discogs = MockProvider::new(
            CoverSource::Discogs,
            Scripted::Url("https://discogs/front.jpg".into()),
        );
        let discogs_calls = discogs.calls();
        let providers: Vec<Box<dyn CoverProvider>> = vec![Box::new(spotify), Box::new(discogs)];
        let resolver = CoverResolver::new(
            providers,
            None,
            Box::new(MockFetcher::new().serving("https://discogs/front.jpg")),
            Arc::new(RateLimiter::disabled()),
        )
        .with_base_dir(dir.path().to_path_buf());

        let mut first = ResultWriter::open(&root);
        run_with(&input, &resolver, &mut first).await.unwrap();

        let mut second = ResultWriter::open(&root);
        let summary = run_with(&input, &resolver, &mut second).await.unwrap();

        assert_eq!(summary.found, 1);
        assert_eq!(discogs_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        let entry = second.get("Burial", "Untrue").unwrap();
        assert_eq!(entry.source, Some(CoverSource::Discogs));
        assert_eq!(entry.source_url.as_deref(), Some("https://discogs/front.jpg"));
    }

    #[tokio::test]
    async fn test_rerun_keeps_artist_image_path() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "electronic.json", json!([{"artist": "Burial", "album": "Untrue"}]));
        let root = dir.path().join("bandcover");
        let providers: Vec<Box<dyn CoverProvider>> = vec![Box::new(MockProvider::new(
            CoverSource::Musicbrainz,
            Scripted::NotFound,
        ))];
        let resolver = CoverResolver::new(
            providers,
            Some(Box::new(MockArtistProvider::new(Scripted::Url(
                "https://commons/burial.jpg".into(),
            )))),
            Box::new(MockFetcher::new().serving("https://commons/burial.jpg")),
            Arc::new(RateLimiter::disabled()),
        )
        .with_base_dir(dir.path().to_path_buf());

        for _ in 0..2 {
            let mut writer = ResultWriter::open(&root);
            let summary = run_with(&input, &resolver, &mut writer).await.unwrap();

            assert_eq!(summary.artist_found, 1);
            let entry = writer.get("Burial", "Untrue").unwrap();
            assert!(entry.cover_path.is_none());
            assert!(entry.artist_image_path.is_some());
            assert_eq!(entry.source, Some(CoverSource::MusicbrainzArtist));
        }
    }

    #[tokio::test]
    async fn test_everything_failing_persists_default_cover() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "jazz.json", json!([{"artist": "Nobody", "album": "Nothing"}]));
        let resolver = failing_resolver(&dir);
        let mut writer = ResultWriter::open(dir.path().join("bandcover"));

        let summary = run_with(&input, &resolver, &mut writer).await.unwrap();

        assert_eq!(summary.defaulted, 1);
        let entry = writer.get("Nobody", "Nothing").unwrap();
        assert_eq!(entry.status, OutcomeStatus::Default);
        assert_eq!(entry.source, Some(CoverSource::Default));

        let written = fs::read(writer.root().join("jazz/nobody-nothing.jpg")).unwrap();
        assert_eq!(written, crate::resolver::DEFAULT_COVER);
    }

    #[tokio::test]
    async fn test_write_failure_is_counted_and_keeps_cover_src() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            &dir,
            "rock.json",
            json!([{"artist": "A", "album": "B", "coverSrc": "https://old/cover.jpg"}]),
        );
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let resolver = failing_resolver(&dir);
        let mut writer = ResultWriter::open(&blocker);

        let summary = run_with(&input, &resolver, &mut writer).await.unwrap();

        assert_eq!(summary.errors, 1);
        assert_eq!(
            writer.get("A", "B").unwrap().status,
            OutcomeStatus::Error
        );
        let rewritten: Value =
            serde_json::from_str(&fs::read_to_string(&input).unwrap()).unwrap();
        assert_eq!(rewritten[0]["coverSrc"], json!("https://old/cover.jpg"));
    }

    #[test]
    fn test_defaulted_record_is_retried() {
        let dir = TempDir::new().unwrap();
        let mut writer = ResultWriter::open(dir.path());
        let record = AlbumRecord::new("Nobody".into(), "Nothing".into())
            .with_cover_src("/bandcover/jazz/nobody-nothing.jpg".into());
        let image = crate::images::ResolvedImage::new(
            crate::resolver::DEFAULT_COVER.to_vec(),
            CoverSource::Default,
            None,
        );

        assert!(retry_candidate(&record, &writer).cover_src.is_some());

        writer
            .save(&record, "jazz", &image, Outcome::Default)
            .unwrap();

        assert!(retry_candidate(&record, &writer).cover_src.is_none());
    }
}
