use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::models::CoverSource;

use super::provider::{ensure_success, lucene_phrase, ArtistImageProvider, CoverProvider};
use super::rate_limit::RateLimiter;

const MUSICBRAINZ_API_URL: &str = "https://musicbrainz.org/ws/2";
const COVER_ART_ARCHIVE_URL: &str = "https://coverartarchive.org";
const COMMONS_FILE_PREFIX: &str = "commons.wikimedia.org/wiki/File:";

#[derive(Debug, Deserialize)]
struct ArtistSearchResponse {
    #[serde(default)]
    artists: Vec<ArtistSearchResult>,
}

#[derive(Debug, Deserialize)]
struct ArtistSearchResult {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseSearchResponse {
    #[serde(default)]
    releases: Vec<ReleaseSearchResult>,
}

#[derive(Debug, Deserialize)]
struct ReleaseSearchResult {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ArtistLookup {
    #[serde(default)]
    relations: Vec<Relation>,
}

#[derive(Debug, Deserialize)]
struct Relation {
    #[serde(rename = "type")]
    kind: String,
    url: Option<RelationUrl>,
}

#[derive(Debug, Deserialize)]
struct RelationUrl {
    resource: String,
}

/// MusicBrainz search backed by the Cover Art Archive, plus artist-image
/// lookup through MusicBrainz URL relationships.
pub struct MusicBrainzImageClient {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    api_url: String,
    cover_art_url: String,
}

impl MusicBrainzImageClient {
    /// `client` must carry a descriptive User-Agent; MusicBrainz rejects anonymous callers.
    pub fn new(client: reqwest::Client, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            limiter,
            api_url: MUSICBRAINZ_API_URL.to_string(),
            cover_art_url: COVER_ART_ARCHIVE_URL.to_string(),
        }
    }

    pub fn with_base_urls(
        mut self,
        api_url: impl Into<String>,
        cover_art_url: impl Into<String>,
    ) -> Self {
        self.api_url = api_url.into();
        self.cover_art_url = cover_art_url.into();
        self
    }

    pub async fn fetch_album_image(
        &self,
        artist_name: &str,
        album_name: &str,
    ) -> Result<Option<String>, ProviderError> {
        // Step 1: Search for the release MBID
        let search_query = format!(
            "artist:{} AND release:{}",
            lucene_phrase(artist_name),
            lucene_phrase(album_name)
        );
        let search_url = format!(
            "{}/release/?query={}&fmt=json&limit=1",
            self.api_url,
            urlencoding::encode(&search_query)
        );

        let search_response = ensure_success(
            "musicbrainz",
            self.client.get(&search_url).send().await?,
        )?
        .json::<ReleaseSearchResponse>()
        .await?;

        let Some(release) = search_response.releases.first() else {
            return Ok(None);
        };

        // Step 2: Ask the Cover Art Archive for the front cover
        let cover_art_url = format!("{}/release/{}/front-500", self.cover_art_url, release.id);

        self.limiter.wait().await;

        let response = self.client.head(&cover_art_url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(
                "Cover Art Archive has no front cover for release {} ('{}' by '{}')",
                release.id,
                album_name,
                artist_name
            );
            return Ok(None);
        }
        ensure_success("coverartarchive", response)?;

        Ok(Some(cover_art_url))
    }

    pub async fn fetch_artist_image(&self, artist_name: &str) -> Result<Option<String>, ProviderError> {
        // Step 1: Search for artist MBID (MusicBrainz ID)
        let search_url = format!(
            "{}/artist/?query={}&fmt=json&limit=1",
            self.api_url,
            urlencoding::encode(&format!("artist:{}", lucene_phrase(artist_name)))
        );

        let search_response = ensure_success(
            "musicbrainz",
            self.client.get(&search_url).send().await?,
        )?
        .json::<ArtistSearchResponse>()
        .await?;

        let Some(artist) = search_response.artists.first() else {
            return Ok(None);
        };

        // Step 2: Look the artist up with URL relationships
        let lookup_url = format!("{}/artist/{}?inc=url-rels&fmt=json", self.api_url, artist.id);

        self.limiter.wait().await;

        let lookup = ensure_success(
            "musicbrainz",
            self.client.get(&lookup_url).send().await?,
        )?
        .json::<ArtistLookup>()
        .await?;

        Ok(lookup
            .relations
            .iter()
            .filter(|rel| rel.kind == "image")
            .filter_map(|rel| rel.url.as_ref())
            .map(|url| direct_image_url(&url.resource))
            .next())
    }
}

#[async_trait]
impl CoverProvider for MusicBrainzImageClient {
    fn source(&self) -> CoverSource {
        CoverSource::Musicbrainz
    }

    async fn find_cover_url(
        &self,
        artist: &str,
        album: &str,
        _year: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        self.fetch_album_image(artist, album).await
    }
}

#[async_trait]
impl ArtistImageProvider for MusicBrainzImageClient {
    fn source(&self) -> CoverSource {
        CoverSource::MusicbrainzArtist
    }

    async fn find_artist_image_url(&self, artist: &str) -> Result<Option<String>, ProviderError> {
        self.fetch_artist_image(artist).await
    }
}

/// Image relations usually point at a Wikimedia Commons file page, which is
/// HTML. Rewrite those to the Special:FilePath redirect that serves the file.
fn direct_image_url(resource: &str) -> String {
    match resource.split_once(COMMONS_FILE_PREFIX) {
        Some((_, file)) => format!(
            "https://commons.wikimedia.org/wiki/Special:FilePath/{}",
            file
        ),
        None => resource.to_string(),
    }
}
