use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::models::CoverSource;

use super::matching::{
    fuzzy_match, release_year, title_variants, ALBUM_MATCH_THRESHOLD, ARTIST_MATCH_THRESHOLD,
};
use super::provider::{ensure_success, CoverProvider};
use super::rate_limit::RateLimiter;

const DEEZER_API_URL: &str = "https://api.deezer.com";

#[derive(Debug, Deserialize)]
struct AlbumSearchResponse {
    #[serde(default)]
    data: Vec<AlbumSearchResult>,
    error: Option<DeezerError>,
}

#[derive(Debug, Deserialize)]
struct AlbumSearchResult {
    #[serde(default)]
    title: String,
    artist: Option<DeezerArtist>,
    record_type: Option<String>,
    #[serde(default)]
    release_date: String,
    #[serde(rename = "cover_xl")]
    cover_xl: Option<String>,
    #[serde(rename = "cover_big")]
    cover_big: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeezerArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DeezerError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

impl AlbumSearchResult {
    fn matches(&self, artist: &str, album: &str, year: Option<&str>, album_types: &[String]) -> bool {
        let Some(result_artist) = self.artist.as_ref() else {
            return false;
        };

        let type_ok = self
            .record_type
            .as_deref()
            .map(|t| album_types.iter().any(|accepted| accepted.eq_ignore_ascii_case(t)))
            .unwrap_or(false);

        let year_ok = year
            .map(|y| release_year(&self.release_date) == y)
            .unwrap_or(true);

        type_ok
            && year_ok
            && fuzzy_match(artist, &result_artist.name, ARTIST_MATCH_THRESHOLD)
            && fuzzy_match(album, &self.title, ALBUM_MATCH_THRESHOLD)
    }

    fn cover(self) -> Option<String> {
        self.cover_xl
            .filter(|url| !url.is_empty())
            .or(self.cover_big)
            .filter(|url| !url.is_empty())
    }
}

pub struct DeezerImageClient {
    client: reqwest::Client,
    api_token: String,
    album_types: Vec<String>,
    limiter: Arc<RateLimiter>,
    base_url: String,
}

impl DeezerImageClient {
    pub fn new(
        client: reqwest::Client,
        api_token: String,
        album_types: Vec<String>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            client,
            api_token,
            album_types,
            limiter,
            base_url: DEEZER_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search_albums(
        &self,
        artist_name: &str,
        album_title: &str,
    ) -> Result<Vec<AlbumSearchResult>, ProviderError> {
        let search_query = format!("artist:\"{}\" album:\"{}\"", artist_name, album_title);
        let search_url = format!(
            "{}/search/album?q={}&access_token={}",
            self.base_url,
            urlencoding::encode(&search_query),
            urlencoding::encode(&self.api_token)
        );

        let response = ensure_success("deezer", self.client.get(&search_url).send().await?)?
            .json::<AlbumSearchResponse>()
            .await?;

        // Deezer reports API errors in a 200 body
        if let Some(error) = response.error {
            return Err(ProviderError::Malformed(format!(
                "deezer error {}: {}",
                error.kind, error.message
            )));
        }

        Ok(response.data)
    }

    /// Only the top hit of each title variant is considered
    pub async fn fetch_album_image(
        &self,
        artist_name: &str,
        album_name: &str,
        year: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        let variants = title_variants(album_name);
        let mut failures = 0;
        let mut last_error = None;

        for (i, variant) in variants.iter().enumerate() {
            if i > 0 {
                self.limiter.wait().await;
            }

            let results = match self.search_albums(artist_name, variant).await {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!("Deezer search for '{}' by '{}' failed: {}", variant, artist_name, e);
                    failures += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            let Some(top) = results.into_iter().next() else {
                continue;
            };

            if top.matches(artist_name, album_name, year, &self.album_types) {
                if let Some(url) = top.cover() {
                    tracing::debug!(
                        "Deezer matched '{}' by '{}' via '{}'",
                        album_name,
                        artist_name,
                        variant
                    );
                    return Ok(Some(url));
                }
            }
        }

        match last_error {
            Some(e) if failures == variants.len() => Err(e),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl CoverProvider for DeezerImageClient {
    fn source(&self) -> CoverSource {
        CoverSource::Deezer
    }

    async fn find_cover_url(
        &self,
        artist: &str,
        album: &str,
        year: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        self.fetch_album_image(artist, album, year).await
    }
}
