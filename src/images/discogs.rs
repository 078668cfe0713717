use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::models::CoverSource;

use super::provider::{ensure_success, CoverProvider};
use super::rate_limit::RateLimiter;

const DISCOGS_API_URL: &str = "https://api.discogs.com";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    images: Vec<ReleaseImage>,
}

#[derive(Debug, Deserialize)]
struct ReleaseImage {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    uri: String,
}

pub struct DiscogsImageClient {
    client: reqwest::Client,
    token: String,
    limiter: Arc<RateLimiter>,
    base_url: String,
}

impl DiscogsImageClient {
    pub fn new(client: reqwest::Client, token: String, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            token,
            limiter,
            base_url: DISCOGS_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn authorization(&self) -> String {
        format!("Discogs token={}", self.token)
    }

    pub async fn fetch_album_image(
        &self,
        artist: &str,
        album: &str,
    ) -> Result<Option<String>, ProviderError> {
        // Step 1: find the release
        let search_url = format!(
            "{}/database/search?release_title={}&artist={}&type=release&per_page=5",
            self.base_url,
            urlencoding::encode(album),
            urlencoding::encode(artist)
        );

        let search = ensure_success(
            "discogs",
            self.client
                .get(&search_url)
                .header(reqwest::header::AUTHORIZATION, self.authorization())
                .send()
                .await?,
        )?
        .json::<SearchResponse>()
        .await?;

        let Some(release_id) = search.results.first().map(|r| r.id) else {
            return Ok(None);
        };

        // Step 2: release detail carries the full-size images
        self.limiter.wait().await;

        let release_url = format!("{}/releases/{}", self.base_url, release_id);
        let release = ensure_success(
            "discogs",
            self.client
                .get(&release_url)
                .header(reqwest::header::AUTHORIZATION, self.authorization())
                .send()
                .await?,
        )?
        .json::<Release>()
        .await?;

        Ok(primary_image_url(&release.images))
    }
}

#[async_trait]
impl CoverProvider for DiscogsImageClient {
    fn source(&self) -> CoverSource {
        CoverSource::Discogs
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

/// The "primary" image, else the first one listed
fn primary_image_url(images: &[ReleaseImage]) -> Option<String> {
    let usable = || images.iter().filter(|img| !img.uri.is_empty());

    usable()
        .find(|img| img.kind == "primary")
        .or_else(|| usable().next())
        .map(|img| img.uri.clone())
}
