use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::SpotifyCredentials;
use crate::error::ProviderError;
use crate::models::CoverSource;

use super::matching::{
    fuzzy_match, release_year, title_variants, ALBUM_MATCH_THRESHOLD, ARTIST_MATCH_THRESHOLD,
};
use super::provider::{ensure_success, CoverProvider};
use super::rate_limit::RateLimiter;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_URL: &str = "https://api.spotify.com/v1";

// Refresh this long before Spotify says the token expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    albums: AlbumPage,
}

#[derive(Debug, Deserialize)]
struct AlbumPage {
    #[serde(default)]
    items: Vec<SpotifyAlbum>,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    name: String,
    album_type: Option<String>,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

impl SpotifyAlbum {
    fn matches(&self, artist: &str, album: &str, year: Option<&str>, album_types: &[String]) -> bool {
        let Some(first_artist) = self.artists.first() else {
            return false;
        };

        let type_ok = self
            .album_type
            .as_deref()
            .map(|t| album_types.iter().any(|accepted| accepted.eq_ignore_ascii_case(t)))
            .unwrap_or(false);

        let year_ok = year
            .map(|y| release_year(&self.release_date) == y)
            .unwrap_or(true);

        type_ok
            && year_ok
            && fuzzy_match(artist, &first_artist.name, ARTIST_MATCH_THRESHOLD)
            && fuzzy_match(album, &self.name, ALBUM_MATCH_THRESHOLD)
    }

    fn largest_image(&self) -> Option<&str> {
        self.images
            .iter()
            .filter(|img| !img.url.is_empty())
            .max_by_key(|img| {
                u64::from(img.width.unwrap_or(0)) * u64::from(img.height.unwrap_or(0))
            })
            .map(|img| img.url.as_str())
    }
}

/// Spotify Web API client using the client-credentials flow
pub struct SpotifyImageClient {
    client: reqwest::Client,
    credentials: SpotifyCredentials,
    album_types: Vec<String>,
    limiter: Arc<RateLimiter>,
    token: Mutex<Option<CachedToken>>,
    token_url: String,
    api_url: String,
}

impl SpotifyImageClient {
    pub fn new(
        client: reqwest::Client,
        credentials: SpotifyCredentials,
        album_types: Vec<String>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            client,
            credentials,
            album_types,
            limiter,
            token: Mutex::new(None),
            token_url: TOKEN_URL.to_string(),
            api_url: API_URL.to_string(),
        }
    }

    /// Point both the accounts and the API endpoints at `base_url`
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.token_url = format!("{}/api/token", base_url);
        self.api_url = format!("{}/v1", base_url);
        self
    }

    /// Cached bearer token, refreshed when close to expiry
    pub async fn access_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.request_token().await?;
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            access_token: fresh.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(fresh.access_token)
    }

    async fn request_token(&self) -> Result<TokenResponse, ProviderError> {
        tracing::debug!("Requesting Spotify access token");

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Auth(format!(
                "spotify token request returned {}: {}",
                status, error_text
            )));
        }

        Ok(response.json::<TokenResponse>().await?)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn search_albums(
        &self,
        token: &str,
        artist: &str,
        album_title: &str,
    ) -> Result<Vec<SpotifyAlbum>, ProviderError> {
        let query = format!("album:{} artist:{}", album_title, artist);
        let url = format!(
            "{}/search?q={}&type=album&limit=20",
            self.api_url,
            urlencoding::encode(&query)
        );

        let response = self.client.get(&url).bearer_auth(token).send().await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
            return Err(ProviderError::Auth(
                "spotify rejected the access token".to_string(),
            ));
        }

        let page = ensure_success("spotify", response)?
            .json::<SearchResponse>()
            .await?;

        Ok(page.albums.items)
    }

    pub async fn fetch_album_image(
        &self,
        artist: &str,
        album: &str,
        year: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        let token = self.access_token().await?;
        let variants = title_variants(album);
        let mut failures = 0;
        let mut last_error = None;

        for (i, variant) in variants.iter().enumerate() {
            if i > 0 {
                self.limiter.wait().await;
            }

            // A rejected token fails every variant; anything else only this one
            let candidates = match self.search_albums(&token, artist, variant).await {
                Ok(candidates) => candidates,
                Err(e @ ProviderError::Auth(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!("Spotify search for '{}' by '{}' failed: {}", variant, artist, e);
                    failures += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            // First match in API order wins
            if let Some(url) = candidates
                .iter()
                .filter(|candidate| candidate.matches(artist, album, year, &self.album_types))
                .find_map(|candidate| candidate.largest_image())
            {
                tracing::debug!("Spotify matched '{}' by '{}' via '{}'", album, artist, variant);
                return Ok(Some(url.to_string()));
            }
        }

        match last_error {
            Some(e) if failures == variants.len() => Err(e),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl CoverProvider for SpotifyImageClient {
    fn source(&self) -> CoverSource {
        CoverSource::Spotify
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
