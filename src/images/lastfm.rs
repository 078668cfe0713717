use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::models::CoverSource;

use super::provider::CoverProvider;
use super::types::ImageSize;

const LASTFM_API_URL: &str = "https://ws.audioscrobbler.com";

// Last.fm error code for an unknown album
const LASTFM_ERROR_INVALID_PARAMETERS: u32 = 6;

#[derive(Debug, Deserialize)]
struct AlbumInfoResponse {
    album: Option<Album>,
    error: Option<u32>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Album {
    #[serde(default)]
    image: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    #[serde(rename = "#text")]
    url: String,
    size: String,
}

pub struct LastFmImageClient {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl LastFmImageClient {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            api_key,
            client,
            base_url: LASTFM_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn fetch_album_image(
        &self,
        artist: &str,
        album: &str,
    ) -> Result<Option<String>, ProviderError> {
        let url = format!(
            "{}/2.0/?method=album.getinfo&artist={}&album={}&api_key={}&format=json",
            self.base_url,
            urlencoding::encode(artist),
            urlencoding::encode(album),
            urlencoding::encode(&self.api_key)
        );

        // Error payloads may arrive with a 4xx status, so read the body first
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let response: AlbumInfoResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(ProviderError::Status {
                    provider: "lastfm",
                    status,
                })
            }
            Err(e) => return Err(ProviderError::Malformed(e.to_string())),
        };

        match (response.album, response.error) {
            (Some(album), _) => Ok(largest_image_url(&album.image)),
            (None, Some(LASTFM_ERROR_INVALID_PARAMETERS)) => Ok(None),
            (None, Some(code)) => Err(ProviderError::Malformed(format!(
                "lastfm error {}: {}",
                code,
                response.message.unwrap_or_default()
            ))),
            (None, None) => Err(ProviderError::Malformed(
                "lastfm response has no album".to_string(),
            )),
        }
    }
}

#[async_trait]
impl CoverProvider for LastFmImageClient {
    fn source(&self) -> CoverSource {
        CoverSource::Lastfm
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

/// Largest known size with a non-empty URL
fn largest_image_url(images: &[Image]) -> Option<String> {
    images
        .iter()
        .filter(|img| !img.url.is_empty())
        .filter_map(|img| ImageSize::parse(&img.size).map(|size| (size, img)))
        .max_by_key(|(size, _)| *size)
        .map(|(_, img)| img.url.clone())
}
