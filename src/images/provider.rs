use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::CoverSource;

/// A metadata service that can point at an album's cover image
#[async_trait]
pub trait CoverProvider: Send + Sync {
    fn source(&self) -> CoverSource;

    /// `Ok(None)` means the provider has no cover for this release
    async fn find_cover_url(
        &self,
        artist: &str,
        album: &str,
        year: Option<&str>,
    ) -> Result<Option<String>, ProviderError>;
}

/// Last-resort lookup of a picture of the artist
#[async_trait]
pub trait ArtistImageProvider: Send + Sync {
    fn source(&self) -> CoverSource;

    async fn find_artist_image_url(&self, artist: &str) -> Result<Option<String>, ProviderError>;
}

/// Fail with `ProviderError::Status` unless the response is a 2xx
pub(crate) fn ensure_success(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ProviderError::Status { provider, status })
    }
}

/// Quote a value for a Lucene query (MusicBrainz search syntax)
pub(crate) fn lucene_phrase(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}
