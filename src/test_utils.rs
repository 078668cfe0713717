// Test utilities: record builders, in-memory images and scripted providers
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

use crate::error::{FetchError, ProviderError};
use crate::images::{ArtistImageProvider, CoverProvider, ImageFetcher};
use crate::models::{AlbumRecord, CoverSource};

/// Create a test record with no year or declared cover
pub fn test_record(artist: &str, album: &str) -> AlbumRecord {
    AlbumRecord::new(artist.to_string(), album.to_string())
}

pub fn solid_rgba(width: u32, height: u32, color: Rgba<u8>) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, color))
}

/// Encode an image as PNG bytes
pub fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

/// What a scripted provider answers with
#[derive(Debug, Clone)]
pub enum Scripted {
    Url(String),
    NotFound,
    Fail,
}

impl Scripted {
    fn answer(&self) -> Result<Option<String>, ProviderError> {
        match self {
            Scripted::Url(url) => Ok(Some(url.clone())),
            Scripted::NotFound => Ok(None),
            Scripted::Fail => Err(ProviderError::Malformed("scripted failure".to_string())),
        }
    }
}

/// Cover provider with a fixed answer and a call counter
pub struct MockProvider {
    source: CoverSource,
    answer: Scripted,
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(source: CoverSource, answer: Scripted) -> Self {
        Self {
            source,
            answer,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle for reading the call count after the provider is boxed
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CoverProvider for MockProvider {
    fn source(&self) -> CoverSource {
        self.source
    }

    async fn find_cover_url(
        &self,
        _artist: &str,
        _album: &str,
        _year: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.answer()
    }
}

pub struct MockArtistProvider {
    answer: Scripted,
    calls: Arc<AtomicUsize>,
}

impl MockArtistProvider {
    pub fn new(answer: Scripted) -> Self {
        Self {
            answer,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ArtistImageProvider for MockArtistProvider {
    fn source(&self) -> CoverSource {
        CoverSource::MusicbrainzArtist
    }

    async fn find_artist_image_url(&self, _artist: &str) -> Result<Option<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.answer()
    }
}

/// Image fetcher serving solid images for known URLs; anything else is a 404
#[derive(Default)]
pub struct MockFetcher {
    images: HashMap<String, RgbImage>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serving(mut self, url: &str) -> Self {
        self.images
            .insert(url.to_string(), RgbImage::from_pixel(300, 300, Rgb([30, 60, 90])));
        self
    }

    /// Handle for reading requested URLs after the fetcher is boxed
    pub fn requested(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.requested)
    }
}

#[async_trait]
impl ImageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<RgbImage, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.images
            .get(url)
            .cloned()
            .ok_or(FetchError::Status(reqwest::StatusCode::NOT_FOUND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_helper() {
        let record = test_record("Artist", "Album");

        assert_eq!(record.artist, "Artist");
        assert_eq!(record.album, "Album");
        assert!(record.year.is_none());
        assert!(record.cover_src.is_none());
    }

    #[test]
    fn test_png_bytes_decode() {
        let bytes = png_bytes(&solid_rgba(7, 3, Rgba([1, 2, 3, 4])));
        let decoded = image::load_from_memory(&bytes).unwrap();

        assert_eq!((decoded.width(), decoded.height()), (7, 3));
        assert!(decoded.color().has_alpha());
    }

    #[tokio::test]
    async fn test_mock_provider_counts_calls() {
        let provider = MockProvider::new(CoverSource::Deezer, Scripted::NotFound);
        let calls = provider.calls();

        assert!(provider.find_cover_url("a", "b", None).await.unwrap().is_none());
        assert!(provider.find_cover_url("a", "b", None).await.unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mock_fetcher_unknown_url() {
        let fetcher = MockFetcher::new().serving("https://known");

        assert!(fetcher.fetch("https://known").await.is_ok());
        assert!(fetcher.fetch("https://unknown").await.is_err());
        assert_eq!(fetcher.requested().lock().unwrap().len(), 2);
    }
}
