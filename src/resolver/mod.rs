use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbImage;

use crate::config::Config;
use crate::error::FetchError;
use crate::images::{
    build_http_client, fetcher, provider_chain, ArtistImageProvider, CoverProvider,
    HttpImageFetcher, ImageFetcher, RateLimiter, ResolvedImage, COVER_SIZE,
};
use crate::models::{AlbumRecord, CoverRef, CoverSource, Outcome};


/// Placeholder persisted when every source comes up empty
pub const DEFAULT_COVER: &[u8] = include_bytes!("../../assets/default-cover.jpg");

/// Result of walking the fallback chain for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub image: ResolvedImage,
    pub outcome: Outcome,
}

impl Resolution {
    fn default_cover() -> Self {
        Self {
            image: ResolvedImage::new(DEFAULT_COVER.to_vec(), CoverSource::Default, None),
            outcome: Outcome::Default,
        }
    }
}

/// Walks declared cover -> cover providers -> artist image -> default
pub struct CoverResolver {
    providers: Vec<Box<dyn CoverProvider>>,
    artist_provider: Option<Box<dyn ArtistImageProvider>>,
    fetcher: Box<dyn ImageFetcher>,
    limiter: Arc<RateLimiter>,
    base_dir: PathBuf,
}

impl CoverResolver {
    pub fn new(
        providers: Vec<Box<dyn CoverProvider>>,
        artist_provider: Option<Box<dyn ArtistImageProvider>>,
        fetcher: Box<dyn ImageFetcher>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            providers,
            artist_provider,
            fetcher,
            limiter,
            base_dir: PathBuf::from("."),
        }
    }

    /// Directory that site-relative `coverSrc` paths are resolved against
    pub fn with_base_dir(mut self, base_dir: PathBuf) -> Self {
        self.base_dir = base_dir;
        self
    }

    /// Wire up the real providers from the startup configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_http_client(config).context("Failed to build HTTP client")?;
        let limiter = Arc::new(RateLimiter::new(config.rate_limit));
        let (providers, artist_provider) = provider_chain(config, &client, &limiter);

        Ok(Self::new(
            providers,
            Some(artist_provider),
            Box::new(HttpImageFetcher::new(client)),
            limiter,
        ))
    }

    pub fn provider_sources(&self) -> Vec<CoverSource> {
        self.providers.iter().map(|p| p.source()).collect()
    }

    /// Resolve exactly one image for `record`. Never fails: every error
    /// degrades to the next source and finally to the default cover.
    pub async fn resolve(&self, record: &AlbumRecord) -> Resolution {
        let artist = record.artist.as_str();
        let album = record.album.as_str();

        // 1. A cover the input already declares
        if let Some(declared) = record.declared_cover() {
            if let Some(image) = self.try_declared(&declared, artist, album).await {
                return Resolution {
                    image,
                    outcome: Outcome::Found,
                };
            }
        }

        // 2. Cover providers in priority order
        for provider in &self.providers {
            let source = provider.source();
            self.limiter.wait().await;

            let url = match provider
                .find_cover_url(artist, album, record.year.as_deref())
                .await
            {
                Ok(Some(url)) => url,
                Ok(None) => {
                    tracing::info!("No cover on {} for '{}' by '{}'", source, album, artist);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        "{} lookup failed for '{}' by '{}': {}",
                        source,
                        album,
                        artist,
                        e
                    );
                    continue;
                }
            };

            if let Some(image) = self.download(&url, source, artist, album).await {
                tracing::info!("Found cover for '{}' by '{}' on {}", album, artist, source);
                return Resolution {
                    image,
                    outcome: Outcome::Found,
                };
            }
        }

        // 3. A picture of the artist
        if let Some(provider) = &self.artist_provider {
            let source = provider.source();
            self.limiter.wait().await;

            match provider.find_artist_image_url(artist).await {
                Ok(Some(url)) => {
                    if let Some(image) = self.download(&url, source, artist, album).await {
                        tracing::info!(
                            "Using artist image for '{}' by '{}' from {}",
                            album,
                            artist,
                            source
                        );
                        return Resolution {
                            image,
                            outcome: Outcome::ArtistFound,
                        };
                    }
                }
                Ok(None) => tracing::info!("No artist image on {} for '{}'", source, artist),
                Err(e) => tracing::warn!("{} artist lookup failed for '{}': {}", source, artist, e),
            }
        }

        // 4. Bundled placeholder
        tracing::info!("Using default cover image for '{}' by '{}'", album, artist);
        Resolution::default_cover()
    }

    async fn try_declared(
        &self,
        declared: &CoverRef,
        artist: &str,
        album: &str,
    ) -> Option<ResolvedImage> {
        match declared {
            CoverRef::Remote(url) => self.download(url, CoverSource::Existing, artist, album).await,
            CoverRef::Local(path) => {
                let Some(existing) = declared.existing_local_path(&self.base_dir) else {
                    tracing::debug!(
                        "Declared cover {} for '{}' by '{}' does not exist",
                        path.display(),
                        album,
                        artist
                    );
                    return None;
                };

                let loaded = fetcher::load_local(&existing, COVER_SIZE);
                self.finish(loaded, CoverSource::Existing, None, artist, album)
            }
        }
    }

    async fn download(
        &self,
        url: &str,
        source: CoverSource,
        artist: &str,
        album: &str,
    ) -> Option<ResolvedImage> {
        let fetched = self.fetcher.fetch(url).await;
        self.finish(fetched, source, Some(url.to_string()), artist, album)
    }

    fn finish(
        &self,
        fetched: Result<RgbImage, FetchError>,
        source: CoverSource,
        source_url: Option<String>,
        artist: &str,
        album: &str,
    ) -> Option<ResolvedImage> {
        let image = match fetched {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(
                    "Unusable image from {} for '{}' by '{}' ({}): {}",
                    source,
                    album,
                    artist,
                    source_url.as_deref().unwrap_or("local file"),
                    e
                );
                return None;
            }
        };

        match fetcher::encode_jpeg(&image) {
            Ok(bytes) => Some(ResolvedImage::new(bytes, source, source_url)),
            Err(e) => {
                tracing::warn!(
                    "Failed to encode image from {} for '{}' by '{}': {}",
                    source,
                    album,
                    artist,
                    e
                );
                None
            }
        }
    }
}
