mod deezer;
mod discogs;
pub mod fetcher;
mod lastfm;
pub mod matching;
mod musicbrainz;
mod provider;
mod rate_limit;
mod spotify;
mod types;

use std::sync::Arc;

use crate::config::Config;

pub use deezer::DeezerImageClient;
pub use discogs::DiscogsImageClient;
pub use fetcher::{HttpImageFetcher, ImageFetcher};
pub use lastfm::LastFmImageClient;
pub use musicbrainz::MusicBrainzImageClient;
pub use provider::{ArtistImageProvider, CoverProvider};
pub use rate_limit::RateLimiter;
pub use spotify::SpotifyImageClient;
pub use types::{ImageSize, ResolvedImage, COVER_SIZE};

const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Shared HTTP client for every provider and image download
pub fn build_http_client(config: &Config) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(HTTP_TIMEOUT)
        .build()
}

/// The cover providers in their fixed priority order, skipping any whose
/// credentials are missing, plus the artist-image fallback.
pub fn provider_chain(
    config: &Config,
    client: &reqwest::Client,
    limiter: &Arc<RateLimiter>,
) -> (Vec<Box<dyn CoverProvider>>, Box<dyn ArtistImageProvider>) {
    let credentials = &config.credentials;
    let mut providers: Vec<Box<dyn CoverProvider>> = Vec::new();

    match &credentials.spotify {
        Some(spotify) => providers.push(Box::new(SpotifyImageClient::new(
            client.clone(),
            spotify.clone(),
            config.album_types.clone(),
            Arc::clone(limiter),
        ))),
        None => tracing::warn!("Spotify disabled: SPOTIFY_CLIENT_ID/SPOTIFY_CLIENT_SECRET not set"),
    }

    match &credentials.deezer_token {
        Some(token) => providers.push(Box::new(DeezerImageClient::new(
            client.clone(),
            token.clone(),
            config.album_types.clone(),
            Arc::clone(limiter),
        ))),
        None => tracing::warn!("Deezer disabled: DEEZER_API_TOKEN not set"),
    }

    match &credentials.lastfm_api_key {
        Some(key) => providers.push(Box::new(LastFmImageClient::new(
            client.clone(),
            key.clone(),
        ))),
        None => tracing::warn!("Last.fm disabled: LASTFM_API_KEY not set"),
    }

    match &credentials.discogs_token {
        Some(token) => providers.push(Box::new(DiscogsImageClient::new(
            client.clone(),
            token.clone(),
            Arc::clone(limiter),
        ))),
        None => tracing::warn!("Discogs disabled: DISCOGS_API_TOKEN not set"),
    }

    // MusicBrainz and the Cover Art Archive need no credentials
    providers.push(Box::new(MusicBrainzImageClient::new(
        client.clone(),
        Arc::clone(limiter),
    )));
    let artist_provider = Box::new(MusicBrainzImageClient::new(
        client.clone(),
        Arc::clone(limiter),
    ));

    (providers, artist_provider)
}
