use std::path::PathBuf;

use thiserror::Error;

/// Failure to read or parse the input file. The only fatal error of a run.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read input file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse input file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A single provider lookup failed. Treated as "not found" by the resolver.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} returned HTTP {status}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("authentication failed: {0}")]
    Auth(String),
}

/// Downloading or decoding an image failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("image request timed out: {0}")]
    Timeout(reqwest::Error),
    #[error("image request failed: {0}")]
    Http(reqwest::Error),
    #[error("image host returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to read local image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err)
        } else {
            FetchError::Http(err)
        }
    }
}

/// Persisting an image or a JSON document failed.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode JPEG: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}
