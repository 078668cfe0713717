use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OUTPUT_DIR: &str = "bandcover";
pub const DEFAULT_RATE_LIMIT_MS: u64 = 2000;
pub const DEFAULT_ALBUM_TYPES: &[&str] = &["album", "ep", "compilation", "live"];

/// Spotify client-credentials pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Per-provider secrets, loaded once at startup. `None` disables a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub spotify: Option<SpotifyCredentials>,
    pub deezer_token: Option<String>,
    pub lastfm_api_key: Option<String>,
    pub discogs_token: Option<String>,
}

/// Read-only run configuration, built once and handed to the resolver.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub output_dir: PathBuf,
    pub rate_limit: Duration,
    pub album_types: Vec<String>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            rate_limit: Duration::from_millis(DEFAULT_RATE_LIMIT_MS),
            album_types: DEFAULT_ALBUM_TYPES.iter().map(|t| t.to_string()).collect(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Build the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    /// Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let spotify = match (get("SPOTIFY_CLIENT_ID"), get("SPOTIFY_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        let credentials = Credentials {
            spotify,
            deezer_token: get("DEEZER_API_TOKEN"),
            lastfm_api_key: get("LASTFM_API_KEY"),
            discogs_token: get("DISCOGS_API_TOKEN"),
        };

        let mut config = Config {
            credentials,
            ..Config::default()
        };

        if let Some(dir) = get("BANDCOVER_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        if let Some(ms) = get("BANDCOVER_RATE_LIMIT_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => config.rate_limit = Duration::from_millis(ms),
                Err(_) => tracing::warn!(
                    "Ignoring invalid BANDCOVER_RATE_LIMIT_MS value '{}', using {}ms",
                    ms,
                    DEFAULT_RATE_LIMIT_MS
                ),
            }
        }

        if let Some(types) = get("BANDCOVER_ALBUM_TYPES") {
            let parsed: Vec<String> = types
                .split(',')
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.album_types = parsed;
            }
        }

        if let Some(agent) = get("BANDCOVER_USER_AGENT") {
            config.user_agent = agent;
        }

        config
    }
}

fn default_user_agent() -> String {
    format!(
        "bandcover/{} (https://github.com/bandcover/bandcover)",
        env!("CARGO_PKG_VERSION")
    )
}
