use std::path::PathBuf;
use thiserror::Error;

/// Failure while fetching the earthquake feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("Failed to fetch: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {code}: {reason}")]
    Status { code: u16, reason: String },

    #[error("Could not parse earthquake feed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The server answered with `success: false`.
    #[error("{0}")]
    Api(String),
}

impl FetchError {
    /// The hosted backend sleeps when idle and the first request may time out.
    pub fn is_cold_start(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
