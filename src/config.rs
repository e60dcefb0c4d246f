use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ConfigError;

pub const ENV_QUAKEWATCH_CONFIG: &str = "QUAKEWATCH_CONFIG";

const DEFAULT_BACKEND_URL: &str = "https://phivolcs-earthquake-api.onrender.com";
const DEFAULT_AUTO_REFRESH_MINUTES: u32 = 15;
const DEFAULT_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
const DEFAULT_ATTRIBUTION: &str = "© OpenStreetMap contributors";
const DEFAULT_MAX_ZOOM: u32 = 19;
const DEFAULT_INITIAL_ZOOM: f64 = 8.0;
const DEFAULT_FOCUS_ZOOM: f64 = 10.0;
const DEFAULT_SETTLE_DELAY_MS: u64 = 100;
const DEFAULT_SIDEBAR_TRANSITION_MS: u64 = 300;
const DEFAULT_SIDEBAR_WIDTH: i32 = 320;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend_url: String,
    /// Minutes between automatic refreshes, 0 turns them off.
    pub auto_refresh_minutes: u32,
    pub map: MapConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub tile_url: String,
    pub attribution: String,
    pub max_zoom: u32,
    pub initial_zoom: f64,
    pub focus_zoom: f64,
    pub settle_delay_ms: u64,
    pub sidebar_transition_ms: u64,
    pub sidebar_width: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            auto_refresh_minutes: DEFAULT_AUTO_REFRESH_MINUTES,
            map: MapConfig::default(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tile_url: DEFAULT_TILE_URL.to_string(),
            attribution: DEFAULT_ATTRIBUTION.to_string(),
            max_zoom: DEFAULT_MAX_ZOOM,
            initial_zoom: DEFAULT_INITIAL_ZOOM,
            focus_zoom: DEFAULT_FOCUS_ZOOM,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            sidebar_transition_ms: DEFAULT_SIDEBAR_TRANSITION_MS,
            sidebar_width: DEFAULT_SIDEBAR_WIDTH,
        }
    }
}

impl MapConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn sidebar_transition(&self) -> Duration {
        Duration::from_millis(self.sidebar_transition_ms)
    }
}

impl Config {
    pub fn backend_host(&self) -> &str {
        self.backend_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
    }

    pub fn auto_refresh_interval(&self) -> Option<Duration> {
        (self.auto_refresh_minutes > 0)
            .then(|| Duration::from_secs(u64::from(self.auto_refresh_minutes) * 60))
    }
}

/// `$QUAKEWATCH_CONFIG` when set and non-blank, else the per-user config dir.
pub fn config_path() -> PathBuf {
    match std::env::var(ENV_QUAKEWATCH_CONFIG) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quakewatch")
            .join("config.toml"),
    }
}

pub fn load() -> Result<Config, ConfigError> {
    load_from_path(config_path())
}

/// A missing file yields the defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.map.initial_zoom, 8.0);
        assert_eq!(config.map.focus_zoom, 10.0);
        assert_eq!(config.map.settle_delay(), Duration::from_millis(100));
        assert_eq!(config.map.sidebar_transition(), Duration::from_millis(300));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "backend_url = \"http://localhost:3000\"\nauto_refresh_minutes = 0\n\n[map]\nfocus_zoom = 12.0"
        )
        .unwrap();

        let config = load_from_path(file.path()).unwrap();
        assert_eq!(config.backend_url, "http://localhost:3000");
        assert_eq!(config.backend_host(), "localhost:3000");
        assert_eq!(config.auto_refresh_interval(), None);
        assert_eq!(config.map.focus_zoom, 12.0);
        assert_eq!(config.map.initial_zoom, 8.0);
        assert_eq!(config.map.tile_url, DEFAULT_TILE_URL);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend_url = [").unwrap();

        let err = load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn default_refresh_interval_is_fifteen_minutes() {
        let config = Config::default();
        assert_eq!(config.auto_refresh_interval(), Some(Duration::from_secs(900)));
        assert_eq!(config.backend_host(), "phivolcs-earthquake-api.onrender.com");
    }
}
