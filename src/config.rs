use crate::constants::{DEFAULT_CONFIG_PATH, DEFAULT_DB_PATH, DEFAULT_SOURCE_URL};
use crate::error::{FeedError, Result};
use crate::feed::FeedSettings;
use crate::pipeline::{CycleSettings, IdentityScheme, Region};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound on the retention horizon and the read window.
pub const MAX_WINDOW_HOURS: u64 = 8760;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub region: Region,
    pub identity: IdentityConfig,
    pub feed: FeedConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub timeout_secs: u64,
    /// Hours the bulletin's local time is ahead of UTC.
    pub utc_offset_hours: i32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            timeout_secs: 8,
            utc_offset_hours: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub scheme: IdentityScheme,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub retention_hours: u64,
    pub window_hours: u64,
    pub max_events: usize,
    pub staleness_secs: u64,
    pub min_attempt_interval_secs: u64,
    pub refresh_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            retention_hours: 24,
            window_hours: 24,
            max_events: 500,
            staleness_secs: 300,
            min_attempt_interval_secs: 60,
            refresh_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file, or `:memory:` for a process-local store.
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn is_in_memory(&self) -> bool {
        self.db_path == ":memory:"
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub metrics_addr: Option<SocketAddr>,
    /// Runs a scrape cycle on this interval while serving, when set.
    pub refresh_interval_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            metrics_addr: None,
            refresh_interval_secs: None,
        }
    }
}

impl Config {
    /// Loads `quake_feed.toml` from the working directory, falling back to
    /// defaults when it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Loads from `path` (which must exist) or the default location, then
    /// applies environment overrides and validates.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::read_file(&default)?
                } else {
                    debug!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                    Config::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FeedError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Applies `QUAKE_*` overrides read through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("QUAKE_SOURCE_URL") {
            self.source.url = url;
        }
        if let Some(path) = var("QUAKE_DB_PATH") {
            self.storage.db_path = path;
        }
        if let Some(port) = var("QUAKE_PORT") {
            self.server.port = parse_env("QUAKE_PORT", &port)?;
        }
        if let Some(addr) = var("QUAKE_METRICS_ADDR") {
            self.server.metrics_addr = Some(parse_env("QUAKE_METRICS_ADDR", &addr)?);
        }
        if let Some(offset) = var("QUAKE_UTC_OFFSET_HOURS") {
            self.source.utc_offset_hours = parse_env("QUAKE_UTC_OFFSET_HOURS", &offset)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(FeedError::Config("source.url must not be empty".into()));
        }
        if self.source.timeout_secs == 0 {
            return Err(FeedError::Config("source.timeout_secs must be positive".into()));
        }
        if !(-14..=14).contains(&self.source.utc_offset_hours) {
            return Err(FeedError::Config(format!(
                "source.utc_offset_hours out of range: {}",
                self.source.utc_offset_hours
            )));
        }
        if !self.region.is_well_formed() {
            return Err(FeedError::Config(format!(
                "region bounding box is inverted or out of range: {:?}",
                self.region
            )));
        }
        if self.feed.retention_hours == 0 || self.feed.window_hours == 0 {
            return Err(FeedError::Config(
                "feed.retention_hours and feed.window_hours must be positive".into(),
            ));
        }
        if self.feed.retention_hours > MAX_WINDOW_HOURS
            || self.feed.window_hours > MAX_WINDOW_HOURS
        {
            return Err(FeedError::Config(format!(
                "feed.retention_hours and feed.window_hours must be at most {}",
                MAX_WINDOW_HOURS
            )));
        }
        if self.feed.max_events == 0 {
            return Err(FeedError::Config("feed.max_events must be positive".into()));
        }
        if self.feed.refresh_timeout_secs == 0 {
            return Err(FeedError::Config("feed.refresh_timeout_secs must be positive".into()));
        }
        if self.server.refresh_interval_secs == Some(0) {
            return Err(FeedError::Config("server.refresh_interval_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_secs)
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            region: self.region,
            utc_offset_hours: self.source.utc_offset_hours,
            identity: self.identity.scheme,
            retention: i64::try_from(self.feed.retention_hours)
                .ok()
                .and_then(chrono::Duration::try_hours)
                .unwrap_or_else(chrono::Duration::max_value),
        }
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            staleness: Duration::from_secs(self.feed.staleness_secs),
            min_attempt_interval: Duration::from_secs(self.feed.min_attempt_interval_secs),
            refresh_timeout: Duration::from_secs(self.feed.refresh_timeout_secs),
            window: self
                .feed
                .window_hours
                .checked_mul(3600)
                .map(Duration::from_secs)
                .unwrap_or(Duration::MAX),
            max_events: self.feed.max_events,
        }
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| FeedError::Config(format!("{} has invalid value '{}': {}", key, value, e)))
}
