/// Shared names and defaults used across the feed, the CLI and the server

// Service identity (health endpoint, user agent, log file prefix)
pub const SERVICE_NAME: &str = "quake_feed";

// Bulletin page published by the seismology agency
pub const DEFAULT_SOURCE_URL: &str = "https://earthquake.phivolcs.dost.gov.ph/";

// File locations
pub const DEFAULT_CONFIG_PATH: &str = "quake_feed.toml";
pub const DEFAULT_DB_PATH: &str = "data/quake_feed.db";
pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "quake_feed.log";

// Default tracing filter when RUST_LOG is unset
pub const DEFAULT_LOG_DIRECTIVE: &str = "quake_feed=info";
