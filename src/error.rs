use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status}")]
    UpstreamStatus { status: u16 },

    #[error("Upstream fetch timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {message}")]
    Database { message: String },
}

impl FeedError {
    /// True for failures of the bulletin source itself. These abort a cycle but
    /// never the read path, which keeps serving what is already stored.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            FeedError::Http(_) | FeedError::UpstreamStatus { .. } | FeedError::Timeout { .. }
        )
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::Http(e) if e.is_timeout() => "timeout",
            FeedError::Http(_) => "http",
            FeedError::UpstreamStatus { .. } => "upstream_status",
            FeedError::Timeout { .. } => "timeout",
            FeedError::Json(_) => "json",
            FeedError::Toml(_) => "toml",
            FeedError::Io(_) => "io",
            FeedError::Config(_) => "config",
            FeedError::Database { .. } => "database",
        }
    }
}

impl From<rusqlite::Error> for FeedError {
    fn from(e: rusqlite::Error) -> Self {
        FeedError::Database {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
