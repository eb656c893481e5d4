use crate::error::{FeedError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the bulletin page comes from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Human-readable origin for logs.
    fn describe(&self) -> String;

    /// Fetches the full bulletin page as text.
    async fn fetch_document(&self) -> Result<String>;
}

/// Fetches the bulletin over HTTPS with a hard request timeout and no retries.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("quake_feed/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    fn classify(&self, e: reqwest::Error) -> FeedError {
        if e.is_timeout() {
            FeedError::Timeout {
                after: self.timeout,
            }
        } else {
            FeedError::Http(e)
        }
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch_document(&self) -> Result<String> {
        info!("Fetching bulletin from {}", self.url);
        let t0 = Instant::now();
        let resp = self.client.get(&self.url).send().await.map_err(|e| self.classify(e))?;

        let status = resp.status().as_u16();
        if !(200..=299).contains(&status) {
            warn!("Bulletin fetch returned HTTP {}", status);
            return Err(FeedError::UpstreamStatus { status });
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = resp.bytes().await.map_err(|e| self.classify(e))?;
        let secs = t0.elapsed().as_secs_f64();
        crate::observability::metrics::source::fetch_duration(secs);
        crate::observability::metrics::source::payload_bytes(bytes.len());
        debug!(
            status,
            content_type = %content_type,
            bytes = bytes.len(),
            secs,
            "Fetched bulletin"
        );
        // the page is not always valid UTF-8
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Reads a saved bulletin page from disk, for offline runs and fixtures.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DocumentSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch_document(&self) -> Result<String> {
        info!("Reading bulletin from {}", self.path.display());
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }
}
