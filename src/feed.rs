//! Read service for the recent-events window.
//!
//! A read refreshes the store first when the last successful scrape is older
//! than the staleness window. Any refresh failure (upstream down, timeout,
//! storage error) is logged and the read answers from what is already stored.

use crate::clock::Clock;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::ScrapeCycle;
use crate::storage::{Storage, LAST_ATTEMPT_KEY, LAST_SUCCESS_KEY};
use crate::types::{CycleReport, RecentEvents, StoredEvent};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct FeedSettings {
    /// How long a successful scrape keeps the store fresh.
    pub staleness: Duration,
    /// Minimum gap between two refresh attempts, successful or not.
    pub min_attempt_interval: Duration,
    /// Upper bound on a refresh triggered by a read.
    pub refresh_timeout: Duration,
    /// How far back the read window reaches.
    pub window: Duration,
    pub max_events: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            staleness: Duration::from_secs(300),
            min_attempt_interval: Duration::from_secs(60),
            refresh_timeout: Duration::from_secs(15),
            window: Duration::from_secs(24 * 60 * 60),
            max_events: 500,
        }
    }
}

/// Why a read did not refresh before answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Fresh,
    Backoff,
    InFlight,
}

impl Skip {
    fn as_str(self) -> &'static str {
        match self {
            Skip::Fresh => "fresh",
            Skip::Backoff => "backoff",
            Skip::InFlight => "in_flight",
        }
    }
}

pub struct FeedService {
    cycle: Arc<ScrapeCycle>,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    settings: FeedSettings,
    refresh_gate: Mutex<()>,
}

impl FeedService {
    pub fn new(cycle: Arc<ScrapeCycle>, clock: Arc<dyn Clock>, settings: FeedSettings) -> Self {
        Self {
            storage: cycle.storage().clone(),
            cycle,
            clock,
            settings,
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Events from the last window, most recent first, refreshing the store
    /// first when it has gone stale.
    ///
    /// Only a failing store query is returned as an error.
    pub async fn list_recent(&self) -> Result<RecentEvents> {
        metrics::feed::read();
        self.refresh_if_stale().await;
        self.read_window().await
    }

    /// Answers from storage without considering a refresh.
    pub async fn read_window(&self) -> Result<RecentEvents> {
        let since = self
            .clock
            .now()
            .checked_sub_signed(to_chrono(self.settings.window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let events = self
            .storage
            .recent_events(since, self.settings.max_events)
            .await?;
        let last_updated = events.iter().map(|e| e.created_at).max();
        Ok(RecentEvents {
            events,
            last_updated,
        })
    }

    pub async fn get_event(&self, id: &str) -> Result<Option<StoredEvent>> {
        self.storage.get_event(id).await
    }

    /// Runs one scrape cycle now, bypassing the staleness and interval gates.
    ///
    /// Concurrent triggers are allowed; each runs its own cycle.
    pub async fn trigger(&self) -> Result<CycleReport> {
        let started = self.clock.now();
        self.record(LAST_ATTEMPT_KEY, started).await;
        let report = self.cycle.run().await?;
        self.record(LAST_SUCCESS_KEY, self.clock.now()).await;
        Ok(report)
    }

    /// Most recent successful scrape, if any.
    pub async fn last_success(&self) -> Result<Option<DateTime<Utc>>> {
        self.storage.last_run(LAST_SUCCESS_KEY).await
    }

    async fn refresh_if_stale(&self) {
        match self.should_refresh().await {
            Ok(None) => {}
            Ok(Some(skip)) => {
                debug!(reason = skip.as_str(), "Serving stored events without refresh");
                metrics::feed::refresh_skipped(skip.as_str());
                return;
            }
            Err(e) => {
                warn!("Could not read scrape cadence, serving stored events: {}", e);
                metrics::feed::stale_serve();
                return;
            }
        }

        // another read is already refreshing; don't queue behind it
        let Ok(_guard) = self.refresh_gate.try_lock() else {
            debug!("Refresh already running, serving stored events");
            metrics::feed::refresh_skipped(Skip::InFlight.as_str());
            return;
        };

        self.record(LAST_ATTEMPT_KEY, self.clock.now()).await;
        info!("Stored events are stale, refreshing");
        match tokio::time::timeout(self.settings.refresh_timeout, self.cycle.run()).await {
            Ok(Ok(report)) => {
                self.record(LAST_SUCCESS_KEY, self.clock.now()).await;
                metrics::feed::refresh("ok");
                debug!(stored = report.events_stored(), "Refresh complete");
            }
            Ok(Err(e)) => {
                warn!(kind = e.kind(), "Refresh failed, serving stored events: {}", e);
                metrics::feed::refresh("error");
                metrics::feed::stale_serve();
            }
            Err(_) => {
                warn!(
                    "Refresh exceeded {:?}, serving stored events",
                    self.settings.refresh_timeout
                );
                metrics::feed::refresh("timeout");
                metrics::feed::stale_serve();
            }
        }
    }

    async fn should_refresh(&self) -> Result<Option<Skip>> {
        let now = self.clock.now();
        if let Some(last) = self.storage.last_run(LAST_SUCCESS_KEY).await? {
            if now - last < to_chrono(self.settings.staleness) {
                return Ok(Some(Skip::Fresh));
            }
        }
        if let Some(last) = self.storage.last_run(LAST_ATTEMPT_KEY).await? {
            if now - last < to_chrono(self.settings.min_attempt_interval) {
                return Ok(Some(Skip::Backoff));
            }
        }
        Ok(None)
    }

    async fn record(&self, key: &str, at: DateTime<Utc>) {
        if let Err(e) = self.storage.mark_run(key, at).await {
            warn!(key, "Failed to record scrape cadence: {}", e);
        }
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::max_value())
}
