use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One bulletin table row exactly as scraped, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub datetime: String,
    pub latitude: String,
    pub longitude: String,
    pub depth: String,
    pub magnitude: String,
    pub location: String,
}

/// A validated earthquake, identified by its deterministic `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub occurred_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: Option<f64>,
    pub magnitude: f64,
    pub location_text: String,
}

/// An event as persisted, with server-side bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    #[serde(flatten)]
    pub event: Event,
    /// Set on first insert and never rewritten by later upserts.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of one batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertOutcome {
    pub fn stored(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Counts produced by one scrape cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Data rows seen in the bulletin table, valid or not.
    pub rows_seen: usize,
    /// Rows dropped by the extractor (wrong cell count, blank required cell).
    pub rows_malformed: usize,
    /// Rows dropped by the validator (bad timestamp, non-numeric, out of region).
    pub rows_rejected: usize,
    pub duplicates_collapsed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CycleReport {
    pub fn events_stored(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn rows_skipped(&self) -> usize {
        self.rows_malformed + self.rows_rejected
    }
}

/// Read API payload: the recent window plus the freshest storage time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentEvents {
    pub events: Vec<StoredEvent>,
    pub last_updated: Option<DateTime<Utc>>,
}
