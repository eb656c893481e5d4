use crate::error::{FeedError, Result};
use crate::types::{Event, StoredEvent, UpsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

mod in_memory;
mod sqlite;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

/// Cadence key recording the last scrape cycle that completed.
pub const LAST_SUCCESS_KEY: &str = "scrape:last_success";
/// Cadence key recording the last scrape cycle that was started.
pub const LAST_ATTEMPT_KEY: &str = "scrape:last_attempt";

/// Storage for events and the scrape cadence.
///
/// Every mutation is a single atomic operation; overlapping scrape cycles rely
/// on that instead of locking each other out.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Inserts events with new ids and overwrites every field but `id` and
    /// `created_at` for ids already stored. All or nothing.
    ///
    /// Callers must pass a batch with distinct ids.
    async fn upsert_events(&self, events: &[Event], now: DateTime<Utc>) -> Result<UpsertOutcome>;

    /// Deletes events that occurred strictly before `cutoff`.
    async fn delete_occurred_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Events that occurred at or after `since`, most recent first.
    async fn recent_events(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<StoredEvent>>;

    async fn get_event(&self, id: &str) -> Result<Option<StoredEvent>>;

    async fn count_events(&self) -> Result<usize>;

    async fn last_run(&self, key: &str) -> Result<Option<DateTime<Utc>>>;

    async fn mark_run(&self, key: &str, at: DateTime<Utc>) -> Result<()>;
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| FeedError::Database {
        message: "storage lock poisoned".to_string(),
    })
}
