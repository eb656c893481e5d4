use super::{lock, Storage};
use crate::error::Result;
use crate::types::{Event, StoredEvent, UpsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    events: Mutex<HashMap<String, StoredEvent>>,
    cadence: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
            cadence: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_events(&self, events: &[Event], now: DateTime<Utc>) -> Result<UpsertOutcome> {
        // one lock for the whole batch keeps it atomic to readers
        let mut stored = lock(&self.events)?;
        let mut outcome = UpsertOutcome::default();
        for event in events {
            let created_at = match stored.get(&event.id) {
                Some(existing) => {
                    outcome.updated += 1;
                    existing.created_at
                }
                None => {
                    outcome.inserted += 1;
                    now
                }
            };
            stored.insert(
                event.id.clone(),
                StoredEvent {
                    event: event.clone(),
                    created_at,
                    updated_at: now,
                },
            );
        }
        debug!(inserted = outcome.inserted, updated = outcome.updated, "Upserted events in memory");
        Ok(outcome)
    }

    async fn delete_occurred_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut stored = lock(&self.events)?;
        let before = stored.len();
        stored.retain(|_, e| e.event.occurred_at >= cutoff);
        Ok(before - stored.len())
    }

    async fn recent_events(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<StoredEvent>> {
        let stored = lock(&self.events)?;
        let mut recent: Vec<StoredEvent> = stored
            .values()
            .filter(|e| e.event.occurred_at >= since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| {
            b.event
                .occurred_at
                .cmp(&a.event.occurred_at)
                .then_with(|| a.event.id.cmp(&b.event.id))
        });
        recent.truncate(limit);
        Ok(recent)
    }

    async fn get_event(&self, id: &str) -> Result<Option<StoredEvent>> {
        Ok(lock(&self.events)?.get(id).cloned())
    }

    async fn count_events(&self) -> Result<usize> {
        Ok(lock(&self.events)?.len())
    }

    async fn last_run(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(lock(&self.cadence)?.get(key).copied())
    }

    async fn mark_run(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        lock(&self.cadence)?.insert(key.to_string(), at);
        Ok(())
    }
}
