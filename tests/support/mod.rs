#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use quake_feed::clock::ManualClock;
use quake_feed::error::{FeedError, Result};
use quake_feed::pipeline::{CycleSettings, ScrapeCycle};
use quake_feed::source::DocumentSource;
use quake_feed::storage::Storage;
use quake_feed::types::{Event, StoredEvent, UpsertOutcome};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BULLETIN: &str = include_str!("../fixtures/bulletin.html");
pub const BULLETIN_UPDATED: &str = include_str!("../fixtures/bulletin_updated.html");
pub const PARTIAL_GARBAGE: &str = include_str!("../fixtures/partial_garbage.html");

/// Id of the 06:30 PM Calatagan row present in both bulletin fixtures.
pub const CALATAGAN_ID: &str = "2025_11_01T10_30_00_1452_12098";

/// 2025-11-01T12:00Z, i.e. 8 PM local time on the day the fixtures describe.
pub fn fixture_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 1, 12, 0, 0).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(fixture_now()))
}

pub fn cycle(
    source: Arc<dyn DocumentSource>,
    storage: Arc<dyn Storage>,
    clock: Arc<ManualClock>,
) -> ScrapeCycle {
    ScrapeCycle::new(source, storage, clock, CycleSettings::default())
}

/// Serves a fixed page and counts fetches.
pub struct StaticSource {
    page: &'static str,
    fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new(page: &'static str) -> Arc<Self> {
        Arc::new(Self {
            page,
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    fn describe(&self) -> String {
        "static fixture".to_string()
    }

    async fn fetch_document(&self) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.page.to_string())
    }
}

/// Waits `delay` before serving its page, like an overloaded upstream.
pub struct SlowSource {
    page: &'static str,
    delay: Duration,
    fetches: AtomicUsize,
}

impl SlowSource {
    pub fn new(page: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            page,
            delay,
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for SlowSource {
    fn describe(&self) -> String {
        "slow fixture".to_string()
    }

    async fn fetch_document(&self) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.page.to_string())
    }
}

/// Always answers with an HTTP error status.
pub struct DownSource(pub u16);

#[async_trait]
impl DocumentSource for DownSource {
    fn describe(&self) -> String {
        "down".to_string()
    }

    async fn fetch_document(&self) -> Result<String> {
        Err(FeedError::UpstreamStatus { status: self.0 })
    }
}

/// Wraps a store, records every upsert batch and can be told to fail writes.
pub struct FailingStore {
    inner: Arc<dyn Storage>,
    fail_writes: AtomicBool,
    batches: Mutex<Vec<Vec<String>>>,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn Storage>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_writes: AtomicBool::new(false),
            batches: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Ids of every batch handed to `upsert_events`, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(FeedError::Database {
                message: "disk I/O error".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Storage for FailingStore {
    async fn upsert_events(&self, events: &[Event], now: DateTime<Utc>) -> Result<UpsertOutcome> {
        self.batches
            .lock()
            .unwrap()
            .push(events.iter().map(|e| e.id.clone()).collect());
        self.check()?;
        self.inner.upsert_events(events, now).await
    }

    async fn delete_occurred_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.check()?;
        self.inner.delete_occurred_before(cutoff).await
    }

    async fn recent_events(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<StoredEvent>> {
        self.inner.recent_events(since, limit).await
    }

    async fn get_event(&self, id: &str) -> Result<Option<StoredEvent>> {
        self.inner.get_event(id).await
    }

    async fn count_events(&self) -> Result<usize> {
        self.inner.count_events().await
    }

    async fn last_run(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        self.inner.last_run(key).await
    }

    async fn mark_run(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.inner.mark_run(key, at).await
    }
}

pub fn distinct(ids: &[String]) -> usize {
    ids.iter().collect::<HashSet<_>>().len()
}
