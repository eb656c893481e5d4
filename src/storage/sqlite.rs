use super::{lock, Storage};
use crate::error::{FeedError, Result};
use crate::types::{Event, StoredEvent, UpsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA: &str = r#"
    PRAGMA journal_mode=WAL;
    CREATE TABLE IF NOT EXISTS events (
        id            TEXT PRIMARY KEY,
        occurred_at   INTEGER NOT NULL,
        latitude      REAL NOT NULL,
        longitude     REAL NOT NULL,
        depth_km      REAL,
        magnitude     REAL NOT NULL,
        location_text TEXT NOT NULL,
        created_at    INTEGER NOT NULL,
        updated_at    INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_events_occurred_at ON events (occurred_at);
    CREATE TABLE IF NOT EXISTS cadence (
        key         TEXT PRIMARY KEY,
        last_run_at INTEGER NOT NULL
    );
"#;

const EVENT_COLUMNS: &str =
    "id, occurred_at, latitude, longitude, depth_km, magnitude, location_text, created_at, updated_at";

/// SQLite-backed event store. Instants are stored as Unix milliseconds.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

fn from_millis(column: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, ms))
}

fn row_to_stored(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredEvent> {
    Ok(StoredEvent {
        event: Event {
            id: row.get(0)?,
            occurred_at: from_millis(1, row.get(1)?)?,
            latitude: row.get(2)?,
            longitude: row.get(3)?,
            depth_km: row.get(4)?,
            magnitude: row.get(5)?,
            location_text: row.get(6)?,
        },
        created_at: from_millis(7, row.get(7)?)?,
        updated_at: from_millis(8, row.get(8)?)?,
    })
}

impl SqliteStorage {
    /// Opens (creating if needed) the database file and applies the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening event store at {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // other processes may be writing the same file
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| FeedError::Database {
            message: format!("storage task failed: {e}"),
        })?
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn upsert_events(&self, events: &[Event], now: DateTime<Utc>) -> Result<UpsertOutcome> {
        let events = events.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut outcome = UpsertOutcome::default();
            {
                let mut exists = tx.prepare_cached("SELECT 1 FROM events WHERE id = ?1")?;
                let mut upsert = tx.prepare_cached(
                    "INSERT INTO events (id, occurred_at, latitude, longitude, depth_km, magnitude, location_text, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                     ON CONFLICT(id) DO UPDATE SET
                         occurred_at = excluded.occurred_at,
                         latitude = excluded.latitude,
                         longitude = excluded.longitude,
                         depth_km = excluded.depth_km,
                         magnitude = excluded.magnitude,
                         location_text = excluded.location_text,
                         updated_at = excluded.updated_at",
                )?;
                for event in &events {
                    if exists.exists(params![event.id])? {
                        outcome.updated += 1;
                    } else {
                        outcome.inserted += 1;
                    }
                    upsert.execute(params![
                        event.id,
                        event.occurred_at.timestamp_millis(),
                        event.latitude,
                        event.longitude,
                        event.depth_km,
                        event.magnitude,
                        event.location_text,
                        now.timestamp_millis(),
                    ])?;
                }
            }
            // an early return above drops `tx`, which rolls the batch back
            tx.commit()?;
            debug!(inserted = outcome.inserted, updated = outcome.updated, "Upserted events");
            Ok(outcome)
        })
        .await
    }

    async fn delete_occurred_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM events WHERE occurred_at < ?1",
                params![cutoff.timestamp_millis()],
            )?;
            Ok(deleted)
        })
        .await
    }

    async fn recent_events(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<StoredEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM events WHERE occurred_at >= ?1
                 ORDER BY occurred_at DESC, id ASC LIMIT ?2",
                EVENT_COLUMNS
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params![since.timestamp_millis(), limit], row_to_stored)?;
            let events = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(events)
        })
        .await
    }

    async fn get_event(&self, id: &str) -> Result<Option<StoredEvent>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
            let event = conn.query_row(&sql, params![id], row_to_stored).optional()?;
            Ok(event)
        })
        .await
    }

    async fn count_events(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
            Ok(count.max(0) as usize)
        })
        .await
    }

    async fn last_run(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let ms: Option<i64> = conn
                .query_row(
                    "SELECT last_run_at FROM cadence WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            match ms {
                Some(ms) => Ok(Some(from_millis(0, ms)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn mark_run(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO cadence (key, last_run_at) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET last_run_at = excluded.last_run_at",
                params![key, at.timestamp_millis()],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn event(id: &str, occurred_at: DateTime<Utc>, magnitude: f64) -> Event {
        Event {
            id: id.to_string(),
            occurred_at,
            latitude: 14.52,
            longitude: 120.98,
            depth_km: None,
            magnitude,
            location_text: "Calatagan (Batangas)".to_string(),
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn upsert_then_read_back() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = noon();
        let at = now - ChronoDuration::minutes(30);

        let outcome = storage
            .upsert_events(&[event("a", at, 2.1), event("b", at, 3.0)], now)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome { inserted: 2, updated: 0 });

        let later = now + ChronoDuration::minutes(5);
        let outcome = storage.upsert_events(&[event("a", at, 2.4)], later).await.unwrap();
        assert_eq!(outcome, UpsertOutcome { inserted: 0, updated: 1 });

        let a = storage.get_event("a").await.unwrap().unwrap();
        assert_eq!(a.event.magnitude, 2.4);
        assert_eq!(a.event.depth_km, None);
        assert_eq!(a.event.occurred_at, at);
        assert_eq!(a.created_at, now);
        assert_eq!(a.updated_at, later);
        assert_eq!(storage.count_events().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_partial_state() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = noon();
        storage.upsert_events(&[event("keep", now, 1.0)], now).await.unwrap();

        // make the second row of the next batch fail inside the transaction
        {
            let conn = storage.conn.clone();
            let guard = conn.lock().unwrap();
            guard
                .execute_batch(
                    "CREATE TRIGGER reject_big BEFORE INSERT ON events
                     WHEN NEW.magnitude > 9.5 BEGIN SELECT RAISE(ABORT, 'implausible'); END;",
                )
                .unwrap();
        }
        let result = storage
            .upsert_events(&[event("x", now, 2.0), event("y", now, 10.0)], now)
            .await;
        assert!(matches!(result, Err(FeedError::Database { .. })));
        assert!(storage.get_event("x").await.unwrap().is_none());
        assert_eq!(storage.count_events().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_window_and_sweep() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = noon();
        let batch = vec![
            event("h1", now - ChronoDuration::hours(1), 1.0),
            event("h5", now - ChronoDuration::hours(5), 1.0),
            event("h30", now - ChronoDuration::hours(30), 1.0),
        ];
        storage.upsert_events(&batch, now).await.unwrap();

        let recent = storage
            .recent_events(now - ChronoDuration::hours(24), 500)
            .await
            .unwrap();
        let ids: Vec<&str> = recent.iter().map(|e| e.event.id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "h5"]);

        let deleted = storage
            .delete_occurred_before(now - ChronoDuration::hours(24))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(storage.count_events().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quake.db");
        let now = noon();
        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage.upsert_events(&[event("a", now, 1.0)], now).await.unwrap();
            storage.mark_run("scrape:last_success", now).await.unwrap();
        }
        let reopened = SqliteStorage::open(&path).unwrap();
        assert!(reopened.get_event("a").await.unwrap().is_some());
        assert_eq!(
            reopened.last_run("scrape:last_success").await.unwrap(),
            Some(now)
        );
        assert_eq!(reopened.last_run("never").await.unwrap(), None);
    }
}
