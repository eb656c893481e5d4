use crate::error::Result;
use crate::observability::metrics;
use crate::storage::Storage;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

/// Deletes events whose occurrence time is older than `horizon` at `now`.
///
/// Age is measured from `occurred_at`, never from when the row was stored, so
/// an event scraped late still leaves on schedule.
pub async fn sweep_expired(
    storage: &dyn Storage,
    now: DateTime<Utc>,
    horizon: Duration,
) -> Result<usize> {
    let cutoff = now
        .checked_sub_signed(horizon)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let deleted = storage
        .delete_occurred_before(cutoff)
        .await
        .map_err(|e| {
            metrics::store::error("delete");
            e
        })?;
    metrics::store::deleted(deleted);
    if deleted > 0 {
        info!("Retired {} events that occurred before {}", deleted, cutoff);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::types::Event;
    use chrono::TimeZone;

    fn event(id: &str, occurred_at: DateTime<Utc>) -> Event {
        Event {
            id: id.to_string(),
            occurred_at,
            latitude: 12.0,
            longitude: 122.0,
            depth_km: None,
            magnitude: 1.5,
            location_text: String::new(),
        }
    }

    #[tokio::test]
    async fn late_scraped_event_is_retired_by_occurrence_time() {
        let storage = InMemoryStorage::new();
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 0, 0, 0).unwrap();
        // stored just now, but it happened two days ago
        storage
            .upsert_events(&[event("late", now - Duration::days(2))], now)
            .await
            .unwrap();
        storage
            .upsert_events(&[event("fresh", now - Duration::hours(23))], now)
            .await
            .unwrap();

        let deleted = sweep_expired(&storage, now, Duration::hours(24)).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(storage.get_event("late").await.unwrap().is_none());
        assert!(storage.get_event("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unbounded_horizon_deletes_nothing() {
        let storage = InMemoryStorage::new();
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 0, 0, 0).unwrap();
        storage
            .upsert_events(&[event("ancient", now - Duration::days(3650))], now)
            .await
            .unwrap();
        let deleted = sweep_expired(&storage, now, Duration::max_value()).await.unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn event_exactly_at_horizon_is_kept() {
        let storage = InMemoryStorage::new();
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 0, 0, 0).unwrap();
        storage
            .upsert_events(&[event("edge", now - Duration::hours(24))], now)
            .await
            .unwrap();
        assert_eq!(sweep_expired(&storage, now, Duration::hours(24)).await.unwrap(), 0);
    }
}
