use crate::types::{RecentEvents, StoredEvent};
use async_graphql::{Object, ID};
use chrono::{DateTime, Utc};

/// GraphQL representation of a stored earthquake
#[derive(Clone)]
pub struct QuakeEvent {
    pub inner: StoredEvent,
}

impl From<StoredEvent> for QuakeEvent {
    fn from(event: StoredEvent) -> Self {
        Self { inner: event }
    }
}

#[Object]
impl QuakeEvent {
    /// Deterministic identifier derived from time and location
    async fn id(&self) -> ID {
        ID(self.inner.event.id.clone())
    }

    /// When the earthquake happened, in UTC
    async fn occurred_at(&self) -> DateTime<Utc> {
        self.inner.event.occurred_at
    }

    async fn latitude(&self) -> f64 {
        self.inner.event.latitude
    }

    async fn longitude(&self) -> f64 {
        self.inner.event.longitude
    }

    /// Depth in kilometres, when the bulletin reports one
    async fn depth_km(&self) -> Option<f64> {
        self.inner.event.depth_km
    }

    async fn magnitude(&self) -> f64 {
        self.inner.event.magnitude
    }

    /// Location as described by the bulletin
    async fn location_text(&self) -> &str {
        &self.inner.event.location_text
    }

    /// When this event was first stored
    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    async fn updated_at(&self) -> DateTime<Utc> {
        self.inner.updated_at
    }
}

/// The recent window together with its freshness
pub struct RecentQuakes {
    pub inner: RecentEvents,
}

impl From<RecentEvents> for RecentQuakes {
    fn from(recent: RecentEvents) -> Self {
        Self { inner: recent }
    }
}

#[Object]
impl RecentQuakes {
    /// Events in the window, most recent first
    async fn events(&self) -> Vec<QuakeEvent> {
        self.inner.events.iter().cloned().map(QuakeEvent::from).collect()
    }

    /// Storage time of the freshest event returned
    async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.last_updated
    }

    async fn count(&self) -> usize {
        self.inner.events.len()
    }
}
