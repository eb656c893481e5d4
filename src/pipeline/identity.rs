//! Deterministic event identifiers.
//!
//! The same physical event is re-published on every bulletin refresh, so the
//! id must depend only on what the bulletin says about it. Coordinates are
//! scaled by 100 and rounded, so `14.5` and `14.50` map to the same key.
//!
//! Two distinct events in the same second at the same rounded coordinates
//! share an id under [`IdentityScheme::TimeLocation`]. Including magnitude
//! narrows that, at the cost of a new row whenever the agency revises a
//! magnitude.

use crate::pipeline::validate::Reading;
use crate::types::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityScheme {
    #[default]
    TimeLocation,
    TimeLocationMagnitude,
}

fn scaled(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Fixed-width, sortable rendering of the instant with separators replaced by `_`.
fn time_key(occurred_at: DateTime<Utc>) -> String {
    occurred_at
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// `2025_11_01T08_12_00_1452_12098` for 14.52N 120.98E at 08:12:00Z.
pub fn event_id(occurred_at: DateTime<Utc>, latitude: f64, longitude: f64) -> String {
    format!(
        "{}_{}_{}",
        time_key(occurred_at),
        scaled(latitude),
        scaled(longitude)
    )
}

impl IdentityScheme {
    pub fn id_for(&self, reading: &Reading) -> String {
        let base = event_id(reading.occurred_at, reading.latitude, reading.longitude);
        match self {
            IdentityScheme::TimeLocation => base,
            IdentityScheme::TimeLocationMagnitude => {
                format!("{}_m{}", base, (reading.magnitude * 10.0).round() as i64)
            }
        }
    }

    pub fn assign(&self, reading: Reading) -> Event {
        Event {
            id: self.id_for(&reading),
            occurred_at: reading.occurred_at,
            latitude: reading.latitude,
            longitude: reading.longitude,
            depth_km: reading.depth_km,
            magnitude: reading.magnitude,
            location_text: reading.location_text,
        }
    }
}
