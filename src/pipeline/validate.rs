use crate::parser::parse_bulletin_datetime;
use crate::types::RawRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Latitude/longitude rectangle of the monitored region, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Region {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            min_lat: 4.0,
            max_lat: 22.0,
            min_lon: 114.0,
            max_lon: 128.0,
        }
    }
}

impl Region {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lon..=self.max_lon).contains(&longitude)
    }

    pub fn is_well_formed(&self) -> bool {
        [self.min_lat, self.max_lat, self.min_lon, self.max_lon]
            .iter()
            .all(|v| v.is_finite())
            && self.min_lat < self.max_lat
            && self.min_lon < self.max_lon
    }
}

/// Why a row was not turned into an event. First failing check wins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("unparseable timestamp {0:?}")]
    Timestamp(String),

    #[error("non-numeric {field}: {text:?}")]
    NonNumeric { field: &'static str, text: String },

    #[error("({latitude}, {longitude}) is outside the monitored region")]
    OutOfRegion { latitude: f64, longitude: f64 },
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Timestamp(_) => "timestamp",
            Rejection::NonNumeric { .. } => "non_numeric",
            Rejection::OutOfRegion { .. } => "out_of_region",
        }
    }
}

/// A row that passed validation but has no identity yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub occurred_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: Option<f64>,
    pub magnitude: f64,
    pub location_text: String,
}

fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn require_number(field: &'static str, text: &str) -> Result<f64, Rejection> {
    parse_finite(text).ok_or_else(|| Rejection::NonNumeric {
        field,
        text: text.to_string(),
    })
}

#[derive(Debug, Clone, Copy)]
pub struct Validator {
    region: Region,
    utc_offset_hours: i32,
}

impl Validator {
    pub fn new(region: Region, utc_offset_hours: i32) -> Self {
        Self {
            region,
            utc_offset_hours,
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn validate(&self, raw: &RawRow) -> Result<Reading, Rejection> {
        let occurred_at = parse_bulletin_datetime(&raw.datetime, self.utc_offset_hours)
            .ok_or_else(|| Rejection::Timestamp(raw.datetime.clone()))?;

        let latitude = require_number("latitude", &raw.latitude)?;
        let longitude = require_number("longitude", &raw.longitude)?;
        let magnitude = require_number("magnitude", &raw.magnitude)?;

        if !self.region.contains(latitude, longitude) {
            return Err(Rejection::OutOfRegion {
                latitude,
                longitude,
            });
        }

        Ok(Reading {
            occurred_at,
            latitude,
            longitude,
            // depth is optional in the bulletin
            depth_km: parse_finite(&raw.depth),
            magnitude,
            location_text: raw.location.trim().to_string(),
        })
    }
}
