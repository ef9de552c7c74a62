use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::TrainNumber;

/// A GeoJSON point as delivered by the position feed.
///
/// Coordinates are `[longitude, latitude]`, in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

fn point_type() -> String {
    "Point".to_string()
}

impl GeoPoint {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            kind: point_type(),
            coordinates: [longitude, latitude],
        }
    }

    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.coordinates[1]
    }

    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.coordinates[0]
    }
}

/// One live vehicle position from the feed.
///
/// The pipeline never mutates a record; enrichment produces a new
/// [`EnrichedPosition`] wrapping a copy. Fields the pipeline does not
/// interpret are kept in `extra` and serialized back out unchanged.
///
/// [`EnrichedPosition`]: crate::model::EnrichedPosition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub train_number: TrainNumber,

    /// The trip's own departure date. Not used for cache keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_date: Option<NaiveDate>,

    pub timestamp: DateTime<Utc>,

    pub location: GeoPoint,

    /// Speed in km/h.
    #[serde(default)]
    pub speed: f64,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PositionRecord {
    #[must_use]
    pub fn new(train_number: TrainNumber, location: GeoPoint, speed: f64) -> Self {
        Self {
            train_number,
            departure_date: None,
            timestamp: Utc::now(),
            location,
            speed,
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.location.latitude()
    }

    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.location.longitude()
    }
}
