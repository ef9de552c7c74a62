use serde::{Deserialize, Serialize};

use crate::model::timetable::Timetable;

/// Origin and destination of a trip, as station short codes.
///
/// A `None` field means "not resolved", never "resolved to nothing".
/// Once stored for a train-day the value is never replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
}

impl TripMetadata {
    #[must_use]
    pub fn new(origin: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
            dest: Some(dest.into()),
        }
    }

    /// Derive metadata from a timetable: the first departure is the origin
    /// and the last arrival is the destination.
    #[must_use]
    pub fn from_timetable(timetable: &Timetable) -> Self {
        Self {
            origin: timetable.first_departure().map(str::to_string),
            dest: timetable.last_arrival().map(str::to_string),
        }
    }

    /// Derive metadata from a timetable lookup response.
    ///
    /// The endpoint answers with a list that is empty when the train does
    /// not run on the requested day; only the first entry is considered.
    #[must_use]
    pub fn from_timetables(timetables: &[Timetable]) -> Self {
        timetables
            .first()
            .map(Self::from_timetable)
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.origin.is_none() && self.dest.is_none()
    }
}
