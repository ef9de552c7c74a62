use serde::Serialize;

use crate::model::ids::TrainNumber;
use crate::model::metadata::TripMetadata;
use crate::model::position::PositionRecord;

/// A position record with whatever trip metadata is known at emit time.
///
/// Recomputed on every poll tick and never stored. Serializes flat: the
/// position's own fields followed by `origin`/`dest` when resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedPosition {
    #[serde(flatten)]
    pub position: PositionRecord,
    #[serde(flatten)]
    pub metadata: TripMetadata,
}

impl EnrichedPosition {
    /// Overlay `metadata` (if any) onto a copy of `position`.
    #[must_use]
    pub fn new(position: PositionRecord, metadata: Option<TripMetadata>) -> Self {
        Self {
            position,
            metadata: metadata.unwrap_or_default(),
        }
    }

    #[must_use]
    pub const fn train_number(&self) -> TrainNumber {
        self.position.train_number
    }

    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.metadata.origin.as_deref()
    }

    #[must_use]
    pub fn dest(&self) -> Option<&str> {
        self.metadata.dest.as_deref()
    }
}
