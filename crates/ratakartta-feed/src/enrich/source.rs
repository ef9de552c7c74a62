//! Upstream data sources consumed by the poller.

use async_trait::async_trait;
use chrono::NaiveDate;

use ratakartta_core::model::{PositionRecord, Timetable, TrainNumber};

use crate::error::EnrichResult;

/// Source of live vehicle positions.
#[async_trait]
pub trait PositionFeed: Send + Sync {
    /// Fetch the current set of positions, in feed order.
    async fn latest_positions(&self) -> EnrichResult<Vec<PositionRecord>>;
}

/// Rate-limited source of per-train timetables.
#[async_trait]
pub trait TimetableSource: Send + Sync {
    /// Fetch the timetables of `train` on service day `day`.
    ///
    /// An empty list means the train does not run that day.
    async fn timetable(&self, day: NaiveDate, train: TrainNumber) -> EnrichResult<Vec<Timetable>>;
}
