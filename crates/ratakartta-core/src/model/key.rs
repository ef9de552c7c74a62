use chrono::NaiveDate;
use std::fmt;

use crate::model::ids::TrainNumber;

/// Cache key for trip metadata: a train number scoped to one service day.
///
/// The day is the date on which the lookup is made, not the trip's own
/// departure date. Rendered as `"{train}-{YYYY-MM-DD}"`, which is also the
/// key used in the durable layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    train: TrainNumber,
    day: NaiveDate,
}

impl CacheKey {
    #[must_use]
    pub const fn new(train: TrainNumber, day: NaiveDate) -> Self {
        Self { train, day }
    }

    #[must_use]
    pub const fn train(&self) -> TrainNumber {
        self.train
    }

    #[must_use]
    pub const fn day(&self) -> NaiveDate {
        self.day
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.train, self.day.format("%Y-%m-%d"))
    }
}
