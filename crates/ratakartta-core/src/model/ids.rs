use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A train number, stable for one trip within a service day.
///
/// The same number is reused on other days by unrelated trips, which is why
/// cached metadata is keyed by number *and* day (see [`CacheKey`]).
///
/// [`CacheKey`]: crate::model::CacheKey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainNumber(u32);

impl TrainNumber {
    #[must_use]
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for TrainNumber {
    fn from(number: u32) -> Self {
        Self(number)
    }
}

impl FromStr for TrainNumber {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl fmt::Display for TrainNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
