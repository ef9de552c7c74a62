pub mod enriched;
pub mod ids;
pub mod key;
pub mod metadata;
pub mod position;
pub mod station;
pub mod timetable;

pub use enriched::EnrichedPosition;
pub use ids::TrainNumber;
pub use key::CacheKey;
pub use metadata::TripMetadata;
pub use position::{GeoPoint, PositionRecord};
pub use station::{Station, StationDirectory};
pub use timetable::{RowType, Timetable, TimetableRow};
