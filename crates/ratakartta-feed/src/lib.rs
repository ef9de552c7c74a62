//! Live train positions for ratakartta.
//!
//! Polls the Digitraffic position feed, merges cached trip metadata into
//! each position, and backfills missing metadata through a rate-limited
//! background executor.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod digitraffic;
pub mod enrich;
pub mod error;

pub use config::Config;
pub use digitraffic::DigitrafficClient;
pub use enrich::poller::{PollerHandle, PositionPoller, Snapshot};
pub use enrich::source::{PositionFeed, TimetableSource};
pub use enrich::store::{Clock, MetadataStore, SystemClock};
pub use enrich::throttle::ThrottledExecutor;
pub use error::{EnrichError, EnrichResult};
