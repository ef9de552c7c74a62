//! Core domain model for ratakartta.
//!
//! This crate defines live train positions, timetables, the trip metadata
//! derived from them, the per-day cache key, station lookups, and the
//! SQLite schema backing the durable metadata cache.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod schema;

pub use error::{Error, Result};
