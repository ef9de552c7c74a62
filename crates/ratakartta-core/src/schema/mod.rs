//! SQLite-backed durable layer for cached trip metadata.

mod db;
mod migrations;

pub use db::{Database, DurableStore};
pub use migrations::{Migration, MIGRATIONS};
