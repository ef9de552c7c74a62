use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::error::Result;

use super::migrations::MIGRATIONS;

/// A key to serialized-value store used as the durable cache layer.
///
/// Writes are first-wins: saving a key that already exists leaves the
/// stored value unchanged.
pub trait DurableStore: Send {
    /// Load the serialized value stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` unless the key is already present.
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

/// A database connection holding the durable metadata cache.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                self.conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }
}

// Trip metadata
impl Database {
    /// Fetch the serialized metadata stored under a cache key.
    pub fn get_trip_metadata(&self, cache_key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM trip_metadata WHERE cache_key = ?1",
                [cache_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert serialized metadata under a cache key.
    ///
    /// Returns `false` (and changes nothing) if the key already exists.
    pub fn insert_trip_metadata(&self, cache_key: &str, value: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO trip_metadata (cache_key, value, stored_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![cache_key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// Count all cached metadata entries.
    pub fn count_trip_metadata(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM trip_metadata", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Count cached metadata entries for one service day.
    pub fn count_trip_metadata_for_day(&self, day: NaiveDate) -> Result<u64> {
        let pattern = format!("%-{}", day.format("%Y-%m-%d"));
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM trip_metadata WHERE cache_key LIKE ?1",
            [pattern],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

impl DurableStore for Database {
    fn load(&self, key: &str) -> Result<Option<String>> {
        self.get_trip_metadata(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.insert_trip_metadata(key, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_migrations_are_not_reapplied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        let db = Database::open(&path).unwrap();
        db.insert_trip_metadata("905-2024-03-01", r#"{"origin":"HKI"}"#)
            .unwrap();
        drop(db);

        let db = Database::open(&path).unwrap();
        assert_eq!(db.count_trip_metadata().unwrap(), 1);
        let versions: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_trip_metadata_round_trip() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_trip_metadata("905-2024-03-01").unwrap(), None);

        assert!(db
            .insert_trip_metadata("905-2024-03-01", r#"{"origin":"HKI","dest":"TPE"}"#)
            .unwrap());
        assert_eq!(
            db.get_trip_metadata("905-2024-03-01").unwrap().as_deref(),
            Some(r#"{"origin":"HKI","dest":"TPE"}"#)
        );
    }

    #[test]
    fn test_insert_is_first_write_wins() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_trip_metadata("1-2024-03-01", r#"{"origin":"A"}"#).unwrap());
        assert!(!db.insert_trip_metadata("1-2024-03-01", r#"{"origin":"B"}"#).unwrap());
        assert_eq!(
            db.get_trip_metadata("1-2024-03-01").unwrap().as_deref(),
            Some(r#"{"origin":"A"}"#)
        );
    }

    #[test]
    fn test_count_for_day() {
        let db = Database::open_in_memory().unwrap();
        db.insert_trip_metadata("1-2024-03-01", "{}").unwrap();
        db.insert_trip_metadata("2-2024-03-01", "{}").unwrap();
        db.insert_trip_metadata("1-2024-03-02", "{}").unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(db.count_trip_metadata_for_day(day).unwrap(), 2);
        assert_eq!(db.count_trip_metadata().unwrap(), 3);
    }

    #[test]
    fn test_durable_store_impl() {
        let db = Database::open_in_memory().unwrap();
        let store: &dyn DurableStore = &db;
        store.save("7-2024-03-01", r#"{"dest":"OL"}"#).unwrap();
        store.save("7-2024-03-01", r#"{"dest":"ROI"}"#).unwrap();
        assert_eq!(
            store.load("7-2024-03-01").unwrap().as_deref(),
            Some(r#"{"dest":"OL"}"#)
        );
    }
}
