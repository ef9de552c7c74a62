/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Trip metadata keyed by "{train}-{YYYY-MM-DD}".
-- Rows are written once and never updated; prior days are not pruned.
CREATE TABLE IF NOT EXISTS trip_metadata (
    cache_key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    stored_at TEXT NOT NULL
);
"#;

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "trip_metadata",
    sql: MIGRATION_001,
}];
