//! SQLite schema and migrations
//!
//! Migrations are keyed on `PRAGMA user_version` and applied once when a
//! store is opened, before any request is served.

use rusqlite::{Connection, types::Type};

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 1;

/// Migration v1: tickets and per-project counters.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tickets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    summary TEXT NOT NULL,
    description TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ticket_counts (
    project_id TEXT PRIMARY KEY,
    count INTEGER NOT NULL CHECK (count > 0)
);
"#;

const MIGRATIONS: &[(u32, &str)] = &[(1, MIGRATION_V1_SQL)];

/// Read `PRAGMA user_version` as a `u32`.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply all pending migrations in ascending order.
///
/// Each migration runs in its own transaction together with the
/// `user_version` bump.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.commit()?;
        tracing::info!(version, "applied schema migration");
        current = *version;
    }

    Ok(current)
}
