//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Which kind of database a connection holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Namespaced key-value preferences
    Store,
    /// Offline event cache
    Cache,
}

impl Schema {
    fn migrations(self) -> &'static [&'static str] {
        match self {
            Schema::Store => STORE_MIGRATIONS,
            Schema::Cache => CACHE_MIGRATIONS,
        }
    }

    /// Latest schema version
    pub fn version(self) -> i32 {
        self.migrations().len() as i32
    }
}

/// Preference store migrations, indexed by version number
const STORE_MIGRATIONS: &[&str] = &[
    // Version 1: key-value table
    r#"
    CREATE TABLE IF NOT EXISTS preferences (
        namespace  TEXT NOT NULL,
        key        TEXT NOT NULL,
        value      TEXT NOT NULL,
        updated_at DATETIME NOT NULL,
        PRIMARY KEY (namespace, key)
    );
    "#,
];

/// Offline cache migrations, indexed by version number
const CACHE_MIGRATIONS: &[&str] = &[
    // Version 1: queued event records, FIFO by id
    r#"
    CREATE TABLE IF NOT EXISTS cached_events (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp  INTEGER NOT NULL,
        query      TEXT NOT NULL,
        size       INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_cached_events_timestamp ON cached_events(timestamp);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection, schema: Schema) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::debug!(
        ?schema,
        current_version,
        target_version = schema.version(),
        "Checking database migrations"
    );

    for (i, migration) in schema.migrations().iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(?schema, version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn, Schema::Cache).unwrap();
        run_migrations(&conn, Schema::Cache).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, Schema::Cache.version());
    }

    #[test]
    fn test_store_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn, Schema::Store).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'preferences'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
