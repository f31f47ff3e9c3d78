//! SQLite plumbing shared by the preference store and the offline cache
//!
//! Each database file carries exactly one [`Schema`]; migrations are tracked
//! with `PRAGMA user_version`.

pub mod schema;

pub use schema::{run_migrations, Schema};

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;

/// Open or create a database file and bring it to the latest schema
pub fn open(path: &Path, schema: Schema) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;

    // WAL lets caller threads and the dispatcher thread share the file
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    run_migrations(&conn, schema)?;
    Ok(conn)
}

/// Open an in-memory database (for testing, or as a fallback)
pub fn open_in_memory(schema: Schema) -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    run_migrations(&conn, schema)?;
    Ok(conn)
}
