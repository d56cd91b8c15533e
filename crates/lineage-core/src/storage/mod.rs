//! SQLite storage shared by the metadata store and the lineage repository.

pub mod repository;
pub mod schema;

pub use repository::{
    ColumnEdgeFilter, LineageRepository, RepositoryStats, TableEdgeFilter,
};

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use tracing::debug;

use crate::error::{LineageError, Result};
use schema::SCHEMA_CREATE_STORE_METADATA;

/// Open (creating parent directories if needed) and configure a database file.
pub(crate) fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    configure_connection(&conn)?;
    debug!(path = %path.display(), "Opened lineage database");
    Ok(conn)
}

/// Open a private in-memory database.
pub(crate) fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_connection(&conn)?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> SqliteResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    // Both components write to the same file
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

/// Create a component's tables and record or verify its schema version.
pub(crate) fn ensure_schema(
    conn: &Connection,
    create_sql: &str,
    version_key: &str,
    version: &str,
) -> Result<()> {
    conn.execute(SCHEMA_CREATE_STORE_METADATA, [])?;

    match get_store_metadata(conn, version_key)? {
        Some(found) if found != version => {
            return Err(LineageError::SchemaVersionMismatch {
                expected: version.to_string(),
                found,
            });
        }
        Some(_) => {}
        None => set_store_metadata(conn, version_key, version)?,
    }

    conn.execute_batch(create_sql)?;
    Ok(())
}

pub(crate) fn get_store_metadata(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM store_metadata WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub(crate) fn set_store_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO store_metadata (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}
