//! SQLite-backed Metadata Store.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use tracing::info;

use super::{MetadataStore, ReferenceCheck};
use crate::error::{Entity, LineageError, Result};
use crate::model::{Column, ColumnId, DataSource, DataSourceId, DataSourceType, Table, TableId};
use crate::storage::schema::{
    COLUMN_COLUMNS, METADATA_SCHEMA_VERSION, METADATA_VERSION_KEY, SCHEMA_CREATE_METADATA_TABLES,
    TABLE_SELECT,
};
use crate::storage::{ensure_schema, open_connection, open_in_memory};

/// Metadata store persisting data sources, tables and columns in SQLite.
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Open (or create) the store in a database file
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_connection(open_connection(path)?)
    }

    /// Create a private in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        ensure_schema(
            &conn,
            SCHEMA_CREATE_METADATA_TABLES,
            METADATA_VERSION_KEY,
            METADATA_SCHEMA_VERSION,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Register a data source. Names are unique.
    pub fn add_data_source(
        &self,
        name: &str,
        source_type: DataSourceType,
        description: Option<&str>,
    ) -> Result<DataSource> {
        let name = require_name(name, "data source")?;
        let conn = self.conn.lock();
        if query_data_source_by_name(&conn, name)?.is_some() {
            return Err(LineageError::conflict(format!(
                "data source '{name}' already exists"
            )));
        }

        conn.execute(
            "INSERT INTO data_sources (name, source_type, description) VALUES (?1, ?2, ?3)",
            params![name, source_type.as_str(), description],
        )?;
        let id = conn.last_insert_rowid();
        info!(id, name, source_type = %source_type, "Added data source");

        Ok(DataSource {
            id,
            name: name.to_string(),
            source_type,
            description: description.map(str::to_string),
        })
    }

    /// Register a table under an existing data source.
    pub fn add_table(
        &self,
        data_source_id: DataSourceId,
        name: &str,
        schema_name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Table> {
        let name = require_name(name, "table")?;
        let conn = self.conn.lock();
        if query_data_source(&conn, data_source_id)?.is_none() {
            return Err(LineageError::not_found(Entity::DataSource, data_source_id));
        }
        if query_table_by_name(&conn, data_source_id, name)?.is_some() {
            return Err(LineageError::conflict(format!(
                "table '{name}' already exists in data source {data_source_id}"
            )));
        }

        conn.execute(
            "INSERT INTO tables (name, data_source_id, schema_name, description) VALUES (?1, ?2, ?3, ?4)",
            params![name, data_source_id, schema_name, description],
        )?;
        let id = conn.last_insert_rowid();
        info!(id, name, data_source_id, "Added table");

        query_table(&conn, id)?.ok_or_else(|| LineageError::not_found(Entity::Table, id))
    }

    /// Register a column under an existing table.
    pub fn add_column(
        &self,
        table_id: TableId,
        name: &str,
        data_type: &str,
        description: Option<&str>,
    ) -> Result<Column> {
        let name = require_name(name, "column")?;
        let conn = self.conn.lock();
        if query_table(&conn, table_id)?.is_none() {
            return Err(LineageError::not_found(Entity::Table, table_id));
        }
        if query_column_by_name(&conn, table_id, name)?.is_some() {
            return Err(LineageError::conflict(format!(
                "column '{name}' already exists in table {table_id}"
            )));
        }

        conn.execute(
            "INSERT INTO columns (name, table_id, data_type, description) VALUES (?1, ?2, ?3, ?4)",
            params![name, table_id, data_type, description],
        )?;
        let id = conn.last_insert_rowid();
        info!(id, name, table_id, "Added column");

        Ok(Column {
            id,
            name: name.to_string(),
            table_id,
            data_type: data_type.to_string(),
            description: description.map(str::to_string),
        })
    }

    /// Delete a table and its columns.
    ///
    /// Fails with `Conflict` while any lineage edge references the table or
    /// one of its columns.
    pub fn remove_table(&self, table_id: TableId, references: &dyn ReferenceCheck) -> Result<()> {
        let mut conn = self.conn.lock();
        if query_table(&conn, table_id)?.is_none() {
            return Err(LineageError::not_found(Entity::Table, table_id));
        }
        if references.table_is_referenced(table_id)? {
            return Err(LineageError::conflict(format!(
                "table {table_id} is referenced by table lineage"
            )));
        }
        for column in query_columns_of(&conn, table_id)? {
            if references.column_is_referenced(column.id)? {
                return Err(LineageError::conflict(format!(
                    "column {} of table {table_id} is referenced by column lineage",
                    column.id
                )));
            }
        }

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM columns WHERE table_id = ?1", [table_id])?;
        tx.execute("DELETE FROM tables WHERE id = ?1", [table_id])?;
        tx.commit()?;
        info!(table_id, "Removed table");
        Ok(())
    }

    /// Delete a column. Fails with `Conflict` while column lineage references it.
    pub fn remove_column(
        &self,
        column_id: ColumnId,
        references: &dyn ReferenceCheck,
    ) -> Result<()> {
        let conn = self.conn.lock();
        if query_column(&conn, column_id)?.is_none() {
            return Err(LineageError::not_found(Entity::Column, column_id));
        }
        if references.column_is_referenced(column_id)? {
            return Err(LineageError::conflict(format!(
                "column {column_id} is referenced by column lineage"
            )));
        }
        conn.execute("DELETE FROM columns WHERE id = ?1", [column_id])?;
        info!(column_id, "Removed column");
        Ok(())
    }

    // =========================================================================
    // Listings
    // =========================================================================

    pub fn list_data_sources(&self) -> Result<Vec<DataSource>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, name, source_type, description FROM data_sources ORDER BY id")?;
        let rows = stmt
            .query_map([], row_to_data_source)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// Tables in ascending id order, optionally restricted to one data source
    pub fn list_tables(&self, data_source_id: Option<DataSourceId>) -> Result<Vec<Table>> {
        let conn = self.conn.lock();
        let tables = match data_source_id {
            Some(ds) => {
                let mut stmt =
                    conn.prepare(&format!("{TABLE_SELECT} WHERE t.data_source_id = ?1 ORDER BY t.id"))?;
                let rows = stmt
                    .query_map([ds], row_to_table)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!("{TABLE_SELECT} ORDER BY t.id"))?;
                let rows = stmt
                    .query_map([], row_to_table)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
        };
        Ok(tables)
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn data_source(&self, id: DataSourceId) -> Result<Option<DataSource>> {
        query_data_source(&self.conn.lock(), id)
    }

    fn data_source_by_name(&self, name: &str) -> Result<Option<DataSource>> {
        query_data_source_by_name(&self.conn.lock(), name)
    }

    fn table(&self, id: TableId) -> Result<Option<Table>> {
        query_table(&self.conn.lock(), id)
    }

    fn table_by_name(&self, data_source_id: DataSourceId, name: &str) -> Result<Option<Table>> {
        query_table_by_name(&self.conn.lock(), data_source_id, name)
    }

    fn column(&self, id: ColumnId) -> Result<Option<Column>> {
        query_column(&self.conn.lock(), id)
    }

    fn column_by_name(&self, table_id: TableId, name: &str) -> Result<Option<Column>> {
        query_column_by_name(&self.conn.lock(), table_id, name)
    }

    fn columns_of(&self, table_id: TableId) -> Result<Vec<Column>> {
        query_columns_of(&self.conn.lock(), table_id)
    }
}

// ============================================================================
// Queries
// ============================================================================

fn require_name<'a>(name: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LineageError::validation(format!("{what} name must not be empty")));
    }
    Ok(trimmed)
}

fn query_data_source(conn: &Connection, id: DataSourceId) -> Result<Option<DataSource>> {
    let row = conn
        .query_row(
            "SELECT id, name, source_type, description FROM data_sources WHERE id = ?1",
            [id],
            row_to_data_source,
        )
        .optional()?;
    Ok(row)
}

fn query_data_source_by_name(conn: &Connection, name: &str) -> Result<Option<DataSource>> {
    let row = conn
        .query_row(
            "SELECT id, name, source_type, description FROM data_sources WHERE name = ?1",
            [name],
            row_to_data_source,
        )
        .optional()?;
    Ok(row)
}

fn query_table(conn: &Connection, id: TableId) -> Result<Option<Table>> {
    let row = conn
        .query_row(&format!("{TABLE_SELECT} WHERE t.id = ?1"), [id], row_to_table)
        .optional()?;
    Ok(row)
}

fn query_table_by_name(
    conn: &Connection,
    data_source_id: DataSourceId,
    name: &str,
) -> Result<Option<Table>> {
    let row = conn
        .query_row(
            &format!("{TABLE_SELECT} WHERE t.data_source_id = ?1 AND t.name = ?2"),
            params![data_source_id, name],
            row_to_table,
        )
        .optional()?;
    Ok(row)
}

fn query_column(conn: &Connection, id: ColumnId) -> Result<Option<Column>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMN_COLUMNS} FROM columns WHERE id = ?1"),
            [id],
            row_to_column,
        )
        .optional()?;
    Ok(row)
}

fn query_column_by_name(conn: &Connection, table_id: TableId, name: &str) -> Result<Option<Column>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMN_COLUMNS} FROM columns WHERE table_id = ?1 AND name = ?2"),
            params![table_id, name],
            row_to_column,
        )
        .optional()?;
    Ok(row)
}

fn query_columns_of(conn: &Connection, table_id: TableId) -> Result<Vec<Column>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {COLUMN_COLUMNS} FROM columns WHERE table_id = ?1 ORDER BY id"))?;
    let rows = stmt
        .query_map([table_id], row_to_column)?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(rows)
}

fn parse_source_type(idx: usize, raw: &str) -> SqliteResult<DataSourceType> {
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

fn row_to_data_source(row: &rusqlite::Row<'_>) -> SqliteResult<DataSource> {
    let raw_type: String = row.get(2)?;
    Ok(DataSource {
        id: row.get(0)?,
        name: row.get(1)?,
        source_type: parse_source_type(2, &raw_type)?,
        description: row.get(3)?,
    })
}

fn row_to_table(row: &rusqlite::Row<'_>) -> SqliteResult<Table> {
    let raw_type: Option<String> = row.get(4)?;
    Ok(Table {
        id: row.get(0)?,
        name: row.get(1)?,
        data_source_id: row.get(2)?,
        data_source_name: row.get(3)?,
        data_source_type: raw_type.and_then(|t| t.parse().ok()),
        schema_name: row.get(5)?,
        description: row.get(6)?,
    })
}

fn row_to_column(row: &rusqlite::Row<'_>) -> SqliteResult<Column> {
    Ok(Column {
        id: row.get(0)?,
        name: row.get(1)?,
        table_id: row.get(2)?,
        data_type: row.get(3)?,
        description: row.get(4)?,
    })
}
