//! SQLite Schema Definitions
//!
//! The metadata tables (`data_sources`, `tables`, `columns`) and the lineage
//! tables live in the same database file but are created and versioned
//! independently, because each component opens its own connection.

/// Schema version of the metadata tables
pub const METADATA_SCHEMA_VERSION: &str = "1.0";

/// Schema version of the lineage tables
pub const LINEAGE_SCHEMA_VERSION: &str = "1.0";

/// Key under which the metadata schema version is stored
pub const METADATA_VERSION_KEY: &str = "metadata_schema_version";

/// Key under which the lineage schema version is stored
pub const LINEAGE_VERSION_KEY: &str = "lineage_schema_version";

/// Key/value table shared by both components.
pub const SCHEMA_CREATE_STORE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS store_metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
"#;

// ============================================================================
// Metadata Store
// ============================================================================

pub const SCHEMA_CREATE_METADATA_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS data_sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    -- oracle | elasticsearch | mongodb
    source_type TEXT NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS tables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    data_source_id INTEGER NOT NULL REFERENCES data_sources(id),
    schema_name TEXT,
    description TEXT,
    UNIQUE(data_source_id, name)
);

CREATE TABLE IF NOT EXISTS columns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    table_id INTEGER NOT NULL REFERENCES tables(id),
    data_type TEXT NOT NULL,
    description TEXT,
    UNIQUE(table_id, name)
);

CREATE INDEX IF NOT EXISTS idx_tables_data_source ON tables(data_source_id);
CREATE INDEX IF NOT EXISTS idx_columns_table ON columns(table_id);
"#;

/// Column names for table queries, joined with the owning data source
pub const TABLE_SELECT: &str = "SELECT t.id, t.name, t.data_source_id, d.name, d.source_type, \
     t.schema_name, t.description \
     FROM tables t LEFT JOIN data_sources d ON d.id = t.data_source_id";

/// Column names for column queries (in order for row mapping)
pub const COLUMN_COLUMNS: &str = "id, name, table_id, data_type, description";

// ============================================================================
// Lineage Repository
// ============================================================================

pub const SCHEMA_CREATE_LINEAGE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS table_lineage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    target_table_id INTEGER NOT NULL,
    relation_type TEXT NOT NULL,
    description TEXT,
    -- JSON object
    relation_details TEXT,
    -- Milliseconds since the Unix epoch
    created_at INTEGER NOT NULL
);

-- Ordered source list of a table lineage edge
CREATE TABLE IF NOT EXISTS table_lineage_sources (
    edge_id INTEGER NOT NULL REFERENCES table_lineage(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    source_table_id INTEGER NOT NULL,
    PRIMARY KEY (edge_id, position),
    UNIQUE (edge_id, source_table_id)
);

CREATE TABLE IF NOT EXISTS column_lineage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    lineage_relation_id INTEGER NOT NULL REFERENCES table_lineage(id),
    source_column_id INTEGER NOT NULL,
    target_column_id INTEGER NOT NULL,
    -- JSON object
    transformation_details TEXT,
    UNIQUE (source_column_id, target_column_id)
);

CREATE INDEX IF NOT EXISTS idx_table_lineage_target ON table_lineage(target_table_id);
CREATE INDEX IF NOT EXISTS idx_table_lineage_sources_table ON table_lineage_sources(source_table_id);
CREATE INDEX IF NOT EXISTS idx_column_lineage_relation ON column_lineage(lineage_relation_id);
CREATE INDEX IF NOT EXISTS idx_column_lineage_target ON column_lineage(target_column_id);
"#;

/// Column names for table edge queries (in order for row mapping)
pub const TABLE_EDGE_COLUMNS: &str =
    "id, target_table_id, relation_type, description, relation_details, created_at";

/// Column names for column edge queries (in order for row mapping)
pub const COLUMN_EDGE_COLUMNS: &str =
    "id, lineage_relation_id, source_column_id, target_column_id, transformation_details";

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_schema_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(SCHEMA_CREATE_STORE_METADATA, []).unwrap();
        conn.execute_batch(SCHEMA_CREATE_METADATA_TABLES).unwrap();
        conn.execute_batch(SCHEMA_CREATE_LINEAGE_TABLES).unwrap();

        let tables = table_names(&conn);
        for expected in [
            "column_lineage",
            "columns",
            "data_sources",
            "store_metadata",
            "table_lineage",
            "table_lineage_sources",
            "tables",
        ] {
            assert!(tables.contains(&expected.to_string()), "{expected} missing");
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_CREATE_LINEAGE_TABLES).unwrap();
        conn.execute_batch(SCHEMA_CREATE_LINEAGE_TABLES).unwrap();
    }

    #[test]
    fn test_duplicate_column_pair_rejected_by_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_CREATE_LINEAGE_TABLES).unwrap();
        conn.execute(
            "INSERT INTO table_lineage (target_table_id, relation_type, created_at) VALUES (2, 'ETL', 0)",
            [],
        )
        .unwrap();
        let insert = "INSERT INTO column_lineage (lineage_relation_id, source_column_id, target_column_id) VALUES (1, 10, 20)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
