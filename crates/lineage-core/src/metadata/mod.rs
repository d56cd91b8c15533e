//! Metadata Store
//!
//! The lineage engine reads data sources, tables and columns through the
//! [`MetadataStore`] trait. It validates references against it and decorates
//! graph nodes with names; it never creates or deletes metadata itself.
//!
//! - [`SqliteMetadataStore`]: SQLite-backed store, also the write path for metadata
//! - [`CachedMetadataStore`]: bounded LRU cache over any store

pub mod cache;
pub mod sqlite;

pub use cache::{CacheMetrics, CachedMetadataStore};
pub use sqlite::SqliteMetadataStore;

use crate::error::Result;
use crate::model::{Column, ColumnId, DataSource, DataSourceId, Table, TableId};

/// Read access to metadata entities.
pub trait MetadataStore: Send + Sync {
    fn data_source(&self, id: DataSourceId) -> Result<Option<DataSource>>;

    fn data_source_by_name(&self, name: &str) -> Result<Option<DataSource>>;

    fn table(&self, id: TableId) -> Result<Option<Table>>;

    /// Look up a table by name within its data source
    fn table_by_name(&self, data_source_id: DataSourceId, name: &str) -> Result<Option<Table>>;

    fn column(&self, id: ColumnId) -> Result<Option<Column>>;

    /// Look up a column by name within its table
    fn column_by_name(&self, table_id: TableId, name: &str) -> Result<Option<Column>>;

    /// All columns of a table, ascending id order
    fn columns_of(&self, table_id: TableId) -> Result<Vec<Column>>;

    fn table_exists(&self, id: TableId) -> Result<bool> {
        Ok(self.table(id)?.is_some())
    }

    fn column_exists(&self, id: ColumnId) -> Result<bool> {
        Ok(self.column(id)?.is_some())
    }
}

/// Existence checks consulted before metadata is deleted.
///
/// Implemented by the lineage repository so the metadata delete path can
/// refuse to remove tables or columns that lineage edges still reference.
pub trait ReferenceCheck {
    fn table_is_referenced(&self, table_id: TableId) -> Result<bool>;

    fn column_is_referenced(&self, column_id: ColumnId) -> Result<bool>;
}
