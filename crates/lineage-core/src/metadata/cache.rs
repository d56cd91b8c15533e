//! Metadata Cache
//!
//! Bounded LRU cache over any [`MetadataStore`]. Graph assembly looks up the
//! same tables and columns many times per traversal; the cache keeps those
//! point lookups off the database.
//!
//! Entries are only ever removed by LRU eviction or by explicit invalidation,
//! so writers must call [`CachedMetadataStore::invalidate_table`] /
//! [`CachedMetadataStore::invalidate_column`] after changing metadata.
//! Thread-safe via interior mutability using parking_lot::Mutex.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::MetadataStore;
use crate::error::Result;
use crate::model::{Column, ColumnId, DataSource, DataSourceId, Table, TableId};

/// Default number of entries kept per entity kind
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

impl CacheMetrics {
    /// Get hit rate as a fraction (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState {
    data_sources: LruCache<DataSourceId, DataSource>,
    tables: LruCache<TableId, Table>,
    columns: LruCache<ColumnId, Column>,
    metrics: CacheMetrics,
}

/// LRU-cached view of a metadata store.
pub struct CachedMetadataStore {
    inner: Arc<dyn MetadataStore>,
    capacity: NonZeroUsize,
    state: Mutex<CacheState>,
}

impl CachedMetadataStore {
    /// Wrap `inner`, keeping at most `capacity` entries per entity kind.
    pub fn new(inner: Arc<dyn MetadataStore>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            capacity,
            state: Mutex::new(CacheState {
                data_sources: LruCache::new(capacity),
                tables: LruCache::new(capacity),
                columns: LruCache::new(capacity),
                metrics: CacheMetrics::default(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Get a snapshot of cache metrics
    pub fn metrics(&self) -> CacheMetrics {
        self.state.lock().metrics.clone()
    }

    /// Number of cached tables and columns
    pub fn len(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.tables.len(), state.columns.len())
    }

    /// Drop a table and every cached column belonging to it.
    pub fn invalidate_table(&self, table_id: TableId) {
        let mut state = self.state.lock();
        state.tables.pop(&table_id);
        let stale: Vec<ColumnId> = state
            .columns
            .iter()
            .filter(|(_, column)| column.table_id == table_id)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            state.columns.pop(&id);
        }
        state.metrics.invalidations += 1;
        debug!(table_id, "Invalidated cached table");
    }

    pub fn invalidate_column(&self, column_id: ColumnId) {
        let mut state = self.state.lock();
        state.columns.pop(&column_id);
        state.metrics.invalidations += 1;
    }

    /// Drop every cached entry. Metrics are kept.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.data_sources.clear();
        state.tables.clear();
        state.columns.clear();
        state.metrics.invalidations += 1;
    }

    fn remember_table(&self, table: &Table) {
        self.state.lock().tables.put(table.id, table.clone());
    }

    fn remember_column(&self, column: &Column) {
        self.state.lock().columns.put(column.id, column.clone());
    }
}

impl MetadataStore for CachedMetadataStore {
    fn data_source(&self, id: DataSourceId) -> Result<Option<DataSource>> {
        {
            let mut state = self.state.lock();
            if let Some(ds) = state.data_sources.get(&id).cloned() {
                state.metrics.hits += 1;
                return Ok(Some(ds));
            }
            state.metrics.misses += 1;
        }
        let found = self.inner.data_source(id)?;
        if let Some(ds) = &found {
            self.state.lock().data_sources.put(ds.id, ds.clone());
        }
        Ok(found)
    }

    fn data_source_by_name(&self, name: &str) -> Result<Option<DataSource>> {
        self.inner.data_source_by_name(name)
    }

    fn table(&self, id: TableId) -> Result<Option<Table>> {
        {
            let mut state = self.state.lock();
            if let Some(table) = state.tables.get(&id).cloned() {
                state.metrics.hits += 1;
                return Ok(Some(table));
            }
            state.metrics.misses += 1;
        }
        let found = self.inner.table(id)?;
        if let Some(table) = &found {
            self.remember_table(table);
        }
        Ok(found)
    }

    fn table_by_name(&self, data_source_id: DataSourceId, name: &str) -> Result<Option<Table>> {
        let found = self.inner.table_by_name(data_source_id, name)?;
        if let Some(table) = &found {
            self.remember_table(table);
        }
        Ok(found)
    }

    fn column(&self, id: ColumnId) -> Result<Option<Column>> {
        {
            let mut state = self.state.lock();
            if let Some(column) = state.columns.get(&id).cloned() {
                state.metrics.hits += 1;
                return Ok(Some(column));
            }
            state.metrics.misses += 1;
        }
        let found = self.inner.column(id)?;
        if let Some(column) = &found {
            self.remember_column(column);
        }
        Ok(found)
    }

    fn column_by_name(&self, table_id: TableId, name: &str) -> Result<Option<Column>> {
        let found = self.inner.column_by_name(table_id, name)?;
        if let Some(column) = &found {
            self.remember_column(column);
        }
        Ok(found)
    }

    fn columns_of(&self, table_id: TableId) -> Result<Vec<Column>> {
        let columns = self.inner.columns_of(table_id)?;
        let mut state = self.state.lock();
        for column in &columns {
            state.columns.put(column.id, column.clone());
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SqliteMetadataStore;
    use crate::model::DataSourceType;

    fn seeded() -> (Arc<SqliteMetadataStore>, Table, Column) {
        let store = Arc::new(SqliteMetadataStore::in_memory().unwrap());
        let ds = store
            .add_data_source("dwh", DataSourceType::Oracle, None)
            .unwrap();
        let table = store.add_table(ds.id, "orders", None, None).unwrap();
        let column = store.add_column(table.id, "id", "NUMBER", None).unwrap();
        (store, table, column)
    }

    #[test]
    fn test_hits_and_misses() {
        let (store, table, _) = seeded();
        let cache = CachedMetadataStore::new(store, 8);

        assert_eq!(cache.table(table.id).unwrap(), Some(table.clone()));
        assert_eq!(cache.table(table.id).unwrap(), Some(table.clone()));
        assert!(cache.table(999).unwrap().is_none());

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 2);
        assert!((metrics.hit_rate() - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_capacity_bound() {
        let (store, table, _) = seeded();
        for i in 0..5 {
            store
                .add_column(table.id, &format!("c{i}"), "VARCHAR2", None)
                .unwrap();
        }
        let cache = CachedMetadataStore::new(store, 3);
        cache.columns_of(table.id).unwrap();
        assert_eq!(cache.len().1, 3);
        assert_eq!(cache.capacity(), 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (store, _, _) = seeded();
        let cache = CachedMetadataStore::new(store, 0);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_invalidate_table_drops_its_columns() {
        let (store, table, column) = seeded();
        let cache = CachedMetadataStore::new(store.clone(), 8);
        cache.table(table.id).unwrap();
        cache.column(column.id).unwrap();
        assert_eq!(cache.len(), (1, 1));

        cache.invalidate_table(table.id);
        assert_eq!(cache.len(), (0, 0));
        assert_eq!(cache.metrics().invalidations, 1);
    }

    #[test]
    fn test_stale_entry_until_invalidated() {
        let (store, table, column) = seeded();
        let cache = CachedMetadataStore::new(store.clone(), 8);
        cache.column(column.id).unwrap();

        struct NoRefs;
        impl crate::metadata::ReferenceCheck for NoRefs {
            fn table_is_referenced(&self, _: TableId) -> Result<bool> {
                Ok(false)
            }
            fn column_is_referenced(&self, _: ColumnId) -> Result<bool> {
                Ok(false)
            }
        }
        store.remove_table(table.id, &NoRefs).unwrap();

        assert!(cache.column(column.id).unwrap().is_some());
        cache.clear();
        assert!(cache.column(column.id).unwrap().is_none());
    }
}
