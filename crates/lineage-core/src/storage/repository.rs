//! Lineage Repository
//!
//! Sole writer of table and column lineage edges. Every reference is checked
//! against the [`MetadataStore`] before a write is committed, and every write
//! runs in one SQLite transaction so readers never observe a half-written edge.
//!
//! Retrieval always returns edges in ascending id order.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Transaction};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::schema::{
    COLUMN_EDGE_COLUMNS, LINEAGE_SCHEMA_VERSION, LINEAGE_VERSION_KEY, SCHEMA_CREATE_LINEAGE_TABLES,
    TABLE_EDGE_COLUMNS,
};
use super::{ensure_schema, open_connection, open_in_memory};
use crate::error::{Entity, InvalidReference, LineageError, ReferenceRole, Result};
use crate::metadata::{MetadataStore, ReferenceCheck};
use crate::model::{
    normalize_table_ids, now_millis, Column, ColumnEdgeId, ColumnId, ColumnLineageEdge,
    ColumnLineagePatch, Details, NewColumnLineage, NewTableLineage, TableEdgeId, TableId,
    TableLineageEdge, TableLineagePatch, DEFAULT_RELATION_TYPE,
};

/// Filter for [`LineageRepository::list_table_edges`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableEdgeFilter {
    pub source_table_id: Option<TableId>,
    pub target_table_id: Option<TableId>,
    pub skip: usize,
    pub limit: Option<usize>,
}

/// Filter for [`LineageRepository::list_column_edges`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnEdgeFilter {
    pub lineage_relation_id: Option<TableEdgeId>,
    pub source_column_id: Option<ColumnId>,
    pub target_column_id: Option<ColumnId>,
    pub skip: usize,
    pub limit: Option<usize>,
}

/// Repository-wide counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryStats {
    pub table_edges: usize,
    pub column_edges: usize,
    /// Distinct tables referenced by any table edge
    pub tables: usize,
}

/// SQLite-backed store of lineage edges.
///
/// Lock order: `conn` is never held while calling into the metadata store,
/// since the metadata delete path calls back into this repository.
pub struct LineageRepository {
    conn: Mutex<Connection>,
    metadata: Arc<dyn MetadataStore>,
    default_relation_type: String,
}

impl LineageRepository {
    /// Open (or create) the lineage tables in a database file
    pub fn open(path: &Path, metadata: Arc<dyn MetadataStore>) -> Result<Self> {
        Self::with_connection(open_connection(path)?, metadata)
    }

    /// Create a repository over a private in-memory database (for testing)
    pub fn in_memory(metadata: Arc<dyn MetadataStore>) -> Result<Self> {
        Self::with_connection(open_in_memory()?, metadata)
    }

    fn with_connection(conn: Connection, metadata: Arc<dyn MetadataStore>) -> Result<Self> {
        ensure_schema(
            &conn,
            SCHEMA_CREATE_LINEAGE_TABLES,
            LINEAGE_VERSION_KEY,
            LINEAGE_SCHEMA_VERSION,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            metadata,
            default_relation_type: DEFAULT_RELATION_TYPE.to_string(),
        })
    }

    /// Relation type stamped on table edges created without one
    pub fn with_default_relation_type(mut self, relation_type: impl Into<String>) -> Self {
        let relation_type = relation_type.into();
        if !relation_type.trim().is_empty() {
            self.default_relation_type = relation_type;
        }
        self
    }

    pub fn default_relation_type(&self) -> &str {
        &self.default_relation_type
    }

    /// The metadata store references are validated against
    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    // =========================================================================
    // Table Lineage Writes
    // =========================================================================

    /// Create a table lineage edge.
    ///
    /// Sources are de-duplicated keeping first occurrence order. Fails with
    /// `ValidationFailed` for an empty source list and with `InvalidReference`
    /// naming every source/target id that does not resolve.
    pub fn create_table_edge(&self, request: NewTableLineage) -> Result<TableLineageEdge> {
        let sources = normalize_sources(&request.source_table_ids)?;
        self.check_tables(Some(&sources), Some(request.target_table_id))?;

        let relation_type = request
            .relation_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.default_relation_type.clone());
        let details = encode_details(request.relation_details.as_ref())?;
        let created_at = now_millis();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO table_lineage (target_table_id, relation_type, description, relation_details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                request.target_table_id,
                relation_type,
                request.description,
                details,
                created_at as i64
            ],
        )?;
        let id = tx.last_insert_rowid();
        insert_sources(&tx, id, &sources)?;
        tx.commit()?;

        info!(
            edge_id = id,
            target = request.target_table_id,
            sources = ?sources,
            "Created table lineage"
        );

        Ok(TableLineageEdge {
            id,
            source_table_ids: sources,
            target_table_id: request.target_table_id,
            relation_type,
            description: request.description,
            relation_details: request.relation_details,
            created_at,
        })
    }

    /// Apply a partial update to a table lineage edge.
    ///
    /// Changed references are validated before anything is written; the
    /// update is all-or-nothing. A new source set or target must still cover
    /// every column edge under this edge, otherwise `ValidationFailed` names
    /// the column edges that would no longer fit.
    pub fn update_table_edge(
        &self,
        id: TableEdgeId,
        patch: TableLineagePatch,
    ) -> Result<TableLineageEdge> {
        self.require_table_edge(id)?;
        let sources = match &patch.source_table_ids {
            Some(ids) => Some(normalize_sources(ids)?),
            None => None,
        };
        self.check_tables(sources.as_deref(), patch.target_table_id)?;
        let details = encode_details(patch.relation_details.as_ref())?;
        let reshapes = sources.is_some() || patch.target_table_id.is_some();

        // Column tables come from the metadata store, which must not be
        // called under `conn`. A column edge added between the lookup and
        // the lock sends the loop round again.
        let mut column_tables = HashMap::new();
        if reshapes {
            let edges = self.column_edges_by_lineage_relation(id)?;
            self.resolve_column_tables(&edges, &mut column_tables)?;
        }
        let mut conn = loop {
            let conn = self.conn.lock();
            let Some(current) = query_table_edge(&conn, id)? else {
                return Err(LineageError::not_found(Entity::TableLineage, id));
            };
            if reshapes {
                let edges = query_column_edges(
                    &conn,
                    &ColumnEdgeFilter {
                        lineage_relation_id: Some(id),
                        ..Default::default()
                    },
                )?;
                let unresolved = edges.iter().any(|e| {
                    !column_tables.contains_key(&e.source_column_id)
                        || !column_tables.contains_key(&e.target_column_id)
                });
                if unresolved {
                    drop(conn);
                    self.resolve_column_tables(&edges, &mut column_tables)?;
                    continue;
                }
                check_column_edges_fit(
                    id,
                    &edges,
                    &column_tables,
                    sources.as_deref().unwrap_or(current.source_table_ids.as_slice()),
                    patch.target_table_id.unwrap_or(current.target_table_id),
                )?;
            }
            break conn;
        };

        let tx = conn.transaction()?;
        if let Some(target) = patch.target_table_id {
            tx.execute(
                "UPDATE table_lineage SET target_table_id = ?1 WHERE id = ?2",
                params![target, id],
            )?;
        }
        if let Some(relation_type) = patch.relation_type.as_ref().filter(|t| !t.trim().is_empty()) {
            tx.execute(
                "UPDATE table_lineage SET relation_type = ?1 WHERE id = ?2",
                params![relation_type, id],
            )?;
        }
        if let Some(description) = &patch.description {
            tx.execute(
                "UPDATE table_lineage SET description = ?1 WHERE id = ?2",
                params![description, id],
            )?;
        }
        if details.is_some() {
            tx.execute(
                "UPDATE table_lineage SET relation_details = ?1 WHERE id = ?2",
                params![details, id],
            )?;
        }
        if let Some(sources) = &sources {
            tx.execute("DELETE FROM table_lineage_sources WHERE edge_id = ?1", [id])?;
            insert_sources(&tx, id, sources)?;
        }
        tx.commit()?;

        info!(edge_id = id, "Updated table lineage");
        query_table_edge(&conn, id)?.ok_or_else(|| LineageError::not_found(Entity::TableLineage, id))
    }

    /// Delete a table lineage edge and, first, all of its column edges.
    ///
    /// Returns the number of column edges removed.
    pub fn delete_table_edge(&self, id: TableEdgeId) -> Result<usize> {
        let mut conn = self.conn.lock();
        if query_table_edge(&conn, id)?.is_none() {
            return Err(LineageError::not_found(Entity::TableLineage, id));
        }

        let tx = conn.transaction()?;
        let cascaded = tx.execute(
            "DELETE FROM column_lineage WHERE lineage_relation_id = ?1",
            [id],
        )?;
        tx.execute("DELETE FROM table_lineage_sources WHERE edge_id = ?1", [id])?;
        tx.execute("DELETE FROM table_lineage WHERE id = ?1", [id])?;
        tx.commit()?;

        info!(edge_id = id, cascaded, "Deleted table lineage");
        Ok(cascaded)
    }

    // =========================================================================
    // Table Lineage Reads
    // =========================================================================

    pub fn table_edge(&self, id: TableEdgeId) -> Result<Option<TableLineageEdge>> {
        query_table_edge(&self.conn.lock(), id)
    }

    /// Edges whose source set contains `table_id`
    pub fn edges_by_source(&self, table_id: TableId) -> Result<Vec<TableLineageEdge>> {
        self.list_table_edges(&TableEdgeFilter {
            source_table_id: Some(table_id),
            ..Default::default()
        })
    }

    /// Edges producing `table_id`
    pub fn edges_by_target(&self, table_id: TableId) -> Result<Vec<TableLineageEdge>> {
        self.list_table_edges(&TableEdgeFilter {
            target_table_id: Some(table_id),
            ..Default::default()
        })
    }

    /// Edges producing `target` whose source set contains every id in `sources`
    pub fn edges_by_target_from(
        &self,
        target: TableId,
        sources: &[TableId],
    ) -> Result<Vec<TableLineageEdge>> {
        let mut edges = self.edges_by_target(target)?;
        edges.retain(|edge| edge.has_all_sources(sources));
        Ok(edges)
    }

    /// Every table edge, ascending id
    pub fn all_table_edges(&self) -> Result<Vec<TableLineageEdge>> {
        self.list_table_edges(&TableEdgeFilter::default())
    }

    pub fn list_table_edges(&self, filter: &TableEdgeFilter) -> Result<Vec<TableLineageEdge>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TABLE_EDGE_COLUMNS} FROM table_lineage
             WHERE (?1 IS NULL OR target_table_id = ?1)
               AND (?2 IS NULL OR id IN
                    (SELECT edge_id FROM table_lineage_sources WHERE source_table_id = ?2))
             ORDER BY id LIMIT ?3 OFFSET ?4"
        ))?;
        let mut edges = stmt
            .query_map(
                params![
                    filter.target_table_id,
                    filter.source_table_id,
                    sql_limit(filter.limit),
                    filter.skip as i64
                ],
                row_to_table_edge,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        attach_sources(&conn, &mut edges)?;
        Ok(edges)
    }

    // =========================================================================
    // Column Lineage Writes
    // =========================================================================

    /// Create a column lineage edge under an existing table edge.
    ///
    /// Checked in order: owning edge exists, both columns exist, the source
    /// column's table is one of the edge's sources, the target column's table
    /// is the edge's target, and the column pair is not already mapped.
    pub fn create_column_edge(&self, request: NewColumnLineage) -> Result<ColumnLineageEdge> {
        self.require_table_edge(request.lineage_relation_id)?;
        let (source, target) =
            self.resolve_columns(request.source_column_id, request.target_column_id)?;
        let details = encode_details(request.transformation_details.as_ref())?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        check_column_membership(&tx, request.lineage_relation_id, &source, &target, None)?;
        tx.execute(
            "INSERT INTO column_lineage (lineage_relation_id, source_column_id, target_column_id, transformation_details)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                request.lineage_relation_id,
                source.id,
                target.id,
                details
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(
            edge_id = id,
            lineage_relation_id = request.lineage_relation_id,
            source = source.id,
            target = target.id,
            "Created column lineage"
        );

        Ok(ColumnLineageEdge {
            id,
            lineage_relation_id: request.lineage_relation_id,
            source_column_id: source.id,
            target_column_id: target.id,
            transformation_details: request.transformation_details,
        })
    }

    /// Apply a partial update to a column lineage edge.
    ///
    /// The effective (patched) edge is re-validated with the same rules as
    /// [`create_column_edge`](Self::create_column_edge), excluding itself from
    /// the duplicate-pair check. Validation and the write share one
    /// transaction.
    pub fn update_column_edge(
        &self,
        id: ColumnEdgeId,
        patch: ColumnLineagePatch,
    ) -> Result<ColumnLineageEdge> {
        let mut existing = self
            .column_edge(id)?
            .ok_or_else(|| LineageError::not_found(Entity::ColumnLineage, id))?;

        loop {
            let lineage_relation_id = patch
                .lineage_relation_id
                .unwrap_or(existing.lineage_relation_id);
            let source_column_id = patch.source_column_id.unwrap_or(existing.source_column_id);
            let target_column_id = patch.target_column_id.unwrap_or(existing.target_column_id);

            let columns = if patch.changes_references() {
                self.require_table_edge(lineage_relation_id)?;
                Some(self.resolve_columns(source_column_id, target_column_id)?)
            } else {
                None
            };

            let mut conn = self.conn.lock();
            let current = query_column_edge(&conn, id)?
                .ok_or_else(|| LineageError::not_found(Entity::ColumnLineage, id))?;
            if !current.same_references(&existing) {
                // Moved since it was read; resolve the new ids without the lock
                drop(conn);
                existing = current;
                continue;
            }

            let transformation_details = patch
                .transformation_details
                .clone()
                .or(current.transformation_details);
            let details = encode_details(transformation_details.as_ref())?;

            let tx = conn.transaction()?;
            if let Some((source, target)) = &columns {
                check_column_membership(&tx, lineage_relation_id, source, target, Some(id))?;
            }
            tx.execute(
                "UPDATE column_lineage SET lineage_relation_id = ?1, source_column_id = ?2,
                        target_column_id = ?3, transformation_details = ?4
                 WHERE id = ?5",
                params![
                    lineage_relation_id,
                    source_column_id,
                    target_column_id,
                    details,
                    id
                ],
            )?;
            tx.commit()?;

            info!(edge_id = id, "Updated column lineage");
            return Ok(ColumnLineageEdge {
                id,
                lineage_relation_id,
                source_column_id,
                target_column_id,
                transformation_details,
            });
        }
    }

    pub fn delete_column_edge(&self, id: ColumnEdgeId) -> Result<()> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM column_lineage WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(LineageError::not_found(Entity::ColumnLineage, id));
        }
        info!(edge_id = id, "Deleted column lineage");
        Ok(())
    }

    // =========================================================================
    // Column Lineage Reads
    // =========================================================================

    pub fn column_edge(&self, id: ColumnEdgeId) -> Result<Option<ColumnLineageEdge>> {
        query_column_edge(&self.conn.lock(), id)
    }

    /// Column edges anchored to one table edge
    pub fn column_edges_by_lineage_relation(
        &self,
        lineage_relation_id: TableEdgeId,
    ) -> Result<Vec<ColumnLineageEdge>> {
        self.list_column_edges(&ColumnEdgeFilter {
            lineage_relation_id: Some(lineage_relation_id),
            ..Default::default()
        })
    }

    pub fn column_edges_by_source_column(
        &self,
        column_id: ColumnId,
    ) -> Result<Vec<ColumnLineageEdge>> {
        self.list_column_edges(&ColumnEdgeFilter {
            source_column_id: Some(column_id),
            ..Default::default()
        })
    }

    pub fn column_edges_by_target_column(
        &self,
        column_id: ColumnId,
    ) -> Result<Vec<ColumnLineageEdge>> {
        self.list_column_edges(&ColumnEdgeFilter {
            target_column_id: Some(column_id),
            ..Default::default()
        })
    }

    pub fn all_column_edges(&self) -> Result<Vec<ColumnLineageEdge>> {
        self.list_column_edges(&ColumnEdgeFilter::default())
    }

    pub fn list_column_edges(&self, filter: &ColumnEdgeFilter) -> Result<Vec<ColumnLineageEdge>> {
        query_column_edges(&self.conn.lock(), filter)
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub fn stats(&self) -> Result<RepositoryStats> {
        let conn = self.conn.lock();
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(RepositoryStats {
            table_edges: count("SELECT COUNT(*) FROM table_lineage")?,
            column_edges: count("SELECT COUNT(*) FROM column_lineage")?,
            tables: count(
                "SELECT COUNT(*) FROM (SELECT target_table_id FROM table_lineage
                 UNION SELECT source_table_id FROM table_lineage_sources)",
            )?,
        })
    }

    // =========================================================================
    // Validation Helpers
    // =========================================================================

    /// Collect every table id that fails to resolve.
    fn check_tables(&self, sources: Option<&[TableId]>, target: Option<TableId>) -> Result<()> {
        let mut invalid = Vec::new();
        for &id in sources.unwrap_or_default() {
            if !self.metadata.table_exists(id)? {
                invalid.push(InvalidReference {
                    role: ReferenceRole::Source,
                    entity: Entity::Table,
                    id,
                });
            }
        }
        if let Some(id) = target {
            if !self.metadata.table_exists(id)? {
                invalid.push(InvalidReference {
                    role: ReferenceRole::Target,
                    entity: Entity::Table,
                    id,
                });
            }
        }

        if invalid.is_empty() {
            Ok(())
        } else {
            debug!(count = invalid.len(), "Rejected invalid table references");
            Err(LineageError::InvalidReference { references: invalid })
        }
    }

    fn require_table_edge(&self, id: TableEdgeId) -> Result<()> {
        if query_table_edge_exists(&self.conn.lock(), id)? {
            Ok(())
        } else {
            Err(LineageError::not_found(Entity::TableLineage, id))
        }
    }

    fn resolve_columns(&self, source: ColumnId, target: ColumnId) -> Result<(Column, Column)> {
        let source_column = self.metadata.column(source)?;
        let target_column = self.metadata.column(target)?;
        match (source_column, target_column) {
            (Some(s), Some(t)) => Ok((s, t)),
            (s, t) => {
                let mut references = Vec::new();
                if s.is_none() {
                    references.push(InvalidReference {
                        role: ReferenceRole::Source,
                        entity: Entity::Column,
                        id: source,
                    });
                }
                if t.is_none() {
                    references.push(InvalidReference {
                        role: ReferenceRole::Target,
                        entity: Entity::Column,
                        id: target,
                    });
                }
                Err(LineageError::InvalidReference { references })
            }
        }
    }

    /// Look up the owning table of every column named by `edges` that is
    /// not in `known` yet.
    fn resolve_column_tables(
        &self,
        edges: &[ColumnLineageEdge],
        known: &mut HashMap<ColumnId, Option<TableId>>,
    ) -> Result<()> {
        for edge in edges {
            for column_id in [edge.source_column_id, edge.target_column_id] {
                if !known.contains_key(&column_id) {
                    let table = self.metadata.column(column_id)?.map(|c| c.table_id);
                    known.insert(column_id, table);
                }
            }
        }
        Ok(())
    }
}

impl ReferenceCheck for LineageRepository {
    /// Whether any table edge names the table as a source or target
    fn table_is_referenced(&self, table_id: TableId) -> Result<bool> {
        let conn = self.conn.lock();
        let referenced: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM table_lineage WHERE target_table_id = ?1)
                 OR EXISTS(SELECT 1 FROM table_lineage_sources WHERE source_table_id = ?1)",
            [table_id],
            |row| row.get(0),
        )?;
        Ok(referenced)
    }

    /// Whether any column edge names the column as a source or target
    fn column_is_referenced(&self, column_id: ColumnId) -> Result<bool> {
        let conn = self.conn.lock();
        let referenced: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM column_lineage
                           WHERE source_column_id = ?1 OR target_column_id = ?1)",
            [column_id],
            |row| row.get(0),
        )?;
        Ok(referenced)
    }
}

// ============================================================================
// Row Mapping and Queries
// ============================================================================

fn normalize_sources(ids: &[TableId]) -> Result<Vec<TableId>> {
    let sources = normalize_table_ids(ids);
    if sources.is_empty() {
        return Err(LineageError::validation(
            "table lineage requires at least one source table",
        ));
    }
    Ok(sources)
}

fn sql_limit(limit: Option<usize>) -> i64 {
    // SQLite treats a negative LIMIT as unbounded
    limit.map(|l| l as i64).unwrap_or(-1)
}

fn encode_details(details: Option<&Details>) -> Result<Option<String>> {
    Ok(match details {
        Some(d) => Some(serde_json::to_string(d)?),
        None => None,
    })
}

/// Malformed stored payloads read back as absent.
fn decode_details(raw: Option<String>, entity: Entity, id: i64) -> Option<Details> {
    let raw = raw?;
    match serde_json::from_str::<Details>(&raw) {
        Ok(details) => Some(details),
        Err(e) => {
            warn!(%entity, id, error = %e, "Ignoring malformed stored details payload");
            None
        }
    }
}

fn insert_sources(tx: &Transaction<'_>, edge_id: TableEdgeId, sources: &[TableId]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO table_lineage_sources (edge_id, position, source_table_id) VALUES (?1, ?2, ?3)",
    )?;
    for (position, source) in sources.iter().enumerate() {
        stmt.execute(params![edge_id, position as i64, source])?;
    }
    Ok(())
}

fn query_table_edge_exists(conn: &Connection, id: TableEdgeId) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM table_lineage WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn query_table_edge(conn: &Connection, id: TableEdgeId) -> Result<Option<TableLineageEdge>> {
    let edge = conn
        .query_row(
            &format!("SELECT {TABLE_EDGE_COLUMNS} FROM table_lineage WHERE id = ?1"),
            [id],
            row_to_table_edge,
        )
        .optional()?;
    match edge {
        Some(mut edge) => {
            edge.source_table_ids = query_sources(conn, id)?;
            Ok(Some(edge))
        }
        None => Ok(None),
    }
}

fn query_sources(conn: &Connection, edge_id: TableEdgeId) -> Result<Vec<TableId>> {
    let mut stmt = conn.prepare(
        "SELECT source_table_id FROM table_lineage_sources WHERE edge_id = ?1 ORDER BY position",
    )?;
    let ids = stmt
        .query_map([edge_id], |row| row.get(0))?
        .collect::<SqliteResult<Vec<TableId>>>()?;
    Ok(ids)
}

/// Fill in source lists for a batch of edges with one query.
fn attach_sources(conn: &Connection, edges: &mut [TableLineageEdge]) -> Result<()> {
    if edges.is_empty() {
        return Ok(());
    }
    if edges.len() == 1 {
        edges[0].source_table_ids = query_sources(conn, edges[0].id)?;
        return Ok(());
    }

    let mut by_edge: HashMap<TableEdgeId, Vec<TableId>> = HashMap::with_capacity(edges.len());
    let mut stmt = conn.prepare(
        "SELECT edge_id, source_table_id FROM table_lineage_sources ORDER BY edge_id, position",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (edge_id, source) = row?;
        by_edge.entry(edge_id).or_default().push(source);
    }

    for edge in edges.iter_mut() {
        edge.source_table_ids = by_edge.remove(&edge.id).unwrap_or_default();
    }
    Ok(())
}

fn query_column_edge(conn: &Connection, id: ColumnEdgeId) -> Result<Option<ColumnLineageEdge>> {
    let edge = conn
        .query_row(
            &format!("SELECT {COLUMN_EDGE_COLUMNS} FROM column_lineage WHERE id = ?1"),
            [id],
            row_to_column_edge,
        )
        .optional()?;
    Ok(edge)
}

fn query_column_edges(
    conn: &Connection,
    filter: &ColumnEdgeFilter,
) -> Result<Vec<ColumnLineageEdge>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMN_EDGE_COLUMNS} FROM column_lineage
         WHERE (?1 IS NULL OR lineage_relation_id = ?1)
           AND (?2 IS NULL OR source_column_id = ?2)
           AND (?3 IS NULL OR target_column_id = ?3)
         ORDER BY id LIMIT ?4 OFFSET ?5"
    ))?;
    let edges = stmt
        .query_map(
            params![
                filter.lineage_relation_id,
                filter.source_column_id,
                filter.target_column_id,
                sql_limit(filter.limit),
                filter.skip as i64
            ],
            row_to_column_edge,
        )?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(edges)
}

/// Reject a new source set or target that strands column edges of `edge_id`.
///
/// Columns missing from the metadata store are not held against the edge.
fn check_column_edges_fit(
    edge_id: TableEdgeId,
    edges: &[ColumnLineageEdge],
    column_tables: &HashMap<ColumnId, Option<TableId>>,
    sources: &[TableId],
    target: TableId,
) -> Result<()> {
    let table_of = |column: ColumnId| column_tables.get(&column).copied().flatten();
    let stranded: Vec<String> = edges
        .iter()
        .filter(|edge| {
            let source_fits = table_of(edge.source_column_id).is_none_or(|t| sources.contains(&t));
            let target_fits = table_of(edge.target_column_id).is_none_or(|t| t == target);
            !(source_fits && target_fits)
        })
        .map(|edge| edge.id.to_string())
        .collect();

    if stranded.is_empty() {
        Ok(())
    } else {
        Err(LineageError::validation(format!(
            "column lineage {} would no longer fit the sources and target of table lineage {edge_id}",
            stranded.join(", ")
        )))
    }
}

/// Enforce the membership and uniqueness rules of a column edge.
fn check_column_membership(
    conn: &Connection,
    lineage_relation_id: TableEdgeId,
    source: &Column,
    target: &Column,
    exclude: Option<ColumnEdgeId>,
) -> Result<()> {
    let owner = query_table_edge(conn, lineage_relation_id)?
        .ok_or_else(|| LineageError::not_found(Entity::TableLineage, lineage_relation_id))?;

    if !owner.has_source(source.table_id) {
        return Err(LineageError::validation(format!(
            "source column {} belongs to table {}, which is not a source of table lineage {}",
            source.id, source.table_id, owner.id
        )));
    }
    if target.table_id != owner.target_table_id {
        return Err(LineageError::validation(format!(
            "target column {} belongs to table {}, but table lineage {} targets table {}",
            target.id, target.table_id, owner.id, owner.target_table_id
        )));
    }

    let duplicate: Option<ColumnEdgeId> = conn
        .query_row(
            "SELECT id FROM column_lineage WHERE source_column_id = ?1 AND target_column_id = ?2",
            params![source.id, target.id],
            |row| row.get(0),
        )
        .optional()?;
    match duplicate {
        Some(existing) if Some(existing) != exclude => Err(LineageError::conflict(format!(
            "column lineage {} -> {} already exists (id {existing})",
            source.id, target.id
        ))),
        _ => Ok(()),
    }
}

fn row_to_table_edge(row: &rusqlite::Row<'_>) -> SqliteResult<TableLineageEdge> {
    let id: TableEdgeId = row.get(0)?;
    let created_at: i64 = row.get(5)?;
    Ok(TableLineageEdge {
        id,
        source_table_ids: Vec::new(),
        target_table_id: row.get(1)?,
        relation_type: row.get(2)?,
        description: row.get(3)?,
        relation_details: decode_details(row.get(4)?, Entity::TableLineage, id),
        created_at: created_at.max(0) as u64,
    })
}

fn row_to_column_edge(row: &rusqlite::Row<'_>) -> SqliteResult<ColumnLineageEdge> {
    let id: ColumnEdgeId = row.get(0)?;
    Ok(ColumnLineageEdge {
        id,
        lineage_relation_id: row.get(1)?,
        source_column_id: row.get(2)?,
        target_column_id: row.get(3)?,
        transformation_details: decode_details(row.get(4)?, Entity::ColumnLineage, id),
    })
}
