//! Lineage error types.

use thiserror::Error;

/// Kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    DataSource,
    Table,
    Column,
    TableLineage,
    ColumnLineage,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Entity::DataSource => "data source",
            Entity::Table => "table",
            Entity::Column => "column",
            Entity::TableLineage => "table lineage",
            Entity::ColumnLineage => "column lineage",
        };
        f.write_str(name)
    }
}

/// Position of a reference inside a lineage edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceRole {
    Source,
    Target,
}

impl std::fmt::Display for ReferenceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceRole::Source => f.write_str("source"),
            ReferenceRole::Target => f.write_str("target"),
        }
    }
}

/// One reference that failed existence validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidReference {
    pub role: ReferenceRole,
    pub entity: Entity,
    pub id: i64,
}

impl std::fmt::Display for InvalidReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.role, self.entity, self.id)
    }
}

fn join_references(references: &[InvalidReference]) -> String {
    references
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised by the lineage repository, metadata store and graph engine.
#[derive(Error, Debug)]
pub enum LineageError {
    /// Referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    /// One or more ids supplied on create/update do not resolve
    #[error("invalid reference(s): {}", join_references(.references))]
    InvalidReference { references: Vec<InvalidReference> },

    /// Duplicate record or a delete blocked by dependents
    #[error("conflict: {0}")]
    Conflict(String),

    /// Membership or shape invariant violated
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// SQLite error
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database was written by an incompatible schema
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: String, found: String },
}

impl LineageError {
    /// Create a NotFound error.
    pub fn not_found(entity: Entity, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Create a Conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a ValidationFailed error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    /// True for missing records, including failed reference checks.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidReference { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationFailed(_))
    }
}

/// Result type for lineage operations.
pub type Result<T> = std::result::Result<T, LineageError>;
