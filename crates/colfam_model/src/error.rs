//! Model definition errors.

use thiserror::Error;

/// A declared record type that cannot describe a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Model '{0}' declares no columns")]
    NoColumns(String),

    #[error("Table '{0}' has no partition key")]
    NoPartitionKey(String),

    #[error("Table '{table}': duplicate column '{column}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Table '{table}': static column '{column}' requires at least one clustering key")]
    StaticWithoutClustering { table: String, column: String },

    #[error("Table '{table}': static column '{column}' cannot be part of the primary key")]
    StaticPrimaryKey { table: String, column: String },

    #[error("Table '{table}': primary key column '{column}' cannot have type {column_type}")]
    InvalidKeyType {
        table: String,
        column: String,
        column_type: String,
    },

    #[error("Table '{table}': clustering order on '{column}', which is not a clustering key")]
    InvalidClusteringOrder { table: String, column: String },

    #[error("Table '{table}': counter column '{column}' cannot share a table with non-counter column '{other}'")]
    CounterMixed {
        table: String,
        column: String,
        other: String,
    },

    #[error("Table '{table}': counter column '{column}' cannot be indexed")]
    CounterIndex { table: String, column: String },

    #[error("Table '{table}': {kind} index is not valid for column '{column}' of type {column_type}")]
    InvalidIndexKind {
        table: String,
        column: String,
        kind: String,
        column_type: String,
    },

    #[error("Unknown index kind '{0}'")]
    UnknownIndexKind(String),

    #[error("Column '{column}': invalid default: {reason}")]
    InvalidDefault { column: String, reason: String },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

impl SchemaError {
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
