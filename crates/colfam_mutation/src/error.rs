//! Mutation validation errors.

use thiserror::Error;

/// A rejected mutation. Nothing is compiled for a batch that fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown column '{column}' on {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Cannot update primary key column '{column}'")]
    PrimaryKeyMutation { column: String },

    #[error("Invalid value for column '{column}': {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("Operation '{op}' is not supported on column '{column}' of type {column_type}")]
    UnsupportedOperation {
        column: String,
        op: &'static str,
        column_type: String,
    },

    #[error("Column '{column}' is required")]
    RequiredColumn { column: String },

    #[error("Missing value for primary key column '{column}'")]
    MissingKey { column: String },

    #[error("Column '{column}' cannot be used in a WHERE clause")]
    NonKeyPredicate { column: String },

    #[error("Column '{column}' appears more than once")]
    DuplicateColumn { column: String },

    #[error("Counter table {table} cannot be written with INSERT; use increments")]
    CounterInsert { table: String },

    #[error("IF NOT EXISTS cannot be used on counter table {table}")]
    IfNotExistsWithCounter { table: String },

    #[error("Mutation contains no intents")]
    EmptyMutation,

    #[error("Invalid mutation '{key}': {reason}")]
    InvalidIntent { key: String, reason: String },

    #[error("Invalid batch: {reason}")]
    InvalidBatch { reason: String },
}

impl ValidationError {
    pub fn invalid_value(column: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidValue {
            column: column.into(),
            reason: reason.to_string(),
        }
    }
}
