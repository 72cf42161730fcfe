//! Reconciliation errors.

use colfam_model::{KeyRole, SchemaError};
use thiserror::Error;

/// Reasons reconciliation refuses to produce a plan.
///
/// Every variant is raised before any DDL is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The declared model is malformed
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Declared and live primary keys differ; never repaired automatically
    #[error(
        "Primary key mismatch on {table}: {role} key at position {position} is declared as {} but live as {}",
        .desired.as_deref().unwrap_or("<absent>"),
        .live.as_deref().unwrap_or("<absent>")
    )]
    PrimaryKeyMismatch {
        table: String,
        role: KeyRole,
        position: usize,
        desired: Option<String>,
        live: Option<String>,
    },

    /// Declared option key outside the recognized set
    #[error("Invalid table option '{option}' on {table}")]
    UnknownOption { table: String, option: String },

    /// Recognized option key with a value of the wrong shape
    #[error("Invalid value {value} for table option '{option}' on {table}")]
    InvalidOptionValue {
        table: String,
        option: String,
        value: String,
    },
}
