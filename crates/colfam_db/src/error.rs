//! Error types for the execution layer.

use colfam_model::SchemaError;
use colfam_mutation::ValidationError;
use colfam_protocol::Row;
use colfam_schema::ReconcileError;
use thiserror::Error;

use crate::session::SessionError;

/// Execution layer result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Everything a caller-facing operation can fail with.
///
/// Reconciliation and validation errors are raised before anything is
/// executed. Session errors are passed through as reported.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// A conditional insert found an existing row
    #[error("Conditional write was not applied: row already exists")]
    NotApplied { existing: Row },
}

impl From<SchemaError> for DbError {
    fn from(err: SchemaError) -> Self {
        Self::Reconcile(ReconcileError::Schema(err))
    }
}

impl DbError {
    /// True for failures reported by the session rather than by local checks.
    pub fn is_session(&self) -> bool {
        matches!(self, DbError::Session(_))
    }
}
