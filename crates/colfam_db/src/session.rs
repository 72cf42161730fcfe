//! The database session seam.
//!
//! Everything that talks to a real cluster (connections, retries, timeouts,
//! the wire protocol) lives behind [`Session`]. This crate only issues
//! statements and reads catalog metadata through it.

use colfam_model::{IndexTarget, TableDescriptor, TableName};
use colfam_mutation::{Capabilities, ServerVersion};
use colfam_protocol::{RowSet, Statement};
use colfam_schema::LiveTable;
use std::collections::BTreeSet;
use thiserror::Error;

/// Failure reported by the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The server rejected the statement
    #[error("Query rejected: {message} [{query}]")]
    Query { query: String, message: String },

    /// Connection or transport failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server did not answer in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The catalog returned something that cannot be turned into a descriptor
    #[error("Invalid metadata for {table}: {reason}")]
    Metadata { table: String, reason: String },
}

impl SessionError {
    pub fn query(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            query: query.into(),
            message: message.into(),
        }
    }
}

/// A connection to a cluster, passed explicitly to every operation.
pub trait Session {
    /// Reconstruct a table from the catalog. `None` means it does not exist.
    fn fetch_table_metadata(&self, table: &TableName) -> Result<Option<TableDescriptor>, SessionError>;

    /// Index targets currently defined on `table`.
    fn fetch_index_metadata(&self, table: &TableName) -> Result<BTreeSet<IndexTarget>, SessionError>;

    /// Execute a DDL or DML statement with its bound values.
    fn execute(&self, statement: &Statement) -> Result<RowSet, SessionError>;

    /// Release of the connected server, when known.
    fn server_version(&self) -> Option<ServerVersion> {
        None
    }

    /// Behaviors the mutation compiler has to account for on this server.
    fn capabilities(&self) -> Capabilities {
        self.server_version()
            .map(Capabilities::from_server_version)
            .unwrap_or_default()
    }
}

impl<S: Session + ?Sized> Session for &S {
    fn fetch_table_metadata(&self, table: &TableName) -> Result<Option<TableDescriptor>, SessionError> {
        (**self).fetch_table_metadata(table)
    }

    fn fetch_index_metadata(&self, table: &TableName) -> Result<BTreeSet<IndexTarget>, SessionError> {
        (**self).fetch_index_metadata(table)
    }

    fn execute(&self, statement: &Statement) -> Result<RowSet, SessionError> {
        (**self).execute(statement)
    }

    fn server_version(&self) -> Option<ServerVersion> {
        (**self).server_version()
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }
}

/// Fetch a table and its indexes as one live snapshot.
pub fn fetch_live_table<S: Session + ?Sized>(
    session: &S,
    table: &TableName,
) -> Result<Option<LiveTable>, SessionError> {
    let Some(descriptor) = session.fetch_table_metadata(table)? else {
        return Ok(None);
    };
    let indexes = session.fetch_index_metadata(table)?;
    Ok(Some(LiveTable::new(descriptor, indexes)))
}
