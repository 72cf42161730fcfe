//! Compiled DML statements.
//!
//! Column names held here are database names; they are quoted on render.
//! Every value is bound, never inlined.

use colfam_model::TableName;
use colfam_protocol::ident::quote_identifier;
use colfam_protocol::{Statement, Value};
use std::fmt;

/// One `SET` clause of an UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `"c" = ?`
    Set { column: String, value: Value },
    /// `"c" = "c" + ?`
    Add { column: String, value: Value },
    /// `"c" = "c" - ?`
    Subtract { column: String, value: Value },
    /// `"c" = ? + "c"`
    Prepend { column: String, value: Value },
}

impl Assignment {
    pub fn column(&self) -> &str {
        match self {
            Assignment::Set { column, .. }
            | Assignment::Add { column, .. }
            | Assignment::Subtract { column, .. }
            | Assignment::Prepend { column, .. } => column,
        }
    }

    fn value(&self) -> &Value {
        match self {
            Assignment::Set { value, .. }
            | Assignment::Add { value, .. }
            | Assignment::Subtract { value, .. }
            | Assignment::Prepend { value, .. } => value,
        }
    }

    fn to_cql(&self) -> String {
        let c = quote_identifier(self.column());
        match self {
            Assignment::Set { .. } => format!("{} = ?", c),
            Assignment::Add { .. } => format!("{} = {} + ?", c, c),
            Assignment::Subtract { .. } => format!("{} = {} - ?", c, c),
            Assignment::Prepend { .. } => format!("{} = ? + {}", c, c),
        }
    }
}

/// What a column-level DELETE removes.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteTarget {
    Column(String),
    MapKey { column: String, key: Value },
}

impl DeleteTarget {
    pub fn column(&self) -> &str {
        match self {
            DeleteTarget::Column(column) | DeleteTarget::MapKey { column, .. } => column,
        }
    }
}

/// A single DML statement.
#[derive(Debug, Clone, PartialEq)]
pub enum DmlStatement {
    Insert {
        table: TableName,
        values: Vec<(String, Value)>,
        if_not_exists: bool,
        ttl: Option<u32>,
        timestamp: Option<i64>,
    },

    Update {
        table: TableName,
        assignments: Vec<Assignment>,
        predicate: Vec<(String, Value)>,
        ttl: Option<u32>,
        timestamp: Option<i64>,
    },

    /// Removes individual columns or map entries. Never carries a TTL.
    Delete {
        table: TableName,
        targets: Vec<DeleteTarget>,
        predicate: Vec<(String, Value)>,
        timestamp: Option<i64>,
    },

    /// Removes whole rows, or a whole partition when only the partition key is given
    RowDelete {
        table: TableName,
        predicate: Vec<(String, Value)>,
        timestamp: Option<i64>,
    },

    Select {
        table: TableName,
        predicate: Vec<(String, Value)>,
        limit: Option<usize>,
    },
}

impl DmlStatement {
    pub fn table(&self) -> &TableName {
        match self {
            DmlStatement::Insert { table, .. }
            | DmlStatement::Update { table, .. }
            | DmlStatement::Delete { table, .. }
            | DmlStatement::RowDelete { table, .. }
            | DmlStatement::Select { table, .. } => table,
        }
    }

    /// True when the server answers with an `[applied]` row.
    pub fn is_conditional(&self) -> bool {
        matches!(self, DmlStatement::Insert { if_not_exists: true, .. })
    }

    pub fn to_statement(&self) -> Statement {
        match self {
            DmlStatement::Insert {
                table,
                values,
                if_not_exists,
                ttl,
                timestamp,
            } => {
                let columns: Vec<String> = values.iter().map(|(c, _)| quote_identifier(c)).collect();
                let marks = vec!["?"; values.len()].join(", ");
                let mut query = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table.qualified(),
                    columns.join(", "),
                    marks
                );
                if *if_not_exists {
                    query.push_str(" IF NOT EXISTS");
                }
                query.push_str(&using_clause(*ttl, *timestamp));
                Statement::with_values(query, values.iter().map(|(_, v)| v.clone()).collect())
            }

            DmlStatement::Update {
                table,
                assignments,
                predicate,
                ttl,
                timestamp,
            } => {
                let sets: Vec<String> = assignments.iter().map(Assignment::to_cql).collect();
                let query = format!(
                    "UPDATE {}{} SET {}{}",
                    table.qualified(),
                    using_clause(*ttl, *timestamp),
                    sets.join(", "),
                    where_clause(predicate)
                );
                let mut values: Vec<Value> = assignments.iter().map(|a| a.value().clone()).collect();
                values.extend(predicate.iter().map(|(_, v)| v.clone()));
                Statement::with_values(query, values)
            }

            DmlStatement::Delete {
                table,
                targets,
                predicate,
                timestamp,
            } => {
                let mut values = Vec::new();
                let rendered: Vec<String> = targets
                    .iter()
                    .map(|target| match target {
                        DeleteTarget::Column(column) => quote_identifier(column),
                        DeleteTarget::MapKey { column, key } => {
                            values.push(key.clone());
                            format!("{}[?]", quote_identifier(column))
                        }
                    })
                    .collect();
                let query = format!(
                    "DELETE {} FROM {}{}{}",
                    rendered.join(", "),
                    table.qualified(),
                    using_clause(None, *timestamp),
                    where_clause(predicate)
                );
                values.extend(predicate.iter().map(|(_, v)| v.clone()));
                Statement::with_values(query, values)
            }

            DmlStatement::RowDelete {
                table,
                predicate,
                timestamp,
            } => {
                let query = format!(
                    "DELETE FROM {}{}{}",
                    table.qualified(),
                    using_clause(None, *timestamp),
                    where_clause(predicate)
                );
                Statement::with_values(query, predicate.iter().map(|(_, v)| v.clone()).collect())
            }

            DmlStatement::Select {
                table,
                predicate,
                limit,
            } => {
                let mut query = format!("SELECT * FROM {}{}", table.qualified(), where_clause(predicate));
                if let Some(limit) = limit {
                    query.push_str(&format!(" LIMIT {}", limit));
                }
                Statement::with_values(query, predicate.iter().map(|(_, v)| v.clone()).collect())
            }
        }
    }
}

impl fmt::Display for DmlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_statement())
    }
}

fn using_clause(ttl: Option<u32>, timestamp: Option<i64>) -> String {
    let mut parts = Vec::new();
    if let Some(ttl) = ttl {
        parts.push(format!("TTL {}", ttl));
    }
    if let Some(ts) = timestamp {
        parts.push(format!("TIMESTAMP {}", ts));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" USING {}", parts.join(" AND "))
    }
}

fn where_clause(predicate: &[(String, Value)]) -> String {
    if predicate.is_empty() {
        return String::new();
    }
    let terms: Vec<String> = predicate
        .iter()
        .map(|(c, _)| format!("{} = ?", quote_identifier(c)))
        .collect();
    format!(" WHERE {}", terms.join(" AND "))
}

/// The ordered statements one mutation compiles to.
///
/// Usually one; an update that both sets and deletes yields two that share
/// the same WHERE clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledStatement {
    pub statements: Vec<DmlStatement>,
}

impl CompiledStatement {
    pub fn new(statements: Vec<DmlStatement>) -> Self {
        Self { statements }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DmlStatement> {
        self.statements.iter()
    }

    pub fn to_statements(&self) -> Vec<Statement> {
        self.statements.iter().map(DmlStatement::to_statement).collect()
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{};", statement.to_statement().inline())?;
        }
        Ok(())
    }
}
