//! Column-level mutation intents.
//!
//! An intent is one column plus one operation. Callers either build them
//! directly or parse them from the `column__op` keyword form used at the
//! API boundary (`tags__add`, `scores__append`, `text_map__update`).

use colfam_protocol::Value;
use std::fmt;

use crate::error::ValidationError;

/// Operation requested on a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    /// Overwrite the column. `Set(Value::Null)` behaves like [`MutationOp::Delete`].
    Set(Value),

    /// Remove the column value
    Delete,

    /// Union into a set
    Add(Vec<Value>),

    /// Subtract from a set or list
    Remove(Vec<Value>),

    /// Append to a list
    Append(Vec<Value>),

    /// Prepend to a list; elements end up in the order given
    Prepend(Vec<Value>),

    /// Merge map entries; `None` or `Some(Value::Null)` deletes the key
    Merge(Vec<(Value, Option<Value>)>),

    /// Add to a counter (negative to decrement)
    Increment(i64),
}

impl MutationOp {
    pub fn name(&self) -> &'static str {
        match self {
            MutationOp::Set(_) => "set",
            MutationOp::Delete => "delete",
            MutationOp::Add(_) => "add",
            MutationOp::Remove(_) => "remove",
            MutationOp::Append(_) => "append",
            MutationOp::Prepend(_) => "prepend",
            MutationOp::Merge(_) => "update",
            MutationOp::Increment(_) => "incr",
        }
    }

    /// True when the operation clears the whole column.
    pub fn is_delete(&self) -> bool {
        matches!(self, MutationOp::Delete | MutationOp::Set(Value::Null))
    }
}

/// One requested change to one column.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationIntent {
    pub column: String,
    pub op: MutationOp,
}

impl MutationIntent {
    pub fn new(column: impl Into<String>, op: MutationOp) -> Self {
        Self {
            column: column.into(),
            op,
        }
    }

    pub fn set(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, MutationOp::Set(value.into()))
    }

    pub fn delete(column: impl Into<String>) -> Self {
        Self::new(column, MutationOp::Delete)
    }

    pub fn add<V: Into<Value>>(column: impl Into<String>, items: impl IntoIterator<Item = V>) -> Self {
        Self::new(column, MutationOp::Add(items.into_iter().map(Into::into).collect()))
    }

    pub fn remove<V: Into<Value>>(column: impl Into<String>, items: impl IntoIterator<Item = V>) -> Self {
        Self::new(column, MutationOp::Remove(items.into_iter().map(Into::into).collect()))
    }

    pub fn append<V: Into<Value>>(column: impl Into<String>, items: impl IntoIterator<Item = V>) -> Self {
        Self::new(column, MutationOp::Append(items.into_iter().map(Into::into).collect()))
    }

    pub fn prepend<V: Into<Value>>(column: impl Into<String>, items: impl IntoIterator<Item = V>) -> Self {
        Self::new(column, MutationOp::Prepend(items.into_iter().map(Into::into).collect()))
    }

    pub fn merge<K, V>(column: impl Into<String>, entries: impl IntoIterator<Item = (K, Option<V>)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.map(Into::into)))
            .collect();
        Self::new(column, MutationOp::Merge(entries))
    }

    pub fn increment(column: impl Into<String>, by: i64) -> Self {
        Self::new(column, MutationOp::Increment(by))
    }

    /// Parse the keyword form `column` or `column__op`.
    ///
    /// A bare column with a null value is a delete. For `__update`, null map
    /// values mark keys to delete.
    pub fn parse(key: &str, value: Value) -> Result<Self, ValidationError> {
        let Some((column, suffix)) = key.rsplit_once("__") else {
            return Ok(Self::from_plain(key, value));
        };
        if column.is_empty() {
            return Err(invalid(key, "missing column name"));
        }

        let op = match suffix {
            "add" => MutationOp::Add(collection_items(key, value)?),
            "remove" => MutationOp::Remove(collection_items(key, value)?),
            "append" => MutationOp::Append(collection_items(key, value)?),
            "prepend" => MutationOp::Prepend(collection_items(key, value)?),
            "update" => match value {
                Value::Map(entries) => MutationOp::Merge(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k, (!v.is_null()).then_some(v)))
                        .collect(),
                ),
                other => {
                    return Err(invalid(key, format!("expected a map, got {}", other.type_name())))
                }
            },
            "incr" => match value.as_i64() {
                Some(by) => MutationOp::Increment(by),
                None => {
                    return Err(invalid(key, format!("expected an integer, got {}", value.type_name())))
                }
            },
            other => return Err(invalid(key, format!("unknown operation '{}'", other))),
        };
        Ok(Self::new(column, op))
    }

    fn from_plain(column: &str, value: Value) -> Self {
        if value.is_null() {
            Self::delete(column)
        } else {
            Self::set(column, value)
        }
    }
}

impl fmt::Display for MutationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op {
            MutationOp::Set(v) => write!(f, "{} = {}", self.column, v),
            MutationOp::Delete => write!(f, "delete {}", self.column),
            MutationOp::Increment(by) => write!(f, "{} += {}", self.column, by),
            op => write!(f, "{}__{}", self.column, op.name()),
        }
    }
}

fn collection_items(key: &str, value: Value) -> Result<Vec<Value>, ValidationError> {
    match value {
        Value::Set(items) | Value::List(items) => Ok(items),
        other => Err(invalid(
            key,
            format!("expected a set or list, got {}", other.type_name()),
        )),
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidIntent {
        key: key.to_string(),
        reason: reason.into(),
    }
}
