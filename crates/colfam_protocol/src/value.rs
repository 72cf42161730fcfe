//! Bound values and result rows.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;
use uuid::Uuid;

use crate::ident::escape_string_literal;

/// A value bound to a statement parameter or read back from a row.
///
/// Sets are carried as vectors; element uniqueness is enforced by coercion,
/// not by the container.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Inet(IpAddr),
    Set(Vec<Value>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::TinyInt(_) => "tinyint",
            Value::SmallInt(_) => "smallint",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Inet(_) => "inet",
            Value::Set(_) => "set",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Tuple(_) => "tuple",
        }
    }

    /// Integer view of any integral variant.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(i64::from(*v)),
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a key in a map value.
    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Build a text-keyed map value.
    pub fn text_map<K, V, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Text(k.into()), v.into()))
                .collect(),
        )
    }

    /// Build a text set value.
    pub fn text_set<S, I>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Set(items.into_iter().map(|s| Value::Text(s.into())).collect())
    }

    /// Build a text list value.
    pub fn text_list<S, I>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::Text(s.into())).collect())
    }

    /// Convert loosely typed JSON input into a value.
    ///
    /// Integers become `BigInt`, other numbers `Double`, arrays `List` and
    /// objects text-keyed `Map`s. Column coercion narrows these afterwards.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::BigInt(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (Value::Text(k.clone()), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// JSON rendering used by the CLI.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Boolean(v) => Json::Bool(*v),
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => {
                Json::from(self.as_i64().unwrap_or_default())
            }
            Value::Float(v) => Json::from(f64::from(*v)),
            Value::Double(v) => Json::from(*v),
            Value::Text(v) => Json::String(v.clone()),
            Value::Blob(v) => Json::String(hex_literal(v)),
            Value::Uuid(v) => Json::String(v.to_string()),
            Value::Timestamp(v) => Json::String(v.to_rfc3339()),
            Value::Date(v) => Json::String(v.to_string()),
            Value::Inet(v) => Json::String(v.to_string()),
            Value::Set(items) | Value::List(items) | Value::Tuple(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => Json::Array(
                entries
                    .iter()
                    .map(|(k, v)| Json::Array(vec![k.to_json(), v.to_json()]))
                    .collect(),
            ),
        }
    }
}

fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn join_values(items: &[Value]) -> String {
    items
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// CQL literal rendering, used for logs and dry-run output.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", escape_string_literal(v)),
            Value::Blob(v) => write!(f, "{}", hex_literal(v)),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "'{}'", v.to_rfc3339()),
            Value::Date(v) => write!(f, "'{}'", v),
            Value::Inet(v) => write!(f, "'{}'", v),
            Value::Set(items) => write!(f, "{{{}}}", join_values(items)),
            Value::List(items) => write!(f, "[{}]", join_values(items)),
            Value::Tuple(items) => write!(f, "({})", join_values(items)),
            Value::Map(entries) => {
                let rendered: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Boolean,
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    f32 => Float,
    f64 => Double,
    String => Text,
    Vec<u8> => Blob,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    NaiveDate => Date,
    IpAddr => Inet,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// Errors decoding a row value into a Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("column '{0}' not found in row")]
    MissingColumn(String),

    #[error("column '{column}' is NULL - use Option<_> for nullable columns")]
    UnexpectedNull { column: String },

    #[error("column '{column}': expected {expected}, got {got}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        got: &'static str,
    },
}

/// Trait for converting from a [`Value`].
pub trait FromValue: Sized {
    const EXPECTED: &'static str;

    /// Returns `None` when the variant does not fit.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! from_value_variant {
    ($($ty:ty => $expected:literal, $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                const EXPECTED: &'static str = $expected;

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

from_value_variant! {
    bool => "boolean", Boolean,
    String => "text", Text,
    Uuid => "uuid", Uuid,
    DateTime<Utc> => "timestamp", Timestamp,
    NaiveDate => "date", Date,
    Vec<u8> => "blob", Blob,
    IpAddr => "inet", Inet,
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for i32 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|v| i32::try_from(v).ok())
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "double";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Double(v) => Some(*v),
            Value::Float(v) => Some(f64::from(*v)),
            other => other.as_i64().map(|v| v as f64),
        }
    }
}

impl FromValue for Vec<Value> {
    const EXPECTED: &'static str = "collection";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Set(items) | Value::List(items) | Value::Tuple(items) => Some(items.clone()),
            _ => None,
        }
    }
}

/// Row data from a query result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Create a new row with column names and values.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Build a row from name/value pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let (columns, values) = pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self { columns, values }
    }

    /// Raw value by column name.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Decode a non-null value by column name.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T, ConversionError> {
        let value = self
            .value(name)
            .ok_or_else(|| ConversionError::MissingColumn(name.to_string()))?;
        if value.is_null() {
            return Err(ConversionError::UnexpectedNull {
                column: name.to_string(),
            });
        }
        T::from_value(value).ok_or_else(|| ConversionError::TypeMismatch {
            column: name.to_string(),
            expected: T::EXPECTED,
            got: value.type_name(),
        })
    }

    /// Decode a nullable value; missing columns read as `None`.
    pub fn get_opt<T: FromValue>(&self, name: &str) -> Result<Option<T>, ConversionError> {
        match self.value(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get(name).map(Some),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Rows returned by a statement. DDL and most DML return none.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    rows: Vec<Row>,
}

impl RowSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl IntoIterator for RowSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_get_typed() {
        let id = Uuid::new_v4();
        let row = Row::from_pairs([
            ("id", Value::Uuid(id)),
            ("count", Value::Int(8)),
            ("text", Value::Null),
        ]);

        assert_eq!(row.get::<Uuid>("id").unwrap(), id);
        assert_eq!(row.get::<i64>("count").unwrap(), 8);
        assert_eq!(row.get_opt::<String>("text").unwrap(), None);
        assert!(matches!(
            row.get::<String>("text"),
            Err(ConversionError::UnexpectedNull { .. })
        ));
        assert!(matches!(
            row.get::<String>("count"),
            Err(ConversionError::TypeMismatch { expected: "text", got: "int", .. })
        ));
        assert!(matches!(
            row.get::<i32>("missing"),
            Err(ConversionError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_display_literals() {
        assert_eq!(Value::from("it's").to_string(), "'it''s'");
        assert_eq!(Value::text_set(["a", "b"]).to_string(), "{'a', 'b'}");
        assert_eq!(Value::List(vec![Value::Int(1), Value::Int(2)]).to_string(), "[1, 2]");
        assert_eq!(Value::text_map([("k", 1i32)]).to_string(), "{'k': 1}");
        assert_eq!(Value::Blob(vec![0xde, 0xad]).to_string(), "0xdead");
        assert_eq!(Value::Null.to_string(), "NULL");
    }

    #[test]
    fn test_from_json() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"bar": null, "baz": "4", "n": 3, "l": [1.5]}"#).unwrap();
        let value = Value::from_json(&json);
        assert_eq!(value.map_get(&Value::from("bar")), Some(&Value::Null));
        assert_eq!(value.map_get(&Value::from("baz")), Some(&Value::from("4")));
        assert_eq!(value.map_get(&Value::from("n")), Some(&Value::BigInt(3)));
        assert_eq!(
            value.map_get(&Value::from("l")),
            Some(&Value::List(vec![Value::Double(1.5)]))
        );
    }

    #[test]
    fn test_option_into_value() {
        let none: Option<i32> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some(5i32)), Value::Int(5));
    }
}
