//! Column types as the database catalog spells them.

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a catalog type string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid column type '{input}': {reason}")]
pub struct TypeParseError {
    pub input: String,
    pub reason: String,
}

/// Canonical column type.
///
/// Collection types are parametrized and nest arbitrarily. Tuples are always
/// frozen on the wire, so they render as `frozen<tuple<...>>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Date,
    Double,
    Float,
    Inet,
    Int,
    SmallInt,
    Text,
    TimeUuid,
    Timestamp,
    TinyInt,
    Uuid,
    Set(Box<ColumnType>),
    List(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Tuple(Vec<ColumnType>),
}

impl ColumnType {
    pub fn set(item: ColumnType) -> Self {
        ColumnType::Set(Box::new(item))
    }

    pub fn list(item: ColumnType) -> Self {
        ColumnType::List(Box::new(item))
    }

    pub fn map(key: ColumnType, value: ColumnType) -> Self {
        ColumnType::Map(Box::new(key), Box::new(value))
    }

    pub fn tuple(items: Vec<ColumnType>) -> Self {
        ColumnType::Tuple(items)
    }

    /// Render the type the way it appears in DDL.
    pub fn cql_name(&self) -> String {
        match self {
            ColumnType::Set(item) => format!("set<{}>", item.cql_name()),
            ColumnType::List(item) => format!("list<{}>", item.cql_name()),
            ColumnType::Map(key, value) => {
                format!("map<{}, {}>", key.cql_name(), value.cql_name())
            }
            ColumnType::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(ColumnType::cql_name).collect();
                format!("frozen<tuple<{}>>", inner.join(", "))
            }
            scalar => scalar.scalar_name().unwrap_or("unknown").to_string(),
        }
    }

    fn scalar_name(&self) -> Option<&'static str> {
        let name = match self {
            ColumnType::Ascii => "ascii",
            ColumnType::BigInt => "bigint",
            ColumnType::Blob => "blob",
            ColumnType::Boolean => "boolean",
            ColumnType::Counter => "counter",
            ColumnType::Date => "date",
            ColumnType::Double => "double",
            ColumnType::Float => "float",
            ColumnType::Inet => "inet",
            ColumnType::Int => "int",
            ColumnType::SmallInt => "smallint",
            ColumnType::Text => "text",
            ColumnType::TimeUuid => "timeuuid",
            ColumnType::Timestamp => "timestamp",
            ColumnType::TinyInt => "tinyint",
            ColumnType::Uuid => "uuid",
            _ => return None,
        };
        Some(name)
    }

    fn scalar_from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "ascii" => ColumnType::Ascii,
            "bigint" => ColumnType::BigInt,
            "blob" => ColumnType::Blob,
            "boolean" => ColumnType::Boolean,
            "counter" => ColumnType::Counter,
            "date" => ColumnType::Date,
            "double" => ColumnType::Double,
            "float" => ColumnType::Float,
            "inet" => ColumnType::Inet,
            "int" => ColumnType::Int,
            "smallint" => ColumnType::SmallInt,
            "text" | "varchar" => ColumnType::Text,
            "timeuuid" => ColumnType::TimeUuid,
            "timestamp" => ColumnType::Timestamp,
            "tinyint" => ColumnType::TinyInt,
            "uuid" => ColumnType::Uuid,
            _ => return None,
        };
        Some(ty)
    }

    /// Returns all scalar types.
    pub fn scalars() -> Vec<ColumnType> {
        vec![
            ColumnType::Ascii,
            ColumnType::BigInt,
            ColumnType::Blob,
            ColumnType::Boolean,
            ColumnType::Counter,
            ColumnType::Date,
            ColumnType::Double,
            ColumnType::Float,
            ColumnType::Inet,
            ColumnType::Int,
            ColumnType::SmallInt,
            ColumnType::Text,
            ColumnType::TimeUuid,
            ColumnType::Timestamp,
            ColumnType::TinyInt,
            ColumnType::Uuid,
        ]
    }

    /// Set, list or map: the types with incremental update semantics.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            ColumnType::Set(_) | ColumnType::List(_) | ColumnType::Map(_, _)
        )
    }

    /// Collections plus tuples.
    pub fn is_container(&self) -> bool {
        self.is_collection() || matches!(self, ColumnType::Tuple(_))
    }

    pub fn is_counter(&self) -> bool {
        matches!(self, ColumnType::Counter)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt
                | ColumnType::SmallInt
                | ColumnType::Int
                | ColumnType::BigInt
                | ColumnType::Counter
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, ColumnType::Float | ColumnType::Double)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cql_name())
    }
}

impl FromStr for ColumnType {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeParser {
            input: s,
            bytes: s.as_bytes(),
            pos: 0,
        };
        let ty = parser.parse_type()?;
        parser.skip_whitespace();
        if parser.pos != parser.bytes.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.cql_name())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ColumnType::from_str(&raw).map_err(de::Error::custom)
    }
}

struct TypeParser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn parse_type(&mut self) -> Result<ColumnType, TypeParseError> {
        self.skip_whitespace();
        let name = self.identifier()?.to_ascii_lowercase();
        self.skip_whitespace();

        if self.peek() != Some(b'<') {
            return ColumnType::scalar_from_name(&name)
                .ok_or_else(|| self.error(&format!("unknown type '{}'", name)));
        }

        self.pos += 1;
        let mut params = vec![self.parse_type()?];
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    params.push(self.parse_type()?);
                }
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.error("expected ',' or '>'")),
            }
        }

        self.parametrized(&name, params)
    }

    fn parametrized(
        &self,
        name: &str,
        mut params: Vec<ColumnType>,
    ) -> Result<ColumnType, TypeParseError> {
        match (name, params.len()) {
            ("frozen", 1) | ("set", 1) | ("list", 1) => {
                let inner = params.remove(0);
                Ok(match name {
                    "set" => ColumnType::set(inner),
                    "list" => ColumnType::list(inner),
                    _ => inner,
                })
            }
            ("map", 2) => {
                let value = params.remove(1);
                let key = params.remove(0);
                Ok(ColumnType::map(key, value))
            }
            ("tuple", n) if n > 0 => Ok(ColumnType::Tuple(params)),
            _ => Err(self.error(&format!(
                "'{}' does not take {} type parameter(s)",
                name,
                params.len()
            ))),
        }
    }

    fn identifier(&mut self) -> Result<&'a str, TypeParseError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("expected a type name"));
        }
        Ok(&self.input[start..self.pos])
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, reason: &str) -> TypeParseError {
        TypeParseError {
            input: self.input.to_string(),
            reason: format!("{} at offset {}", reason, self.pos),
        }
    }
}
