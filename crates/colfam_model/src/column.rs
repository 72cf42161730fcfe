//! Column descriptors and their role flags.

use chrono::Utc;
use colfam_protocol::ident::{quote_identifier, unquote_identifier};
use colfam_protocol::{ColumnType, Value};
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SchemaError;

/// Sort direction of a clustering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringOrder {
    #[default]
    Asc,
    Desc,
}

impl ClusteringOrder {
    pub fn as_cql(self) -> &'static str {
        match self {
            ClusteringOrder::Asc => "ASC",
            ClusteringOrder::Desc => "DESC",
        }
    }
}

impl fmt::Display for ClusteringOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_cql())
    }
}

/// What a secondary index covers.
///
/// Scalar columns only take `Simple`. Collections can be indexed on their
/// values, map keys or map entries; frozen values (tuples) are indexed whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Simple,
    Keys,
    Values,
    Entries,
    Full,
}

impl IndexKind {
    /// The kind used when a column is marked indexed without naming one.
    pub fn default_for(column_type: &ColumnType) -> Self {
        match column_type {
            ColumnType::Set(_) | ColumnType::List(_) | ColumnType::Map(_, _) => IndexKind::Values,
            ColumnType::Tuple(_) => IndexKind::Full,
            _ => IndexKind::Simple,
        }
    }

    pub fn is_valid_for(self, column_type: &ColumnType) -> bool {
        match self {
            IndexKind::Simple => !column_type.is_container(),
            IndexKind::Keys | IndexKind::Entries => matches!(column_type, ColumnType::Map(_, _)),
            IndexKind::Values => column_type.is_collection(),
            IndexKind::Full => matches!(column_type, ColumnType::Tuple(_)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IndexKind::Simple => "simple",
            IndexKind::Keys => "keys",
            IndexKind::Values => "values",
            IndexKind::Entries => "entries",
            IndexKind::Full => "full",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(IndexKind::Simple),
            "keys" => Ok(IndexKind::Keys),
            "values" => Ok(IndexKind::Values),
            "entries" => Ok(IndexKind::Entries),
            "full" => Ok(IndexKind::Full),
            other => Err(SchemaError::UnknownIndexKind(other.to_string())),
        }
    }
}

/// A column plus the part of it an index covers.
///
/// This is the identity used to decide whether an index already exists: a
/// `keys(...)` index does not satisfy a declared `values(...)` index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexTarget {
    /// Column db name, unquoted.
    pub column: String,
    pub kind: IndexKind,
}

impl IndexTarget {
    pub fn new(column: impl Into<String>, kind: IndexKind) -> Self {
        Self {
            column: column.into(),
            kind,
        }
    }

    /// Parse a catalog target such as `second_key`, `values(int_set)` or
    /// `keys("textMap")`.
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SchemaError::invalid_name(raw, "empty index target"));
        }
        if let Some(inner) = raw.strip_suffix(')') {
            if let Some((kind, column)) = inner.split_once('(') {
                if !kind.trim().starts_with('"') {
                    let kind: IndexKind = kind.parse()?;
                    return Ok(Self::new(unquote_identifier(column), kind));
                }
            }
        }
        Ok(Self::new(unquote_identifier(raw), IndexKind::Simple))
    }

    /// Target expression for `CREATE INDEX ... ON table (<target>)`.
    pub fn to_cql(&self) -> String {
        let column = quote_identifier(&self.column);
        match self.kind {
            IndexKind::Simple => column,
            kind => format!("{}({})", kind, column),
        }
    }
}

impl fmt::Display for IndexTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cql())
    }
}

impl Serialize for IndexTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_cql())
    }
}

impl<'de> Deserialize<'de> for IndexTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        IndexTarget::parse(&raw).map_err(de::Error::custom)
    }
}

/// Value supplied for a column that an insert leaves out.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DefaultValue {
    #[default]
    None,
    Value(Value),
    RandomUuid,
    Now,
}

impl DefaultValue {
    /// Produce a fresh default, or `None` when the column has no policy.
    pub fn produce(&self) -> Option<Value> {
        match self {
            DefaultValue::None => None,
            DefaultValue::Value(v) => Some(v.clone()),
            DefaultValue::RandomUuid => Some(Value::Uuid(Uuid::new_v4())),
            DefaultValue::Now => Some(Value::Timestamp(Utc::now())),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, DefaultValue::None)
    }
}

/// Which half of the primary key a column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    Partition,
    Clustering,
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::Partition => f.write_str("partition"),
            KeyRole::Clustering => f.write_str("clustering"),
        }
    }
}

/// A single declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Logical name used by callers
    pub name: String,

    /// Name of the column in the database (defaults to `name`)
    pub db_name: String,

    pub column_type: ColumnType,

    /// Part of the primary key (partition or clustering)
    pub primary_key: bool,

    /// Part of the partition key. Resolved by the table builder: when no
    /// column asks for it explicitly, the first primary key column gets it.
    pub partition_key: bool,

    /// Only meaningful on clustering keys
    pub clustering_order: ClusteringOrder,

    /// Shared by every row of a partition
    pub is_static: bool,

    /// Secondary index, if any
    pub index: Option<IndexKind>,

    /// Must be present on insert
    pub required: bool,

    pub default: DefaultValue,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let name = name.into();
        Self {
            db_name: name.clone(),
            name,
            column_type,
            primary_key: false,
            partition_key: false,
            clustering_order: ClusteringOrder::Asc,
            is_static: false,
            index: None,
            required: false,
            default: DefaultValue::None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark as partition key (implies primary key).
    pub fn partition_key(mut self) -> Self {
        self.primary_key = true;
        self.partition_key = true;
        self
    }

    pub fn descending(mut self) -> Self {
        self.clustering_order = ClusteringOrder::Desc;
        self
    }

    pub fn static_column(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.index = Some(IndexKind::default_for(&self.column_type));
        self
    }

    pub fn indexed_on(mut self, kind: IndexKind) -> Self {
        self.index = Some(kind);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultValue::Value(value.into());
        self
    }

    pub fn default_uuid(mut self) -> Self {
        self.default = DefaultValue::RandomUuid;
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default = DefaultValue::Now;
        self
    }

    pub fn is_partition_key(&self) -> bool {
        self.partition_key
    }

    pub fn is_clustering_key(&self) -> bool {
        self.primary_key && !self.partition_key
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    pub fn index_target(&self) -> Option<IndexTarget> {
        self.index.map(|kind| IndexTarget::new(self.db_name.clone(), kind))
    }

    /// Double-quoted db name, as used in every generated statement.
    pub fn quoted(&self) -> String {
        quote_identifier(&self.db_name)
    }

    /// `"name" type [static]`, the fragment used by CREATE and ALTER ADD.
    pub fn cql_definition(&self) -> String {
        let mut def = format!("{} {}", self.quoted(), self.column_type);
        if self.is_static {
            def.push_str(" static");
        }
        def
    }

    /// Key identity: db name, type and (for clustering keys) order.
    pub fn same_key_identity(&self, other: &ColumnDescriptor) -> bool {
        self.db_name == other.db_name
            && self.column_type == other.column_type
            && (self.partition_key || self.clustering_order == other.clustering_order)
    }

    /// Short rendering used in key mismatch errors.
    pub fn key_summary(&self) -> String {
        if self.is_clustering_key() {
            format!("{} {} {}", self.db_name, self.column_type, self.clustering_order)
        } else {
            format!("{} {}", self.db_name, self.column_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_flags() {
        let col = ColumnDescriptor::new("renamed", ColumnType::map(ColumnType::Text, ColumnType::Text))
            .db_name("blah")
            .indexed();

        assert_eq!(col.name, "renamed");
        assert_eq!(col.db_name, "blah");
        assert_eq!(col.index, Some(IndexKind::Values));
        assert_eq!(col.quoted(), "\"blah\"");
        assert!(!col.primary_key);

        let key = ColumnDescriptor::new("id", ColumnType::Uuid).partition_key();
        assert!(key.primary_key && key.is_partition_key());
        assert!(!key.is_clustering_key());
    }

    #[test]
    fn test_cql_definition_marks_static() {
        let col = ColumnDescriptor::new("name", ColumnType::Text).static_column();
        assert_eq!(col.cql_definition(), "\"name\" text static");
    }

    #[test]
    fn test_default_index_kinds() {
        assert_eq!(IndexKind::default_for(&ColumnType::Text), IndexKind::Simple);
        assert_eq!(IndexKind::default_for(&ColumnType::set(ColumnType::Int)), IndexKind::Values);
        assert_eq!(IndexKind::default_for(&ColumnType::list(ColumnType::Int)), IndexKind::Values);
        assert_eq!(
            IndexKind::default_for(&ColumnType::tuple(vec![ColumnType::Text, ColumnType::Int])),
            IndexKind::Full
        );

        let map = ColumnType::map(ColumnType::Text, ColumnType::Timestamp);
        assert!(IndexKind::Keys.is_valid_for(&map));
        assert!(IndexKind::Entries.is_valid_for(&map));
        assert!(!IndexKind::Keys.is_valid_for(&ColumnType::set(ColumnType::Int)));
        assert!(!IndexKind::Simple.is_valid_for(&map));
    }

    #[test]
    fn test_index_target_parse() {
        assert_eq!(
            IndexTarget::parse("second_key").unwrap(),
            IndexTarget::new("second_key", IndexKind::Simple)
        );
        assert_eq!(
            IndexTarget::parse("values(int_set)").unwrap(),
            IndexTarget::new("int_set", IndexKind::Values)
        );
        assert_eq!(
            IndexTarget::parse("KEYS(\"textMap\")").unwrap(),
            IndexTarget::new("textMap", IndexKind::Keys)
        );
        assert_eq!(
            IndexTarget::parse("\"odd(name)\"").unwrap(),
            IndexTarget::new("odd(name)", IndexKind::Simple)
        );
        assert!(IndexTarget::parse("bogus(col)").is_err());
    }

    #[test]
    fn test_index_target_cql() {
        assert_eq!(IndexTarget::new("text", IndexKind::Simple).to_cql(), "\"text\"");
        assert_eq!(IndexTarget::new("m", IndexKind::Entries).to_cql(), "entries(\"m\")");
    }

    #[test]
    fn test_default_value_policies() {
        assert!(DefaultValue::None.produce().is_none());
        assert!(matches!(DefaultValue::RandomUuid.produce(), Some(Value::Uuid(_))));
        assert!(matches!(DefaultValue::Now.produce(), Some(Value::Timestamp(_))));
        assert_eq!(DefaultValue::Value(Value::Int(3)).produce(), Some(Value::Int(3)));
    }

    #[test]
    fn test_key_identity_includes_clustering_order() {
        let asc = ColumnDescriptor::new("c", ColumnType::Int).primary_key();
        let desc = ColumnDescriptor::new("c", ColumnType::Int).primary_key().descending();
        assert!(!asc.same_key_identity(&desc));

        let float = ColumnDescriptor::new("c", ColumnType::Float).primary_key();
        assert!(!asc.same_key_identity(&float));
        assert!(asc.same_key_identity(&asc.clone()));
    }
}
