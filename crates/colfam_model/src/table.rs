//! Table descriptors: the ordered column set, the resolved name and options.

use colfam_protocol::ident::{format_identifier, quote_identifier};
use std::collections::HashSet;
use std::fmt;

use crate::column::{ClusteringOrder, ColumnDescriptor, IndexKind, IndexTarget};
use crate::error::SchemaError;
use crate::options::{OptionValue, TableOptions};

/// Keyspace-qualified table name with its case-sensitivity policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    pub keyspace: String,
    pub name: String,
    pub case_sensitive: bool,
}

impl TableName {
    /// Case-insensitive name; lower-cased before any comparison or DDL.
    pub fn new(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            name: name.into().to_lowercase(),
            case_sensitive: false,
        }
    }

    /// Case-sensitive name; always quoted.
    pub fn case_sensitive(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            name: name.into(),
            case_sensitive: true,
        }
    }

    pub fn keyspace_cql(&self) -> String {
        format_identifier(&self.keyspace)
    }

    pub fn name_cql(&self) -> String {
        if self.case_sensitive {
            quote_identifier(&self.name)
        } else {
            format_identifier(&self.name)
        }
    }

    /// `keyspace.table`, quoted where needed.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.keyspace_cql(), self.name_cql())
    }

    /// Deterministic name for an index.
    ///
    /// Collection targets carry their kind after the `_idx` marker, so
    /// `keys(m)` and `values(m)` never share a name, and no kinded name can
    /// equal the `<table>_<column>_idx` name of a plain index.
    pub fn index_name(&self, target: &IndexTarget) -> String {
        match target.kind {
            IndexKind::Simple => format!("{}_{}_idx", self.name, target.column),
            kind => format!("{}_{}_idx_{}", self.name, target.column, kind),
        }
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.keyspace.trim().is_empty() {
            return Err(SchemaError::invalid_name(&self.keyspace, "keyspace name is empty"));
        }
        if self.name.trim().is_empty() {
            return Err(SchemaError::invalid_name(&self.name, "table name is empty"));
        }
        Ok(())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

/// Snake-case table name for a record type name.
///
/// Module paths and generic arguments are dropped, and an underscore is only
/// inserted where a lower-case letter meets an upper-case one, so
/// `TestModel` becomes `test_model` and `TestTTLModel` becomes
/// `test_ttlmodel`.
pub fn table_name_for_type(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let base = base.rsplit("::").next().unwrap_or(base);

    let mut out = String::with_capacity(base.len() + 4);
    let mut prev_lower = false;
    for c in base.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = c.is_ascii_lowercase();
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// A record type that can describe its own table.
pub trait Model {
    fn describe() -> Result<TableDescriptor, SchemaError>;
}

/// Start a builder named after the Rust type `T`.
pub fn builder_for<T: ?Sized>(keyspace: impl Into<String>) -> TableBuilder {
    TableDescriptor::builder(keyspace, table_name_for_type(std::any::type_name::<T>()))
}

/// Immutable description of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub table: TableName,
    columns: Vec<ColumnDescriptor>,
    pub options: TableOptions,
}

impl TableDescriptor {
    pub fn builder(keyspace: impl Into<String>, name: impl Into<String>) -> TableBuilder {
        TableBuilder {
            table: TableName::new(keyspace, name),
            columns: Vec::new(),
            options: TableOptions::new(),
        }
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Look up by logical name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_by_db_name(&self, db_name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.db_name == db_name)
    }

    pub fn partition_keys(&self) -> Vec<&ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_partition_key()).collect()
    }

    pub fn clustering_keys(&self) -> Vec<&ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_clustering_key()).collect()
    }

    /// Partition keys followed by clustering keys.
    pub fn primary_keys(&self) -> Vec<&ColumnDescriptor> {
        let mut keys = self.partition_keys();
        keys.extend(self.clustering_keys());
        keys
    }

    /// Non-key columns (statics included) in declaration order.
    pub fn regular_columns(&self) -> Vec<&ColumnDescriptor> {
        self.columns.iter().filter(|c| !c.primary_key).collect()
    }

    pub fn has_statics(&self) -> bool {
        self.columns.iter().any(|c| c.is_static)
    }

    /// True when the non-key columns are counters.
    pub fn is_counter_table(&self) -> bool {
        self.columns
            .iter()
            .any(|c| !c.primary_key && c.column_type.is_counter())
    }

    pub fn index_targets(&self) -> Vec<IndexTarget> {
        self.columns.iter().filter_map(|c| c.index_target()).collect()
    }

    /// Check every structural invariant.
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.table.validate()?;
        let table = self.table.to_string();

        if self.columns.is_empty() {
            return Err(SchemaError::NoColumns(table));
        }

        let mut names = HashSet::new();
        let mut db_names = HashSet::new();
        for col in &self.columns {
            if col.name.is_empty() || col.db_name.is_empty() {
                return Err(SchemaError::invalid_name(&col.name, "column name is empty"));
            }
            if !names.insert(col.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table,
                    column: col.name.clone(),
                });
            }
            if !db_names.insert(col.db_name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table,
                    column: col.db_name.clone(),
                });
            }
        }

        if self.partition_keys().is_empty() {
            return Err(SchemaError::NoPartitionKey(table));
        }
        let has_clustering = !self.clustering_keys().is_empty();

        for col in &self.columns {
            if col.primary_key {
                if col.column_type.is_collection() || col.column_type.is_counter() {
                    return Err(SchemaError::InvalidKeyType {
                        table,
                        column: col.name.clone(),
                        column_type: col.column_type.to_string(),
                    });
                }
                if col.is_static {
                    return Err(SchemaError::StaticPrimaryKey {
                        table,
                        column: col.name.clone(),
                    });
                }
            }
            if col.is_static && !has_clustering {
                return Err(SchemaError::StaticWithoutClustering {
                    table,
                    column: col.name.clone(),
                });
            }
            if col.clustering_order == ClusteringOrder::Desc && !col.is_clustering_key() {
                return Err(SchemaError::InvalidClusteringOrder {
                    table,
                    column: col.name.clone(),
                });
            }
            if let Some(kind) = col.index {
                if col.column_type.is_counter() {
                    return Err(SchemaError::CounterIndex {
                        table,
                        column: col.name.clone(),
                    });
                }
                if !kind.is_valid_for(&col.column_type) {
                    return Err(SchemaError::InvalidIndexKind {
                        table,
                        column: col.name.clone(),
                        kind: kind.to_string(),
                        column_type: col.column_type.to_string(),
                    });
                }
            }
        }

        let regular = self.regular_columns();
        if let Some(counter) = regular.iter().find(|c| c.column_type.is_counter()) {
            if let Some(other) = regular.iter().find(|c| !c.column_type.is_counter()) {
                return Err(SchemaError::CounterMixed {
                    table,
                    column: counter.name.clone(),
                    other: other.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Accumulates columns and options, then resolves key roles and validates.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    table: TableName,
    columns: Vec<ColumnDescriptor>,
    options: TableOptions,
}

impl TableBuilder {
    /// Keep the table name's case and always quote it.
    pub fn case_sensitive(mut self, name: impl Into<String>) -> Self {
        self.table = TableName::case_sensitive(self.table.keyspace, name);
        self
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = ColumnDescriptor>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name, value);
        self
    }

    pub fn options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(mut self) -> Result<TableDescriptor, SchemaError> {
        // No explicit partition key: the first primary key column takes the role.
        if !self.columns.iter().any(|c| c.partition_key) {
            if let Some(first) = self.columns.iter_mut().find(|c| c.primary_key) {
                first.partition_key = true;
            }
        }

        let descriptor = TableDescriptor {
            table: self.table,
            columns: self.columns,
            options: self.options,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::IndexKind;
    use colfam_protocol::ColumnType;

    fn static_model() -> TableBuilder {
        TableDescriptor::builder("ks", "static_model")
            .column(ColumnDescriptor::new("id", ColumnType::Int).primary_key())
            .column(ColumnDescriptor::new("c", ColumnType::Int).primary_key())
            .column(ColumnDescriptor::new("name", ColumnType::Text).static_column())
    }

    #[test]
    fn test_first_primary_key_becomes_partition_key() {
        let table = static_model().build().unwrap();
        let partition: Vec<_> = table.partition_keys().iter().map(|c| c.name.as_str()).collect();
        let clustering: Vec<_> = table.clustering_keys().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(partition, vec!["id"]);
        assert_eq!(clustering, vec!["c"]);
        assert!(table.has_statics());
    }

    #[test]
    fn test_explicit_partition_keys_win() {
        let table = TableDescriptor::builder("ks", "t")
            .column(ColumnDescriptor::new("a", ColumnType::Int).primary_key())
            .column(ColumnDescriptor::new("b", ColumnType::Int).partition_key())
            .column(ColumnDescriptor::new("c", ColumnType::Int).partition_key())
            .build()
            .unwrap();

        let keys: Vec<_> = table.primary_keys().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
        assert!(table.column("a").unwrap().is_clustering_key());
    }

    #[test]
    fn test_table_name_policies() {
        let lower = TableName::new("ks", "IndexModel");
        assert_eq!(lower.name, "indexmodel");
        assert_eq!(lower.qualified(), "ks.indexmodel");

        let sensitive = TableName::case_sensitive("ks", "IndexModel");
        assert_eq!(sensitive.qualified(), "ks.\"IndexModel\"");

        let keyword = TableName::new("keyspace", "table");
        assert_eq!(keyword.qualified(), "\"keyspace\".\"table\"");
    }

    #[test]
    fn test_table_name_for_type() {
        assert_eq!(table_name_for_type("TestModel"), "test_model");
        assert_eq!(table_name_for_type("my_crate::models::TestTTLModel"), "test_ttlmodel");
        assert_eq!(table_name_for_type("TestDefaultTTLModel"), "test_default_ttlmodel");
        assert_eq!(table_name_for_type("Wrapper<Inner>"), "wrapper");
    }

    #[test]
    fn test_builder_for_type() {
        struct EqualityModel;
        let table = builder_for::<EqualityModel>("ks")
            .column(ColumnDescriptor::new("pk", ColumnType::Int).primary_key())
            .build()
            .unwrap();
        assert_eq!(table.table.name, "equality_model");
    }

    #[test]
    fn test_no_columns() {
        let err = TableDescriptor::builder("ks", "fake_model").build().unwrap_err();
        assert!(matches!(err, SchemaError::NoColumns(_)));
    }

    #[test]
    fn test_no_partition_key() {
        let err = TableDescriptor::builder("ks", "t")
            .column(ColumnDescriptor::new("a", ColumnType::Int))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::NoPartitionKey(_)));
    }

    #[test]
    fn test_duplicate_db_name() {
        let err = TableDescriptor::builder("ks", "t")
            .column(ColumnDescriptor::new("a", ColumnType::Int).primary_key())
            .column(ColumnDescriptor::new("b", ColumnType::Text).db_name("a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateColumn { column, .. } if column == "a"));
    }

    #[test]
    fn test_static_rules() {
        let err = TableDescriptor::builder("ks", "t")
            .column(ColumnDescriptor::new("id", ColumnType::Int).primary_key())
            .column(ColumnDescriptor::new("s", ColumnType::Int).static_column())
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::StaticWithoutClustering { .. }));

        let err = TableDescriptor::builder("ks", "t")
            .column(ColumnDescriptor::new("id", ColumnType::Int).primary_key())
            .column(ColumnDescriptor::new("c", ColumnType::Int).primary_key().static_column())
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::StaticPrimaryKey { .. }));
    }

    #[test]
    fn test_key_type_rules() {
        let err = TableDescriptor::builder("ks", "t")
            .column(ColumnDescriptor::new("id", ColumnType::set(ColumnType::Int)).primary_key())
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidKeyType { .. }));

        let err = TableDescriptor::builder("ks", "t")
            .column(ColumnDescriptor::new("id", ColumnType::Int).primary_key().descending())
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidClusteringOrder { .. }));
    }

    #[test]
    fn test_counter_rules() {
        let ok = TableDescriptor::builder("ks", "likes")
            .column(ColumnDescriptor::new("id", ColumnType::Uuid).primary_key())
            .column(ColumnDescriptor::new("likes", ColumnType::Counter))
            .build()
            .unwrap();
        assert!(ok.is_counter_table());

        let err = TableDescriptor::builder("ks", "likes")
            .column(ColumnDescriptor::new("id", ColumnType::Uuid).primary_key())
            .column(ColumnDescriptor::new("likes", ColumnType::Counter))
            .column(ColumnDescriptor::new("text", ColumnType::Text))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::CounterMixed { .. }));

        let err = TableDescriptor::builder("ks", "likes")
            .column(ColumnDescriptor::new("id", ColumnType::Uuid).primary_key())
            .column(ColumnDescriptor::new("likes", ColumnType::Counter).indexed())
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::CounterIndex { .. }));
    }

    #[test]
    fn test_invalid_index_kind() {
        let err = TableDescriptor::builder("ks", "t")
            .column(ColumnDescriptor::new("id", ColumnType::Uuid).primary_key())
            .column(ColumnDescriptor::new("s", ColumnType::set(ColumnType::Int)).indexed_on(IndexKind::Keys))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidIndexKind { .. }));
    }

    #[test]
    fn test_index_name() {
        let table = TableName::case_sensitive("ks", "IndexModel");
        assert_eq!(
            table.index_name(&IndexTarget::new("second_key", IndexKind::Simple)),
            "IndexModel_second_key_idx"
        );
        assert_eq!(
            table.index_name(&IndexTarget::new("text_map", IndexKind::Keys)),
            "IndexModel_text_map_idx_keys"
        );
        assert_ne!(
            table.index_name(&IndexTarget::new("m", IndexKind::Values)),
            table.index_name(&IndexTarget::new("m", IndexKind::Keys))
        );
        assert_ne!(
            table.index_name(&IndexTarget::new("m", IndexKind::Keys)),
            table.index_name(&IndexTarget::new("m_keys", IndexKind::Simple))
        );
    }
}
