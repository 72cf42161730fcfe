//! Serde form of a table declaration, as read from TOML model files.
//!
//! ```toml
//! keyspace = "app"
//! name = "test_query_update_model"
//!
//! [options]
//! comment = "updates"
//!
//! [[columns]]
//! name = "partition"
//! type = "uuid"
//! primary_key = true
//! default = "uuid"
//!
//! [[columns]]
//! name = "text"
//! type = "text"
//! index = true
//! ```

use colfam_protocol::{coerce_value, ColumnType, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::column::{ClusteringOrder, ColumnDescriptor, DefaultValue, IndexKind, IndexTarget};
use crate::error::SchemaError;
use crate::options::TableOptions;
use crate::table::{TableDescriptor, TableName};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSpec {
    /// Falls back to the configured default keyspace when absent
    #[serde(default)]
    pub keyspace: Option<String>,

    pub name: String,

    #[serde(default)]
    pub case_sensitive: bool,

    pub columns: Vec<ColumnSpec>,

    #[serde(default)]
    pub options: TableOptions,

    /// Catalog index targets; only meaningful in live snapshots
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    #[serde(default)]
    pub db_name: Option<String>,

    #[serde(default)]
    pub primary_key: bool,

    #[serde(default)]
    pub partition_key: bool,

    #[serde(default)]
    pub order: Option<ClusteringOrder>,

    #[serde(default, rename = "static")]
    pub is_static: bool,

    #[serde(default)]
    pub index: Option<IndexSpec>,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub default: Option<DefaultSpec>,
}

/// `index = true` or `index = "keys"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexSpec {
    Enabled(bool),
    Kind(IndexKind),
}

/// `default = "uuid"`, `default = "now"` or `default = { value = ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultSpec {
    Uuid,
    Now,
    Value(serde_json::Value),
}

impl TableSpec {
    /// Build the descriptor, using `default_keyspace` when the file names none.
    pub fn into_descriptor(self, default_keyspace: &str) -> Result<TableDescriptor, SchemaError> {
        let keyspace = self
            .keyspace
            .clone()
            .unwrap_or_else(|| default_keyspace.to_string());

        let mut builder = TableDescriptor::builder(keyspace.clone(), self.name.clone());
        if self.case_sensitive {
            builder = builder.case_sensitive(self.name.clone());
        }

        for spec in self.columns {
            builder = builder.column(spec.into_column()?);
        }
        builder.options(self.options).build()
    }

    /// Index targets listed by a live snapshot.
    pub fn live_indexes(&self) -> BTreeSet<IndexTarget> {
        self.indexes.iter().cloned().collect()
    }

    /// Snapshot form of a descriptor, the inverse of [`TableSpec::into_descriptor`].
    pub fn from_descriptor(descriptor: &TableDescriptor, indexes: &BTreeSet<IndexTarget>) -> Self {
        let table: &TableName = &descriptor.table;
        Self {
            keyspace: Some(table.keyspace.clone()),
            name: table.name.clone(),
            case_sensitive: table.case_sensitive,
            columns: descriptor.columns().iter().map(ColumnSpec::from_column).collect(),
            options: descriptor.options.clone(),
            indexes: indexes.iter().cloned().collect(),
        }
    }
}

impl TryFrom<TableSpec> for TableDescriptor {
    type Error = SchemaError;

    fn try_from(spec: TableSpec) -> Result<Self, Self::Error> {
        if spec.keyspace.is_none() {
            return Err(SchemaError::invalid_name(&spec.name, "no keyspace given"));
        }
        spec.into_descriptor("")
    }
}

impl ColumnSpec {
    fn into_column(self) -> Result<ColumnDescriptor, SchemaError> {
        let mut column = ColumnDescriptor::new(self.name, self.column_type);
        if let Some(db_name) = self.db_name {
            column = column.db_name(db_name);
        }
        if self.partition_key {
            column = column.partition_key();
        } else if self.primary_key {
            column = column.primary_key();
        }
        if let Some(order) = self.order {
            column.clustering_order = order;
        }
        if self.is_static {
            column = column.static_column();
        }
        match self.index {
            Some(IndexSpec::Enabled(true)) => column = column.indexed(),
            Some(IndexSpec::Kind(kind)) => column = column.indexed_on(kind),
            Some(IndexSpec::Enabled(false)) | None => {}
        }
        if self.required {
            column = column.required();
        }
        column.default = match self.default {
            None => DefaultValue::None,
            Some(DefaultSpec::Uuid) => DefaultValue::RandomUuid,
            Some(DefaultSpec::Now) => DefaultValue::Now,
            Some(DefaultSpec::Value(json)) => {
                let value = coerce_value(&column.column_type, Value::from_json(&json)).map_err(
                    |e| SchemaError::InvalidDefault {
                        column: column.name.clone(),
                        reason: e.to_string(),
                    },
                )?;
                DefaultValue::Value(value)
            }
        };
        Ok(column)
    }

    fn from_column(column: &ColumnDescriptor) -> Self {
        Self {
            name: column.name.clone(),
            column_type: column.column_type.clone(),
            db_name: (column.db_name != column.name).then(|| column.db_name.clone()),
            primary_key: column.primary_key,
            partition_key: column.partition_key,
            order: (column.clustering_order == ClusteringOrder::Desc).then_some(ClusteringOrder::Desc),
            is_static: column.is_static,
            index: column.index.map(IndexSpec::Kind),
            required: column.required,
            default: match &column.default {
                DefaultValue::None => None,
                DefaultValue::RandomUuid => Some(DefaultSpec::Uuid),
                DefaultValue::Now => Some(DefaultSpec::Now),
                DefaultValue::Value(v) => Some(DefaultSpec::Value(v.to_json())),
            },
        }
    }
}
