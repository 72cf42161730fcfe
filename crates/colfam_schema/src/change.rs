//! DDL statements as values.
//!
//! Every change renders to a statement that is safe to run twice: creates
//! carry `IF NOT EXISTS`, drops carry `IF EXISTS`, and option alters restate
//! the whole option map.

use colfam_model::{ColumnDescriptor, IndexTarget, TableDescriptor, TableName, TableOptions};
use colfam_protocol::ident::{escape_string_literal, format_identifier};
use colfam_protocol::Statement;
use std::collections::BTreeMap;
use std::fmt;

/// Keyspace replication strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replication {
    Simple { replication_factor: u32 },
    NetworkTopology { datacenters: BTreeMap<String, u32> },
}

impl Replication {
    /// The replication map literal.
    pub fn to_cql(&self) -> String {
        match self {
            Replication::Simple { replication_factor } => format!(
                "{{'class': 'SimpleStrategy', 'replication_factor': {}}}",
                replication_factor
            ),
            Replication::NetworkTopology { datacenters } => {
                let mut parts = vec!["'class': 'NetworkTopologyStrategy'".to_string()];
                parts.extend(
                    datacenters
                        .iter()
                        .map(|(dc, rf)| format!("{}: {}", escape_string_literal(dc), rf)),
                );
                format!("{{{}}}", parts.join(", "))
            }
        }
    }
}

/// A single DDL step.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    CreateTable {
        descriptor: TableDescriptor,
    },

    AddColumn {
        table: TableName,
        column: ColumnDescriptor,
    },

    CreateIndex {
        table: TableName,
        /// See [`TableName::index_name`]
        name: String,
        target: IndexTarget,
    },

    /// Restates the complete option map
    AlterOptions {
        table: TableName,
        options: TableOptions,
    },

    DropTable {
        table: TableName,
    },

    CreateKeyspace {
        name: String,
        replication: Replication,
    },

    DropKeyspace {
        name: String,
    },
}

impl SchemaChange {
    pub fn to_cql(&self) -> String {
        match self {
            SchemaChange::CreateTable { descriptor } => create_table_cql(descriptor),
            SchemaChange::AddColumn { table, column } => {
                format!("ALTER TABLE {} ADD {}", table.qualified(), column.cql_definition())
            }
            SchemaChange::CreateIndex {
                table,
                name,
                target,
            } => format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                format_identifier(name),
                table.qualified(),
                target.to_cql()
            ),
            SchemaChange::AlterOptions { table, options } => {
                format!("ALTER TABLE {} WITH {}", table.qualified(), options.to_cql())
            }
            SchemaChange::DropTable { table } => {
                format!("DROP TABLE IF EXISTS {}", table.qualified())
            }
            SchemaChange::CreateKeyspace { name, replication } => format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {} AND durable_writes = true",
                format_identifier(name),
                replication.to_cql()
            ),
            SchemaChange::DropKeyspace { name } => {
                format!("DROP KEYSPACE IF EXISTS {}", format_identifier(name))
            }
        }
    }

    pub fn to_statement(&self) -> Statement {
        Statement::new(self.to_cql())
    }

    /// Table the change applies to, if any.
    pub fn table(&self) -> Option<&TableName> {
        match self {
            SchemaChange::CreateTable { descriptor } => Some(&descriptor.table),
            SchemaChange::AddColumn { table, .. }
            | SchemaChange::CreateIndex { table, .. }
            | SchemaChange::AlterOptions { table, .. }
            | SchemaChange::DropTable { table } => Some(table),
            SchemaChange::CreateKeyspace { .. } | SchemaChange::DropKeyspace { .. } => None,
        }
    }
}

fn create_table_cql(descriptor: &TableDescriptor) -> String {
    let partition = descriptor.partition_keys();
    let clustering = descriptor.clustering_keys();

    let mut definitions: Vec<String> = descriptor
        .primary_keys()
        .iter()
        .map(|c| c.cql_definition())
        .collect();
    definitions.extend(descriptor.regular_columns().iter().map(|c| c.cql_definition()));

    let partition_cols: Vec<String> = partition.iter().map(|c| c.quoted()).collect();
    let mut key = format!("({})", partition_cols.join(", "));
    for col in &clustering {
        key.push_str(", ");
        key.push_str(&col.quoted());
    }
    definitions.push(format!("PRIMARY KEY ({})", key));

    let mut cql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        descriptor.table.qualified(),
        definitions.join(", ")
    );

    let mut with = Vec::new();
    if !clustering.is_empty() {
        let order: Vec<String> = clustering
            .iter()
            .map(|c| format!("{} {}", c.quoted(), c.clustering_order))
            .collect();
        with.push(format!("CLUSTERING ORDER BY ({})", order.join(", ")));
    }
    if !descriptor.options.is_empty() {
        with.push(descriptor.options.to_cql());
    }
    if !with.is_empty() {
        cql.push_str(" WITH ");
        cql.push_str(&with.join(" AND "));
    }
    cql
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaChange::CreateTable { descriptor } => {
                write!(f, "Create table {} ({} columns)", descriptor.table, descriptor.columns().len())
            }
            SchemaChange::AddColumn { table, column } => {
                write!(f, "Add column '{}' ({}) to {}", column.db_name, column.column_type, table)
            }
            SchemaChange::CreateIndex { table, name, target } => {
                write!(f, "Create index {} on {} ({})", name, table, target)
            }
            SchemaChange::AlterOptions { table, options } => {
                write!(f, "Set {} options on {}", options.len(), table)
            }
            SchemaChange::DropTable { table } => write!(f, "Drop table {}", table),
            SchemaChange::CreateKeyspace { name, .. } => write!(f, "Create keyspace {}", name),
            SchemaChange::DropKeyspace { name } => write!(f, "Drop keyspace {}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colfam_model::{IndexKind, OptionValue};
    use colfam_protocol::ColumnType;

    fn static_model() -> TableDescriptor {
        TableDescriptor::builder("cqlengine_test", "static_model")
            .column(ColumnDescriptor::new("id", ColumnType::Int).primary_key())
            .column(ColumnDescriptor::new("c", ColumnType::Int).primary_key().descending())
            .column(ColumnDescriptor::new("name", ColumnType::Text).static_column())
            .option("comment", "x")
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_table_cql() {
        let change = SchemaChange::CreateTable {
            descriptor: static_model(),
        };
        assert_eq!(
            change.to_cql(),
            "CREATE TABLE IF NOT EXISTS cqlengine_test.static_model \
             (\"id\" int, \"c\" int, \"name\" text static, PRIMARY KEY ((\"id\"), \"c\")) \
             WITH CLUSTERING ORDER BY (\"c\" DESC) AND comment = 'x'"
        );
    }

    #[test]
    fn test_create_table_orders_keys_first() {
        let table = TableDescriptor::builder("ks", "t")
            .column(ColumnDescriptor::new("data", ColumnType::Text))
            .column(ColumnDescriptor::new("b", ColumnType::Int).partition_key())
            .column(ColumnDescriptor::new("a", ColumnType::Int).partition_key())
            .build()
            .unwrap();
        let cql = SchemaChange::CreateTable { descriptor: table }.to_cql();
        assert_eq!(
            cql,
            "CREATE TABLE IF NOT EXISTS ks.t (\"b\" int, \"a\" int, \"data\" text, \
             PRIMARY KEY ((\"b\", \"a\")))"
        );
    }

    #[test]
    fn test_add_column_and_index_cql() {
        let table = TableName::case_sensitive("ks", "IndexModel");
        let add = SchemaChange::AddColumn {
            table: table.clone(),
            column: ColumnDescriptor::new("where", ColumnType::Text),
        };
        assert_eq!(add.to_cql(), "ALTER TABLE ks.\"IndexModel\" ADD \"where\" text");

        let index = SchemaChange::CreateIndex {
            name: table.index_name(&IndexTarget::new("second_key", IndexKind::Simple)),
            table,
            target: IndexTarget::new("second_key", IndexKind::Simple),
        };
        assert_eq!(
            index.to_cql(),
            "CREATE INDEX IF NOT EXISTS \"IndexModel_second_key_idx\" ON ks.\"IndexModel\" (\"second_key\")"
        );
    }

    #[test]
    fn test_alter_options_restates_everything() {
        let change = SchemaChange::AlterOptions {
            table: TableName::new("ks", "t"),
            options: TableOptions::new()
                .with("compaction", OptionValue::map([("class", "SizeTieredCompactionStrategy")]))
                .with("default_time_to_live", 10i64),
        };
        assert_eq!(
            change.to_cql(),
            "ALTER TABLE ks.t WITH compaction = {'class': 'SizeTieredCompactionStrategy'} \
             AND default_time_to_live = 10"
        );
    }

    #[test]
    fn test_keyspace_cql() {
        let simple = SchemaChange::CreateKeyspace {
            name: "keyspace".to_string(),
            replication: Replication::Simple { replication_factor: 1 },
        };
        assert_eq!(
            simple.to_cql(),
            "CREATE KEYSPACE IF NOT EXISTS \"keyspace\" WITH replication = \
             {'class': 'SimpleStrategy', 'replication_factor': 1} AND durable_writes = true"
        );

        let nts = SchemaChange::CreateKeyspace {
            name: "test_ks_nts".to_string(),
            replication: Replication::NetworkTopology {
                datacenters: [("dc1".to_string(), 1)].into(),
            },
        };
        assert!(nts.to_cql().contains("{'class': 'NetworkTopologyStrategy', 'dc1': 1}"));

        let drop = SchemaChange::DropKeyspace {
            name: "test_ks_nts".to_string(),
        };
        assert_eq!(drop.to_cql(), "DROP KEYSPACE IF EXISTS test_ks_nts");
    }

    #[test]
    fn test_display() {
        let change = SchemaChange::AddColumn {
            table: TableName::new("ks", "first_model"),
            column: ColumnDescriptor::new("fourth_key", ColumnType::Text),
        };
        let display = change.to_string();
        assert!(display.contains("fourth_key"));
        assert!(display.contains("text"));
    }
}
