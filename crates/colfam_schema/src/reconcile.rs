//! Diff a declared table against its live counterpart.

use colfam_model::{
    option_kind, ColumnDescriptor, IndexTarget, KeyRole, OptionKind, OptionValue, TableDescriptor,
    TableOptions,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::change::SchemaChange;
use crate::error::ReconcileError;
use crate::plan::{ColumnDrift, ExecutionPlan, LiveTable};

/// Relative tolerance for float options read back from the catalog.
const FLOAT_TOLERANCE: f64 = 1e-9;

/// Compute the DDL that brings `live` in line with `desired`.
///
/// Order of the resulting plan: create table or add columns, then indexes,
/// then options. Key mismatches and option problems are reported before any
/// change is planned, so an `Err` always means no DDL should run.
pub fn reconcile(
    desired: &TableDescriptor,
    live: Option<&LiveTable>,
) -> Result<ExecutionPlan, ReconcileError> {
    desired.validate()?;
    let options = normalize_options(desired)?;
    let table = &desired.table;

    let mut plan = ExecutionPlan::default();

    let Some(live) = live else {
        let mut normalized = desired.clone();
        normalized.options = options;
        plan.changes.push(SchemaChange::CreateTable {
            descriptor: normalized,
        });
        plan.changes
            .extend(index_changes(desired, &BTreeSet::new()));
        info!(table = %table, changes = plan.len(), "Planned table creation");
        return Ok(plan);
    };

    check_primary_key(desired, &live.descriptor)?;

    for column in desired.regular_columns() {
        match live.descriptor.column_by_db_name(&column.db_name) {
            None => plan.changes.push(SchemaChange::AddColumn {
                table: table.clone(),
                column: column.clone(),
            }),
            Some(existing) => {
                if existing.column_type != column.column_type || existing.is_static != column.is_static {
                    let drift = ColumnDrift {
                        column: column.db_name.clone(),
                        desired: type_summary(column),
                        live: type_summary(existing),
                    };
                    warn!(table = %table, "Column drift: {}", drift);
                    plan.drift.push(drift);
                }
            }
        }
    }

    plan.changes.extend(index_changes(desired, &live.indexes));

    if let Some(name) = first_differing_option(&options, &live.descriptor.options) {
        debug!(table = %table, option = name, "Option differs from catalog");
        plan.changes.push(SchemaChange::AlterOptions {
            table: table.clone(),
            options,
        });
    }

    if plan.is_empty() {
        debug!(table = %table, "Schema is up to date");
    } else {
        info!(table = %table, changes = plan.len(), "Planned schema changes");
    }
    Ok(plan)
}

fn type_summary(column: &ColumnDescriptor) -> String {
    if column.is_static {
        format!("{} static", column.column_type)
    } else {
        column.column_type.to_string()
    }
}

/// Reject unknown keys and coerce every declared value to its option kind.
pub fn normalize_options(desired: &TableDescriptor) -> Result<TableOptions, ReconcileError> {
    if let Some(unknown) = desired.options.unknown_keys().first() {
        return Err(ReconcileError::UnknownOption {
            table: desired.table.to_string(),
            option: unknown.to_string(),
        });
    }

    desired
        .options
        .iter()
        .map(|(name, value)| {
            option_kind(name)
                .and_then(|kind| kind.coerce(value))
                .map(|coerced| (name.to_string(), coerced))
                .ok_or_else(|| ReconcileError::InvalidOptionValue {
                    table: desired.table.to_string(),
                    option: name.to_string(),
                    value: value.to_string(),
                })
        })
        .collect()
}

/// Name of the first declared option whose live value differs.
fn first_differing_option<'a>(desired: &'a TableOptions, live: &TableOptions) -> Option<&'a str> {
    desired
        .iter()
        .find(|(name, value)| {
            let Some(kind) = option_kind(name) else {
                return true;
            };
            let live = live.get(name).and_then(|v| kind.coerce(v));
            !option_matches(kind, value, live.as_ref())
        })
        .map(|(name, _)| name)
}

fn option_matches(kind: OptionKind, desired: &OptionValue, live: Option<&OptionValue>) -> bool {
    let Some(live) = live else {
        return false;
    };
    match (kind, desired, live) {
        (OptionKind::Float, OptionValue::Float(a), OptionValue::Float(b)) => {
            (a - b).abs() <= FLOAT_TOLERANCE * a.abs().max(b.abs()).max(1.0)
        }
        (OptionKind::Map, OptionValue::Map(a), OptionValue::Map(b)) => map_is_subset(a, b),
        _ => desired == live,
    }
}

/// Every declared map entry is present live. Class names compare by their
/// simple name, since catalogs report them fully qualified.
fn map_is_subset(desired: &BTreeMap<String, String>, live: &BTreeMap<String, String>) -> bool {
    desired.iter().all(|(key, value)| match live.get(key) {
        Some(live_value) if key == "class" => simple_class(value) == simple_class(live_value),
        Some(live_value) => value == live_value,
        None => false,
    })
}

fn simple_class(class: &str) -> &str {
    class.rsplit('.').next().unwrap_or(class)
}

fn check_primary_key(desired: &TableDescriptor, live: &TableDescriptor) -> Result<(), ReconcileError> {
    compare_keys(
        desired,
        KeyRole::Partition,
        &desired.partition_keys(),
        &live.partition_keys(),
    )?;
    compare_keys(
        desired,
        KeyRole::Clustering,
        &desired.clustering_keys(),
        &live.clustering_keys(),
    )
}

fn compare_keys(
    desired_table: &TableDescriptor,
    role: KeyRole,
    desired: &[&ColumnDescriptor],
    live: &[&ColumnDescriptor],
) -> Result<(), ReconcileError> {
    for position in 0..desired.len().max(live.len()) {
        let d = desired.get(position);
        let l = live.get(position);
        let same = matches!((d, l), (Some(a), Some(b)) if a.same_key_identity(b));
        if !same {
            warn!(table = %desired_table.table, %role, position, "Primary key mismatch");
            return Err(ReconcileError::PrimaryKeyMismatch {
                table: desired_table.table.to_string(),
                role,
                position,
                desired: d.map(|c| c.key_summary()),
                live: l.map(|c| c.key_summary()),
            });
        }
    }
    Ok(())
}

fn index_changes(desired: &TableDescriptor, existing: &BTreeSet<IndexTarget>) -> Vec<SchemaChange> {
    desired
        .index_targets()
        .into_iter()
        .filter(|target| !existing.contains(target))
        .map(|target| SchemaChange::CreateIndex {
            table: desired.table.clone(),
            name: desired.table.index_name(&target),
            target,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use colfam_model::{ColumnDescriptor, IndexKind, SchemaError};
    use colfam_protocol::ColumnType;

    fn first_model() -> TableDescriptor {
        TableDescriptor::builder("ks", "first_model")
            .column(ColumnDescriptor::new("first_key", ColumnType::Uuid).primary_key())
            .column(ColumnDescriptor::new("second_key", ColumnType::Uuid))
            .column(ColumnDescriptor::new("third_key", ColumnType::Text))
            .build()
            .unwrap()
    }

    fn live(descriptor: TableDescriptor) -> LiveTable {
        LiveTable::new(descriptor, BTreeSet::new())
    }

    #[test]
    fn test_absent_table_is_created() {
        let plan = reconcile(&first_model(), None).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(matches!(plan.changes[0], SchemaChange::CreateTable { .. }));
    }

    #[test]
    fn test_unchanged_table_is_a_no_op() {
        let desired = first_model();
        let plan = reconcile(&desired, Some(&live(desired.clone()))).unwrap();
        assert!(plan.is_empty());
        assert!(plan.drift.is_empty());
    }

    #[test]
    fn test_added_columns_only() {
        let live_table = live(first_model());
        let desired = TableDescriptor::builder("ks", "first_model")
            .column(ColumnDescriptor::new("first_key", ColumnType::Uuid).primary_key())
            .column(ColumnDescriptor::new("second_key", ColumnType::Uuid))
            .column(ColumnDescriptor::new("fourth_key", ColumnType::Text))
            .build()
            .unwrap();

        let plan = reconcile(&desired, Some(&live_table)).unwrap();
        assert_eq!(plan.len(), 1);
        match &plan.changes[0] {
            SchemaChange::AddColumn { column, .. } => assert_eq!(column.db_name, "fourth_key"),
            other => panic!("unexpected change {:?}", other),
        }
    }

    #[test]
    fn test_db_name_maps_to_existing_column() {
        let live_table = live(
            TableDescriptor::builder("ks", "first_model")
                .column(ColumnDescriptor::new("first_key", ColumnType::Uuid).primary_key())
                .column(ColumnDescriptor::new("blah", ColumnType::map(ColumnType::Text, ColumnType::Text)))
                .build()
                .unwrap(),
        );
        let desired = TableDescriptor::builder("ks", "first_model")
            .column(ColumnDescriptor::new("first_key", ColumnType::Uuid).primary_key())
            .column(
                ColumnDescriptor::new("renamed", ColumnType::map(ColumnType::Text, ColumnType::Text))
                    .db_name("blah"),
            )
            .build()
            .unwrap();

        assert!(reconcile(&desired, Some(&live_table)).unwrap().is_empty());
    }

    #[test]
    fn test_primary_key_mismatches() {
        let live_table = live(
            TableDescriptor::builder("ks", "primary_keys_only")
                .column(ColumnDescriptor::new("first_key", ColumnType::Int).primary_key())
                .column(ColumnDescriptor::new("second_key", ColumnType::Int).primary_key())
                .build()
                .unwrap(),
        );

        let renamed = TableDescriptor::builder("ks", "primary_keys_only")
            .column(ColumnDescriptor::new("new_first_key", ColumnType::Int).primary_key())
            .column(ColumnDescriptor::new("second_key", ColumnType::Int).primary_key())
            .build()
            .unwrap();
        let err = reconcile(&renamed, Some(&live_table)).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::PrimaryKeyMismatch { role: KeyRole::Partition, position: 0, .. }
        ));

        let retyped = TableDescriptor::builder("ks", "primary_keys_only")
            .column(ColumnDescriptor::new("first_key", ColumnType::Float).primary_key())
            .column(ColumnDescriptor::new("second_key", ColumnType::Int).primary_key())
            .build()
            .unwrap();
        assert!(reconcile(&retyped, Some(&live_table)).is_err());

        let removed = TableDescriptor::builder("ks", "primary_keys_only")
            .column(ColumnDescriptor::new("second_key", ColumnType::Int).primary_key())
            .build()
            .unwrap();
        assert!(reconcile(&removed, Some(&live_table)).is_err());

        let reordered = TableDescriptor::builder("ks", "primary_keys_only")
            .column(ColumnDescriptor::new("first_key", ColumnType::Int).primary_key())
            .column(ColumnDescriptor::new("second_key", ColumnType::Int).primary_key().descending())
            .build()
            .unwrap();
        let err = reconcile(&reordered, Some(&live_table)).unwrap_err();
        match err {
            ReconcileError::PrimaryKeyMismatch { role, position, desired, live, .. } => {
                assert_eq!(role, KeyRole::Clustering);
                assert_eq!(position, 0);
                assert_eq!(desired.as_deref(), Some("second_key int DESC"));
                assert_eq!(live.as_deref(), Some("second_key int ASC"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_added_clustering_key_is_fatal() {
        let live_table = live(
            TableDescriptor::builder("ks", "t")
                .column(ColumnDescriptor::new("a", ColumnType::Int).primary_key())
                .build()
                .unwrap(),
        );
        let desired = TableDescriptor::builder("ks", "t")
            .column(ColumnDescriptor::new("a", ColumnType::Int).primary_key())
            .column(ColumnDescriptor::new("b", ColumnType::Int).primary_key())
            .build()
            .unwrap();
        let err = reconcile(&desired, Some(&live_table)).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::PrimaryKeyMismatch { role: KeyRole::Clustering, live: None, .. }
        ));
    }

    #[test]
    fn test_non_key_type_drift_is_reported_not_altered() {
        let live_table = live(
            TableDescriptor::builder("ks", "inconsistent")
                .column(ColumnDescriptor::new("first_key", ColumnType::Uuid).primary_key())
                .column(ColumnDescriptor::new("second_key", ColumnType::Int))
                .build()
                .unwrap(),
        );
        let desired = TableDescriptor::builder("ks", "inconsistent")
            .column(ColumnDescriptor::new("first_key", ColumnType::Uuid).primary_key())
            .column(ColumnDescriptor::new("second_key", ColumnType::Text))
            .build()
            .unwrap();

        let plan = reconcile(&desired, Some(&live_table)).unwrap();
        assert!(plan.is_empty());
        assert_eq!(
            plan.drift,
            vec![ColumnDrift {
                column: "second_key".to_string(),
                desired: "text".to_string(),
                live: "int".to_string(),
            }]
        );
    }

    #[test]
    fn test_indexes_created_once() {
        let desired = TableDescriptor::builder("ks", "index_model")
            .column(ColumnDescriptor::new("first_key", ColumnType::Uuid).primary_key())
            .column(ColumnDescriptor::new("second_key", ColumnType::Text).indexed())
            .column(
                ColumnDescriptor::new("m", ColumnType::map(ColumnType::Text, ColumnType::Int))
                    .indexed_on(IndexKind::Keys),
            )
            .build()
            .unwrap();

        let mut live_table = live(desired.clone());
        let plan = reconcile(&desired, Some(&live_table)).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan
            .iter()
            .all(|c| matches!(c, SchemaChange::CreateIndex { .. })));

        live_table.indexes.insert(IndexTarget::new("second_key", IndexKind::Simple));
        live_table.indexes.insert(IndexTarget::new("m", IndexKind::Values));
        let plan = reconcile(&desired, Some(&live_table)).unwrap();
        assert_eq!(plan.len(), 1);
        match &plan.changes[0] {
            SchemaChange::CreateIndex { target, name, .. } => {
                assert_eq!(target, &IndexTarget::new("m", IndexKind::Keys));
                assert_eq!(name, "index_model_m_idx_keys");
            }
            other => panic!("unexpected change {:?}", other),
        }
    }

    fn with_options(options: TableOptions) -> TableDescriptor {
        TableDescriptor::builder("ks", "model_with_table_properties")
            .column(ColumnDescriptor::new("key", ColumnType::Uuid).primary_key())
            .options(options)
            .build()
            .unwrap()
    }

    #[test]
    fn test_unknown_option_fails_first() {
        let desired = with_options(
            TableOptions::new()
                .with("comment", "x")
                .with("no way will this ever be an option", "what was I thinking?"),
        );
        let err = reconcile(&desired, None).unwrap_err();
        assert!(err.to_string().contains("Invalid table option"));
        assert!(err.to_string().contains("no way will this ever be an option"));
    }

    #[test]
    fn test_invalid_option_value() {
        let desired = with_options(TableOptions::new().with("gc_grace_seconds", "soon"));
        assert!(matches!(
            reconcile(&desired, None),
            Err(ReconcileError::InvalidOptionValue { .. })
        ));
    }

    #[test]
    fn test_catalog_strings_compare_equal() {
        let desired = with_options(
            TableOptions::new()
                .with("bloom_filter_fp_chance", "0.76328")
                .with("comment", "x")
                .with("gc_grace_seconds", 2063i64)
                .with("compaction", OptionValue::map([("class", "LeveledCompactionStrategy")])),
        );
        let catalog = with_options(
            TableOptions::new()
                .with("bloom_filter_fp_chance", "0.76328")
                .with("comment", "x")
                .with("gc_grace_seconds", "2063")
                .with("crc_check_chance", "1.0")
                .with(
                    "compaction",
                    "{\"class\": \"org.apache.cassandra.db.compaction.LeveledCompactionStrategy\", \
                     \"sstable_size_in_mb\": \"160\"}",
                ),
        );
        let plan = reconcile(&desired, Some(&live(catalog))).unwrap();
        assert!(plan.is_empty(), "unexpected plan: {}", plan);
    }

    #[test]
    fn test_changed_option_restates_full_map() {
        let desired = with_options(
            TableOptions::new()
                .with("comment", "x")
                .with("compaction", OptionValue::map([("class", "SizeTieredCompactionStrategy")])),
        );
        let catalog = with_options(
            TableOptions::new()
                .with("comment", "x")
                .with("compaction", OptionValue::map([("class", "LeveledCompactionStrategy")])),
        );
        let plan = reconcile(&desired, Some(&live(catalog))).unwrap();
        assert_eq!(plan.len(), 1);
        match &plan.changes[0] {
            SchemaChange::AlterOptions { options, .. } => {
                assert_eq!(options.len(), 2);
                assert_eq!(options.get("comment"), Some(&OptionValue::from("x")));
            }
            other => panic!("unexpected change {:?}", other),
        }
    }

    #[test]
    fn test_create_renders_normalized_options() {
        let desired = with_options(TableOptions::new().with("bloom_filter_fp_chance", "0.76328"));
        let plan = reconcile(&desired, None).unwrap();
        assert!(plan.changes[0].to_cql().ends_with("WITH bloom_filter_fp_chance = 0.76328"));
    }

    #[test]
    fn test_malformed_model() {
        let desired = TableDescriptor::builder("ks", "t")
            .column(ColumnDescriptor::new("id", ColumnType::Int).primary_key())
            .build()
            .unwrap();
        let mut broken = desired.clone();
        broken.table.name.clear();
        assert!(matches!(
            reconcile(&broken, None),
            Err(ReconcileError::Schema(SchemaError::InvalidName { .. }))
        ));
    }
}
