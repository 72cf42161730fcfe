//! Schema synchronization against the in-memory cluster.

use colfam_db::{
    create_keyspace_network_topology, create_keyspace_simple, drop_keyspace, drop_model, drop_table,
    plan_synchronize, synchronize, synchronize_model, DbError, Session,
};
use colfam_model::{
    ColumnDescriptor, IndexKind, IndexTarget, Model, OptionValue, SchemaError, TableDescriptor, TableOptions,
};
use colfam_protocol::{ColumnType, Statement};
use colfam_schema::{ReconcileError, SchemaChange};
use colfam_test_utils::MemoryCluster;
use std::collections::{BTreeMap, BTreeSet};

const KS: &str = "cqlengine_test";

fn cluster() -> MemoryCluster {
    MemoryCluster::new().with_keyspace(KS)
}

fn first_model() -> TableDescriptor {
    TableDescriptor::builder(KS, "first_model")
        .column(ColumnDescriptor::new("first_key", ColumnType::Uuid).partition_key())
        .column(ColumnDescriptor::new("second_key", ColumnType::Uuid))
        .column(ColumnDescriptor::new("third_key", ColumnType::Text))
        .build()
        .unwrap()
}

fn second_model() -> TableDescriptor {
    TableDescriptor::builder(KS, "first_model")
        .column(ColumnDescriptor::new("first_key", ColumnType::Uuid).partition_key())
        .column(ColumnDescriptor::new("second_key", ColumnType::Uuid))
        .column(ColumnDescriptor::new("fourth_key", ColumnType::Text))
        .build()
        .unwrap()
}

fn static_model() -> TableDescriptor {
    TableDescriptor::builder(KS, "static_model")
        .column(ColumnDescriptor::new("id", ColumnType::Int).partition_key())
        .column(ColumnDescriptor::new("c", ColumnType::Int).primary_key().descending())
        .column(ColumnDescriptor::new("name", ColumnType::Text).static_column())
        .build()
        .unwrap()
}

fn index_model() -> TableDescriptor {
    TableDescriptor::builder(KS, "IndexModel")
        .case_sensitive("IndexModel")
        .column(ColumnDescriptor::new("id", ColumnType::Int).partition_key())
        .column(ColumnDescriptor::new("second_key", ColumnType::Text).indexed())
        .column(ColumnDescriptor::new("text_map", ColumnType::map(ColumnType::Text, ColumnType::Text)).indexed_on(IndexKind::Keys))
        .column(ColumnDescriptor::new("int_map", ColumnType::map(ColumnType::Int, ColumnType::Int)).indexed_on(IndexKind::Entries))
        .column(ColumnDescriptor::new("text_set", ColumnType::set(ColumnType::Text)).indexed())
        .build()
        .unwrap()
}

fn with_options(options: TableOptions) -> TableDescriptor {
    TableDescriptor::builder(KS, "model_with_options")
        .column(ColumnDescriptor::new("id", ColumnType::Int).partition_key())
        .column(ColumnDescriptor::new("data", ColumnType::Text))
        .options(options)
        .build()
        .unwrap()
}

#[test]
fn test_sync_creates_then_does_nothing() {
    let cluster = cluster();
    let table = first_model();

    let plan = synchronize(&cluster, &table).unwrap();
    assert_eq!(plan.len(), 1);
    assert!(matches!(plan.changes[0], SchemaChange::CreateTable { .. }));
    assert!(cluster.fetch_table_metadata(&table.table).unwrap().is_some());

    cluster.clear_log();
    let plan = synchronize(&cluster, &table).unwrap();
    assert!(plan.is_empty());
    assert_eq!(cluster.execute_count(), 0);
}

#[test]
fn test_static_model_is_idempotent() {
    let cluster = cluster();
    let table = static_model();

    synchronize(&cluster, &table).unwrap();
    let live = cluster.fetch_table_metadata(&table.table).unwrap().unwrap();
    assert!(live.column("name").unwrap().is_static);
    assert_eq!(live.clustering_keys().len(), 1);

    cluster.clear_log();
    synchronize(&cluster, &table).unwrap();
    synchronize(&cluster, &table).unwrap();
    assert_eq!(cluster.execute_count(), 0);
}

#[test]
fn test_columns_are_only_added() {
    let cluster = cluster();
    synchronize(&cluster, &first_model()).unwrap();
    cluster.clear_log();

    let plan = synchronize(&cluster, &second_model()).unwrap();
    assert_eq!(plan.len(), 1);
    let queries = cluster.executed_queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].starts_with("ALTER TABLE cqlengine_test.first_model ADD \"fourth_key\" text"));

    // The column the new model dropped stays live
    let live = cluster.fetch_table_metadata(&second_model().table).unwrap().unwrap();
    let names: Vec<&str> = live.columns().iter().map(|c| c.db_name.as_str()).collect();
    assert_eq!(names.len(), 4);
    assert!(names.contains(&"third_key"));
    assert!(names.contains(&"fourth_key"));

    cluster.clear_log();
    synchronize(&cluster, &second_model()).unwrap();
    synchronize(&cluster, &first_model()).unwrap();
    assert_eq!(cluster.execute_count(), 0);
}

#[test]
fn test_primary_key_mismatch_issues_no_ddl() {
    let cluster = cluster();
    cluster
        .execute(&Statement::new(
            "CREATE TABLE cqlengine_test.static_model (\"id\" int, \"c\" int, \"name\" text, \
             PRIMARY KEY ((\"id\", \"c\")))",
        ))
        .unwrap();
    cluster.clear_log();

    let err = synchronize(&cluster, &static_model()).unwrap_err();
    match err {
        DbError::Reconcile(ReconcileError::PrimaryKeyMismatch { position, .. }) => assert_eq!(position, 1),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(cluster.execute_count(), 0);
}

#[test]
fn test_clustering_order_change_is_a_mismatch() {
    let cluster = cluster();
    cluster
        .execute(&Statement::new(
            "CREATE TABLE cqlengine_test.static_model (\"id\" int, \"c\" int, \"name\" text static, \
             PRIMARY KEY ((\"id\"), \"c\"))",
        ))
        .unwrap();
    cluster.clear_log();

    let err = synchronize(&cluster, &static_model()).unwrap_err();
    assert!(matches!(
        err,
        DbError::Reconcile(ReconcileError::PrimaryKeyMismatch { .. })
    ));
    assert_eq!(cluster.execute_count(), 0);
}

#[test]
fn test_indexes_created_once() {
    let cluster = cluster();
    let table = index_model();

    synchronize(&cluster, &table).unwrap();
    let queries = cluster.executed_queries();
    assert_eq!(queries.len(), 5);
    assert!(queries.iter().any(|q| q.contains("(keys(\"text_map\"))")));
    assert!(queries.iter().any(|q| q.contains("(entries(\"int_map\"))")));
    assert!(queries.iter().any(|q| q.contains("\"IndexModel_second_key_idx\"")));

    let indexes = cluster.fetch_index_metadata(&table.table).unwrap();
    let expected: BTreeSet<_> = [
        IndexTarget::new("second_key", IndexKind::Simple),
        IndexTarget::new("text_map", IndexKind::Keys),
        IndexTarget::new("int_map", IndexKind::Entries),
        IndexTarget::new("text_set", IndexKind::Values),
    ]
    .into();
    assert_eq!(indexes, expected);

    cluster.clear_log();
    synchronize(&cluster, &table).unwrap();
    assert_eq!(cluster.execute_count(), 0);
}

#[test]
fn test_index_added_to_existing_table() {
    let cluster = cluster();
    let plain = TableDescriptor::builder(KS, "IndexModel")
        .case_sensitive("IndexModel")
        .column(ColumnDescriptor::new("id", ColumnType::Int).partition_key())
        .column(ColumnDescriptor::new("second_key", ColumnType::Text))
        .build()
        .unwrap();
    synchronize(&cluster, &plain).unwrap();
    cluster.clear_log();

    let indexed = TableDescriptor::builder(KS, "IndexModel")
        .case_sensitive("IndexModel")
        .column(ColumnDescriptor::new("id", ColumnType::Int).partition_key())
        .column(ColumnDescriptor::new("second_key", ColumnType::Text).indexed())
        .build()
        .unwrap();
    synchronize(&cluster, &indexed).unwrap();
    assert_eq!(
        cluster.executed_queries(),
        vec![
            "CREATE INDEX IF NOT EXISTS \"IndexModel_second_key_idx\" ON cqlengine_test.\"IndexModel\" (\"second_key\")"
                .to_string()
        ]
    );
}

fn map_index_model(kind: IndexKind) -> TableDescriptor {
    TableDescriptor::builder(KS, "map_index_model")
        .column(ColumnDescriptor::new("id", ColumnType::Int).partition_key())
        .column(ColumnDescriptor::new("m", ColumnType::map(ColumnType::Text, ColumnType::Int)).indexed_on(kind))
        .build()
        .unwrap()
}

#[test]
fn test_index_kind_change_on_same_column_converges() {
    let cluster = cluster();
    synchronize(&cluster, &map_index_model(IndexKind::Values)).unwrap();

    let keys = map_index_model(IndexKind::Keys);
    cluster.clear_log();
    let plan = synchronize(&cluster, &keys).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(
        cluster.executed_queries(),
        vec![
            "CREATE INDEX IF NOT EXISTS map_index_model_m_idx_keys ON cqlengine_test.map_index_model (keys(\"m\"))"
                .to_string()
        ]
    );

    let indexes = cluster.fetch_index_metadata(&keys.table).unwrap();
    assert!(indexes.contains(&IndexTarget::new("m", IndexKind::Keys)));
    assert!(indexes.contains(&IndexTarget::new("m", IndexKind::Values)));

    cluster.clear_log();
    let plan = synchronize(&cluster, &keys).unwrap();
    assert!(plan.is_empty());
    assert_eq!(cluster.execute_count(), 0);
}

#[test]
fn test_options_round_trip() {
    let cluster = cluster();
    let table = with_options(
        TableOptions::new()
            .with("bloom_filter_fp_chance", 0.76328)
            .with("comment", "x")
            .with("gc_grace_seconds", 2063i64)
            .with("compaction", OptionValue::map([("class", "LeveledCompactionStrategy")])),
    );

    synchronize(&cluster, &table).unwrap();
    let live = cluster.table_options(&table.table).unwrap();
    assert_eq!(live.get("bloom_filter_fp_chance"), Some(&OptionValue::from("0.76328")));
    assert_eq!(live.get("comment"), Some(&OptionValue::from("x")));
    assert_eq!(live.get("gc_grace_seconds"), Some(&OptionValue::from("2063")));
    assert!(live
        .get("compaction")
        .map(|v| v.to_string().contains("LeveledCompactionStrategy"))
        .unwrap_or(false));

    cluster.clear_log();
    synchronize(&cluster, &table).unwrap();
    assert_eq!(cluster.execute_count(), 0);
}

#[test]
fn test_changed_option_is_altered() {
    let cluster = cluster();
    synchronize(&cluster, &with_options(TableOptions::new().with("comment", "before"))).unwrap();
    cluster.clear_log();

    let changed = with_options(
        TableOptions::new()
            .with("comment", "after")
            .with("default_time_to_live", 10i64),
    );
    synchronize(&cluster, &changed).unwrap();
    let queries = cluster.executed_queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].starts_with("ALTER TABLE cqlengine_test.model_with_options WITH"));

    let live = cluster.table_options(&changed.table).unwrap();
    assert_eq!(live.get("comment"), Some(&OptionValue::from("after")));
    assert_eq!(live.get("default_time_to_live"), Some(&OptionValue::from("10")));
}

#[test]
fn test_unknown_option_fails_before_execution() {
    let cluster = cluster();
    let table = with_options(TableOptions::new().with("comment", "x").with("bogus_option", 1i64));

    let err = synchronize(&cluster, &table).unwrap_err();
    assert!(matches!(
        err,
        DbError::Reconcile(ReconcileError::UnknownOption { ref option, .. }) if option == "bogus_option"
    ));
    assert_eq!(cluster.execute_count(), 0);
    assert!(cluster.fetch_table_metadata(&table.table).unwrap().is_none());
}

#[test]
fn test_plan_executes_nothing() {
    let cluster = cluster();
    let plan = plan_synchronize(&cluster, &index_model()).unwrap();
    assert_eq!(plan.len(), 5);
    assert_eq!(cluster.execute_count(), 0);
}

#[test]
fn test_missing_keyspace_is_reported_by_session() {
    let cluster = MemoryCluster::new();
    let err = synchronize(&cluster, &first_model()).unwrap_err();
    assert!(err.is_session());
}

#[test]
fn test_drop_table_is_idempotent() {
    let cluster = cluster();
    let table = first_model();
    synchronize(&cluster, &table).unwrap();

    drop_table(&cluster, &table).unwrap();
    assert!(cluster.fetch_table_metadata(&table.table).unwrap().is_none());

    cluster.clear_log();
    drop_table(&cluster, &table).unwrap();
    assert_eq!(cluster.execute_count(), 0);
}

struct TestModel;

impl Model for TestModel {
    fn describe() -> Result<TableDescriptor, SchemaError> {
        colfam_model::builder_for::<TestModel>(KS)
            .column(ColumnDescriptor::new("id", ColumnType::Uuid).partition_key())
            .column(ColumnDescriptor::new("count", ColumnType::Int))
            .build()
    }
}

#[test]
fn test_model_sync_and_drop() {
    let cluster = cluster();
    synchronize_model::<TestModel, _>(&cluster).unwrap();
    let table = TestModel::describe().unwrap();
    assert_eq!(table.table.name, "test_model");
    assert!(cluster.fetch_table_metadata(&table.table).unwrap().is_some());

    drop_model::<TestModel, _>(&cluster).unwrap();
    assert!(cluster.fetch_table_metadata(&table.table).unwrap().is_none());
}

#[test]
fn test_keyspace_management() {
    let cluster = MemoryCluster::new();
    create_keyspace_simple(&cluster, "test_ks_simple", 1).unwrap();
    let datacenters: BTreeMap<String, u32> = [("dc1".to_string(), 1)].into();
    create_keyspace_network_topology(&cluster, "test_ks_nts", &datacenters).unwrap();
    assert!(cluster.has_keyspace("test_ks_simple"));
    assert!(cluster.has_keyspace("test_ks_nts"));

    drop_keyspace(&cluster, "test_ks_nts").unwrap();
    assert!(!cluster.has_keyspace("test_ks_nts"));

    let err = create_keyspace_simple(&cluster, " ", 1).unwrap_err();
    assert!(matches!(err, DbError::Reconcile(ReconcileError::Schema(_))));
}
