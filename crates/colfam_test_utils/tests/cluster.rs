//! The in-memory cluster behaves like a catalog and a storage engine would.

use colfam_db::{Session, SessionError};
use colfam_model::{IndexKind, IndexTarget, OptionValue, TableName};
use colfam_protocol::{Statement, Value};
use colfam_test_utils::MemoryCluster;

fn run(cluster: &MemoryCluster, query: &str) -> Result<colfam_protocol::RowSet, SessionError> {
    cluster.execute(&Statement::new(query))
}

fn run_with(cluster: &MemoryCluster, query: &str, values: Vec<Value>) -> colfam_protocol::RowSet {
    cluster.execute(&Statement::with_values(query, values)).unwrap()
}

fn table() -> TableName {
    TableName::new("ks", "t")
}

fn with_table() -> MemoryCluster {
    let cluster = MemoryCluster::new().with_keyspace("ks");
    run(
        &cluster,
        "CREATE TABLE IF NOT EXISTS ks.t (\"id\" int, \"c\" int, \"tags\" set<text>, \"props\" map<text, text>, \
         PRIMARY KEY ((\"id\"), \"c\")) WITH compaction = {'class': 'LeveledCompactionStrategy'}",
    )
    .unwrap();
    cluster
}

#[test]
fn test_catalog_reports_options_as_text() {
    let cluster = with_table();
    let options = cluster.table_options(&table()).unwrap();

    assert_eq!(options.get("gc_grace_seconds"), Some(&OptionValue::from("864000")));
    let compaction = options.get("compaction").unwrap().to_string();
    assert!(compaction.contains("org.apache.cassandra.db.compaction.LeveledCompactionStrategy"));
}

#[test]
fn test_metadata_round_trip() {
    let cluster = with_table();
    let descriptor = cluster.fetch_table_metadata(&table()).unwrap().unwrap();

    assert_eq!(descriptor.partition_keys()[0].db_name, "id");
    assert_eq!(descriptor.clustering_keys()[0].db_name, "c");
    assert_eq!(descriptor.columns().len(), 4);
    assert!(cluster.fetch_table_metadata(&TableName::new("ks", "missing")).unwrap().is_none());
}

#[test]
fn test_every_statement_is_recorded() {
    let cluster = with_table();
    assert_eq!(cluster.execute_count(), 1);

    let err = run(&cluster, "ALTER TABLE ks.t WITH bogus = 1").unwrap_err();
    assert!(err.to_string().contains("Unknown property 'bogus'"));
    assert_eq!(cluster.execute_count(), 2);

    cluster.clear_log();
    assert!(cluster.executed().is_empty());
}

#[test]
fn test_duplicate_column_rejected() {
    let cluster = with_table();
    assert!(run(&cluster, "ALTER TABLE ks.t ADD \"tags\" set<text>").is_err());
    run(&cluster, "ALTER TABLE ks.t ADD \"extra\" text").unwrap();
    let descriptor = cluster.fetch_table_metadata(&table()).unwrap().unwrap();
    assert!(descriptor.column_by_db_name("extra").is_some());
}

#[test]
fn test_index_rules() {
    let cluster = with_table();
    run(&cluster, "CREATE INDEX IF NOT EXISTS t_props_idx ON ks.t (keys(\"props\"))").unwrap();
    run(&cluster, "CREATE INDEX IF NOT EXISTS t_props_idx ON ks.t (keys(\"props\"))").unwrap();
    assert!(run(&cluster, "CREATE INDEX IF NOT EXISTS other ON ks.t (keys(\"props\"))").is_err());
    assert!(run(&cluster, "CREATE INDEX IF NOT EXISTS t_tags_idx ON ks.t (keys(\"tags\"))").is_err());

    let indexes = cluster.fetch_index_metadata(&table()).unwrap();
    assert_eq!(indexes.len(), 1);
    assert!(indexes.contains(&IndexTarget::new("props", IndexKind::Keys)));
}

#[test]
fn test_collection_cells() {
    let cluster = with_table();
    run_with(
        &cluster,
        "UPDATE ks.t SET \"tags\" = \"tags\" + ? WHERE \"id\" = ? AND \"c\" = ?",
        vec![Value::text_set(["b", "a"]), Value::Int(1), Value::Int(1)],
    );
    run_with(
        &cluster,
        "UPDATE ks.t SET \"tags\" = \"tags\" - ? WHERE \"id\" = ? AND \"c\" = ?",
        vec![Value::text_set(["zz"]), Value::Int(1), Value::Int(1)],
    );

    let rows = run_with(&cluster, "SELECT * FROM ks.t WHERE \"id\" = ?", vec![Value::Int(1)]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.rows()[0].value("tags"), Some(&Value::text_set(["a", "b"])));
    assert_eq!(rows.rows()[0].value("props"), Some(&Value::Null));

    // Removing the last element leaves no cell behind
    run_with(
        &cluster,
        "UPDATE ks.t SET \"tags\" = \"tags\" - ? WHERE \"id\" = ? AND \"c\" = ?",
        vec![Value::text_set(["a", "b"]), Value::Int(1), Value::Int(1)],
    );
    let rows = run_with(&cluster, "SELECT * FROM ks.t WHERE \"id\" = ?", vec![Value::Int(1)]);
    assert_eq!(rows.rows()[0].value("tags"), Some(&Value::Null));
}

#[test]
fn test_unused_values_are_an_error() {
    let cluster = with_table();
    let err = cluster
        .execute(&Statement::with_values(
            "SELECT * FROM ks.t WHERE \"id\" = ?",
            vec![Value::Int(1), Value::Int(2)],
        ))
        .unwrap_err();
    assert!(matches!(err, SessionError::Query { .. }));
}

#[test]
fn test_drop_keyspace_drops_tables() {
    let cluster = with_table();
    run(&cluster, "DROP KEYSPACE IF EXISTS ks").unwrap();
    assert!(!cluster.has_keyspace("ks"));
    assert_eq!(cluster.row_count(&table()), 0);
    assert!(cluster.fetch_table_metadata(&table()).unwrap().is_none());
}

#[test]
fn test_failing_batch_member_rolls_back_the_batch() {
    let cluster = with_table();
    let err = cluster
        .execute(&Statement::with_values(
            "BEGIN BATCH INSERT INTO ks.t (\"id\", \"c\") VALUES (?, ?); \
             UPDATE ks.t SET \"nope\" = ? WHERE \"id\" = ? AND \"c\" = ?; APPLY BATCH",
            vec![Value::Int(1), Value::Int(1), Value::Int(0), Value::Int(1), Value::Int(2)],
        ))
        .unwrap_err();
    assert!(err.to_string().contains("Undefined column name nope"));
    assert_eq!(cluster.row_count(&table()), 0);

    run_with(
        &cluster,
        "BEGIN UNLOGGED BATCH INSERT INTO ks.t (\"id\", \"c\") VALUES (?, ?); \
         INSERT INTO ks.t (\"id\", \"c\") VALUES (?, ?); APPLY BATCH",
        vec![Value::Int(1), Value::Int(1), Value::Int(2), Value::Int(1)],
    );
    assert_eq!(cluster.row_count(&table()), 2);
}
