//! Record types describing themselves through the Model trait.

use colfam_model::{
    builder_for, ColumnDescriptor, IndexKind, Model, SchemaError, TableDescriptor,
};
use colfam_protocol::ColumnType;

struct TestIndexSetModel;

impl Model for TestIndexSetModel {
    fn describe() -> Result<TableDescriptor, SchemaError> {
        builder_for::<Self>("cqlengine_test")
            .column(ColumnDescriptor::new("partition", ColumnType::Uuid).primary_key())
            .column(ColumnDescriptor::new("int_set", ColumnType::set(ColumnType::Int)).indexed())
            .column(ColumnDescriptor::new("int_list", ColumnType::list(ColumnType::Int)).indexed())
            .column(
                ColumnDescriptor::new(
                    "text_map",
                    ColumnType::map(ColumnType::Text, ColumnType::Timestamp),
                )
                .indexed(),
            )
            .column(
                ColumnDescriptor::new(
                    "mixed_tuple",
                    ColumnType::tuple(vec![ColumnType::Text, ColumnType::Int, ColumnType::Text]),
                )
                .indexed(),
            )
            .build()
    }
}

struct FakeModel;

impl Model for FakeModel {
    fn describe() -> Result<TableDescriptor, SchemaError> {
        builder_for::<Self>("cqlengine_test").build()
    }
}

#[test]
fn test_describe_container_indexes() {
    let table = TestIndexSetModel::describe().unwrap();
    assert_eq!(table.table.name, "test_index_set_model");

    let kinds: Vec<_> = table.index_targets().into_iter().map(|t| (t.column, t.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            ("int_set".to_string(), IndexKind::Values),
            ("int_list".to_string(), IndexKind::Values),
            ("text_map".to_string(), IndexKind::Values),
            ("mixed_tuple".to_string(), IndexKind::Full),
        ]
    );
}

#[test]
fn test_model_without_columns_is_a_schema_error() {
    assert!(matches!(FakeModel::describe(), Err(SchemaError::NoColumns(_))));
}
