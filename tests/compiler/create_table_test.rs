// tests/compiler/create_table_test.rs
use chronoql::catalog::{ColumnType, MemoryCatalog, PartitionBy};
use chronoql::compiler::{CompiledStatement, Compiler};
use chronoql::config::CompilerSettings;
use chronoql::SqlErrorKind;

fn compile_with(sql: &str, settings: CompilerSettings) -> Result<CompiledStatement, chronoql::SqlError> {
    let catalog = MemoryCatalog::new();
    Compiler::with_settings(&catalog, settings).compile(sql)
}

fn compile(sql: &str) -> Result<CompiledStatement, chronoql::SqlError> {
    compile_with(sql, CompilerSettings::default())
}

#[test]
fn test_create_table_canonical_text() {
    let compiled = compile(
        "create table trades (sym SYMBOL index, price DOUBLE, ts TIMESTAMP) \
         timestamp(ts) partition by DAY",
    )
    .unwrap();
    assert_eq!(
        compiled.to_string(),
        "create table trades (sym SYMBOL index block size 256, price DOUBLE, ts TIMESTAMP) timestamp(ts) partition by DAY"
    );

    let model = compiled.as_create_table().unwrap();
    assert_eq!(model.timestamp_index, Some(2));
    assert_eq!(model.partition_by, PartitionBy::Day);
    assert_eq!(model.column("PRICE").map(|c| c.column_type), Some(ColumnType::Double));
    assert!(compiled.as_query().is_none());
}

#[test]
fn test_default_block_size_comes_from_settings() {
    let settings = CompilerSettings {
        index_value_block_size: 1024,
        ..CompilerSettings::default()
    };
    let compiled = compile_with("create table x (a INT, b SYMBOL), index(b)", settings).unwrap();
    let model = compiled.as_create_table().unwrap();
    assert!(!model.columns[0].indexed);
    assert_eq!(model.columns[1].index_block_size, 1024);
}

#[test]
fn test_record_hint_is_kept() {
    let compiled = compile("create table x (a INT) record hint 100").unwrap();
    assert_eq!(
        compiled.to_string(),
        "create table x (a INT) partition by NONE record hint 100"
    );
}

#[test]
fn test_index_on_unknown_column() {
    let err = compile("create table x (a INT), index(b)").unwrap_err();
    assert_eq!(err.position, 30);
    assert_eq!(err.kind, SqlErrorKind::InvalidColumn("b".into()));
}

#[test]
fn test_unknown_column_type() {
    let err = compile("create table x (a VARCHAR)").unwrap_err();
    assert_eq!(err.position, 18);
    assert_eq!(err.kind, SqlErrorKind::InvalidColumnType("VARCHAR".into()));
}

#[test]
fn test_unknown_partition() {
    let err = compile("create table x (a INT) partition by WEEK").unwrap_err();
    assert_eq!(err.position, 36);
    assert_eq!(err.kind, SqlErrorKind::InvalidPartition("WEEK".into()));
}

#[test]
fn test_json_form_is_tagged() {
    let compiled = compile("create table x (t TIMESTAMP) timestamp(t)").unwrap();
    let json = serde_json::to_value(&compiled).unwrap();
    assert_eq!(json["kind"], "create_table");
    assert_eq!(json["model"]["name"], "x");
    assert_eq!(json["model"]["columns"][0]["column_type"], "TIMESTAMP");
    assert_eq!(json["model"]["timestamp_index"], 0);
}
