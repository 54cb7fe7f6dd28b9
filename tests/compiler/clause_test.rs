// tests/compiler/clause_test.rs
use chronoql::catalog::{ColumnType, MemoryCatalog, TableMetadata};
use chronoql::compiler::Compiler;
use chronoql::config::CompilerSettings;
use chronoql::{SqlError, SqlErrorKind};

fn catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog
        .register(
            TableMetadata::new("tab")
                .col("x", ColumnType::Int)
                .col("y", ColumnType::Int)
                .col("z", ColumnType::Int)
                .with_default_timestamp(),
        )
        .register(
            TableMetadata::new("trades")
                .col("sym", ColumnType::Symbol)
                .col("price", ColumnType::Double)
                .with_default_timestamp(),
        )
        .register(
            TableMetadata::new("plain")
                .col("x", ColumnType::Int)
                .col("y", ColumnType::Double),
        );
    catalog
}

fn compile(sql: &str) -> String {
    let catalog = catalog();
    Compiler::new(&catalog)
        .compile(sql)
        .unwrap_or_else(|e| panic!("{sql}: {e}"))
        .to_string()
}

fn error(sql: &str) -> SqlError {
    let catalog = catalog();
    Compiler::new(&catalog)
        .compile(sql)
        .expect_err("statement should fail")
}

// ============================================================================
// sample by
// ============================================================================

#[test]
fn test_sample_by_keys_on_designated_timestamp() {
    assert_eq!(
        compile("select sym, avg(price) from trades sample by 1h"),
        "select-group-by timestamp, sym, avg(price) avg from (trades) timestamp (timestamp) sample by 1h"
    );
}

#[test]
fn test_sample_by_requires_aggregate() {
    let err = error("select sym, price from trades sample by 1h");
    assert_eq!(err.position, 40);
    assert_eq!(err.kind, SqlErrorKind::AtLeastOneAggregateRequired);
}

#[test]
fn test_sample_by_requires_timestamp() {
    let err = error("select x, sum(y) from plain sample by 1h");
    assert_eq!(err.position, 38);
    assert_eq!(err.kind, SqlErrorKind::TimestampNotDefined);
}

#[test]
fn test_sample_by_timestamp_must_be_timestamp_typed() {
    let err = error("select sum(price) from trades timestamp(price) sample by 1d");
    assert_eq!(err.position, 40);
    assert_eq!(err.kind, SqlErrorKind::NotATimestamp("price".into()));
}

// ============================================================================
// order by
// ============================================================================

#[test]
fn test_order_by_selected_alias() {
    assert_eq!(
        compile("select x, y from tab order by y desc"),
        "select-choose x, y from (tab) order by y desc"
    );
}

#[test]
fn test_order_by_hidden_column_adds_wrapper() {
    assert_eq!(
        compile("select x from tab order by y"),
        "select-choose x from (select-choose x, y from (tab) order by y)"
    );
}

#[test]
fn test_order_by_unselected_column_under_group_by() {
    let err = error("select x, sum(y) from tab order by z");
    assert_eq!(err.position, 35);
    assert_eq!(err.kind, SqlErrorKind::InvalidColumn("z".into()));
}

#[test]
fn test_order_by_column_cap() {
    let catalog = catalog();
    let settings = CompilerSettings {
        max_order_by_columns: 2,
        ..CompilerSettings::default()
    };
    let err = Compiler::with_settings(&catalog, settings)
        .compile("select x, y, z from tab order by x, y, z")
        .unwrap_err();
    assert_eq!(err.position, 39);
    assert_eq!(err.kind, SqlErrorKind::TooManyColumns(2));
}

#[test]
fn test_inner_order_by_dropped_under_ordered_parent() {
    assert_eq!(
        compile("select x from (select x from tab order by x) order by x"),
        "select-choose x from ((select-choose x from (tab))) order by x"
    );
}

#[test]
fn test_inner_order_by_kept_under_limit() {
    assert_eq!(
        compile("select x from (select x from tab order by x limit 10) order by x"),
        "select-choose x from ((select-choose x from (tab) order by x limit 10)) order by x"
    );
}

// ============================================================================
// limit, latest by
// ============================================================================

#[test]
fn test_limit_without_order_applies_to_rows_read() {
    assert_eq!(
        compile("select x from tab limit 10"),
        "select-choose x from (tab limit 10)"
    );
}

#[test]
fn test_limit_with_order_applies_to_output() {
    assert_eq!(
        compile("select x from tab order by x limit 5,10"),
        "select-choose x from (tab) order by x limit 5,10"
    );
}

#[test]
fn test_latest_by_on_master() {
    assert_eq!(
        compile("select sym, price from trades latest by sym"),
        "select-choose sym, price from (trades latest by sym)"
    );
}

fn compile_with(catalog: &MemoryCatalog, sql: &str) -> Result<String, SqlError> {
    Compiler::new(catalog).compile(sql).map(|c| c.to_string())
}

fn sampled_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog.register(
        TableMetadata::new("tab")
            .col("x", ColumnType::Timestamp)
            .col("y", ColumnType::Int),
    );
    catalog.register(
        TableMetadata::new("ticks")
            .col("a", ColumnType::Int)
            .col("b", ColumnType::Int)
            .col("t", ColumnType::Timestamp),
    );
    catalog
}

#[test]
fn test_sample_by_key_named_before_selected_columns() {
    let catalog = sampled_catalog();
    assert_eq!(
        compile_with(&catalog, "select x,avg(y) from tab timestamp(x) sample by 2m").unwrap(),
        "select-group-by x, x1, avg(y) avg from (select-choose x, x x1, y from (tab)) timestamp (x) sample by 2m"
    );
}

#[test]
fn test_sample_by_without_select_list_aggregated_by_enclosing_query() {
    let catalog = sampled_catalog();
    assert_eq!(
        compile_with(
            &catalog,
            "select a, sum(b) from ((ticks order by t) timestamp(t) sample by 10m order by t) order by a"
        )
        .unwrap(),
        "select-group-by a, sum(b) sum from (((ticks order by t) timestamp (t) sample by 10m)) order by a"
    );
}

#[test]
fn test_sample_by_without_select_list_needs_aggregating_parent() {
    let catalog = sampled_catalog();
    let sql = "select a, b from ((ticks) timestamp(t) sample by 10m)";
    let err = compile_with(&catalog, sql).unwrap_err();
    assert_eq!(err.position, sql.find("10m").unwrap());
    assert_eq!(err.kind, SqlErrorKind::AtLeastOneAggregateRequired);

    let sql = "(ticks) timestamp(t) sample by 10m";
    let err = compile_with(&catalog, sql).unwrap_err();
    assert_eq!(err.position, 31);
    assert_eq!(err.kind, SqlErrorKind::AtLeastOneAggregateRequired);
}
