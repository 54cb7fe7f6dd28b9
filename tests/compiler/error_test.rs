// tests/compiler/error_test.rs
use chronoql::catalog::{ColumnType, MemoryCatalog, TableMetadata};
use chronoql::compiler::Compiler;
use chronoql::{SqlError, SqlErrorKind};

fn catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog
        .register(
            TableMetadata::new("tab")
                .col("x", ColumnType::Int)
                .col("y", ColumnType::Int)
                .with_default_timestamp(),
        )
        .register(
            TableMetadata::new("customers")
                .col("customerId", ColumnType::Int)
                .col("customerName", ColumnType::String),
        )
        .register(
            TableMetadata::new("orders")
                .col("orderId", ColumnType::Int)
                .col("customerId", ColumnType::Int),
        );
    catalog
}

fn error(sql: &str) -> SqlError {
    let catalog = catalog();
    match Compiler::new(&catalog).compile(sql) {
        Ok(compiled) => panic!("{sql} compiled to {compiled}"),
        Err(err) => err,
    }
}

#[test]
fn test_unknown_table_message() {
    let err = error("select x from nope");
    assert_eq!(err.to_string(), "table does not exist: nope at position 14");
}

#[test]
fn test_first_error_wins() {
    // the table is bound before the select list is resolved
    let err = error("select k from nope");
    assert_eq!(err.kind, SqlErrorKind::TableDoesNotExist("nope".into()));
}

#[test]
fn test_unknown_column_in_where() {
    let err = error("select x from tab where k > 1");
    assert_eq!(err.position, 24);
    assert_eq!(err.message(), "Invalid column: k");
}

#[test]
fn test_unknown_column_in_join_condition() {
    let err = error("customers c join orders o on c.customerIdx = o.customerId");
    assert_eq!(err.position, 29);
    assert_eq!(err.kind, SqlErrorKind::InvalidColumn("c.customerIdx".into()));
}

#[test]
fn test_timestamp_and_latest_by_name_master_columns() {
    let err = error("tab timestamp(q)");
    assert_eq!(err.position, 14);
    assert_eq!(err.kind, SqlErrorKind::InvalidColumn("q".into()));

    let err = error("tab latest by q");
    assert_eq!(err.position, 14);
    assert_eq!(err.kind, SqlErrorKind::InvalidColumn("q".into()));
}

#[test]
fn test_parse_errors_surface_through_compiler() {
    let err = error("select from tab");
    assert_eq!(err.position, 7);
    assert_eq!(err.kind, SqlErrorKind::MissingColumns);

    let err = error("select x from tab t inner join customers c");
    assert_eq!(err.message(), "'on' expected");

    let err = error("select x x.y, y from tab");
    assert_eq!(err.position, 9);
    assert_eq!(err.kind, SqlErrorKind::DotNotAllowed);
}

#[test]
fn test_latest_by_not_allowed_on_sub_query() {
    let err = error("select x,y from (tab where x = 100) latest by x");
    assert_eq!(err.position, 36);
    assert_eq!(err.kind, SqlErrorKind::LatestByNotAllowedOnSubquery);
}
