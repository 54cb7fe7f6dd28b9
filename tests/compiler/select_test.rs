// tests/compiler/select_test.rs
use chronoql::catalog::{ColumnType, MemoryCatalog, TableMetadata};
use chronoql::compiler::Compiler;
use chronoql::model::Projection;
use chronoql::SqlErrorKind;
use insta::assert_snapshot;

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
            TableMetadata::new("zyzy")
                .col("a", ColumnType::Int)
                .col("b", ColumnType::Int)
                .col("c", ColumnType::Int)
                .col("z", ColumnType::Int),
        )
        .register(
            TableMetadata::new("xyz")
                .col("a", ColumnType::Int)
                .col("b", ColumnType::Int)
                .col("c", ColumnType::Int)
                .col("ts", ColumnType::Timestamp)
                .timestamp("ts"),
        )
        .register(
            TableMetadata::new("customers")
                .col("customerId", ColumnType::Int)
                .col("customerName", ColumnType::String),
        )
        .register(
            TableMetadata::new("orders")
                .col("orderId", ColumnType::Int)
                .col("customerId", ColumnType::Int)
                .col("amount", ColumnType::Double),
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

#[test]
fn test_plain_columns_are_chosen() {
    assert_eq!(compile("select x, y from tab"), "select-choose x, y from (tab)");
    assert_eq!(compile("select x x1, y from tab"), "select-choose x x1, y from (tab)");
}

#[test]
fn test_repeated_column_gets_numbered_alias() {
    assert_eq!(compile("select x, x from tab"), "select-choose x, x x1 from (tab)");
}

#[test]
fn test_computed_columns_are_virtual() {
    assert_eq!(
        compile("select x + y, z from tab"),
        "select-virtual x + y column, z from (tab)"
    );
}

#[test]
fn test_select_star_returns_row_source() {
    assert_eq!(compile("select * from tab where x > 1"), "tab where x > 1");
}

#[test]
fn test_simple_group_by() {
    assert_eq!(
        compile("select x, sum(y) from tab"),
        "select-group-by x, sum(y) sum from (tab)"
    );
    assert_eq!(
        compile("select count() from tab"),
        "select-group-by count() count from (tab)"
    );
}

#[test]
fn test_group_by_with_computed_keys_and_arithmetic_over_aggregates() {
    assert_snapshot!(
        compile("select a+b*c x, sum(z)+25 ohoh from zyzy"),
        @"select-virtual x, sum + 25 ohoh from (select-group-by x, sum(z) sum from (select-virtual a + b * c x, z from (zyzy)))"
    );
}

#[test]
fn test_analytic_columns() {
    assert_snapshot!(
        compile("select a, b, f(c) over (partition by b order by ts) from xyz"),
        @"select-analytic a, b, f(c) f over (partition by b order by ts) from (xyz)"
    );
}

#[test]
fn test_qualified_columns_of_joined_sources_are_translated() {
    assert_snapshot!(
        compile(
            "select c.customerId, count() from customers c \
             join orders o on c.customerId = o.customerId"
        ),
        @"select-group-by customerId, count() count from (select-choose c.customerId customerId from (customers c join orders o on o.customerId = c.customerId))"
    );
}

#[test]
fn test_plain_join_select_keeps_qualifiers() {
    assert_snapshot!(
        compile(
            "select c.customerName, o.amount from customers c \
             join orders o on c.customerId = o.customerId"
        ),
        @"select-choose c.customerName customerName, o.amount amount from (customers c join orders o on o.customerId = c.customerId)"
    );
}

#[test]
fn test_projection_kind_is_exposed() {
    let catalog = catalog();
    let compiled = Compiler::new(&catalog)
        .compile("select x, sum(y) total from tab")
        .unwrap();
    let model = compiled.as_query().unwrap();
    match &model.projection {
        Some(Projection::GroupBy(columns)) => {
            assert_eq!(columns.len(), 2);
            assert_eq!(columns[1].alias, "total");
        }
        other => panic!("expected group-by, got {other:?}"),
    }
}

#[test]
fn test_duplicate_explicit_alias() {
    let catalog = catalog();
    let err = Compiler::new(&catalog)
        .compile("select x a, y a from tab")
        .unwrap_err();
    assert_eq!(err.position, 14);
    assert_eq!(err.kind, SqlErrorKind::DuplicateColumn("a".into()));
}

#[test]
fn test_analytic_mixed_with_aggregate() {
    let catalog = catalog();
    let err = Compiler::new(&catalog)
        .compile("select sum(x), count() over() from tab")
        .unwrap_err();
    assert_eq!(err.position, 0);
    assert_eq!(err.kind, SqlErrorKind::AnalyticFunctionNotAllowed);
}

#[test]
fn test_unknown_select_column() {
    let catalog = catalog();
    let err = Compiler::new(&catalog).compile("select k from tab").unwrap_err();
    assert_eq!(err.position, 7);
    assert_eq!(err.kind, SqlErrorKind::InvalidColumn("k".into()));
}

#[test]
fn test_filter_stays_on_source_under_group_by() {
    assert_snapshot!(
        compile("select a+b*c x, sum(z)+25 ohoh from zyzy where a in (0,10) and b = 10"),
        @"select-virtual x, sum + 25 ohoh from (select-group-by x, sum(z) sum from (select-virtual a + b * c x, z from (zyzy where in(10,0,a) and b = 10)))"
    );
}

#[test]
fn test_order_by_unselected_column_under_computed_list() {
    assert_snapshot!(
        compile("select 2*y+x from tab order by x"),
        @"select-choose column from (select-virtual 2 * y + x column, x from (select-choose 2 * y + x column, x from (tab)) order by x)"
    );
    assert_snapshot!(
        compile("select 2*y+x, 3/x from tab order by x"),
        @"select-choose column, column1 from (select-virtual 2 * y + x column, 3 / x column1, x from (select-choose 2 * y + x column, 3 / x column1, x from (tab)) order by x)"
    );
}

#[test]
fn test_renamed_column_under_computed_list_is_translated() {
    assert_eq!(
        compile("select x + 1, y k from tab"),
        "select-virtual x + 1 column, k from (select-choose x, y k from (tab))"
    );
    assert_eq!(
        compile("select y k, sum(x) from tab"),
        "select-group-by k, sum(x) sum from (select-choose y k, x from (tab))"
    );
}
