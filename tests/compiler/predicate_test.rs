// tests/compiler/predicate_test.rs
use chronoql::catalog::{ColumnType, MemoryCatalog, TableMetadata};
use chronoql::compiler::Compiler;

fn catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog
        .register(
            TableMetadata::new("tab")
                .col("x", ColumnType::Int)
                .col("y", ColumnType::Int)
                .col("z", ColumnType::Int),
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
        )
        .register(
            TableMetadata::new("trades")
                .col("sym", ColumnType::Symbol)
                .col("price", ColumnType::Double)
                .with_default_timestamp(),
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
fn test_filter_pushed_into_sub_query() {
    assert_eq!(
        compile("select x from (select x, y from tab) where y > 1"),
        "select-choose x from ((select-choose x, y from (tab where y > 1)))"
    );
}

#[test]
fn test_filter_follows_renamed_column() {
    assert_eq!(
        compile("select cid from (select customerId cid from customers) c where c.cid = 100"),
        "select-choose cid from ((select-choose customerId cid from (customers where customerId = 100)) c)"
    );
}

#[test]
fn test_filter_on_computed_column_stays_outside() {
    assert_eq!(
        compile("select y from (select x, z + x y from tab) t1 where y > 0"),
        "select-choose y from ((select-virtual x, z + x y from (tab)) t1 where y > 0)"
    );
}

#[test]
fn test_limit_blocks_pushdown() {
    assert_eq!(
        compile("select x from (select x from tab limit 10) where x > 1"),
        "select-choose x from ((select-choose x from (tab limit 10)) where x > 1)"
    );
}

#[test]
fn test_latest_by_blocks_pushdown() {
    assert_eq!(
        compile("select sym from (trades latest by sym) where price > 1"),
        "select-choose sym from ((trades latest by sym) where price > 1)"
    );
}

#[test]
fn test_negation_normalized_before_placement() {
    assert_eq!(
        compile("select x from tab where not (x > 1 and y = 2)"),
        "select-choose x from (tab where x <= 1 or y != 2)"
    );
}

#[test]
fn test_disjunction_stays_one_conjunct() {
    assert_eq!(
        compile("select x from tab where x = 1 or y = 2"),
        "select-choose x from (tab where x = 1 or y = 2)"
    );
}

#[test]
fn test_constant_conjunct_goes_to_const_where() {
    assert_eq!(
        compile("select x from tab where 1 = 1 and x > 2"),
        "select-choose x from (tab where x > 2 const-where 1 = 1)"
    );
}

#[test]
fn test_filter_spanning_inner_join_is_post_join() {
    assert_eq!(
        compile(
            "customers c join orders o on c.customerId = o.customerId \
             where c.customerId > o.amount"
        ),
        "customers c join orders o on o.customerId = c.customerId post-join-where c.customerId > o.amount"
    );
}
