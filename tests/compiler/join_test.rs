// tests/compiler/join_test.rs
use chronoql::catalog::{ColumnType, MemoryCatalog, TableMetadata};
use chronoql::compiler::Compiler;
use chronoql::config::CompilerSettings;
use chronoql::model::JoinProvenance;
use chronoql::SqlErrorKind;
use insta::assert_snapshot;

fn catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog
        .register(
            TableMetadata::new("orders")
                .col("orderId", ColumnType::Int)
                .col("customerId", ColumnType::Int)
                .col("amount", ColumnType::Double),
        )
        .register(
            TableMetadata::new("customers")
                .col("customerId", ColumnType::Int)
                .col("customerName", ColumnType::String),
        )
        .register(
            TableMetadata::new("orderDetails")
                .col("orderId", ColumnType::Int)
                .col("productId", ColumnType::Int),
        )
        .register(
            TableMetadata::new("products")
                .col("productId", ColumnType::Int)
                .col("supplier", ColumnType::Symbol),
        )
        .register(TableMetadata::new("suppliers").col("supplier", ColumnType::Symbol))
        .register(
            TableMetadata::new("trades")
                .col("sym", ColumnType::Symbol)
                .col("price", ColumnType::Double)
                .with_default_timestamp(),
        )
        .register(
            TableMetadata::new("quotes")
                .col("sym", ColumnType::Symbol)
                .col("bid", ColumnType::Double)
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
fn test_joins_reordered_breadth_first_from_master() {
    assert_snapshot!(
        compile(
            "select customers.customerName, d.productId from orders \
             join customers on 1=1 \
             join orderDetails d on d.orderId = orders.orderId and d.productId = customers.customerId \
             join products on d.productId = products.productId \
             join suppliers on products.supplier = suppliers.supplier \
             where d.productId = d.orderId"
        ),
        @"select-choose customers.customerName customerName, d.productId productId from (orders join (orderDetails d where d.productId = d.orderId) d on d.orderId = orders.orderId join customers on customers.customerId = d.productId join products on products.productId = d.productId join suppliers on suppliers.supplier = products.supplier const-where 1 = 1)"
    );
}

#[test]
fn test_outer_join_keeps_position_and_receives_constants() {
    assert_snapshot!(
        compile(
            "customers c outer join orders o on c.customerId = o.customerId \
             where c.customerId = 100"
        ),
        @"customers c outer join (orders o where o.customerId = 100) o on o.customerId = c.customerId where c.customerId = 100"
    );
}

#[test]
fn test_outer_join_side_filter_is_post_join() {
    assert_eq!(
        compile("customers c outer join orders o on c.customerId = o.customerId where o.amount > 5"),
        "customers c outer join orders o on o.customerId = c.customerId post-join-where o.amount > 5"
    );
}

#[test]
fn test_inner_join_constant_propagates_to_master() {
    assert_snapshot!(
        compile(
            "select c.customerName from customers c \
             join orders o on c.customerId = o.customerId \
             where o.customerId = 100"
        ),
        @"select-choose c.customerName customerName from (customers c join (orders o where o.customerId = 100) o on o.customerId = c.customerId where c.customerId = 100)"
    );
}

#[test]
fn test_join_on_column_list() {
    assert_eq!(
        compile("customers c join orders o on (customerId)"),
        "customers c join orders o on o.customerId = c.customerId"
    );
}

#[test]
fn test_asof_join_carries_timestamps() {
    assert_eq!(
        compile("trades asof join quotes on (sym)"),
        "trades timestamp (timestamp) asof join quotes timestamp (timestamp) on quotes.sym = trades.sym"
    );
}

#[test]
fn test_cross_join_without_criteria() {
    assert_eq!(compile("customers cross join orders"), "customers cross join orders");

    let catalog = catalog();
    let compiled = Compiler::new(&catalog)
        .compile("customers cross join orders")
        .unwrap();
    let model = compiled.as_query().unwrap();
    assert_eq!(model.joins[0].provenance, JoinProvenance::ImplicitCross);
}

#[test]
fn test_cross_join_sentinels_are_numbered() {
    let catalog = catalog();
    let settings = CompilerSettings {
        synthesize_cross_join_sentinels: true,
        ..CompilerSettings::default()
    };
    let compiled = Compiler::with_settings(&catalog, settings)
        .compile("customers cross join orders cross join suppliers")
        .unwrap();
    assert_eq!(
        compiled.to_string(),
        "customers cross join orders cross join suppliers const-where 1 = 1 and 2 = 2"
    );
}

#[test]
fn test_unqualified_column_in_two_sources_is_ambiguous() {
    let catalog = catalog();
    let err = Compiler::new(&catalog)
        .compile("orders join customers on customerId = customerId")
        .unwrap_err();
    assert_eq!(err.position, 25);
    assert_eq!(err.kind, SqlErrorKind::AmbiguousColumn("customerId".into()));
}

#[test]
fn test_repeated_alias_fails_at_second() {
    let catalog = catalog();
    let err = Compiler::new(&catalog)
        .compile("customers c join orders c on c.customerId = c.customerId")
        .unwrap_err();
    assert_eq!(err.position, 24);
    assert_eq!(err.kind, SqlErrorKind::DuplicateAlias("c".into()));
}

#[test]
fn test_unknown_qualifier() {
    let catalog = catalog();
    let err = Compiler::new(&catalog)
        .compile("customers c join orders o on c.customerId = x.customerId")
        .unwrap_err();
    assert_eq!(err.position, 44);
    assert_eq!(err.kind, SqlErrorKind::InvalidTableName("x".into()));
}

#[test]
fn test_join_permutations_share_canonical_order() {
    let joins = [
        "join customers on customers.customerId = orders.customerId",
        "join orderDetails d on d.orderId = orders.orderId",
        "join products on products.productId = d.productId",
    ];
    let permutations = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    for permutation in permutations {
        let sql = format!(
            "orders {} {} {}",
            joins[permutation[0]], joins[permutation[1]], joins[permutation[2]]
        );
        assert_eq!(
            compile(&sql),
            "orders join customers on customers.customerId = orders.customerId \
             join orderDetails d on d.orderId = orders.orderId \
             join products on products.productId = d.productId",
            "{sql}"
        );
    }
}

#[test]
fn test_canonical_text_is_stable_across_compilations() {
    let sql = "select customerName, amount \
               from (customers where customerId > 1) join orders on (customerId) \
               where 1 = 1 and orders.amount > 10";
    let catalog = catalog();
    let first = Compiler::new(&catalog).compile(sql).unwrap();
    let second = Compiler::new(&catalog).compile(sql).unwrap();
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_snapshot!(
        first.to_string(),
        @"select-choose customerName, amount from ((customers where customerId > 1) _xQdbA0 join (orders where orders.amount > 10) on orders.customerId = _xQdbA0.customerId const-where 1 = 1)"
    );
}

fn time_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog
        .register(
            TableMetadata::new("trades")
                .col("tag", ColumnType::Symbol)
                .with_default_timestamp(),
        )
        .register(TableMetadata::new("quotes").with_default_timestamp())
        .register(TableMetadata::new("customers").col("customerId", ColumnType::Symbol))
        .register(
            TableMetadata::new("employees")
                .col("employeeId", ColumnType::String)
                .col("lastName", ColumnType::String)
                .col("timestamp", ColumnType::Timestamp),
        );
    catalog
}

fn compile_timed(sql: &str) -> String {
    let catalog = time_catalog();
    Compiler::new(&catalog)
        .compile(sql)
        .unwrap_or_else(|e| panic!("{sql}: {e}"))
        .to_string()
}

#[test]
fn test_master_filter_waits_for_asof_join() {
    assert_eq!(
        compile_timed("trades t asof join quotes q where tag = null"),
        "trades t timestamp (timestamp) asof join quotes q timestamp (timestamp) post-join-where tag = null"
    );
}

#[test]
fn test_asof_join_on_renaming_sub_query() {
    assert_snapshot!(
        compile_timed(
            "customers c asof join (select '1' blah, lastName, employeeId customerId, timestamp \
             from employees order by lastName) a on (customerId)"
        ),
        @"customers c asof join (select-virtual '1' blah, lastName, customerId, timestamp from (select-choose lastName, employeeId customerId, timestamp from (employees)) order by lastName) a on a.customerId = c.customerId"
    );
    assert_snapshot!(
        compile_timed(
            "customers c asof join (select '1' blah, lastName, employeeId customerId, timestamp \
             from employees order by lastName) on (customerId)"
        ),
        @"customers c asof join (select-virtual '1' blah, lastName, customerId, timestamp from (select-choose lastName, employeeId customerId, timestamp from (employees)) order by lastName) _xQdbA0 on _xQdbA0.customerId = c.customerId"
    );
}
