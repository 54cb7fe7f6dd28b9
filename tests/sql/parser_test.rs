// tests/sql/parser_test.rs
use chronoql::sql::ast::{JoinCondition, SourceAst, Statement};
use chronoql::sql::{parse_statement, JoinKind};
use chronoql::SqlErrorKind;

fn query(sql: &str) -> chronoql::sql::ast::QueryAst {
    match parse_statement(sql) {
        Ok(Statement::Query(q)) => q,
        other => panic!("{sql}: expected a query, got {other:?}"),
    }
}

#[test]
fn test_keywords_are_case_insensitive() {
    let q = query("SELECT x FROM tab WHERE x > 1 ORDER BY x DESC LIMIT 10");
    assert!(q.select.is_some());
    assert!(q.where_clause.is_some());
    assert!(q.order_by[0].descending);
    assert!(q.limit.is_some());
}

#[test]
fn test_operator_offset_is_recorded() {
    let q = query("select x from tab where x > 1");
    let filter = q.where_clause.unwrap();
    assert_eq!(filter.position, 26);
    assert_eq!(filter.to_string(), "x > 1");
}

#[test]
fn test_expression_canonical_text() {
    let q = query("select x from tab where x in ('a', 'b') and -y < 3");
    assert_eq!(q.where_clause.unwrap().to_string(), "in('b','a',x) and -y < 3");
}

#[test]
fn test_quoted_alias_keeps_quotes() {
    let q = query("select x 'my col' from tab");
    let alias = q.select.unwrap().items[0].alias.clone().unwrap();
    assert_eq!(alias.name, "'my col'");
    assert_eq!(alias.position, 9);
}

#[test]
fn test_comments_and_semicolon() {
    let q = query("select x -- note\nfrom tab /* trailing */;");
    assert!(matches!(q.source, SourceAst::Table(ref t) if t.name == "tab"));
}

#[test]
fn test_second_statement_is_rejected() {
    let err = parse_statement("select x from tab; select").unwrap_err();
    assert_eq!(err.position, 19);
    assert_eq!(err.kind, SqlErrorKind::UnexpectedToken("select".into()));
}

#[test]
fn test_sub_query_source() {
    let q = query("select x from (select x from tab where x > 1) t");
    assert_eq!(q.alias.unwrap().name, "t");
    match q.source {
        SourceAst::SubQuery(inner) => {
            assert!(inner.select.is_some());
            assert!(inner.where_clause.is_some());
        }
        SourceAst::Table(t) => panic!("expected sub-query, got table {}", t.name),
    }
}

#[test]
fn test_join_kinds() {
    let q = query("a asof join b splice join c outer join d on x = y cross join e");
    let kinds: Vec<JoinKind> = q.joins.iter().map(|j| j.kind).collect();
    assert_eq!(
        kinds,
        vec![JoinKind::Asof, JoinKind::Splice, JoinKind::Outer, JoinKind::Cross]
    );
    assert!(q.joins[0].condition.is_none());
    assert!(matches!(q.joins[2].condition, Some(JoinCondition::On(_))));
    assert!(q.joins[3].condition.is_none());
}

#[test]
fn test_sample_by_interval_and_limit_range() {
    let q = query("select sum(x) from tab sample by 30m limit 10,20");
    assert_eq!(q.sample_by.unwrap().to_string(), "30m");
    let limit = q.limit.unwrap();
    assert_eq!(limit.lo.to_string(), "10");
    assert_eq!(limit.hi.map(|h| h.to_string()), Some("20".to_string()));
}

#[test]
fn test_nested_sub_queries_are_bounded() {
    let deep = format!("{}tab{}", "(".repeat(150), ")".repeat(150));
    let err = parse_statement(&deep).unwrap_err();
    assert_eq!(err.position, 64);
    assert_eq!(err.kind, SqlErrorKind::NestingTooDeep(64));

    let limit = format!("{}tab{}", "(".repeat(64), ")".repeat(64));
    assert!(matches!(parse_statement(&limit), Ok(Statement::Query(_))));
}
