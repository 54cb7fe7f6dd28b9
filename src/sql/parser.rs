//! Recursive-descent statement parser.
//!
//! ```text
//! statement   := create_table | query [';']
//! query       := ['select' items 'from'] source [alias] ['timestamp' '(' expr ')']
//!                ['latest' 'by' exprs] join* ['where' expr] ['sample' 'by' value]
//!                ['order' 'by' order_items] ['limit' expr [',' expr]]
//! source      := name | '(' query ')'
//! item        := expr [['as'] alias] ['over' '(' ['partition' 'by' exprs] ['order' 'by' order_items] ')']
//! join        := ['inner' | 'outer' | 'asof' | 'splice' | 'cross'] 'join' source [alias]
//!                ['on' (expr | '(' names ')')]
//! ```

use super::ast::*;
use super::cursor::{Lexeme, TokenCursor};
use super::expr::{ColumnRef, ExprKind, ExprNode};
use super::expr_parser::{parse_expr, parse_expr_list};
use super::lexer::Token;
use crate::catalog::{ColumnType, PartitionBy};
use crate::error::{SqlError, SqlErrorKind, SqlResult};

/// Words that end a source and can never be read as its alias.
const CLAUSE_KEYWORDS: [&str; 15] = [
    "where", "join", "inner", "outer", "asof", "splice", "cross", "on", "sample", "order",
    "limit", "latest", "timestamp", "select", "from",
];

fn is_clause_keyword(lexeme: &Lexeme<'_>) -> bool {
    CLAUSE_KEYWORDS.iter().any(|k| lexeme.is_keyword(k))
}

/// Parse one statement.
pub fn parse_statement(sql: &str) -> SqlResult<Statement> {
    let mut cursor = TokenCursor::new(sql)?;
    let statement = match cursor.peek() {
        Some(l) if l.is_keyword("create") => {
            cursor.next();
            Statement::CreateTable(parse_create_table(&mut cursor)?)
        }
        _ => Statement::Query(parse_query(&mut cursor)?),
    };
    cursor.accept(|t| *t == Token::Semicolon);
    if let Some(extra) = cursor.next() {
        return Err(SqlError::unexpected(extra.position, extra.text()));
    }
    Ok(statement)
}

// ============================================================================
// Queries
// ============================================================================

fn parse_query(cursor: &mut TokenCursor<'_>) -> SqlResult<QueryAst> {
    let position = cursor.position();

    let select = match cursor.peek() {
        Some(l) if l.is_keyword("select") => {
            cursor.next();
            parse_select_clause(cursor, l.position)?
        }
        _ => None,
    };

    let source = parse_source(cursor)?;
    let alias = parse_alias(cursor)?;

    let mut timestamp = None;
    if let Some(l) = cursor.peek() {
        if l.is_keyword("timestamp") {
            cursor.next();
            cursor.expect_token(Token::LParen)?;
            timestamp = Some(parse_expr(cursor)?);
            cursor.expect_token(Token::RParen)?;
        }
    }

    let mut latest_by = Vec::new();
    if let Some(l) = cursor.peek() {
        if l.is_keyword("latest") {
            if matches!(source, SourceAst::SubQuery(_)) {
                return Err(SqlError::new(
                    l.position,
                    SqlErrorKind::LatestByNotAllowedOnSubquery,
                ));
            }
            cursor.next();
            cursor.expect_keyword("by")?;
            latest_by = parse_expr_list(cursor)?;
        }
    }

    let mut joins = Vec::new();
    while let Some(join) = parse_join(cursor)? {
        joins.push(join);
    }

    let where_clause = if cursor.accept_keyword("where") {
        Some(parse_expr(cursor)?)
    } else {
        None
    };

    let sample_by = if cursor.accept_keyword("sample") {
        cursor.expect_keyword("by")?;
        let value = cursor.expect_next()?;
        Some(ExprNode::constant(value.text(), value.position))
    } else {
        None
    };

    let order_by = if cursor.accept_keyword("order") {
        cursor.expect_keyword("by")?;
        parse_order_items(cursor, SqlErrorKind::ExpressionExpected)?
    } else {
        Vec::new()
    };

    let limit = if cursor.accept_keyword("limit") {
        let lo = parse_expr(cursor)?;
        let hi = if cursor.accept(|t| *t == Token::Comma) {
            Some(parse_expr(cursor)?)
        } else {
            None
        };
        Some(Limit { lo, hi })
    } else {
        None
    };

    Ok(QueryAst {
        position,
        select,
        source,
        alias,
        timestamp,
        latest_by,
        joins,
        where_clause,
        sample_by,
        order_by,
        limit,
    })
}

/// Items after `select`, through `from`. `None` for `select *`.
fn parse_select_clause(
    cursor: &mut TokenCursor<'_>,
    position: usize,
) -> SqlResult<Option<SelectClause>> {
    match cursor.peek() {
        None => return Err(SqlError::new(cursor.position(), SqlErrorKind::MissingColumns)),
        Some(l) if l.is_keyword("from") => {
            return Err(SqlError::new(l.position, SqlErrorKind::MissingColumns));
        }
        Some(l) if l.token.is_op("*") => {
            cursor.next();
            cursor.expect_keyword("from")?;
            return Ok(None);
        }
        _ => {}
    }

    let mut items = Vec::new();
    loop {
        items.push(parse_select_item(cursor)?);
        let next = cursor.expect_next()?;
        if next.token == Token::Comma {
            continue;
        }
        if next.is_keyword("from") {
            break;
        }
        return Err(SqlError::expected(next.position, ",|from"));
    }
    Ok(Some(SelectClause { position, items }))
}

fn parse_select_item(cursor: &mut TokenCursor<'_>) -> SqlResult<SelectItem> {
    let expr = parse_expr(cursor)?;

    let explicit = cursor.accept_keyword("as");
    let alias = match cursor.peek() {
        Some(l) if explicit || is_column_alias(&l) => {
            cursor.next();
            match l.token {
                Token::Ident(text) if text.contains('.') => {
                    return Err(SqlError::new(l.position, SqlErrorKind::DotNotAllowed));
                }
                Token::Ident(text) | Token::Str(text) => Some(Ident::new(text, l.position)),
                _ => return Err(SqlError::new(l.position, SqlErrorKind::InvalidAlias(l.text().into()))),
            }
        }
        None if explicit => {
            return Err(SqlError::new(cursor.eof_position(), SqlErrorKind::UnexpectedEndOfInput))
        }
        _ => None,
    };

    let window = if cursor.accept_keyword("over") {
        if !matches!(expr.kind, ExprKind::Function { .. }) {
            return Err(SqlError::new(
                expr.position,
                SqlErrorKind::AnalyticFunctionExpected,
            ));
        }
        Some(parse_window(cursor)?)
    } else {
        None
    };

    Ok(SelectItem {
        expr,
        alias,
        window,
    })
}

fn is_column_alias(lexeme: &Lexeme<'_>) -> bool {
    match lexeme.token {
        Token::Str(_) => true,
        Token::Ident(_) => !lexeme.is_keyword("from") && !lexeme.is_keyword("over"),
        _ => false,
    }
}

fn parse_window(cursor: &mut TokenCursor<'_>) -> SqlResult<WindowSpec> {
    cursor.expect_token(Token::LParen)?;
    let mut window = WindowSpec::default();
    if cursor.accept_keyword("partition") {
        cursor.expect_keyword("by")?;
        window.partition_by = parse_expr_list(cursor)?;
    }
    if cursor.accept_keyword("order") {
        cursor.expect_keyword("by")?;
        window.order_by = parse_order_items(cursor, SqlErrorKind::ExpectedToken("literal".into()))?;
    }
    cursor.expect_token(Token::RParen)?;
    Ok(window)
}

/// `col [asc|desc], ...`; a non-name in column position fails with `not_a_name`.
fn parse_order_items(
    cursor: &mut TokenCursor<'_>,
    not_a_name: SqlErrorKind,
) -> SqlResult<Vec<OrderItem>> {
    let mut items = Vec::new();
    loop {
        let lexeme = cursor.expect_next()?;
        let Token::Ident(text) = lexeme.token else {
            return Err(SqlError::new(lexeme.position, not_a_name));
        };
        let expr = ExprNode::column(ColumnRef::parse(text), lexeme.position);
        let descending = if cursor.accept_keyword("desc") {
            true
        } else {
            cursor.accept_keyword("asc");
            false
        };
        items.push(OrderItem { expr, descending });
        if !cursor.accept(|t| *t == Token::Comma) {
            return Ok(items);
        }
    }
}

fn parse_source(cursor: &mut TokenCursor<'_>) -> SqlResult<SourceAst> {
    let lexeme = cursor.expect_next()?;
    match lexeme.token {
        Token::LParen => {
            let query = cursor.nested(lexeme.position, parse_query)?;
            cursor.expect_token(Token::RParen)?;
            Ok(SourceAst::SubQuery(Box::new(query)))
        }
        Token::Ident(name) => Ok(SourceAst::Table(Ident::new(name, lexeme.position))),
        _ => Err(SqlError::unexpected(lexeme.position, lexeme.text())),
    }
}

fn parse_alias(cursor: &mut TokenCursor<'_>) -> SqlResult<Option<Ident>> {
    let Some(lexeme) = cursor.peek() else {
        return Ok(None);
    };
    match lexeme.token {
        Token::Ident(_) if is_clause_keyword(&lexeme) => Ok(None),
        Token::Ident(text) if text.contains('.') => Err(SqlError::new(
            lexeme.position,
            SqlErrorKind::InvalidAlias(text.to_string()),
        )),
        Token::Ident(text) | Token::Str(text) => {
            cursor.next();
            Ok(Some(Ident::new(text, lexeme.position)))
        }
        _ => Ok(None),
    }
}

fn parse_join(cursor: &mut TokenCursor<'_>) -> SqlResult<Option<JoinAst>> {
    let Some(first) = cursor.peek() else {
        return Ok(None);
    };
    let kind = if first.is_keyword("join") || first.is_keyword("inner") {
        JoinKind::Inner
    } else if first.is_keyword("outer") {
        JoinKind::Outer
    } else if first.is_keyword("asof") {
        JoinKind::Asof
    } else if first.is_keyword("splice") {
        JoinKind::Splice
    } else if first.is_keyword("cross") {
        JoinKind::Cross
    } else {
        return Ok(None);
    };
    cursor.next();
    if !first.is_keyword("join") {
        cursor.expect_keyword("join")?;
    }

    let source = parse_source(cursor)?;
    let alias = parse_alias(cursor)?;

    let has_on = matches!(cursor.peek(), Some(l) if l.is_keyword("on"));
    let condition = match kind {
        JoinKind::Cross if has_on => {
            return Err(SqlError::new(
                cursor.position(),
                SqlErrorKind::CrossJoinCondition,
            ));
        }
        JoinKind::Cross => None,
        JoinKind::Inner | JoinKind::Outer if !has_on => {
            return Err(SqlError::new(
                cursor.position(),
                SqlErrorKind::JoinConditionRequired,
            ));
        }
        JoinKind::Asof | JoinKind::Splice if !has_on => None,
        _ => {
            cursor.next();
            Some(parse_join_condition(cursor)?)
        }
    };

    Ok(Some(JoinAst {
        kind,
        position: first.position,
        source,
        alias,
        condition,
    }))
}

/// Either `(a, b, ...)` naming shared columns, or a boolean expression.
fn parse_join_condition(cursor: &mut TokenCursor<'_>) -> SqlResult<JoinCondition> {
    let mark = cursor.mark();
    if let Some(columns) = try_parse_column_list(cursor) {
        return Ok(JoinCondition::Columns(columns));
    }
    cursor.reset(mark);
    Ok(JoinCondition::On(parse_expr(cursor)?))
}

fn try_parse_column_list(cursor: &mut TokenCursor<'_>) -> Option<Vec<ExprNode>> {
    if !cursor.accept(|t| *t == Token::LParen) {
        return None;
    }
    let mut columns = Vec::new();
    loop {
        let lexeme = cursor.next()?;
        match lexeme.token {
            Token::Ident(text) if !text.contains('.') => {
                columns.push(ExprNode::column(ColumnRef::new(text), lexeme.position));
            }
            _ => return None,
        }
        match cursor.next()?.token {
            Token::Comma => continue,
            Token::RParen => return Some(columns),
            _ => return None,
        }
    }
}

// ============================================================================
// Create table
// ============================================================================

fn parse_create_table(cursor: &mut TokenCursor<'_>) -> SqlResult<CreateTableAst> {
    let target = cursor.expect_next()?;
    if !target.is_keyword("table") {
        return Err(SqlError::new(
            target.position,
            SqlErrorKind::UnsupportedCreateTarget,
        ));
    }

    let name = expect_name(cursor)?;
    cursor.expect_token(Token::LParen)?;

    let mut columns = Vec::new();
    loop {
        columns.push(parse_column_def(cursor)?);
        let next = cursor.expect_next()?;
        match next.token {
            Token::Comma => continue,
            Token::RParen => break,
            _ => return Err(SqlError::expected(next.position, "',' or ')'")),
        }
    }

    let mut indexes = Vec::new();
    while cursor.accept(|t| *t == Token::Comma) {
        cursor.expect_keyword("index")?;
        cursor.expect_token(Token::LParen)?;
        let column = expect_name(cursor)?;
        let spec = parse_index_spec(cursor)?;
        cursor.expect_token(Token::RParen)?;
        indexes.push(IndexAst { column, spec });
    }

    let timestamp = if cursor.accept_keyword("timestamp") {
        cursor.expect_token(Token::LParen)?;
        let column = expect_name(cursor)?;
        cursor.expect_token(Token::RParen)?;
        Some(column)
    } else {
        None
    };

    let partition_by = if cursor.accept_keyword("partition") {
        cursor.expect_keyword("by")?;
        let value = cursor.expect_next()?;
        let partition = value.text().parse::<PartitionBy>().map_err(|_| {
            SqlError::new(
                value.position,
                SqlErrorKind::InvalidPartition(value.text().into()),
            )
        })?;
        Some((partition, value.position))
    } else {
        None
    };

    let record_hint = if cursor.accept_keyword("record") {
        cursor.expect_keyword("hint")?;
        let value = cursor.expect_next()?;
        Some(parse_number(&value)?)
    } else {
        None
    };

    Ok(CreateTableAst {
        name,
        columns,
        indexes,
        timestamp,
        partition_by,
        record_hint,
    })
}

fn parse_column_def(cursor: &mut TokenCursor<'_>) -> SqlResult<ColumnDefAst> {
    let name = expect_name(cursor)?;
    let type_token = cursor.expect_next()?;
    let column_type = type_token.text().parse::<ColumnType>().map_err(|_| {
        SqlError::new(
            type_token.position,
            SqlErrorKind::InvalidColumnType(type_token.text().into()),
        )
    })?;
    let index = if cursor.accept_keyword("index") {
        Some(parse_index_spec(cursor)?)
    } else {
        None
    };
    Ok(ColumnDefAst {
        name,
        column_type,
        index,
    })
}

/// Optional `block size N` after `index`.
fn parse_index_spec(cursor: &mut TokenCursor<'_>) -> SqlResult<IndexSpec> {
    if !cursor.accept_keyword("block") {
        return Ok(IndexSpec { block_size: None });
    }
    cursor.expect_keyword("size")?;
    let value = cursor.expect_next()?;
    let size = parse_number(&value)?;
    let size = u32::try_from(size)
        .map_err(|_| SqlError::new(value.position, SqlErrorKind::InvalidNumber(value.text().into())))?;
    Ok(IndexSpec {
        block_size: Some(size),
    })
}

fn expect_name(cursor: &mut TokenCursor<'_>) -> SqlResult<Ident> {
    let lexeme = cursor.expect_next()?;
    match lexeme.token {
        Token::Ident(text) => Ok(Ident::new(text, lexeme.position)),
        _ => Err(SqlError::unexpected(lexeme.position, lexeme.text())),
    }
}

fn parse_number(lexeme: &Lexeme<'_>) -> SqlResult<u64> {
    lexeme
        .text()
        .parse::<u64>()
        .map_err(|_| SqlError::new(lexeme.position, SqlErrorKind::InvalidNumber(lexeme.text().into())))
}
