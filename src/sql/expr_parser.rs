//! Precedence-climbing expression parser.
//!
//! Grammar, loosest to tightest:
//!
//! ```text
//! or  ->  and  ->  not  ->  = != <> < <= > >= ~ in  ->  + -  ->  * / % ^  ->  unary -  ->  primary
//! ```
//!
//! Words are not reserved apart from the operator words `and`, `or`, `not`
//! and `in`. An expression ends at the first token that cannot continue it,
//! so `select a b from t` reads `a` and leaves `b` for the caller.

use super::cursor::TokenCursor;
use super::expr::{not_precedence, BinaryOp, ColumnRef, ExprKind, ExprNode, UnaryOp};
use super::lexer::Token;
use crate::error::{SqlError, SqlErrorKind, SqlResult};

const IN_PRECEDENCE: u8 = 4;

/// Words that read as constants rather than column names.
const CONSTANT_WORDS: [&str; 4] = ["NaN", "null", "true", "false"];

/// Parse one expression at the cursor.
pub fn parse_expr(cursor: &mut TokenCursor<'_>) -> SqlResult<ExprNode> {
    parse_binary(cursor, 1)
}

/// Parse a comma-separated list of expressions, at least one.
pub fn parse_expr_list(cursor: &mut TokenCursor<'_>) -> SqlResult<Vec<ExprNode>> {
    let mut list = vec![parse_expr(cursor)?];
    while cursor.accept(|t| *t == Token::Comma) {
        list.push(parse_expr(cursor)?);
    }
    Ok(list)
}

fn parse_binary(cursor: &mut TokenCursor<'_>, min_prec: u8) -> SqlResult<ExprNode> {
    let mut left = parse_operand(cursor)?;

    loop {
        let Some(lexeme) = cursor.peek() else { break };

        if lexeme.is_keyword("in") {
            if IN_PRECEDENCE < min_prec {
                break;
            }
            cursor.next();
            let list = parse_in_list(cursor)?;
            left = ExprNode::new(
                ExprKind::InList {
                    operand: Box::new(left),
                    list,
                },
                lexeme.position,
            );
            continue;
        }

        let op = match lexeme.token {
            Token::Op(text) | Token::Ident(text) => BinaryOp::from_token(text),
            _ => None,
        };
        let Some(op) = op else { break };
        let prec = op.precedence();
        if prec < min_prec {
            break;
        }
        cursor.next();
        let right = parse_binary(cursor, prec + 1)?;
        left = ExprNode::binary(op, left, right, lexeme.position);
    }

    Ok(left)
}

fn parse_operand(cursor: &mut TokenCursor<'_>) -> SqlResult<ExprNode> {
    match cursor.peek() {
        Some(l) if l.is_keyword("not") => {
            cursor.next();
            let operand = cursor.nested(l.position, |c| parse_binary(c, not_precedence()))?;
            Ok(ExprNode::not(operand, l.position))
        }
        _ => parse_unary(cursor),
    }
}

fn parse_unary(cursor: &mut TokenCursor<'_>) -> SqlResult<ExprNode> {
    match cursor.peek() {
        Some(l) if l.token.is_op("-") => {
            cursor.next();
            let operand = cursor.nested(l.position, parse_unary)?;
            Ok(ExprNode::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                l.position,
            ))
        }
        _ => parse_primary(cursor),
    }
}

fn parse_primary(cursor: &mut TokenCursor<'_>) -> SqlResult<ExprNode> {
    let Some(lexeme) = cursor.peek() else {
        return Err(SqlError::new(
            cursor.eof_position(),
            SqlErrorKind::ExpressionExpected,
        ));
    };
    let position = lexeme.position;

    match lexeme.token {
        Token::Ident(text) => {
            if text.eq_ignore_ascii_case("and") || text.eq_ignore_ascii_case("or") {
                return Err(SqlError::new(position, SqlErrorKind::ExpressionExpected));
            }
            cursor.next();
            if CONSTANT_WORDS.iter().any(|w| w.eq_ignore_ascii_case(text)) {
                return Ok(ExprNode::constant(text, position));
            }
            if cursor.accept(|t| *t == Token::LParen) {
                let args = cursor.nested(position, parse_call_args)?;
                return Ok(ExprNode::new(
                    ExprKind::Function {
                        name: text.to_string(),
                        args,
                    },
                    position,
                ));
            }
            Ok(ExprNode::column(ColumnRef::parse(text), position))
        }
        Token::Number(text) | Token::Str(text) => {
            cursor.next();
            Ok(ExprNode::constant(text, position))
        }
        Token::QueryRef(text) => {
            cursor.next();
            Ok(ExprNode::new(ExprKind::QueryRef(text.to_string()), position))
        }
        Token::LParen => {
            cursor.next();
            let inner = cursor.nested(position, parse_expr)?;
            close_paren(cursor)?;
            Ok(inner)
        }
        _ => Err(SqlError::new(position, SqlErrorKind::ExpressionExpected)),
    }
}

/// Arguments after the opening parenthesis of a call.
fn parse_call_args(cursor: &mut TokenCursor<'_>) -> SqlResult<Vec<ExprNode>> {
    if cursor.accept(|t| *t == Token::RParen) {
        return Ok(Vec::new());
    }
    let args = parse_expr_list(cursor)?;
    close_paren(cursor)?;
    Ok(args)
}

fn parse_in_list(cursor: &mut TokenCursor<'_>) -> SqlResult<Vec<ExprNode>> {
    let open = cursor.expect_token(Token::LParen)?;
    let list = cursor.nested(open.position, parse_expr_list)?;
    close_paren(cursor)?;
    Ok(list)
}

fn close_paren(cursor: &mut TokenCursor<'_>) -> SqlResult<()> {
    if cursor.accept(|t| *t == Token::RParen) {
        Ok(())
    } else {
        Err(SqlError::new(
            cursor.position(),
            SqlErrorKind::UnbalancedExpression,
        ))
    }
}
