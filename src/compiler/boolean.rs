//! Negation normalizer.
//!
//! Pushes `not` down through `and`/`or` and folds it into comparison
//! operators, so predicates reach placement as plain conjunctions:
//!
//! ```text
//! not(a = b)        ->  a != b
//! not(a > b)        ->  a <= b
//! not(a and b)      ->  not(a) or not(b)
//! not(a or b)       ->  not(a) and not(b)
//! not(not(x))       ->  x
//! not(a)            ->  not(a)
//! ```

use crate::sql::{BinaryOp, ExprKind, ExprNode, UnaryOp};

/// Normalize every negation in `expr`, innermost first.
pub fn normalize(expr: ExprNode) -> ExprNode {
    let position = expr.position;
    match expr.kind {
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => negate(normalize(*operand), position),
        ExprKind::Unary { op, operand } => ExprNode::new(
            ExprKind::Unary {
                op,
                operand: Box::new(normalize(*operand)),
            },
            position,
        ),
        ExprKind::Binary { op, left, right } => {
            ExprNode::binary(op, normalize(*left), normalize(*right), position)
        }
        ExprKind::Function { name, args } => ExprNode::new(
            ExprKind::Function {
                name,
                args: args.into_iter().map(normalize).collect(),
            },
            position,
        ),
        ExprKind::InList { operand, list } => ExprNode::new(
            ExprKind::InList {
                operand: Box::new(normalize(*operand)),
                list: list.into_iter().map(normalize).collect(),
            },
            position,
        ),
        kind => ExprNode::new(kind, position),
    }
}

/// Negate an already normalized expression.
fn negate(expr: ExprNode, not_position: usize) -> ExprNode {
    let position = expr.position;
    match expr.kind {
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => *operand,
        ExprKind::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => ExprNode::binary(
            BinaryOp::Or,
            negate(*left, not_position),
            negate(*right, not_position),
            position,
        ),
        ExprKind::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => ExprNode::binary(
            BinaryOp::And,
            negate(*left, not_position),
            negate(*right, not_position),
            position,
        ),
        ExprKind::Binary { op, left, right } => match op.negated() {
            Some(negated) => ExprNode::binary(negated, *left, *right, position),
            None => ExprNode::not(ExprNode::binary(op, *left, *right, position), not_position),
        },
        kind => ExprNode::not(ExprNode::new(kind, position), not_position),
    }
}
