//! Expression AST.
//!
//! Every node carries the offset of the token that introduced it: the name
//! of a column or function, the operator of a binary or unary expression,
//! the `in` keyword of a list test. Errors raised against an expression use
//! that offset.
//!
//! `Display` renders the canonical text: infix operators with single spaces,
//! function arguments separated by bare commas, `not(x)` in call form, and
//! parentheses only where precedence requires them.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;

/// Functions that aggregate rows.
static AGGREGATE_FUNCTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "sum", "count", "avg", "min", "max", "first", "last", "ksum", "nsum", "stddev",
        "variance",
    ]
    .into_iter()
    .collect()
});

/// Whether `name` is an aggregate function, ignoring case.
pub fn is_aggregate_function(name: &str) -> bool {
    AGGREGATE_FUNCTIONS.contains(name.to_ascii_lowercase().as_str())
}

// ============================================================================
// Nodes
// ============================================================================

/// A possibly qualified column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }

    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }

    /// Split `a.b` into qualifier and name.
    ///
    /// Anything after the first dot is the name.
    pub fn parse(text: &str) -> Self {
        match text.split_once('.') {
            Some((q, n)) => Self::qualified(q, n),
            None => Self::new(text),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Match,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Match => "~",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
        }
    }

    /// Operator for an operator token, ignoring case of word operators.
    pub fn from_token(text: &str) -> Option<Self> {
        let op = match text {
            "=" => BinaryOp::Eq,
            "!=" | "<>" => BinaryOp::NotEq,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::LtEq,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::GtEq,
            "~" => BinaryOp::Match,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "^" => BinaryOp::Pow,
            _ if text.eq_ignore_ascii_case("and") => BinaryOp::And,
            _ if text.eq_ignore_ascii_case("or") => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq
            | BinaryOp::Match => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => 6,
        }
    }

    /// The comparison that holds exactly when this one does not.
    pub fn negated(&self) -> Option<Self> {
        match self {
            BinaryOp::Eq => Some(BinaryOp::NotEq),
            BinaryOp::NotEq => Some(BinaryOp::Eq),
            BinaryOp::Gt => Some(BinaryOp::LtEq),
            BinaryOp::GtEq => Some(BinaryOp::Lt),
            BinaryOp::Lt => Some(BinaryOp::GtEq),
            BinaryOp::LtEq => Some(BinaryOp::Gt),
            _ => None,
        }
    }
}

const NOT_PRECEDENCE: u8 = 3;
const NEG_PRECEDENCE: u8 = 7;
const ATOM_PRECEDENCE: u8 = 8;

/// An expression node with its source offset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    Column(ColumnRef),
    /// Number, string, `null`, `NaN`, `true` or `false`, as written.
    Constant(String),
    /// Backtick-quoted sub-query reference, as written.
    QueryRef(String),
    Unary {
        op: UnaryOp,
        operand: Box<ExprNode>,
    },
    Binary {
        op: BinaryOp,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    Function {
        name: String,
        args: Vec<ExprNode>,
    },
    InList {
        operand: Box<ExprNode>,
        list: Vec<ExprNode>,
    },
}

impl ExprNode {
    pub fn new(kind: ExprKind, position: usize) -> Self {
        Self { kind, position }
    }

    pub fn column(column: ColumnRef, position: usize) -> Self {
        Self::new(ExprKind::Column(column), position)
    }

    pub fn constant(text: impl Into<String>, position: usize) -> Self {
        Self::new(ExprKind::Constant(text.into()), position)
    }

    pub fn binary(op: BinaryOp, left: ExprNode, right: ExprNode, position: usize) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            position,
        )
    }

    pub fn not(operand: ExprNode, position: usize) -> Self {
        Self::new(
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
            position,
        )
    }

    /// `left = right`, positioned at the left operand.
    pub fn equality(left: ExprNode, right: ExprNode) -> Self {
        let position = left.position;
        Self::binary(BinaryOp::Eq, left, right, position)
    }

    /// Left-fold conjuncts into an `and` chain.
    pub fn conjunction(conjuncts: impl IntoIterator<Item = ExprNode>) -> Option<Self> {
        conjuncts.into_iter().reduce(|acc, next| {
            let position = acc.position;
            Self::binary(BinaryOp::And, acc, next, position)
        })
    }

    /// Append `conjunct` to an optional filter with `and`.
    pub fn and_into(filter: &mut Option<ExprNode>, conjunct: ExprNode) {
        *filter = match filter.take() {
            None => Some(conjunct),
            Some(existing) => Self::conjunction([existing, conjunct]),
        };
    }

    pub fn as_column(&self) -> Option<&ColumnRef> {
        match &self.kind {
            ExprKind::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, ExprKind::Constant(_))
    }

    /// Whether the expression is a call to an aggregate function.
    pub fn is_aggregate_call(&self) -> bool {
        matches!(&self.kind, ExprKind::Function { name, .. } if is_aggregate_function(name))
    }

    /// Whether an aggregate call appears anywhere in the tree.
    pub fn contains_aggregate(&self) -> bool {
        self.is_aggregate_call() || self.children().any(|c| c.contains_aggregate())
    }

    /// Whether any column is referenced.
    pub fn has_column_refs(&self) -> bool {
        let mut found = false;
        self.for_each_column(&mut |_, _| found = true);
        found
    }

    /// Immediate children in evaluation order.
    pub fn children(&self) -> Box<dyn Iterator<Item = &ExprNode> + '_> {
        match &self.kind {
            ExprKind::Column(_) | ExprKind::Constant(_) | ExprKind::QueryRef(_) => {
                Box::new(std::iter::empty())
            }
            ExprKind::Unary { operand, .. } => Box::new(std::iter::once(operand.as_ref())),
            ExprKind::Binary { left, right, .. } => {
                Box::new([left.as_ref(), right.as_ref()].into_iter())
            }
            ExprKind::Function { args, .. } => Box::new(args.iter()),
            ExprKind::InList { operand, list } => {
                Box::new(std::iter::once(operand.as_ref()).chain(list.iter()))
            }
        }
    }

    /// Visit every column reference left to right.
    pub fn for_each_column<'a>(&'a self, f: &mut impl FnMut(&'a ColumnRef, usize)) {
        match &self.kind {
            ExprKind::Column(c) => f(c, self.position),
            _ => {
                for child in self.children() {
                    child.for_each_column(f);
                }
            }
        }
    }

    /// Rebuild the tree, replacing every column reference through `f`.
    pub fn try_map_columns<E>(
        self,
        f: &mut impl FnMut(ColumnRef, usize) -> Result<ExprNode, E>,
    ) -> Result<ExprNode, E> {
        let position = self.position;
        let kind = match self.kind {
            ExprKind::Column(c) => return f(c, position),
            kind @ (ExprKind::Constant(_) | ExprKind::QueryRef(_)) => kind,
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op,
                operand: Box::new(operand.try_map_columns(f)?),
            },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op,
                left: Box::new(left.try_map_columns(f)?),
                right: Box::new(right.try_map_columns(f)?),
            },
            ExprKind::Function { name, args } => {
                let mut mapped = Vec::with_capacity(args.len());
                for arg in args {
                    mapped.push(arg.try_map_columns(f)?);
                }
                ExprKind::Function { name, args: mapped }
            }
            ExprKind::InList { operand, list } => {
                let operand = Box::new(operand.try_map_columns(f)?);
                let mut mapped = Vec::with_capacity(list.len());
                for item in list {
                    mapped.push(item.try_map_columns(f)?);
                }
                ExprKind::InList {
                    operand,
                    list: mapped,
                }
            }
        };
        Ok(ExprNode::new(kind, position))
    }

    /// Rebuild the tree with an infallible column mapping.
    pub fn map_columns(self, mut f: impl FnMut(ColumnRef, usize) -> ExprNode) -> ExprNode {
        let mapped: Result<ExprNode, std::convert::Infallible> =
            self.try_map_columns(&mut |c, pos| Ok(f(c, pos)));
        mapped.unwrap_or_else(|never| match never {})
    }

    /// Structural equality ignoring offsets.
    pub fn same_as(&self, other: &ExprNode) -> bool {
        self.to_string() == other.to_string()
    }

    fn precedence(&self) -> u8 {
        match &self.kind {
            ExprKind::Binary { op, .. } => op.precedence(),
            ExprKind::Unary {
                op: UnaryOp::Neg, ..
            } => NEG_PRECEDENCE,
            _ => ATOM_PRECEDENCE,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parens: bool) -> fmt::Result {
        if parens {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[ExprNode]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Column(c) => write!(f, "{c}"),
            ExprKind::Constant(text) | ExprKind::QueryRef(text) => f.write_str(text),
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => write!(f, "not({operand})"),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => {
                f.write_str("-")?;
                operand.fmt_operand(f, operand.precedence() <= NEG_PRECEDENCE)
            }
            ExprKind::Binary { op, left, right } => {
                let prec = op.precedence();
                left.fmt_operand(f, left.precedence() < prec)?;
                write!(f, " {} ", op.symbol())?;
                right.fmt_operand(f, right.precedence() <= prec)
            }
            ExprKind::Function { name, args } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            // list reversed, operand last: `a in (x, y)` prints `in(y,x,a)`
            ExprKind::InList { operand, list } => {
                f.write_str("in(")?;
                for item in list.iter().rev() {
                    write!(f, "{item},")?;
                }
                write!(f, "{operand})")
            }
        }
    }
}

/// Precedence of prefix `not`, for the expression parser.
pub(crate) fn not_precedence() -> u8 {
    NOT_PRECEDENCE
}
