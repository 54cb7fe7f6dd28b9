//! Parsed statement tree.
//!
//! This is the statement exactly as written, with source offsets. The
//! compiler turns it into [`QueryModel`](crate::model::QueryModel) or
//! [`CreateTableModel`](crate::model::CreateTableModel) trees.

use serde::Serialize;

use super::expr::ExprNode;
use crate::catalog::{ColumnType, PartitionBy};

/// A name with the offset it was written at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ident {
    pub name: String,
    pub position: usize,
}

impl Ident {
    pub fn new(name: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Query(QueryAst),
    CreateTable(CreateTableAst),
}

// ============================================================================
// Queries
// ============================================================================

/// One query level: `[select ...] source [alias] clauses`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAst {
    pub position: usize,
    pub select: Option<SelectClause>,
    pub source: SourceAst,
    pub alias: Option<Ident>,
    pub timestamp: Option<ExprNode>,
    pub latest_by: Vec<ExprNode>,
    pub joins: Vec<JoinAst>,
    pub where_clause: Option<ExprNode>,
    pub sample_by: Option<ExprNode>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<Limit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    /// Offset of the `select` keyword.
    pub position: usize,
    pub items: Vec<SelectItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: ExprNode,
    pub alias: Option<Ident>,
    pub window: Option<WindowSpec>,
}

/// `over (partition by ... order by ...)`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WindowSpec {
    pub partition_by: Vec<ExprNode>,
    pub order_by: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceAst {
    Table(Ident),
    SubQuery(Box<QueryAst>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JoinKind {
    Inner,
    Outer,
    Asof,
    Splice,
    Cross,
}

impl JoinKind {
    /// Joins whose declared position must be kept.
    pub fn is_order_sensitive(&self) -> bool {
        matches!(self, JoinKind::Outer | JoinKind::Asof | JoinKind::Splice)
    }

    /// Joins that match rows by timestamp.
    pub fn is_time_ordered(&self) -> bool {
        matches!(self, JoinKind::Asof | JoinKind::Splice)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "join",
            JoinKind::Outer => "outer join",
            JoinKind::Asof => "asof join",
            JoinKind::Splice => "splice join",
            JoinKind::Cross => "cross join",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinAst {
    pub kind: JoinKind,
    pub position: usize,
    pub source: SourceAst,
    pub alias: Option<Ident>,
    pub condition: Option<JoinCondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    /// `on expr`
    On(ExprNode),
    /// `on (a, b)`: equality on equally named columns.
    Columns(Vec<ExprNode>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItem {
    pub expr: ExprNode,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Limit {
    pub lo: ExprNode,
    pub hi: Option<ExprNode>,
}

// ============================================================================
// Create table
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableAst {
    pub name: Ident,
    pub columns: Vec<ColumnDefAst>,
    /// Trailing `, index(col [block size N])` clauses.
    pub indexes: Vec<IndexAst>,
    pub timestamp: Option<Ident>,
    pub partition_by: Option<(PartitionBy, usize)>,
    pub record_hint: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefAst {
    pub name: Ident,
    pub column_type: ColumnType,
    /// Present when the column is declared with `index`.
    pub index: Option<IndexSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub block_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexAst {
    pub column: Ident,
    pub spec: IndexSpec,
}
