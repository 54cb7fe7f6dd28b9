//! Compiled query models.
//!
//! A [`QueryModel`] is one node of the compiled tree. Models without a
//! projection describe a row source: a base table or a nested model, its
//! alias, its joins and its filters. Models with a [`Projection`] compute
//! columns over a nested row source.
//!
//! ```text
//!   select-group-by ──► (scope: master [alias] joins... where ...)
//!                              │                 │
//!                              ▼                 ▼
//!                         base table        JoinClause { kind, model, criteria }
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{ColumnType, TableMetadata};
use crate::sql::{ColumnRef, ExprNode, JoinKind, Limit, OrderItem, WindowSpec};

// ============================================================================
// Projection
// ============================================================================

/// An output column: an expression and the name it is published under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryColumn {
    pub alias: String,
    pub expr: ExprNode,
}

impl QueryColumn {
    pub fn new(alias: impl Into<String>, expr: ExprNode) -> Self {
        Self {
            alias: alias.into(),
            expr,
        }
    }

    /// Whether the column passes a source column through under its own name.
    pub fn is_pass_through(&self) -> bool {
        matches!(self.expr.as_column(), Some(c) if c.to_string() == self.alias)
    }
}

/// An output column of an analytic model; plain columns have no window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticColumn {
    pub alias: String,
    pub expr: ExprNode,
    pub window: Option<WindowSpec>,
}

/// The kind of computation a projection model performs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Projection {
    /// Pure column selection and renaming.
    Choose(Vec<QueryColumn>),
    /// Computed columns.
    Virtual(Vec<QueryColumn>),
    /// Aggregation keyed by the non-aggregate columns.
    GroupBy(Vec<QueryColumn>),
    /// Window functions over the source rows.
    Analytic(Vec<AnalyticColumn>),
}

impl Projection {
    pub fn keyword(&self) -> &'static str {
        match self {
            Projection::Choose(_) => "select-choose",
            Projection::Virtual(_) => "select-virtual",
            Projection::GroupBy(_) => "select-group-by",
            Projection::Analytic(_) => "select-analytic",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Projection::Choose(c) | Projection::Virtual(c) | Projection::GroupBy(c) => c.len(),
            Projection::Analytic(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(alias, expr)` pairs in output order.
    pub fn columns(&self) -> Vec<(&str, &ExprNode)> {
        match self {
            Projection::Choose(c) | Projection::Virtual(c) | Projection::GroupBy(c) => {
                c.iter().map(|c| (c.alias.as_str(), &c.expr)).collect()
            }
            Projection::Analytic(c) => c.iter().map(|c| (c.alias.as_str(), &c.expr)).collect(),
        }
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.columns().into_iter().map(|(a, _)| a).collect()
    }

    /// Expression published under `alias`, ignoring case.
    pub fn column(&self, alias: &str) -> Option<&ExprNode> {
        self.columns()
            .into_iter()
            .find(|(a, _)| a.eq_ignore_ascii_case(alias))
            .map(|(_, e)| e)
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.column(alias).is_some()
    }

    /// Append a plain column.
    pub fn push(&mut self, alias: impl Into<String>, expr: ExprNode) {
        match self {
            Projection::Choose(c) | Projection::Virtual(c) | Projection::GroupBy(c) => {
                c.push(QueryColumn::new(alias, expr))
            }
            Projection::Analytic(c) => c.push(AnalyticColumn {
                alias: alias.into(),
                expr,
                window: None,
            }),
        }
    }

    pub fn is_group_by(&self) -> bool {
        matches!(self, Projection::GroupBy(_))
    }

    pub fn is_analytic(&self) -> bool {
        matches!(self, Projection::Analytic(_))
    }
}

// ============================================================================
// Sources and joins
// ============================================================================

/// A base table the model reads from.
#[derive(Debug, Clone, Serialize)]
pub struct TableSource {
    pub name: String,
    #[serde(skip)]
    pub metadata: Arc<TableMetadata>,
}

impl PartialEq for TableSource {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ModelSource {
    Table(TableSource),
    Nested(Box<QueryModel>),
}

/// Whether a join was written by the user or left without criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinProvenance {
    Explicit,
    /// No equality relates the joined source to the sources before it.
    ImplicitCross,
}

/// A joined row source and the conditions that bind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub model: QueryModel,
    /// Equality conjuncts `this.col = earlier.col`, in first-seen order.
    pub criteria: Vec<ExprNode>,
    /// Filter evaluated after this join has produced its rows.
    pub post_join_where: Option<ExprNode>,
    pub provenance: JoinProvenance,
    pub position: usize,
}

impl JoinClause {
    /// Keyword the join prints with once criteria are settled.
    pub fn keyword(&self) -> &'static str {
        match self.kind {
            JoinKind::Inner | JoinKind::Cross if self.criteria.is_empty() => {
                JoinKind::Cross.keyword()
            }
            JoinKind::Inner | JoinKind::Cross => JoinKind::Inner.keyword(),
            kind => kind.keyword(),
        }
    }
}

// ============================================================================
// Query model
// ============================================================================

/// A column visible to an enclosing scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    /// Known when the column is a base column or passes one through.
    pub column_type: Option<ColumnType>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryModel {
    pub projection: Option<Projection>,
    pub source: ModelSource,
    pub alias: Option<String>,
    pub timestamp: Option<ExprNode>,
    pub latest_by: Vec<ExprNode>,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<ExprNode>,
    pub const_where: Option<ExprNode>,
    pub sample_by: Option<ExprNode>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<Limit>,
}

impl QueryModel {
    pub fn new(source: ModelSource) -> Self {
        Self {
            projection: None,
            source,
            alias: None,
            timestamp: None,
            latest_by: Vec::new(),
            joins: Vec::new(),
            where_clause: None,
            const_where: None,
            sample_by: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn table(name: impl Into<String>, metadata: Arc<TableMetadata>) -> Self {
        Self::new(ModelSource::Table(TableSource {
            name: name.into(),
            metadata,
        }))
    }

    pub fn nested(model: QueryModel) -> Self {
        Self::new(ModelSource::Nested(Box::new(model)))
    }

    /// A projection model over `body`.
    pub fn select(projection: Projection, body: QueryModel) -> Self {
        let mut model = Self::nested(body);
        model.projection = Some(projection);
        model
    }

    pub fn table_name(&self) -> Option<&str> {
        match &self.source {
            ModelSource::Table(t) => Some(t.name.as_str()),
            ModelSource::Nested(_) => None,
        }
    }

    pub fn nested_model(&self) -> Option<&QueryModel> {
        match &self.source {
            ModelSource::Nested(m) => Some(m),
            ModelSource::Table(_) => None,
        }
    }

    pub fn nested_model_mut(&mut self) -> Option<&mut QueryModel> {
        match &mut self.source {
            ModelSource::Nested(m) => Some(m),
            ModelSource::Table(_) => None,
        }
    }

    /// Alias, falling back to the table name.
    pub fn name(&self) -> Option<&str> {
        self.alias.as_deref().or_else(|| self.table_name())
    }

    /// Whether `qualifier` names this model, ignoring case.
    pub fn answers_to(&self, qualifier: &str) -> bool {
        match (&self.alias, self.table_name()) {
            (Some(alias), _) => alias.eq_ignore_ascii_case(qualifier),
            (None, Some(table)) => table.eq_ignore_ascii_case(qualifier),
            (None, None) => false,
        }
    }

    /// Filters and clauses beyond name, alias and timestamp.
    pub fn has_clauses(&self) -> bool {
        self.where_clause.is_some()
            || self.const_where.is_some()
            || !self.latest_by.is_empty()
            || self.sample_by.is_some()
            || !self.order_by.is_empty()
            || self.limit.is_some()
    }

    pub fn is_grouped(&self) -> bool {
        matches!(self.projection, Some(Projection::GroupBy(_)))
    }

    pub fn is_analytic(&self) -> bool {
        matches!(self.projection, Some(Projection::Analytic(_)))
    }

    /// Columns this model exposes to an enclosing scope.
    pub fn output_columns(&self) -> Vec<OutputColumn> {
        if let Some(projection) = &self.projection {
            return projection
                .columns()
                .into_iter()
                .map(|(alias, expr)| OutputColumn {
                    name: alias.to_string(),
                    column_type: expr.as_column().and_then(|c| self.source_column_type(c)),
                })
                .collect();
        }

        let mut columns = self.source_columns();
        for join in &self.joins {
            columns.extend(join.model.output_columns());
        }
        columns
    }

    /// Columns of the model's own source, without joins.
    pub fn source_columns(&self) -> Vec<OutputColumn> {
        match &self.source {
            ModelSource::Table(t) => t
                .metadata
                .columns
                .iter()
                .map(|c| OutputColumn {
                    name: c.name.clone(),
                    column_type: Some(c.column_type),
                })
                .collect(),
            ModelSource::Nested(m) => m.output_columns(),
        }
    }

    /// Type of a column as seen from inside this model.
    pub fn source_column_type(&self, column: &ColumnRef) -> Option<ColumnType> {
        let body = match (&self.projection, &self.source) {
            (Some(_), ModelSource::Nested(m)) if m.projection.is_some() => {
                return m
                    .output_columns()
                    .into_iter()
                    .find(|c| c.name.eq_ignore_ascii_case(&column.name))
                    .and_then(|c| c.column_type);
            }
            (Some(_), ModelSource::Nested(m)) => m.as_ref(),
            (Some(_), ModelSource::Table(_)) | (None, _) => self,
        };
        body.scope_sources()
            .into_iter()
            .filter(|m| match &column.qualifier {
                Some(q) => m.answers_to(q),
                None => true,
            })
            .flat_map(|m| m.source_columns())
            .find(|c| c.name.eq_ignore_ascii_case(&column.name))
            .and_then(|c| c.column_type)
    }

    /// The master and every joined model of a row-source model.
    pub fn scope_sources(&self) -> Vec<&QueryModel> {
        std::iter::once(self)
            .chain(self.joins.iter().map(|j| &j.model))
            .collect()
    }

    /// Designated timestamp of a row-source model: explicit, or the
    /// table's own when the model reads one table without joins.
    pub fn designated_timestamp(&self) -> Option<ExprNode> {
        if let Some(ts) = &self.timestamp {
            return Some(ts.clone());
        }
        if !self.joins.is_empty() {
            return None;
        }
        match &self.source {
            ModelSource::Table(t) => t
                .metadata
                .designated_timestamp()
                .map(|name| ExprNode::column(ColumnRef::new(name), 0)),
            ModelSource::Nested(_) => None,
        }
    }
}
