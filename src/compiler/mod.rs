//! Statement compiler.
//!
//! Turns parsed statements into model trees. Each query level is compiled
//! in the same sequence of stages:
//!
//! ```text
//!   sources ──► scope ──► normalize + split on/where ──► place conjuncts
//!                                                            │
//!        ┌───────────────────────────────────────────────────┘
//!        ▼
//!   reorder joins ──► rewrite projection ──► sample by ──► order by ──► limit
//! ```
//!
//! Sub-queries are compiled depth first, so a level only ever sees the
//! finished models of its sources. Once the root is built, order-by
//! elimination runs over the whole tree.
//!
//! A [`Compiler`] holds only the catalog and settings; all working state of
//! one statement lives in a `CompileContext` that is dropped with it.

pub mod boolean;
pub mod clauses;
pub mod create_table;
pub mod join_graph;
pub mod predicate;
pub mod scope;
pub mod select;

use std::fmt;
use std::mem::take;

use serde::Serialize;
use tracing::{debug, debug_span};

use self::predicate::{Conjunct, Origin, Placement};
use self::scope::Scope;
use crate::cache::fingerprint;
use crate::catalog::Catalog;
use crate::config::CompilerSettings;
use crate::error::{SqlError, SqlResult};
use crate::model::{CreateTableModel, JoinClause, JoinProvenance, QueryModel};
use crate::sql::ast::{JoinAst, JoinCondition, QueryAst, SourceAst, Statement};
use crate::sql::{parse_statement, ColumnRef, ExprNode, JoinKind};

// ============================================================================
// Compiled statements
// ============================================================================

/// The result of compiling one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum CompiledStatement {
    Query(QueryModel),
    CreateTable(CreateTableModel),
}

impl CompiledStatement {
    pub fn as_query(&self) -> Option<&QueryModel> {
        match self {
            CompiledStatement::Query(model) => Some(model),
            CompiledStatement::CreateTable(_) => None,
        }
    }

    pub fn as_create_table(&self) -> Option<&CreateTableModel> {
        match self {
            CompiledStatement::CreateTable(model) => Some(model),
            CompiledStatement::Query(_) => None,
        }
    }

    /// Hex SHA256 of the canonical text.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.to_string())
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledStatement::Query(model) => model.fmt(f),
            CompiledStatement::CreateTable(model) => model.fmt(f),
        }
    }
}

// ============================================================================
// Compiler
// ============================================================================

/// Compiles SQL text against a catalog.
///
/// # Example
///
/// ```
/// use chronoql::catalog::{ColumnType, MemoryCatalog, TableMetadata};
/// use chronoql::compiler::Compiler;
///
/// let catalog = MemoryCatalog::new();
/// catalog.register(
///     TableMetadata::new("tab")
///         .col("x", ColumnType::Int)
///         .col("y", ColumnType::Int),
/// );
///
/// let compiled = Compiler::new(&catalog)
///     .compile("select x from tab where y > 1")
///     .unwrap();
/// assert_eq!(compiled.to_string(), "select-choose x from (tab where y > 1)");
/// ```
pub struct Compiler<'c> {
    catalog: &'c dyn Catalog,
    settings: CompilerSettings,
}

impl<'c> Compiler<'c> {
    pub fn new(catalog: &'c dyn Catalog) -> Self {
        Self::with_settings(catalog, CompilerSettings::default())
    }

    pub fn with_settings(catalog: &'c dyn Catalog, settings: CompilerSettings) -> Self {
        Self { catalog, settings }
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Parse and compile one statement.
    pub fn compile(&self, sql: &str) -> SqlResult<CompiledStatement> {
        let span = debug_span!("compile", len = sql.len());
        let _guard = span.enter();

        let statement = parse_statement(sql)?;
        debug!("statement parsed");
        self.compile_statement(statement)
    }

    pub fn compile_statement(&self, statement: Statement) -> SqlResult<CompiledStatement> {
        match statement {
            Statement::Query(ast) => {
                let mut context = CompileContext::new(self.catalog, &self.settings);
                let mut model = context.compile_query(ast)?;
                clauses::eliminate_redundant_order_by(&mut model, false);
                debug!("query compiled");
                Ok(CompiledStatement::Query(model))
            }
            Statement::CreateTable(ast) => {
                let model = create_table::bind(ast, &self.settings)?;
                debug!(table = %model.name, "create table bound");
                Ok(CompiledStatement::CreateTable(model))
            }
        }
    }
}

// ============================================================================
// Per-statement state
// ============================================================================

struct CompileContext<'a> {
    catalog: &'a dyn Catalog,
    settings: &'a CompilerSettings,
    /// Next `_xQdbA<n>` alias.
    next_alias: usize,
    /// Last cross-join sentinel handed out.
    sentinels: usize,
    /// Sub-queries open around the level being compiled.
    depth: usize,
}

/// A joined source waiting for its place in the final join order.
struct PendingJoin {
    kind: JoinKind,
    position: usize,
    model: QueryModel,
}

fn source_name(model: &QueryModel) -> String {
    model.name().unwrap_or_default().to_string()
}

impl<'a> CompileContext<'a> {
    fn new(catalog: &'a dyn Catalog, settings: &'a CompilerSettings) -> Self {
        Self {
            catalog,
            settings,
            next_alias: 0,
            sentinels: 0,
            depth: 0,
        }
    }

    fn synthetic_alias(&mut self) -> String {
        let alias = format!("_xQdbA{}", self.next_alias);
        self.next_alias += 1;
        alias
    }

    fn build_source(&mut self, source: SourceAst) -> SqlResult<QueryModel> {
        match source {
            SourceAst::Table(name) => {
                let metadata = scope::resolve_table(self.catalog, &name)?;
                Ok(QueryModel::table(name.name, metadata))
            }
            SourceAst::SubQuery(query) => {
                self.depth += 1;
                let model = self.compile_query(*query);
                self.depth -= 1;
                Ok(QueryModel::nested(model?))
            }
        }
    }

    fn compile_query(&mut self, ast: QueryAst) -> SqlResult<QueryModel> {
        let QueryAst {
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
            ..
        } = ast;

        let mut master = self.build_source(source)?;
        master.alias = alias.as_ref().map(|a| a.name.clone());
        if !joins.is_empty() && master.name().is_none() {
            master.alias = Some(self.synthetic_alias());
        }
        let mut scope = Scope::new();
        scope.declare(master.name(), alias.as_ref(), master.source_columns())?;

        if let Some(ts) = timestamp {
            clauses::bind_timestamp(&mut master, ts, &scope)?;
        }
        if !latest_by.is_empty() {
            clauses::bind_latest_by(&mut master, latest_by, &scope)?;
        }

        let mut kinds = vec![None];
        let mut pending = Vec::with_capacity(joins.len());
        let mut conjuncts = Vec::new();
        for join in joins {
            let (joined, on) = self.declare_join(join, &master, &mut scope)?;
            conjuncts.extend(on);
            kinds.push(Some(joined.kind));
            pending.push(joined);
        }
        if let Some(filter) = where_clause {
            conjuncts.extend(
                predicate::split_conjuncts(boolean::normalize(filter))
                    .into_iter()
                    .map(|expr| Conjunct {
                        expr,
                        origin: Origin::Where,
                    }),
            );
        }

        let placement = predicate::place(&scope, &kinds, conjuncts)?;
        debug!(sources = kinds.len(), order = ?placement.order, "predicates placed");
        self.attach_joins(&mut master, pending, placement);
        clauses::fill_asof_timestamps(&mut master);

        let nested = self.depth > 0;
        let mut layers = match select {
            Some(select) => {
                let key = sample_by
                    .as_ref()
                    .map(|interval| clauses::bind_sample_by(&select, &mut master, &scope, interval))
                    .transpose()?;
                let mut layers = select::rewrite(select, &scope, key)?;
                layers.sample_by = sample_by;
                debug!("projection rewritten");
                Some(layers)
            }
            None => {
                if let Some(interval) = sample_by {
                    clauses::defer_sample_by(&mut master, &scope, interval, nested)?;
                }
                None
            }
        };
        clauses::check_deferred_sample_by(&master, layers.as_ref(), nested)?;
        if !order_by.is_empty() {
            clauses::bind_order_by(
                order_by,
                layers.as_mut(),
                &mut master,
                &scope,
                self.settings.max_order_by_columns,
            )?;
        }
        if let Some(limit) = limit {
            clauses::bind_limit(layers.as_mut(), &mut master, limit);
        }

        Ok(match layers {
            Some(layers) => layers.assemble(master),
            None => master,
        })
    }

    /// Build a joined source, add it to `scope` and return it with the
    /// conjuncts of its `on` clause.
    fn declare_join(
        &mut self,
        join: JoinAst,
        master: &QueryModel,
        scope: &mut Scope,
    ) -> SqlResult<(PendingJoin, Vec<Conjunct>)> {
        let JoinAst {
            kind,
            position,
            source,
            alias,
            condition,
        } = join;

        let mut model = self.build_source(source)?;
        model.alias = alias.as_ref().map(|a| a.name.clone());
        if matches!(condition, Some(JoinCondition::Columns(_))) && model.name().is_none() {
            model.alias = Some(self.synthetic_alias());
        }
        let index = scope.declare(model.name(), alias.as_ref(), model.source_columns())?;
        let origin = Origin::On(index);

        let conjuncts = match condition {
            Some(JoinCondition::On(expr)) => predicate::split_conjuncts(boolean::normalize(expr))
                .into_iter()
                .map(|expr| Conjunct { expr, origin })
                .collect(),
            Some(JoinCondition::Columns(columns)) => {
                let (joined, earlier) = (source_name(&model), source_name(master));
                let mut conjuncts = Vec::with_capacity(columns.len());
                for column in columns {
                    let Some(name) = column.as_column().map(|c| c.name.clone()) else {
                        return Err(SqlError::invalid_column(column.position, column.to_string()));
                    };
                    let left = ExprNode::column(ColumnRef::qualified(&joined, &name), column.position);
                    let right = ExprNode::column(ColumnRef::qualified(&earlier, name), column.position);
                    conjuncts.push(Conjunct {
                        expr: ExprNode::equality(left, right),
                        origin,
                    });
                }
                conjuncts
            }
            None => Vec::new(),
        };
        Ok((
            PendingJoin {
                kind,
                position,
                model,
            },
            conjuncts,
        ))
    }

    /// Attach placed filters and the joins, in their final order, to the
    /// master model.
    fn attach_joins(&mut self, master: &mut QueryModel, pending: Vec<PendingJoin>, placement: Placement) {
        let Placement {
            order,
            mut criteria,
            mut filters,
            mut post_join,
            mut const_where,
        } = placement;

        predicate::apply_filters(master, take(&mut filters[0]));
        for conjunct in take(&mut post_join[0]) {
            ExprNode::and_into(&mut master.where_clause, conjunct);
        }

        let mut slots: Vec<Option<PendingJoin>> = std::iter::once(None)
            .chain(pending.into_iter().map(Some))
            .collect();
        for &source in order.iter().skip(1) {
            let Some(PendingJoin {
                kind,
                position,
                mut model,
            }) = slots[source].take()
            else {
                continue;
            };
            predicate::apply_filters(&mut model, take(&mut filters[source]));
            let criteria = take(&mut criteria[source]);
            let provenance = if matches!(kind, JoinKind::Inner | JoinKind::Cross) && criteria.is_empty() {
                JoinProvenance::ImplicitCross
            } else {
                JoinProvenance::Explicit
            };
            if provenance == JoinProvenance::ImplicitCross && self.settings.synthesize_cross_join_sentinels {
                self.sentinels += 1;
                let n = self.sentinels.to_string();
                const_where.push(ExprNode::equality(
                    ExprNode::constant(n.clone(), position),
                    ExprNode::constant(n, position),
                ));
            }
            master.joins.push(JoinClause {
                kind,
                model,
                criteria,
                post_join_where: ExprNode::conjunction(take(&mut post_join[source])),
                provenance,
                position,
            });
        }
        master.const_where = ExprNode::conjunction(const_where);
    }
}
