//! Predicate placement.
//!
//! `where` and `on` filters are split into conjuncts and each conjunct goes
//! to the innermost place that can evaluate it:
//!
//! ```text
//!   conjunct                               goes to
//!   ─────────────────────────────────────  ──────────────────────────────
//!   no column references                   const-where of the scope
//!   a.x = b.y between two inner sources    join criteria (equivalence graph)
//!   one inner source only                  that source's own where
//!   on-clause equality of an outer join    that join's criteria
//!   on-clause filter of the joined side    the joined source's own where
//!   touches an outer/asof/splice source    post-join-where of the last
//!     or spans several sources               source it needs
//!   master only, scope has an asof/splice  post-join-where of the first
//!     join                                   such join
//! ```
//!
//! A constant filter on a column, `o.id = 100`, is copied to every column
//! the equivalence graph makes equal to it. Filters that land on a
//! sub-query are pushed into it when its projection passes the columns
//! through unchanged.

use std::collections::BTreeSet;

use tracing::trace;

use super::join_graph::{EquivalenceGraph, Equality};
use super::scope::Scope;
use crate::error::SqlResult;
use crate::model::{Projection, QueryModel};
use crate::sql::{BinaryOp, ColumnRef, ExprKind, ExprNode, JoinKind};

// ============================================================================
// Conjuncts
// ============================================================================

/// Where a conjunct was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// `on` clause of the source with this scope index.
    On(usize),
    Where,
}

#[derive(Debug, Clone)]
pub struct Conjunct {
    pub expr: ExprNode,
    pub origin: Origin,
}

/// Split a filter on its top-level `and`s, left to right.
pub fn split_conjuncts(expr: ExprNode) -> Vec<ExprNode> {
    let mut out = Vec::new();
    collect_conjuncts(expr, &mut out);
    out
}

fn collect_conjuncts(expr: ExprNode, out: &mut Vec<ExprNode>) {
    match expr.kind {
        ExprKind::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            collect_conjuncts(*left, out);
            collect_conjuncts(*right, out);
        }
        kind => out.push(ExprNode::new(kind, expr.position)),
    }
}

/// `col = constant` or `constant = col`.
fn column_constant(expr: &ExprNode) -> Option<(&ColumnRef, &ExprNode)> {
    match &expr.kind {
        ExprKind::Binary {
            op: BinaryOp::Eq,
            left,
            right,
        } => match (left.as_column(), right.as_column()) {
            (Some(c), None) if right.is_constant() => Some((c, right)),
            (None, Some(c)) if left.is_constant() => Some((c, left)),
            _ => None,
        },
        _ => None,
    }
}

/// `a.x = b.y` where the two columns belong to different sources.
fn column_equality(expr: &ExprNode, scope: &Scope) -> SqlResult<Option<Equality>> {
    let ExprKind::Binary {
        op: BinaryOp::Eq,
        left,
        right,
    } = &expr.kind
    else {
        return Ok(None);
    };
    let (Some(lc), Some(rc)) = (left.as_column(), right.as_column()) else {
        return Ok(None);
    };
    let left_source = scope.resolve(lc, left.position)?.source;
    let right_source = scope.resolve(rc, right.position)?.source;
    if left_source == right_source {
        return Ok(None);
    }
    Ok(Some(Equality {
        left: left.as_ref().clone(),
        left_source,
        right: right.as_ref().clone(),
        right_source,
    }))
}

// ============================================================================
// Placement
// ============================================================================

/// Where every conjunct of one scope ended up.
#[derive(Debug, Default)]
pub struct Placement {
    /// Evaluation order of the scope's sources; the master is first.
    pub order: Vec<usize>,
    /// Join criteria per source.
    pub criteria: Vec<Vec<ExprNode>>,
    /// Filters evaluated by each source before it is joined.
    pub filters: Vec<Vec<ExprNode>>,
    /// Filters evaluated once each source has been joined.
    pub post_join: Vec<Vec<ExprNode>>,
    pub const_where: Vec<ExprNode>,
}

enum Deferred {
    /// After this source is joined.
    At(usize),
    /// After every referenced source is joined.
    Latest(BTreeSet<usize>),
}

/// Classify the conjuncts of a scope whose sources have the given join
/// kinds (`None` for the master).
pub fn place(
    scope: &Scope,
    kinds: &[Option<JoinKind>],
    conjuncts: Vec<Conjunct>,
) -> SqlResult<Placement> {
    let n = kinds.len();
    let fixed: Vec<bool> = kinds
        .iter()
        .map(|k| k.is_some_and(|k| k.is_order_sensitive()))
        .collect();
    let time_join = kinds
        .iter()
        .position(|k| k.is_some_and(|k| k.is_time_ordered()));

    let mut graph = EquivalenceGraph::new(
        (0..n).map(|i| scope.entry(i).and_then(|e| e.name.clone()).unwrap_or_default()),
    );
    let mut placement = Placement {
        criteria: vec![Vec::new(); n],
        filters: vec![Vec::new(); n],
        post_join: vec![Vec::new(); n],
        ..Placement::default()
    };
    let mut deferred: Vec<(Deferred, ExprNode)> = Vec::new();
    let mut constants: Vec<(usize, ColumnRef, ExprNode)> = Vec::new();

    for Conjunct { expr, origin } in conjuncts {
        let refs = scope.references(&expr)?;
        if refs.is_empty() {
            trace!(conjunct = %expr, "const-where");
            placement.const_where.push(expr);
            continue;
        }
        let equality = column_equality(&expr, scope)?;

        if let Origin::On(join) = origin {
            if fixed[join] {
                match equality {
                    Some(eq) if eq.other_source(join) < join && refs.contains(&join) => {
                        trace!(conjunct = %expr, join, "order-sensitive join criterion");
                        placement.criteria[join].push(eq.oriented_to(join));
                        graph.add_equivalence(&eq);
                    }
                    _ if refs.len() == 1 && refs.contains(&join) => {
                        trace!(conjunct = %expr, join, "joined side filter");
                        placement.filters[join].push(expr);
                    }
                    _ => deferred.push((Deferred::At(join), expr)),
                }
                continue;
            }
        }

        let edge = equality.filter(|eq| {
            [eq.left_source, eq.right_source].iter().all(|&s| {
                !fixed[s] || matches!(origin, Origin::On(join) if s < join)
            })
        });
        if let Some(eq) = edge {
            trace!(conjunct = %expr, "join edge");
            graph.add_join_edge(eq);
            continue;
        }

        let touches_fixed = refs.iter().any(|&s| fixed[s]);
        let single = match refs.len() {
            1 if !touches_fixed => refs.first().copied(),
            _ => None,
        };
        if let (Some(0), Some(join), Origin::Where) = (single, time_join, origin) {
            trace!(conjunct = %expr, join, "master filter after time-ordered join");
            deferred.push((Deferred::At(join), expr));
            continue;
        }
        match single {
            Some(source) => {
                trace!(conjunct = %expr, source, "source filter");
                if let Some((column, constant)) = column_constant(&expr) {
                    constants.push((source, column.clone(), constant.clone()));
                }
                placement.filters[source].push(expr);
            }
            None => deferred.push((Deferred::Latest(refs), expr)),
        }
    }

    placement.order = graph.order(&fixed);
    for (source, criteria) in graph.criteria(&placement.order).into_iter().enumerate() {
        placement.criteria[source].extend(criteria);
    }

    let mut rank = vec![0; n];
    for (i, &source) in placement.order.iter().enumerate() {
        rank[source] = i;
    }
    for (target, expr) in deferred {
        let source = match target {
            Deferred::At(source) => source,
            Deferred::Latest(refs) => refs
                .into_iter()
                .max_by_key(|&s| rank[s])
                .unwrap_or_default(),
        };
        trace!(conjunct = %expr, source, "post-join-where");
        placement.post_join[source].push(expr);
    }

    for (source, column, constant) in constants {
        for (target, target_column) in graph.equivalents(source, &column) {
            let filter = ExprNode::equality(target_column, constant.clone());
            let filters = &mut placement.filters[target];
            if !filters.iter().any(|f| f.same_as(&filter)) {
                trace!(filter = %filter, target, "propagated constant");
                filters.push(filter);
            }
        }
    }

    Ok(placement)
}

// ============================================================================
// Sub-query pushdown
// ============================================================================

/// Whether rows of `model` depend on more than a row-by-row filter.
fn blocks_pushdown(model: &QueryModel) -> bool {
    model.limit.is_some()
        || !model.latest_by.is_empty()
        || model.sample_by.is_some()
        || model.is_analytic()
}

fn strip_qualifiers(expr: ExprNode) -> ExprNode {
    expr.map_columns(|c, position| ExprNode::column(ColumnRef::new(c.name), position))
}

/// Rewrite `expr` from the output names of `projection` into its input
/// columns; `None` when a referenced output is computed.
fn map_through(projection: &Projection, expr: &ExprNode) -> Option<ExprNode> {
    let mut passes = true;
    let mapped = expr.clone().map_columns(|c, position| {
        match projection.column(&c.name).and_then(ExprNode::as_column) {
            Some(source) => ExprNode::column(source.clone(), position),
            None => {
                passes = false;
                ExprNode::column(c, position)
            }
        }
    });
    passes.then_some(mapped)
}

/// Move `conjunct`, written in the output names of `model`, inside it.
fn sink(model: &mut QueryModel, conjunct: ExprNode) -> Result<(), ExprNode> {
    if blocks_pushdown(model) {
        return Err(conjunct);
    }
    match &model.projection {
        None if model.joins.is_empty() => {
            keep_or_sink(model, strip_qualifiers(conjunct));
            Ok(())
        }
        None => Err(conjunct),
        Some(projection) => {
            let Some(mapped) = map_through(projection, &conjunct) else {
                return Err(conjunct);
            };
            match model.nested_model_mut() {
                Some(body) => sink(body, mapped).map_err(|_| conjunct),
                None => Err(conjunct),
            }
        }
    }
}

/// Push `conjunct` into the nested source of a row-source model, else
/// keep it as the model's own filter.
fn keep_or_sink(model: &mut QueryModel, conjunct: ExprNode) {
    let conjunct = match model.nested_model_mut() {
        Some(inner) => match sink(inner, conjunct) {
            Ok(()) => {
                trace!("filter pushed into sub-query");
                return;
            }
            Err(conjunct) => conjunct,
        },
        None => conjunct,
    };
    ExprNode::and_into(&mut model.where_clause, conjunct);
}

/// Attach `filters` to a source model, pushing each one as deep as it goes.
pub fn apply_filters(model: &mut QueryModel, filters: Vec<ExprNode>) {
    for conjunct in filters {
        keep_or_sink(model, conjunct);
    }
}
