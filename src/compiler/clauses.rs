//! Clause binders: `timestamp`, `latest by`, `sample by`, `order by` and
//! `limit`, plus the order-by elimination pass that runs over the finished
//! tree.

use super::scope::Scope;
use super::select::{self, SelectLayers};
use crate::catalog::ColumnType;
use crate::error::{SqlError, SqlErrorKind, SqlResult};
use crate::model::{ModelSource, QueryModel};
use crate::sql::ast::SelectClause;
use crate::sql::{ColumnRef, ExprNode, Limit, OrderItem};

/// Resolve a column of the master source, else fail at `expr`.
fn master_column(expr: &ExprNode, scope: &Scope) -> SqlResult<()> {
    let Some(column) = expr.as_column() else {
        return Err(SqlError::invalid_column(expr.position, expr.to_string()));
    };
    match scope.resolve(column, expr.position)? {
        resolved if resolved.source == 0 => Ok(()),
        _ => Err(SqlError::invalid_column(expr.position, column.to_string())),
    }
}

/// `timestamp(col)` nominates a column of the master source.
pub fn bind_timestamp(model: &mut QueryModel, expr: ExprNode, scope: &Scope) -> SqlResult<()> {
    master_column(&expr, scope)?;
    model.timestamp = Some(expr);
    Ok(())
}

pub fn bind_latest_by(model: &mut QueryModel, columns: Vec<ExprNode>, scope: &Scope) -> SqlResult<()> {
    for column in &columns {
        master_column(column, scope)?;
    }
    model.latest_by = columns;
    Ok(())
}

fn table_timestamp(model: &QueryModel) -> Option<ExprNode> {
    match &model.source {
        ModelSource::Table(t) => t
            .metadata
            .designated_timestamp()
            .map(|name| ExprNode::column(ColumnRef::new(name), 0)),
        ModelSource::Nested(_) => None,
    }
}

/// Asof and splice joins match rows by time: both the master and each
/// time-ordered target carry their timestamp explicitly.
pub fn fill_asof_timestamps(model: &mut QueryModel) {
    if !model.joins.iter().any(|j| j.kind.is_time_ordered()) {
        return;
    }
    if model.timestamp.is_none() {
        model.timestamp = table_timestamp(model);
    }
    for join in model.joins.iter_mut().filter(|j| j.kind.is_time_ordered()) {
        if join.model.timestamp.is_none() {
            join.model.timestamp = table_timestamp(&join.model);
        }
    }
}

/// The column `sample by` keys on: the `timestamp(...)` nominated on
/// `body`, else its designated timestamp.
fn sample_key(body: &mut QueryModel, scope: &Scope, interval: &ExprNode) -> SqlResult<ExprNode> {
    let timestamp = match body.timestamp.take() {
        Some(ts) => ts,
        None => body.designated_timestamp().ok_or_else(|| {
            SqlError::new(interval.position, SqlErrorKind::TimestampNotDefined)
        })?,
    };
    if let Some(column) = timestamp.as_column() {
        let resolved = scope.resolve(column, timestamp.position)?;
        if resolved.column_type.is_some_and(|t| t != ColumnType::Timestamp) {
            return Err(SqlError::new(
                timestamp.position,
                SqlErrorKind::NotATimestamp(column.name.clone()),
            ));
        }
    }
    Ok(timestamp)
}

fn aggregate_required(interval: &ExprNode) -> SqlError {
    SqlError::new(interval.position, SqlErrorKind::AtLeastOneAggregateRequired)
}

/// Check `sample by` over the select list `clause` and return the
/// timestamp it groups on.
pub fn bind_sample_by(
    clause: &SelectClause,
    body: &mut QueryModel,
    scope: &Scope,
    interval: &ExprNode,
) -> SqlResult<ExprNode> {
    if !select::resolve(clause, scope)? {
        return Err(aggregate_required(interval));
    }
    sample_key(body, scope, interval)
}

/// `sample by` on a level without a select list stays on its row source
/// until an enclosing level aggregates it.
pub fn defer_sample_by(
    body: &mut QueryModel,
    scope: &Scope,
    interval: ExprNode,
    nested: bool,
) -> SqlResult<()> {
    if !nested {
        return Err(aggregate_required(&interval));
    }
    body.timestamp = Some(sample_key(body, scope, &interval)?);
    body.sample_by = Some(interval);
    Ok(())
}

/// Interval of a deferred `sample by` in the row sources under `model`.
fn deferred_sample_by(model: &QueryModel) -> Option<&ExprNode> {
    if model.projection.is_some() {
        return None;
    }
    model.sample_by.as_ref().or_else(|| match &model.source {
        ModelSource::Nested(inner) => deferred_sample_by(inner),
        ModelSource::Table(_) => None,
    })
}

/// A deferred `sample by` under `body` needs this level to aggregate, or
/// to defer it again.
pub fn check_deferred_sample_by(
    body: &QueryModel,
    layers: Option<&SelectLayers>,
    nested: bool,
) -> SqlResult<()> {
    let Some(interval) = deferred_sample_by(body) else {
        return Ok(());
    };
    match layers {
        Some(layers) if layers.main().is_group_by() => Ok(()),
        None if nested => Ok(()),
        _ => Err(aggregate_required(interval)),
    }
}

/// Bind one order-by column to an output alias of `layers`, or add it as a
/// hidden column.
fn bind_order_column(layers: &mut SelectLayers, scope: &Scope, expr: ExprNode) -> SqlResult<ExprNode> {
    let position = expr.position;
    let Some(reference) = expr.as_column() else {
        return Err(SqlError::invalid_column(position, expr.to_string()));
    };
    let by_alias = layers.output_alias(reference).or_else(|| {
        let qualifier = reference.qualifier.as_deref()?;
        if !scope.has_source(qualifier) {
            return None;
        }
        layers.output_alias(&ColumnRef::new(reference.name.clone()))
    });
    if let Some(alias) = by_alias {
        return Ok(ExprNode::column(ColumnRef::new(alias), position));
    }

    scope.resolve(reference, position)?;
    let name = reference.to_string();
    match layers.add_hidden(expr) {
        Some(alias) => Ok(ExprNode::column(ColumnRef::new(alias), position)),
        None => Err(SqlError::invalid_column(position, name)),
    }
}

pub fn bind_order_by(
    items: Vec<OrderItem>,
    layers: Option<&mut SelectLayers>,
    body: &mut QueryModel,
    scope: &Scope,
    max_columns: usize,
) -> SqlResult<()> {
    if let Some(extra) = items.get(max_columns) {
        return Err(SqlError::new(
            extra.expr.position,
            SqlErrorKind::TooManyColumns(max_columns),
        ));
    }
    let Some(layers) = layers else {
        for item in &items {
            scope.references(&item.expr)?;
        }
        body.order_by = items;
        return Ok(());
    };

    let mut bound = Vec::with_capacity(items.len());
    for item in items {
        bound.push(OrderItem {
            expr: bind_order_column(layers, scope, item.expr)?,
            descending: item.descending,
        });
    }
    layers.order_by = bound;
    Ok(())
}

/// `limit` applies to ordered or aggregated output, else to the rows read.
pub fn bind_limit(layers: Option<&mut SelectLayers>, body: &mut QueryModel, limit: Limit) {
    match layers {
        Some(layers) if !layers.order_by.is_empty() || layers.is_aggregating() => {
            layers.limit = Some(limit);
        }
        _ => body.limit = Some(limit),
    }
}

// ============================================================================
// Order-by elimination
// ============================================================================

/// Drop `order by` from models whose row order an enclosing model throws
/// away. Run once on the root with `ordered_above = false`.
pub fn eliminate_redundant_order_by(model: &mut QueryModel, ordered_above: bool) {
    if ordered_above && model.limit.is_none() && !model.order_by.is_empty() {
        tracing::trace!("dropping order by under an ordered parent");
        model.order_by.clear();
    }
    let orders_rows =
        !model.order_by.is_empty() || (model.is_grouped() && model.sample_by.is_none());
    let below = if model.sample_by.is_some() || model.is_analytic() {
        false
    } else if model.limit.is_some() {
        orders_rows
    } else {
        ordered_above || orders_rows
    };

    let time_ordered = model.joins.iter().any(|j| j.kind.is_time_ordered());
    if let Some(nested) = model.nested_model_mut() {
        eliminate_redundant_order_by(nested, below && !time_ordered);
    }
    for join in &mut model.joins {
        let keeps_order = time_ordered && join.kind.is_time_ordered();
        eliminate_redundant_order_by(&mut join.model, below && !keeps_order);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::TableMetadata;
    use crate::model::{OutputColumn, Projection, QueryColumn};
    use crate::sql::ast::Ident;

    fn col(name: &str) -> ExprNode {
        ExprNode::column(ColumnRef::parse(name), 0)
    }

    fn tab() -> QueryModel {
        QueryModel::table(
            "tab",
            Arc::new(
                TableMetadata::new("tab")
                    .col("x", ColumnType::Int)
                    .with_default_timestamp(),
            ),
        )
    }

    fn order(name: &str) -> Vec<OrderItem> {
        vec![OrderItem {
            expr: col(name),
            descending: false,
        }]
    }

    #[test]
    fn test_inner_order_by_dropped_under_ordered_parent() {
        let mut inner = tab();
        inner.order_by = order("x");
        let mut outer = QueryModel::select(
            Projection::Choose(vec![QueryColumn::new("x", col("x"))]),
            inner,
        );
        outer.order_by = order("x");

        eliminate_redundant_order_by(&mut outer, false);
        assert_eq!(outer.to_string(), "select-choose x from (tab) order by x");
    }

    #[test]
    fn test_inner_order_by_kept_under_limit_and_sample_by() {
        let mut inner = tab();
        inner.order_by = order("x");
        let mut outer = QueryModel::select(
            Projection::Choose(vec![QueryColumn::new("x", col("x"))]),
            inner,
        );
        outer.limit = Some(Limit {
            lo: ExprNode::constant("10", 0),
            hi: None,
        });
        eliminate_redundant_order_by(&mut outer, false);
        assert_eq!(
            outer.to_string(),
            "select-choose x from (tab order by x) limit 10"
        );

        let mut inner = tab();
        inner.order_by = order("x");
        let mut sampled = QueryModel::select(
            Projection::GroupBy(vec![QueryColumn::new("x", col("x"))]),
            inner,
        );
        sampled.sample_by = Some(ExprNode::constant("1h", 0));
        eliminate_redundant_order_by(&mut sampled, true);
        assert_eq!(
            sampled.to_string(),
            "select-group-by x from (tab order by x) sample by 1h"
        );
    }

    #[test]
    fn test_timestamp_must_name_master_column() {
        let mut scope = Scope::new();
        scope
            .declare(
                Some("tab"),
                None,
                vec![OutputColumn {
                    name: "x".into(),
                    column_type: Some(ColumnType::Int),
                }],
            )
            .unwrap();
        scope
            .declare(
                Some("b"),
                Some(&Ident::new("b", 20)),
                vec![OutputColumn {
                    name: "y".into(),
                    column_type: Some(ColumnType::Timestamp),
                }],
            )
            .unwrap();

        let mut model = tab();
        bind_timestamp(&mut model, ExprNode::column(ColumnRef::new("x"), 15), &scope).unwrap();
        assert_eq!(model.timestamp.as_ref().map(|t| t.to_string()), Some("x".into()));

        let err = bind_timestamp(&mut model, ExprNode::column(ColumnRef::new("y"), 15), &scope)
            .unwrap_err();
        assert_eq!(err.position, 15);
        assert_eq!(err.kind, SqlErrorKind::InvalidColumn("y".into()));
    }
}
