//! Projection rewrite.
//!
//! A select list becomes a stack of projection models over the row-source
//! model of its scope. Each layer does one kind of work:
//!
//! ```text
//!   select-virtual   outer:       arithmetic over aggregates   sum + 25 ohoh
//!   select-group-by  main:        keys and aggregate calls     x, sum(z) sum
//!   select-virtual   inner:       computed keys and arguments  a + b * c x, z
//!   select-choose    translating: renamed and qualified columns c.customerId customerId
//!   <row source>
//! ```
//!
//! Layers that have nothing to do are left out, so `select a, b from t` is a
//! single `select-choose`. A list without aggregates or window functions is
//! a `select-choose` when every item is a plain column and a
//! `select-virtual` otherwise. The translating layer is kept only under a
//! layer that computes, and only when one of its columns is more than a
//! bare source column under its own name.

use std::collections::HashSet;

use super::scope::Scope;
use crate::error::{SqlError, SqlErrorKind, SqlResult};
use crate::model::{AnalyticColumn, Projection, QueryColumn, QueryModel};
use crate::sql::ast::{SelectClause, SelectItem};
use crate::sql::{ColumnRef, ExprKind, ExprNode, Limit, OrderItem, WindowSpec};

// ============================================================================
// Aliases
// ============================================================================

/// Case-insensitive set of the aliases taken in one projection.
#[derive(Debug, Clone, Default)]
pub struct AliasSet {
    taken: HashSet<String>,
}

impl AliasSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_aliases<'a>(aliases: impl IntoIterator<Item = &'a str>) -> Self {
        let mut set = Self::new();
        for alias in aliases {
            set.reserve(alias);
        }
        set
    }

    /// Take `alias`; false when it is already taken.
    pub fn reserve(&mut self, alias: &str) -> bool {
        self.taken.insert(alias.to_ascii_lowercase())
    }

    /// Take `base`, or the first free `base1`, `base2`, ...
    pub fn unique(&mut self, base: &str) -> String {
        if self.reserve(base) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}{n}");
            if self.reserve(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// The name a select item is published under when it has no alias.
pub fn natural_alias(expr: &ExprNode) -> String {
    match &expr.kind {
        ExprKind::Column(c) => c.name.clone(),
        ExprKind::Function { name, .. } => name.clone(),
        _ => "column".to_string(),
    }
}

fn column(alias: &str, position: usize) -> ExprNode {
    ExprNode::column(ColumnRef::new(alias), position)
}

// ============================================================================
// Pass-through layers
// ============================================================================

/// A `select-choose` or `select-virtual` layer fed by the layer below.
#[derive(Debug, Default)]
struct Layer {
    columns: Vec<QueryColumn>,
    aliases: AliasSet,
}

impl Layer {
    /// Publish `expr` unchanged and return a reference to it.
    fn pass_through(&mut self, expr: &ExprNode) -> ExprNode {
        if let Some(existing) = self.columns.iter().find(|c| c.expr.same_as(expr)) {
            return column(&existing.alias, expr.position);
        }
        let alias = self.aliases.unique(&natural_alias(expr));
        self.columns.push(QueryColumn::new(alias.clone(), expr.clone()));
        column(&alias, expr.position)
    }

    /// Publish a computed expression under `alias`, or a free variant of it.
    fn computed(&mut self, alias: &str, expr: ExprNode) -> ExprNode {
        let position = expr.position;
        let alias = self.aliases.unique(alias);
        self.columns.push(QueryColumn::new(alias.clone(), expr));
        column(&alias, position)
    }

    /// Rewrite every column of `expr` to go through this layer.
    fn route(&mut self, expr: ExprNode) -> ExprNode {
        expr.map_columns(|c, position| self.pass_through(&ExprNode::column(c, position)))
    }

    /// Route one select item through this layer as a translating layer: a
    /// renamed column is published under its new name.
    fn translate(&mut self, item: &Item) -> Item {
        let expr = match item.expr.as_column() {
            Some(c) if item.window.is_none() && c.name != item.alias => {
                self.computed(&item.alias, item.expr.clone())
            }
            _ => self.route(item.expr.clone()),
        };
        Item {
            alias: item.alias.clone(),
            expr,
            window: item.window.clone().map(|w| self.route_window(w)),
        }
    }

    /// Every column republishes a source column under its own name.
    fn is_identity(&self) -> bool {
        self.columns.iter().all(QueryColumn::is_pass_through)
    }

    fn route_window(&mut self, window: WindowSpec) -> WindowSpec {
        WindowSpec {
            partition_by: window
                .partition_by
                .into_iter()
                .map(|e| self.route(e))
                .collect(),
            order_by: window
                .order_by
                .into_iter()
                .map(|o| OrderItem {
                    expr: self.route(o.expr),
                    descending: o.descending,
                })
                .collect(),
        }
    }
}

fn route_opt(layer: Option<&mut Layer>, expr: ExprNode) -> ExprNode {
    match layer {
        Some(layer) => layer.route(expr),
        None => expr,
    }
}

// ============================================================================
// Layers
// ============================================================================

/// The projection stack of one query level, plus the clauses bound to it.
#[derive(Debug)]
pub struct SelectLayers {
    translating: Option<Layer>,
    inner: Option<Layer>,
    main: Projection,
    outer: Option<Projection>,
    /// User-visible aliases with the expressions written for them.
    items: Vec<(String, ExprNode)>,
    /// Hidden order-by columns were added to `main`.
    wrap: bool,
    pub timestamp: Option<ExprNode>,
    pub sample_by: Option<ExprNode>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<Limit>,
}

impl SelectLayers {
    /// The projection that produces the final rows.
    pub fn top(&self) -> &Projection {
        self.outer.as_ref().unwrap_or(&self.main)
    }

    pub fn main(&self) -> &Projection {
        &self.main
    }

    /// Whether the main layer aggregates or windows its input.
    pub fn is_aggregating(&self) -> bool {
        self.main.is_group_by() || self.main.is_analytic()
    }

    /// Route a source column up to the input of the main layer.
    fn expose(&mut self, expr: &ExprNode) -> ExprNode {
        let expr = route_opt(self.translating.as_mut(), expr.clone());
        route_opt(self.inner.as_mut(), expr)
    }

    /// Output alias that an order-by column names, by alias or by the
    /// column it was selected from.
    pub fn output_alias(&self, reference: &ColumnRef) -> Option<String> {
        if reference.qualifier.is_none() {
            let found = self
                .top()
                .aliases()
                .into_iter()
                .find(|a| a.eq_ignore_ascii_case(&reference.name));
            if let Some(alias) = found {
                return Some(alias.to_string());
            }
        }
        let text = reference.to_string();
        self.items
            .iter()
            .find(|(_, e)| {
                e.as_column()
                    .is_some_and(|c| c.to_string().eq_ignore_ascii_case(&text))
            })
            .map(|(alias, _)| alias.clone())
    }

    /// Add a source column only ordering needs; `None` when the main layer
    /// cannot carry extra columns.
    pub fn add_hidden(&mut self, expr: ExprNode) -> Option<String> {
        if self.is_aggregating() || self.outer.is_some() {
            return None;
        }
        let existing = self
            .main
            .columns()
            .into_iter()
            .find(|(_, e)| e.same_as(&expr))
            .map(|(alias, _)| alias.to_string());
        if existing.is_some() {
            return existing;
        }
        let routed = if self.translating.is_none() && matches!(self.main, Projection::Virtual(_)) {
            // a computing layer reads the extra column from a copy of itself
            let mut layer = Layer::default();
            for (alias, e) in self.main.columns() {
                layer.aliases.reserve(alias);
                layer.columns.push(QueryColumn::new(alias, e.clone()));
            }
            let routed = layer.pass_through(&expr);
            self.translating = Some(layer);
            routed
        } else {
            self.expose(&expr)
        };
        let alias = AliasSet::from_aliases(self.main.aliases()).unique(&natural_alias(&expr));
        self.main.push(alias.clone(), routed);
        self.wrap = true;
        Some(alias)
    }

    /// Stack the layers over `body`.
    pub fn assemble(self, body: QueryModel) -> QueryModel {
        let mut model = body;
        if let Some(layer) = self.translating {
            model = QueryModel::select(Projection::Choose(layer.columns), model);
        }
        if let Some(layer) = self.inner {
            model = QueryModel::select(Projection::Virtual(layer.columns), model);
        }
        model = QueryModel::select(self.main, model);
        model.timestamp = self.timestamp;
        model.sample_by = self.sample_by;
        if let Some(outer) = self.outer {
            model = QueryModel::select(outer, model);
        }
        model.order_by = self.order_by;
        model.limit = self.limit;
        if self.wrap {
            let visible = self
                .items
                .iter()
                .map(|(alias, _)| QueryColumn::new(alias.clone(), column(alias, 0)))
                .collect();
            model = QueryModel::select(Projection::Choose(visible), model);
        }
        model
    }
}

// ============================================================================
// Rewrite
// ============================================================================

struct Item {
    alias: String,
    expr: ExprNode,
    window: Option<WindowSpec>,
}

fn resolve_item(item: &SelectItem, scope: &Scope) -> SqlResult<()> {
    scope.references(&item.expr)?;
    if let Some(window) = &item.window {
        for e in &window.partition_by {
            scope.references(e)?;
        }
        for o in &window.order_by {
            scope.references(&o.expr)?;
        }
    }
    Ok(())
}

/// Replace each aggregate call inside `expr` by a reference to a main
/// layer column computing it.
fn extract_aggregates(
    expr: ExprNode,
    aliases: &mut AliasSet,
    inner: &mut Option<Layer>,
    main: &mut Vec<QueryColumn>,
) -> ExprNode {
    if expr.is_aggregate_call() {
        let alias = aliases.unique(&natural_alias(&expr));
        let position = expr.position;
        main.push(QueryColumn::new(
            alias.clone(),
            route_opt(inner.as_mut(), expr),
        ));
        return column(&alias, position);
    }
    let position = expr.position;
    let kind = match expr.kind {
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op,
            operand: Box::new(extract_aggregates(*operand, aliases, inner, main)),
        },
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op,
            left: Box::new(extract_aggregates(*left, aliases, inner, main)),
            right: Box::new(extract_aggregates(*right, aliases, inner, main)),
        },
        ExprKind::Function { name, args } => ExprKind::Function {
            name,
            args: args
                .into_iter()
                .map(|a| extract_aggregates(a, aliases, inner, main))
                .collect(),
        },
        ExprKind::InList { operand, list } => ExprKind::InList {
            operand: Box::new(extract_aggregates(*operand, aliases, inner, main)),
            list: list
                .into_iter()
                .map(|e| extract_aggregates(e, aliases, inner, main))
                .collect(),
        },
        kind => kind,
    };
    ExprNode::new(kind, position)
}

fn reserve_aliases(select: &SelectClause) -> SqlResult<AliasSet> {
    let mut aliases = AliasSet::new();
    for alias in select.items.iter().filter_map(|i| i.alias.as_ref()) {
        if !aliases.reserve(&alias.name) {
            return Err(SqlError::new(
                alias.position,
                SqlErrorKind::DuplicateColumn(alias.name.clone()),
            ));
        }
    }
    Ok(aliases)
}

/// Check a select list against `scope`; true when it aggregates.
pub fn resolve(select: &SelectClause, scope: &Scope) -> SqlResult<bool> {
    for item in &select.items {
        resolve_item(item, scope)?;
    }
    reserve_aliases(select)?;

    let analytic = select.items.iter().any(|i| i.window.is_some());
    let aggregate = select
        .items
        .iter()
        .any(|i| i.window.is_none() && i.expr.contains_aggregate());
    if analytic && aggregate {
        return Err(SqlError::new(
            select.position,
            SqlErrorKind::AnalyticFunctionNotAllowed,
        ));
    }
    Ok(aggregate)
}

/// Rewrite a select list over the sources of `scope`.
///
/// A `sample_key` becomes the first group-by key and takes its natural
/// name before any unaliased item does.
pub fn rewrite(
    select: SelectClause,
    scope: &Scope,
    sample_key: Option<ExprNode>,
) -> SqlResult<SelectLayers> {
    let aggregate = resolve(&select, scope)?;
    let mut aliases = reserve_aliases(&select)?;

    let mut items = Vec::with_capacity(select.items.len() + 1);
    let keyed = sample_key.is_some();
    if let Some(key) = sample_key {
        items.push(Item {
            alias: aliases.unique(&natural_alias(&key)),
            expr: key,
            window: None,
        });
    }
    items.extend(select.items.into_iter().map(|item| Item {
        alias: match item.alias {
            Some(alias) => alias.name,
            None => aliases.unique(&natural_alias(&item.expr)),
        },
        expr: item.expr,
        window: item.window,
    }));
    let written: Vec<(String, ExprNode)> = items
        .iter()
        .map(|i| (i.alias.clone(), i.expr.clone()))
        .collect();

    let analytic = items.iter().any(|i| i.window.is_some());
    let plain = items.iter().all(|i| i.expr.as_column().is_some());
    let mut translating = None;
    if aggregate || analytic || !plain {
        let mut layer = Layer::default();
        let translated: Vec<Item> = items.iter().map(|i| layer.translate(i)).collect();
        if !layer.is_identity() {
            items = translated;
            translating = Some(layer);
        }
    }

    let mut inner = None;
    let mut outer = None;
    let main = if aggregate {
        let needs_inner = items
            .iter()
            .any(|i| !i.expr.contains_aggregate() && i.expr.as_column().is_none());
        let needs_outer = items
            .iter()
            .any(|i| i.expr.contains_aggregate() && !i.expr.is_aggregate_call());
        inner = needs_inner.then(Layer::default);

        let mut main_columns = Vec::new();
        let mut outer_columns = Vec::new();
        for item in items {
            let position = item.expr.position;
            if item.expr.is_aggregate_call() {
                let call = route_opt(inner.as_mut(), item.expr);
                main_columns.push(QueryColumn::new(item.alias.clone(), call));
                outer_columns.push(QueryColumn::new(item.alias.clone(), column(&item.alias, position)));
            } else if item.expr.contains_aggregate() {
                let rewritten =
                    extract_aggregates(item.expr, &mut aliases, &mut inner, &mut main_columns);
                outer_columns.push(QueryColumn::new(item.alias, rewritten));
            } else {
                let key = match inner.as_mut() {
                    Some(layer) if item.expr.as_column().is_none() => {
                        layer.computed(&item.alias, item.expr)
                    }
                    Some(layer) => layer.pass_through(&item.expr),
                    None => item.expr,
                };
                main_columns.push(QueryColumn::new(item.alias.clone(), key));
                outer_columns.push(QueryColumn::new(item.alias.clone(), column(&item.alias, position)));
            }
        }
        outer = needs_outer.then(|| Projection::Virtual(outer_columns));
        Projection::GroupBy(main_columns)
    } else if analytic {
        let needs_inner = items
            .iter()
            .any(|i| i.window.is_none() && i.expr.as_column().is_none());
        inner = needs_inner.then(Layer::default);

        let mut columns = Vec::new();
        for item in items {
            let (expr, window) = match (item.window, inner.as_mut()) {
                (Some(window), Some(layer)) => {
                    (layer.route(item.expr), Some(layer.route_window(window)))
                }
                (Some(window), None) => (item.expr, Some(window)),
                (None, Some(layer)) if item.expr.as_column().is_none() => {
                    (layer.computed(&item.alias, item.expr), None)
                }
                (None, Some(layer)) => (layer.pass_through(&item.expr), None),
                (None, None) => (item.expr, None),
            };
            columns.push(AnalyticColumn {
                alias: item.alias,
                expr,
                window,
            });
        }
        Projection::Analytic(columns)
    } else {
        let columns = items
            .into_iter()
            .map(|i| QueryColumn::new(i.alias, i.expr))
            .collect();
        if plain {
            Projection::Choose(columns)
        } else {
            Projection::Virtual(columns)
        }
    };

    let timestamp = keyed
        .then(|| main.columns().first().map(|(_, e)| (*e).clone()))
        .flatten();
    Ok(SelectLayers {
        translating,
        inner,
        main,
        outer,
        items: written,
        wrap: false,
        timestamp,
        sample_by: None,
        order_by: Vec::new(),
        limit: None,
    })
}
