//! Canonical text form of compiled models.
//!
//! ```text
//! select-<kind> col [alias], ... from (<body>) [timestamp (c)] [sample by v] [order by ...] [limit lo[,hi]]
//! <table|(nested)> [alias] [timestamp (c)] [latest by ...] [joins...] [where e] [const-where e] ...
//! ```
//!
//! A joined model that carries its own filters prints in parentheses
//! followed by its alias. Output is deterministic: equal models always
//! print identically, so the text doubles as a cache key.

use std::fmt::{self, Display, Formatter, Write};

use super::create_table::CreateTableModel;
use super::query::{JoinClause, ModelSource, Projection, QueryModel};
use crate::sql::{OrderItem, WindowSpec};

fn write_order_items(f: &mut Formatter<'_>, items: &[OrderItem]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item.expr)?;
        if item.descending {
            f.write_str(" desc")?;
        }
    }
    Ok(())
}

fn write_window(f: &mut Formatter<'_>, window: &WindowSpec) -> fmt::Result {
    f.write_str(" over (")?;
    let mut sep = "";
    if !window.partition_by.is_empty() {
        f.write_str("partition by ")?;
        for (i, e) in window.partition_by.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{e}")?;
        }
        sep = " ";
    }
    if !window.order_by.is_empty() {
        write!(f, "{sep}order by ")?;
        write_order_items(f, &window.order_by)?;
    }
    f.write_char(')')
}

fn write_column(f: &mut Formatter<'_>, alias: &str, expr: &crate::sql::ExprNode) -> fmt::Result {
    let text = expr.to_string();
    if expr.as_column().is_some() && text == alias {
        f.write_str(&text)
    } else {
        write!(f, "{text} {alias}")
    }
}

impl Display for Projection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())?;
        f.write_char(' ')?;
        match self {
            Projection::Choose(cols) | Projection::Virtual(cols) | Projection::GroupBy(cols) => {
                for (i, c) in cols.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_column(f, &c.alias, &c.expr)?;
                }
            }
            Projection::Analytic(cols) => {
                for (i, c) in cols.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_column(f, &c.alias, &c.expr)?;
                    if let Some(window) = &c.window {
                        write_window(f, window)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Display for JoinClause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, " {} ", self.keyword())?;
        let target = &self.model;
        if target.has_clauses() {
            write!(f, "({target})")?;
            if let Some(alias) = &target.alias {
                write!(f, " {alias}")?;
            }
        } else {
            write!(f, "{target}")?;
        }
        for (i, c) in self.criteria.iter().enumerate() {
            f.write_str(if i == 0 { " on " } else { " and " })?;
            write!(f, "{c}")?;
        }
        if let Some(filter) = &self.post_join_where {
            write!(f, " post-join-where {filter}")?;
        }
        Ok(())
    }
}

impl Display for QueryModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (&self.projection, &self.source) {
            (Some(projection), ModelSource::Nested(body)) => {
                write!(f, "{projection} from ({body})")?;
            }
            (Some(projection), ModelSource::Table(t)) => {
                write!(f, "{projection} from ({})", t.name)?;
            }
            (None, ModelSource::Table(t)) => f.write_str(&t.name)?,
            (None, ModelSource::Nested(body)) => write!(f, "({body})")?,
        }
        if let Some(alias) = &self.alias {
            write!(f, " {alias}")?;
        }
        if let Some(ts) = &self.timestamp {
            write!(f, " timestamp ({ts})")?;
        }
        if !self.latest_by.is_empty() {
            f.write_str(" latest by ")?;
            for (i, e) in self.latest_by.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{e}")?;
            }
        }
        for join in &self.joins {
            write!(f, "{join}")?;
        }
        if let Some(filter) = &self.where_clause {
            write!(f, " where {filter}")?;
        }
        if let Some(filter) = &self.const_where {
            write!(f, " const-where {filter}")?;
        }
        if let Some(sample) = &self.sample_by {
            write!(f, " sample by {sample}")?;
        }
        if !self.order_by.is_empty() {
            f.write_str(" order by ")?;
            write_order_items(f, &self.order_by)?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " limit {}", limit.lo)?;
            if let Some(hi) = &limit.hi {
                write!(f, ",{hi}")?;
            }
        }
        Ok(())
    }
}

impl Display for CreateTableModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "create table {} (", self.name)?;
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", c.name, c.column_type)?;
            if c.indexed {
                write!(f, " index block size {}", c.index_block_size)?;
            }
        }
        f.write_char(')')?;
        if let Some(ts) = self.timestamp_index.and_then(|i| self.columns.get(i)) {
            write!(f, " timestamp({})", ts.name)?;
        }
        write!(f, " partition by {}", self.partition_by)?;
        if let Some(hint) = self.record_hint {
            write!(f, " record hint {hint}")?;
        }
        Ok(())
    }
}
