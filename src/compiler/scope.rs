//! Name resolution.
//!
//! A [`Scope`] lists the row sources of one query level in declaration
//! order: the master source first, then every joined source. Column
//! references resolve against the union of their columns.
//!
//! ```text
//!   orders o join customers c on ...        Scope
//!   ─────────────────────────────────       ┌───┬───────────┬──────────────────┐
//!   o.customerId  ──► source 0              │ 0 │ o         │ orderId, custId  │
//!   customerName  ──► source 1              │ 1 │ c         │ custId, name     │
//!   customerId    ──► ambiguous             └───┴───────────┴──────────────────┘
//! ```
//!
//! Resolution never crosses query levels: a sub-query sees only its own
//! sources.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::catalog::{Catalog, ColumnType, TableMetadata};
use crate::error::{SqlError, SqlErrorKind, SqlResult};
use crate::model::OutputColumn;
use crate::sql::ast::Ident;
use crate::sql::{ColumnRef, ExprNode};

/// Look up a base table, failing at the name's position.
pub fn resolve_table(catalog: &dyn Catalog, name: &Ident) -> SqlResult<Arc<TableMetadata>> {
    catalog.resolve_table(&name.name).ok_or_else(|| {
        SqlError::new(
            name.position,
            SqlErrorKind::TableDoesNotExist(name.name.clone()),
        )
    })
}

/// One row source visible in a scope.
#[derive(Debug, Clone)]
pub struct ScopeEntry {
    /// Alias, else table name; unnamed sub-queries have none.
    pub name: Option<String>,
    pub columns: Vec<OutputColumn>,
}

impl ScopeEntry {
    fn column(&self, name: &str) -> Option<&OutputColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn answers_to(&self, qualifier: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(qualifier))
    }
}

/// Where a column reference landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub source: usize,
    pub column_type: Option<ColumnType>,
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    entries: Vec<ScopeEntry>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, source: usize) -> Option<&ScopeEntry> {
        self.entries.get(source)
    }

    /// Add a source and return its index.
    ///
    /// An explicit alias that repeats a name already in scope fails at the
    /// alias. Unaliased tables may repeat.
    pub fn declare(
        &mut self,
        name: Option<&str>,
        alias: Option<&Ident>,
        columns: Vec<OutputColumn>,
    ) -> SqlResult<usize> {
        if let Some(alias) = alias {
            if self.entries.iter().any(|e| e.answers_to(&alias.name)) {
                return Err(SqlError::new(
                    alias.position,
                    SqlErrorKind::DuplicateAlias(alias.name.clone()),
                ));
            }
        }
        self.entries.push(ScopeEntry {
            name: name.map(str::to_string),
            columns,
        });
        Ok(self.entries.len() - 1)
    }

    /// Whether `qualifier` names a source of this scope.
    pub fn has_source(&self, qualifier: &str) -> bool {
        self.entries.iter().any(|e| e.answers_to(qualifier))
    }

    /// Resolve one column reference written at `position`.
    pub fn resolve(&self, column: &ColumnRef, position: usize) -> SqlResult<Resolved> {
        match &column.qualifier {
            Some(qualifier) => {
                let mut named = self
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.answers_to(qualifier));
                let Some((source, entry)) = named.next() else {
                    return Err(SqlError::new(
                        position,
                        SqlErrorKind::InvalidTableName(qualifier.clone()),
                    ));
                };
                if named.next().is_some() {
                    return Err(SqlError::new(
                        position,
                        SqlErrorKind::AmbiguousColumn(column.to_string()),
                    ));
                }
                entry
                    .column(&column.name)
                    .map(|c| Resolved {
                        source,
                        column_type: c.column_type,
                    })
                    .ok_or_else(|| SqlError::invalid_column(position, column.to_string()))
            }
            None => {
                let mut found = None;
                for (source, entry) in self.entries.iter().enumerate() {
                    if let Some(c) = entry.column(&column.name) {
                        if found.is_some() {
                            return Err(SqlError::new(
                                position,
                                SqlErrorKind::AmbiguousColumn(column.name.clone()),
                            ));
                        }
                        found = Some(Resolved {
                            source,
                            column_type: c.column_type,
                        });
                    }
                }
                found.ok_or_else(|| SqlError::invalid_column(position, column.name.clone()))
            }
        }
    }

    /// Resolve every column of `expr` and return the sources it touches.
    pub fn references(&self, expr: &ExprNode) -> SqlResult<BTreeSet<usize>> {
        let mut sources = BTreeSet::new();
        let mut failure = None;
        expr.for_each_column(&mut |column, position| {
            if failure.is_some() {
                return;
            }
            match self.resolve(column, position) {
                Ok(resolved) => {
                    sources.insert(resolved.source);
                }
                Err(err) => failure = Some(err),
            }
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(sources),
        }
    }
}
