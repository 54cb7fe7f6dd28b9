//! `CREATE TABLE` binder.

use crate::catalog::ColumnType;
use crate::config::CompilerSettings;
use crate::error::{SqlError, SqlErrorKind, SqlResult};
use crate::model::{ColumnDefinition, CreateTableModel};
use crate::sql::ast::{CreateTableAst, IndexSpec};

fn block_size(spec: IndexSpec, settings: &CompilerSettings) -> u32 {
    spec.block_size.unwrap_or(settings.index_value_block_size)
}

/// Bind a parsed `create table` to its model.
///
/// Column names are unique ignoring case. Trailing `index(col)` clauses and
/// `timestamp(col)` must name a declared column, and the timestamp column
/// must be of type TIMESTAMP.
pub fn bind(ast: CreateTableAst, settings: &CompilerSettings) -> SqlResult<CreateTableModel> {
    let mut columns: Vec<ColumnDefinition> = Vec::with_capacity(ast.columns.len());
    for def in ast.columns {
        if columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&def.name.name))
        {
            return Err(SqlError::new(
                def.name.position,
                SqlErrorKind::DuplicateColumn(def.name.name),
            ));
        }
        let (indexed, index_block_size) = match def.index {
            Some(spec) => (true, block_size(spec, settings)),
            None => (false, 0),
        };
        columns.push(ColumnDefinition {
            name: def.name.name,
            column_type: def.column_type,
            indexed,
            index_block_size,
        });
    }

    for index in ast.indexes {
        let Some(column) = columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&index.column.name))
        else {
            return Err(SqlError::invalid_column(
                index.column.position,
                index.column.name,
            ));
        };
        column.indexed = true;
        column.index_block_size = block_size(index.spec, settings);
    }

    let timestamp_index = match ast.timestamp {
        Some(ts) => {
            let Some(i) = columns
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(&ts.name))
            else {
                return Err(SqlError::invalid_column(ts.position, ts.name));
            };
            if columns[i].column_type != ColumnType::Timestamp {
                return Err(SqlError::new(
                    ts.position,
                    SqlErrorKind::NotATimestamp(ts.name),
                ));
            }
            Some(i)
        }
        None => None,
    };

    Ok(CreateTableModel {
        name: ast.name.name,
        columns,
        timestamp_index,
        partition_by: ast.partition_by.map(|(p, _)| p).unwrap_or_default(),
        record_hint: ast.record_hint,
    })
}
