//! `CREATE TABLE` model.

use serde::Serialize;

use crate::catalog::{ColumnType, PartitionBy};

/// A column as declared by `create table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub indexed: bool,
    /// Index value block size; zero when not indexed.
    pub index_block_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTableModel {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    /// Index into `columns` of the designated timestamp.
    pub timestamp_index: Option<usize>,
    pub partition_by: PartitionBy,
    pub record_hint: Option<u64>,
}

impl CreateTableModel {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn indexed_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| c.indexed)
    }
}
