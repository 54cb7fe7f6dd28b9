//! Table and column metadata supplied by the storage layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Symbol,
    Binary,
    Date,
    Timestamp,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Byte => "BYTE",
            ColumnType::Short => "SHORT",
            ColumnType::Int => "INT",
            ColumnType::Long => "LONG",
            ColumnType::Float => "FLOAT",
            ColumnType::Double => "DOUBLE",
            ColumnType::String => "STRING",
            ColumnType::Symbol => "SYMBOL",
            ColumnType::Binary => "BINARY",
            ColumnType::Date => "DATE",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnType {
    type Err = ();

    /// Case-insensitive type name lookup.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BOOLEAN" => Ok(ColumnType::Boolean),
            "BYTE" => Ok(ColumnType::Byte),
            "SHORT" => Ok(ColumnType::Short),
            "INT" => Ok(ColumnType::Int),
            "LONG" => Ok(ColumnType::Long),
            "FLOAT" => Ok(ColumnType::Float),
            "DOUBLE" => Ok(ColumnType::Double),
            "STRING" => Ok(ColumnType::String),
            "SYMBOL" => Ok(ColumnType::Symbol),
            "BINARY" => Ok(ColumnType::Binary),
            "DATE" => Ok(ColumnType::Date),
            "TIMESTAMP" => Ok(ColumnType::Timestamp),
            _ => Err(()),
        }
    }
}

/// Table partitioning scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartitionBy {
    #[default]
    None,
    Day,
    Month,
    Year,
}

impl PartitionBy {
    pub fn name(&self) -> &'static str {
        match self {
            PartitionBy::None => "NONE",
            PartitionBy::Day => "DAY",
            PartitionBy::Month => "MONTH",
            PartitionBy::Year => "YEAR",
        }
    }
}

impl fmt::Display for PartitionBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PartitionBy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(PartitionBy::None),
            "DAY" => Ok(PartitionBy::Day),
            "MONTH" => Ok(PartitionBy::Month),
            "YEAR" => Ok(PartitionBy::Year),
            _ => Err(()),
        }
    }
}

/// A column of a base table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub indexed: bool,
    /// Index value block capacity; zero when the column is not indexed.
    #[serde(default, rename = "block_size")]
    pub index_block_capacity: u32,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            indexed: false,
            index_block_capacity: 0,
        }
    }
}

/// Everything the compiler needs to know about a base table.
///
/// Built with a small fluent API:
///
/// ```
/// use chronoql::catalog::{ColumnType, TableMetadata};
///
/// let trades = TableMetadata::new("trades")
///     .col("sym", ColumnType::Symbol)
///     .col("price", ColumnType::Double)
///     .col("ts", ColumnType::Timestamp)
///     .timestamp("ts");
/// assert_eq!(trades.designated_timestamp(), Some("ts"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
    pub timestamp_index: Option<usize>,
    pub partition_by: PartitionBy,
}

impl TableMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            timestamp_index: None,
            partition_by: PartitionBy::None,
        }
    }

    /// Append a column.
    pub fn col(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(ColumnMetadata::new(name, column_type));
        self
    }

    /// Append an indexed column.
    pub fn indexed_col(
        mut self,
        name: impl Into<String>,
        column_type: ColumnType,
        block_capacity: u32,
    ) -> Self {
        let mut column = ColumnMetadata::new(name, column_type);
        column.indexed = true;
        column.index_block_capacity = block_capacity;
        self.columns.push(column);
        self
    }

    /// Nominate an existing column as the designated timestamp.
    ///
    /// Unknown names leave the table without a designated timestamp.
    pub fn timestamp(mut self, name: &str) -> Self {
        self.timestamp_index = self.column_index(name);
        self
    }

    /// Append a `timestamp` column of TIMESTAMP type and designate it.
    pub fn with_default_timestamp(self) -> Self {
        self.col("timestamp", ColumnType::Timestamp)
            .timestamp("timestamp")
    }

    pub fn partition_by(mut self, partition_by: PartitionBy) -> Self {
        self.partition_by = partition_by;
        self
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    pub fn designated_timestamp(&self) -> Option<&str> {
        self.timestamp_index
            .and_then(|i| self.columns.get(i))
            .map(|c| c.name.as_str())
    }
}
