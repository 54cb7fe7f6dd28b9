//! Catalog trait definition and the in-memory implementation.
//!
//! The compiler only ever reads from a catalog. Implementations must be safe
//! to share between threads compiling independent statements.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;

use super::types::{ColumnMetadata, PartitionBy, TableMetadata};
use super::{CatalogError, CatalogResult};

/// Read-only table lookup used during name resolution.
///
/// # Example
///
/// ```
/// use chronoql::catalog::{Catalog, ColumnType, MemoryCatalog, TableMetadata};
///
/// let catalog = MemoryCatalog::new();
/// catalog.register(TableMetadata::new("orders").col("orderId", ColumnType::Int));
///
/// assert!(catalog.resolve_table("ORDERS").is_some());
/// assert!(catalog.resolve_table("customers").is_none());
/// ```
pub trait Catalog: Send + Sync {
    /// Look up a base table by name, case-insensitively.
    fn resolve_table(&self, name: &str) -> Option<Arc<TableMetadata>>;

    /// Whether a table with this name exists.
    fn table_exists(&self, name: &str) -> bool {
        self.resolve_table(name).is_some()
    }
}

// ============================================================================
// In-memory catalog
// ============================================================================

/// Concurrent table map keyed by lower-cased table name.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: DashMap<String, Arc<TableMetadata>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, replacing any previous definition with the same name.
    pub fn register(&self, table: TableMetadata) -> &Self {
        self.tables
            .insert(table.name.to_ascii_lowercase(), Arc::new(table));
        self
    }

    /// Register a table, failing if the name is taken.
    pub fn try_register(&self, table: TableMetadata) -> CatalogResult<()> {
        let key = table.name.to_ascii_lowercase();
        if self.tables.contains_key(&key) {
            return Err(CatalogError::DuplicateTable(table.name));
        }
        self.tables.insert(key, Arc::new(table));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|e| e.value().name.clone()).collect();
        names.sort();
        names
    }

    /// Parse a catalog file of `[[table]]` entries.
    pub fn from_toml_str(content: &str) -> CatalogResult<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        let catalog = Self::new();
        for entry in file.table {
            catalog.try_register(entry.into_metadata()?)?;
        }
        Ok(catalog)
    }

    pub fn from_file(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }
}

impl Catalog for MemoryCatalog {
    fn resolve_table(&self, name: &str) -> Option<Arc<TableMetadata>> {
        self.tables
            .get(&name.to_ascii_lowercase())
            .map(|e| Arc::clone(e.value()))
    }
}

impl<C: Catalog + ?Sized> Catalog for Arc<C> {
    fn resolve_table(&self, name: &str) -> Option<Arc<TableMetadata>> {
        (**self).resolve_table(name)
    }
}

// ============================================================================
// Catalog file format
// ============================================================================

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    table: Vec<TableEntry>,
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    name: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    partition_by: PartitionBy,
    #[serde(default)]
    columns: Vec<ColumnMetadata>,
}

impl TableEntry {
    fn into_metadata(self) -> CatalogResult<TableMetadata> {
        let mut table = TableMetadata::new(self.name).partition_by(self.partition_by);
        table.columns = self.columns;
        if let Some(ts) = self.timestamp {
            table = table.timestamp(&ts);
            if table.timestamp_index.is_none() {
                return Err(CatalogError::UnknownTimestamp {
                    table: table.name,
                    column: ts,
                });
            }
        }
        Ok(table)
    }
}
