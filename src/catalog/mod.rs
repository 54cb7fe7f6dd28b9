//! Table metadata supplied to the compiler.
//!
//! The compiler consults a [`Catalog`] to learn which base tables exist, what
//! columns they carry, and which column is the designated timestamp.
//! [`MemoryCatalog`] is the bundled implementation; it is filled either
//! programmatically through the [`TableMetadata`] builder or from a TOML file.

mod provider;
mod types;

pub use provider::{Catalog, MemoryCatalog};
pub use types::{ColumnMetadata, ColumnType, PartitionBy, TableMetadata};

use thiserror::Error;

/// Errors raised while building or loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Duplicate table: {0}")]
    DuplicateTable(String),

    #[error("Table '{table}' has no column '{column}' to use as timestamp")]
    UnknownTimestamp { table: String, column: String },
}

pub type CatalogResult<T> = Result<T, CatalogError>;
