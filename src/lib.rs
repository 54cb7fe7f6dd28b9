//! # chronoql
//!
//! A compiler from time-series SQL to canonical query models.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       SQL text                           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql: lexer, parser]
//! ┌─────────────────────────────────────────────────────────┐
//! │              Statement (AST with offsets)                │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compiler + catalog]
//! ┌─────────────────────────────────────────────────────────┐
//! │   name resolution, join reordering, predicate placement, │
//! │   projection layers, clause binding                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │       QueryModel / CreateTableModel + canonical text     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [cache: fingerprint]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 AssociativeCache entry                   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure is a [`SqlError`](error::SqlError) carrying the offset of
//! the offending token in the statement text.

pub mod cache;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod error;
pub mod model;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::cache::{fingerprint, AssociativeCache, CacheMetrics};
    pub use crate::catalog::{Catalog, ColumnType, MemoryCatalog, PartitionBy, TableMetadata};
    pub use crate::compiler::{CompiledStatement, Compiler};
    pub use crate::config::{CompilerSettings, Settings};
    pub use crate::error::{SqlError, SqlErrorKind, SqlResult};
    pub use crate::model::{CreateTableModel, Projection, QueryModel};
}

pub use compiler::{CompiledStatement, Compiler};
pub use error::{SqlError, SqlErrorKind, SqlResult};
