//! Compiled models and their canonical text form.

mod create_table;
mod printer;
mod query;

pub use create_table::{ColumnDefinition, CreateTableModel};
pub use query::{
    AnalyticColumn, JoinClause, JoinProvenance, ModelSource, OutputColumn, Projection,
    QueryColumn, QueryModel, TableSource,
};
