//! SQL front end: lexer, expression AST and statement parser.
//!
//! ```text
//!   SQL text ──► lexer ──► TokenCursor ──► parser ──► Statement
//!                                            │
//!                                            └──► expr_parser ──► ExprNode
//! ```

pub mod ast;
pub mod cursor;
pub mod expr;
pub mod expr_parser;
pub mod lexer;
pub mod parser;

pub use ast::{JoinKind, Limit, OrderItem, Statement, WindowSpec};
pub use expr::{BinaryOp, ColumnRef, ExprKind, ExprNode, UnaryOp};
pub use parser::parse_statement;
