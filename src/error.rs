//! Position-tagged compilation errors.
//!
//! Every failure raised while lexing, parsing or compiling a statement carries
//! the zero-based byte offset of the offending token in the statement text.
//! The first error aborts compilation; nothing is aggregated.

use std::fmt;

// ============================================================================
// Error Types
// ============================================================================

/// A compilation failure at a position in the statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlError {
    /// Zero-based offset into the statement text.
    pub position: usize,
    /// What went wrong.
    pub kind: SqlErrorKind,
}

/// The kinds of compilation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SqlErrorKind {
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("Unexpected end of input")]
    UnexpectedEndOfInput,

    #[error("{0} expected")]
    ExpectedToken(String),

    #[error("Expression expected")]
    ExpressionExpected,

    #[error("Unbalanced expression: missing ')'")]
    UnbalancedExpression,

    #[error("missing column list")]
    MissingColumns,

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Invalid table name or alias: {0}")]
    InvalidTableName(String),

    #[error("table does not exist: {0}")]
    TableDoesNotExist(String),

    #[error("Ambiguous column name: {0}")]
    AmbiguousColumn(String),

    #[error("Duplicate table or alias: {0}")]
    DuplicateAlias(String),

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("'.' is not allowed in column alias")]
    DotNotAllowed,

    #[error("Invalid alias: {0}")]
    InvalidAlias(String),

    #[error("'on' expected")]
    JoinConditionRequired,

    #[error("cross join cannot have join clauses")]
    CrossJoinCondition,

    #[error("not a TIMESTAMP column: {0}")]
    NotATimestamp(String),

    #[error("TIMESTAMP column is not defined")]
    TimestampNotDefined,

    #[error("at least one aggregation function must be present in 'select' clause")]
    AtLeastOneAggregateRequired,

    #[error("latest by is not allowed on a sub-query")]
    LatestByNotAllowedOnSubquery,

    #[error("Too many columns in order by, maximum is {0}")]
    TooManyColumns(usize),

    #[error("Analytic function is not allowed in context of aggregation. Use sub-query.")]
    AnalyticFunctionNotAllowed,

    #[error("Analytic function expected")]
    AnalyticFunctionExpected,

    #[error("'table' expected")]
    UnsupportedCreateTarget,

    #[error("Unsupported column type: {0}")]
    InvalidColumnType(String),

    #[error("Too deeply nested, maximum depth is {0}")]
    NestingTooDeep(usize),

    #[error("Invalid partition type: {0}")]
    InvalidPartition(String),

    #[error("Integer expected: {0}")]
    InvalidNumber(String),
}

/// Result alias used by every compilation stage.
pub type SqlResult<T> = Result<T, SqlError>;

impl SqlError {
    pub fn new(position: usize, kind: SqlErrorKind) -> Self {
        Self { position, kind }
    }

    /// The human-readable message without the position suffix.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn invalid_column(position: usize, name: impl Into<String>) -> Self {
        Self::new(position, SqlErrorKind::InvalidColumn(name.into()))
    }

    pub fn unexpected(position: usize, token: impl Into<String>) -> Self {
        Self::new(position, SqlErrorKind::UnexpectedToken(token.into()))
    }

    pub fn expected(position: usize, what: impl Into<String>) -> Self {
        Self::new(position, SqlErrorKind::ExpectedToken(what.into()))
    }
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.kind, self.position)
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_position() {
        let err = SqlError::invalid_column(25, "customerIdx");
        assert_eq!(err.to_string(), "Invalid column: customerIdx at position 25");
        assert_eq!(err.message(), "Invalid column: customerIdx");
    }

    #[test]
    fn test_expected_token_message() {
        let err = SqlError::expected(33, "')'");
        assert_eq!(err.message(), "')' expected");
    }
}
