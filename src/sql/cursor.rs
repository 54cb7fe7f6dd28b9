//! Token cursor used by the recursive-descent parsers.
//!
//! Errors raised at end of input point at the start of the last lexeme of
//! the statement. A run of trailing whitespace (or a trailing comment)
//! counts as a lexeme of its own, so `"select "` reports offset 6.

use super::lexer::{lex, Token};
use crate::error::{SqlError, SqlErrorKind, SqlResult};

/// Deepest nesting of sub-queries, parentheses and prefix operators.
pub const MAX_NESTING: usize = 64;

/// A token together with its byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme<'src> {
    pub token: Token<'src>,
    pub position: usize,
}

impl<'src> Lexeme<'src> {
    pub fn text(&self) -> &'src str {
        self.token.text()
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.token.is_keyword(keyword)
    }
}

/// Forward cursor over the lexemes of one statement with single-step unparse.
#[derive(Debug, Clone)]
pub struct TokenCursor<'src> {
    lexemes: Vec<Lexeme<'src>>,
    index: usize,
    eof_position: usize,
    depth: usize,
}

impl<'src> TokenCursor<'src> {
    /// Lex `source` and position the cursor before the first token.
    pub fn new(source: &'src str) -> SqlResult<Self> {
        let spanned = lex(source)?;
        let eof_position = match spanned.last() {
            None => 0,
            Some((_, span)) if span.end < source.len() => span.end,
            Some((_, span)) => span.start,
        };
        let lexemes = spanned
            .into_iter()
            .map(|(token, span)| Lexeme {
                token,
                position: span.start,
            })
            .collect();
        Ok(Self {
            lexemes,
            index: 0,
            eof_position,
            depth: 0,
        })
    }

    /// Consume the next lexeme.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Lexeme<'src>> {
        let lexeme = self.lexemes.get(self.index).copied();
        if lexeme.is_some() {
            self.index += 1;
        }
        lexeme
    }

    pub fn peek(&self) -> Option<Lexeme<'src>> {
        self.lexemes.get(self.index).copied()
    }

    /// Step back over the last consumed lexeme.
    pub fn unparse(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn at_end(&self) -> bool {
        self.index >= self.lexemes.len()
    }

    /// Offset of the next lexeme, or the end-of-input offset.
    pub fn position(&self) -> usize {
        self.peek().map_or(self.eof_position, |l| l.position)
    }

    pub fn eof_position(&self) -> usize {
        self.eof_position
    }

    /// Consume the next lexeme, failing at end of input.
    pub fn expect_next(&mut self) -> SqlResult<Lexeme<'src>> {
        self.next()
            .ok_or_else(|| SqlError::new(self.eof_position, SqlErrorKind::UnexpectedEndOfInput))
    }

    /// Consume the next lexeme if it is the given keyword.
    pub fn accept_keyword(&mut self, keyword: &str) -> bool {
        self.accept(|t| t.is_keyword(keyword))
    }

    /// Consume the next lexeme if it matches.
    pub fn accept(&mut self, pred: impl Fn(&Token<'src>) -> bool) -> bool {
        match self.peek() {
            Some(l) if pred(&l.token) => {
                self.index += 1;
                true
            }
            _ => false,
        }
    }

    /// Require the given keyword.
    ///
    /// A different token fails with `'<keyword>' expected` at its offset.
    pub fn expect_keyword(&mut self, keyword: &str) -> SqlResult<Lexeme<'src>> {
        let lexeme = self.expect_next()?;
        if lexeme.is_keyword(keyword) {
            Ok(lexeme)
        } else {
            Err(SqlError::expected(lexeme.position, format!("'{keyword}'")))
        }
    }

    /// Require a specific token.
    ///
    /// A different token fails with `'<token>' expected` at its offset.
    pub fn expect_token(&mut self, token: Token<'_>) -> SqlResult<Lexeme<'src>> {
        let lexeme = self.expect_next()?;
        if lexeme.token == token {
            Ok(lexeme)
        } else {
            Err(SqlError::expected(lexeme.position, format!("'{token}'")))
        }
    }

    /// Run `parse` one nesting level down; past [`MAX_NESTING`] levels it
    /// fails at `position` instead.
    pub fn nested<T>(
        &mut self,
        position: usize,
        parse: impl FnOnce(&mut Self) -> SqlResult<T>,
    ) -> SqlResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(SqlError::new(
                position,
                SqlErrorKind::NestingTooDeep(MAX_NESTING),
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Remember the current position for [`reset`](Self::reset).
    pub fn mark(&self) -> usize {
        self.index
    }

    pub fn reset(&mut self, mark: usize) {
        self.index = mark.min(self.lexemes.len());
    }
}
