//! Lexer for SQL statements.
//!
//! Words are never classified as keywords here: `select`, `from` and friends
//! come out as [`Token::Ident`] and the parser matches them case-insensitively.
//! Qualified names such as `a.b` are a single identifier token.

use chumsky::prelude::*;

use crate::error::{SqlError, SqlErrorKind, SqlResult};

/// A token of SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'src> {
    /// A word or qualified name.
    Ident(&'src str),
    /// A number, possibly with a unit suffix (`2m`, `1.5`, `10d`).
    Number(&'src str),
    /// A single-quoted string, quotes included.
    Str(&'src str),
    /// A backtick-quoted sub-query reference, backticks included.
    QueryRef(&'src str),
    /// An operator symbol.
    Op(&'src str),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
}

impl<'src> Token<'src> {
    /// Source text of the token.
    pub fn text(&self) -> &'src str {
        match self {
            Token::Ident(s) | Token::Number(s) | Token::Str(s) | Token::QueryRef(s) | Token::Op(s) => s,
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::Semicolon => ";",
        }
    }

    /// Whether this is the given word, ignoring case.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }

    pub fn is_op(&self, op: &str) -> bool {
        matches!(self, Token::Op(s) if *s == op)
    }
}

impl<'src> std::fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// Create a lexer for SQL text.
///
/// Returns a parser that tokenizes the input into spanned tokens, skipping
/// whitespace, `--` line comments and `/* */` block comments.
pub fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    // Identifiers with optional qualifiers: a, a.b
    let ident = text::ident()
        .then(just('.').then(text::ident()).repeated())
        .to_slice()
        .map(Token::Ident);

    // Numbers with optional fraction and unit suffix: 10, 1.5, 2m, 10d
    let number = text::digits(10)
        .then(just('.').then(text::digits(10)).or_not())
        .then(text::ident().or_not())
        .to_slice()
        .map(Token::Number);

    let string_lit = just('\'')
        .then(none_of('\'').repeated())
        .then(just('\''))
        .to_slice()
        .map(Token::Str);

    let query_ref = just('`')
        .then(none_of('`').repeated())
        .then(just('`'))
        .to_slice()
        .map(Token::QueryRef);

    let punct = choice((
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just(',').to(Token::Comma),
        just(';').to(Token::Semicolon),
    ));

    // Operators (multi-char first)
    let op = choice((
        just("!="),
        just("<>"),
        just("<="),
        just(">="),
        just("="),
        just("<"),
        just(">"),
        just("+"),
        just("-"),
        just("*"),
        just("/"),
        just("%"),
        just("^"),
        just("~"),
    ))
    .to_slice()
    .map(Token::Op);

    let line_comment = just("--")
        .then(any().and_is(just('\n').not()).repeated())
        .ignored();

    let block_comment = just("/*")
        .then(any().and_is(just("*/").not()).repeated())
        .then(just("*/"))
        .ignored();

    let comment = line_comment.or(block_comment);

    let token = choice((ident, number, string_lit, query_ref, punct, op))
        .map_with(|tok, e| (tok, e.span()));

    token
        .padded_by(comment.padded().repeated())
        .padded()
        .repeated()
        .collect()
        .padded_by(comment.padded().repeated())
        .padded()
        .then_ignore(end())
}

/// Lex SQL text into spanned tokens.
///
/// The first lexical error is reported at its offset.
pub fn lex(source: &str) -> SqlResult<Vec<(Token<'_>, SimpleSpan)>> {
    let (tokens, errs) = lexer().parse(source).into_output_errors();
    match errs.into_iter().next() {
        None => Ok(tokens.unwrap_or_default()),
        Some(err) => {
            let position = err.span().start;
            let kind = match err.found() {
                Some(c) => SqlErrorKind::UnexpectedToken(c.to_string()),
                None => SqlErrorKind::UnexpectedEndOfInput,
            };
            Err(SqlError::new(position, kind))
        }
    }
}
