//! Error types for SQL parsing.
//!
//! # Error Handling Strategy
//!
//! This crate uses two complementary error handling patterns:
//!
//! - [`ParseError`]: fatal, syntactic. Returned as `Result<T, ParseError>`
//!   and stops the whole operation; matching and validation never run on a
//!   query that failed to parse.
//!
//! - Resolution and capability errors (a table, alias, schema, or column
//!   that does not exist; a numeric aggregate over a non-numeric column)
//!   are *data*, not `Err`: the matcher embeds them as inline markers in
//!   the row shape ([`crate::types::ColumnShape::Error`]) so the rest of
//!   the shape stays inspectable, and the validator reports the first one
//!   as an [`crate::types::Verdict::Invalid`] message.

use thiserror::Error;

/// Error encountered while tokenizing or parsing a query.
///
/// Carries the byte offset into the original query string when one is
/// known (currently: unterminated quotes report their opening quote).
/// `Display` renders the message alone; consumers that want the offset
/// read the field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    /// Human-readable error message.
    pub message: String,
    /// Byte offset into the original query string, if available.
    pub offset: Option<usize>,
    /// The specific category of parse error.
    pub kind: ParseErrorKind,
}

/// Category of parse error for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseErrorKind {
    /// Unexpected token or clause structure.
    #[default]
    SyntaxError,
    /// Input ended where more tokens were required.
    UnexpectedEof,
    /// A quoted identifier or string literal never closed.
    UnterminatedQuote,
    /// Query nesting exceeded the configured recursion budget.
    DepthExceeded,
}

impl ParseError {
    /// Creates a new parse error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
            kind: ParseErrorKind::SyntaxError,
        }
    }

    /// Creates a parse error pointing at a byte offset in the source.
    pub fn at_offset(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset: Some(offset),
            kind: ParseErrorKind::SyntaxError,
        }
    }

    /// Sets the error kind.
    pub fn with_kind(mut self, kind: ParseErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// The error raised when input runs out mid-clause.
    pub(crate) fn eof(expected: &str) -> Self {
        Self::new(format!("Unexpected end of query, expected {expected}"))
            .with_kind(ParseErrorKind::UnexpectedEof)
    }
}
