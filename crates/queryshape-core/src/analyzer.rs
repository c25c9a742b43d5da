//! The analysis entry points: parse, match, validate.
//!
//! A query is a short-lived transform: tokenize, parse, build context,
//! walk. Nothing is cached or mutated between calls, so any number of
//! queries may run concurrently against a shared catalog.

pub(crate) mod context;
pub(crate) mod matcher;
pub(crate) mod validator;

use crate::ast::Statement;
use crate::catalog::SchemaCatalog;
use crate::error::ParseError;
use crate::parser::{parse_statement_with_options, ParserOptions};
use crate::types::{QueryInput, RowShape, ValidateOptions, Verdict};
#[cfg(feature = "tracing")]
use tracing::trace;

/// Parses a query into its AST. Syntactic only; no schema involved.
///
/// A [`QueryInput::Dynamic`] input short-circuits to
/// [`Statement::Dynamic`].
pub fn parse<'a>(input: impl Into<QueryInput<'a>>) -> Result<Statement, ParseError> {
    parse_with_options(input, &ParserOptions::default())
}

/// [`parse`] with explicit parser options.
pub fn parse_with_options<'a>(
    input: impl Into<QueryInput<'a>>,
    options: &ParserOptions,
) -> Result<Statement, ParseError> {
    match input.into() {
        QueryInput::Dynamic => Ok(Statement::Dynamic),
        QueryInput::Sql(sql) => {
            #[cfg(feature = "tracing")]
            trace!(sql, "parsing statement");
            parse_statement_with_options(sql, options)
        }
    }
}

/// Derives the row shape a query would return against `catalog`.
///
/// Resolution failures are embedded as inline markers; an unresolvable
/// FROM table collapses to [`RowShape::Unresolved`]. Parse errors are
/// fatal and short-circuit matching entirely. Dynamic queries yield the
/// open-ended [`RowShape::Open`].
pub fn match_shape<'a>(
    input: impl Into<QueryInput<'a>>,
    catalog: &SchemaCatalog,
) -> Result<RowShape, ParseError> {
    let stmt = parse(input)?;
    #[cfg(feature = "tracing")]
    trace!(?stmt, "matching row shape");
    Ok(matcher::match_statement(&stmt, catalog))
}

/// Validates a query against `catalog`, returning [`Verdict::Valid`] or
/// the first error encountered.
///
/// Parse errors surface their message verbatim. Dynamic queries always
/// validate; that is the contract the caller opted into by not providing
/// an inspectable query string.
pub fn validate<'a>(
    input: impl Into<QueryInput<'a>>,
    catalog: &SchemaCatalog,
    options: &ValidateOptions,
) -> Verdict {
    match parse(input) {
        Err(err) => Verdict::Invalid(err.message),
        Ok(stmt) => {
            #[cfg(feature = "tracing")]
            trace!(?stmt, "validating statement");
            validator::validate_statement(&stmt, catalog, options)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HostType;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new("public").with_table(
            "public",
            "users",
            [("id", HostType::Number), ("name", HostType::String)],
        )
    }

    #[test]
    fn test_parse_error_short_circuits_matching() {
        let err = match_shape("SELECT FROM", &catalog()).unwrap_err();
        assert_eq!(err.message, "Invalid SELECT clause");
    }

    #[test]
    fn test_parse_error_surfaces_verbatim_in_verdict() {
        let verdict = validate(
            "UPDATE users SET",
            &catalog(),
            &ValidateOptions::default(),
        );
        assert_eq!(verdict.message(), Some("Expected assignments after SET"));
    }

    #[test]
    fn test_dynamic_short_circuits() {
        assert_eq!(parse(QueryInput::Dynamic).unwrap(), Statement::Dynamic);
        assert_eq!(
            match_shape(QueryInput::Dynamic, &catalog()).unwrap(),
            RowShape::Open
        );
        assert!(validate(QueryInput::Dynamic, &catalog(), &ValidateOptions::default()).is_valid());
    }

    #[test]
    fn test_end_to_end() {
        let shape = match_shape("SELECT id, name FROM users", &catalog()).unwrap();
        assert!(!shape.has_errors());
        assert!(validate(
            "SELECT id, name FROM users",
            &catalog(),
            &ValidateOptions::default()
        )
        .is_valid());
    }
}
