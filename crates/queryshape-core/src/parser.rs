//! Recursive-descent statement parsers over the token stream.
//!
//! The entry point dispatches on the first token: `WITH`/`SELECT` parse
//! through the SELECT pipeline, `INSERT`/`UPDATE`/`DELETE` through the DML
//! grammars. Parsing is stateless recursion with a configurable depth
//! budget; overflow is a parse error rather than a stack exhaust.

pub(crate) mod dml;
pub(crate) mod select;

pub(crate) use select::parse_query;

use crate::ast::{Query, Statement, TableRef, TableSource};
use crate::error::{ParseError, ParseErrorKind};
use crate::expression::{split_dotted_name, unquote_identifier};
use crate::keywords::{self, CLAUSE_STARTERS, JOIN_STARTERS};
use crate::lexer::{matching_paren, tokenize, Token};

/// Options for the parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Maximum query nesting depth (subqueries, derived tables, CTE
    /// bodies, union arms). Exceeding it is a parse error.
    pub max_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// A recursion budget carried through the descent. Copy-on-descend keeps
/// the parser free of shared state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Budget {
    max_depth: usize,
    depth: usize,
}

impl Default for Budget {
    fn default() -> Self {
        Self::new(ParserOptions::default().max_depth)
    }
}

impl Budget {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            depth: 0,
        }
    }

    /// Enters one nesting level, failing when the budget is spent.
    pub(crate) fn descend(self) -> Result<Self, ParseError> {
        if self.depth >= self.max_depth {
            return Err(ParseError::new(format!(
                "Query nesting exceeds the maximum depth of {}",
                self.max_depth
            ))
            .with_kind(ParseErrorKind::DepthExceeded));
        }
        Ok(Self {
            max_depth: self.max_depth,
            depth: self.depth + 1,
        })
    }
}

/// Parses one statement with default options.
pub fn parse_statement(sql: &str) -> Result<Statement, ParseError> {
    parse_statement_with_options(sql, &ParserOptions::default())
}

/// Parses one statement. A single trailing `;` is tolerated.
pub fn parse_statement_with_options(
    sql: &str,
    options: &ParserOptions,
) -> Result<Statement, ParseError> {
    let tokens = tokenize(sql)?;
    let tokens = strip_trailing_semicolon(&tokens);
    let Some(first) = tokens.first() else {
        return Err(ParseError::new("Empty query"));
    };
    let budget = Budget::new(options.max_depth);

    if first.is_keyword("SELECT") || first.is_keyword("WITH") {
        select::parse_query(tokens, budget).map(Statement::Select)
    } else if first.is_keyword("INSERT") {
        dml::parse_insert(tokens, budget).map(Statement::Insert)
    } else if first.is_keyword("UPDATE") {
        dml::parse_update(tokens, budget).map(Statement::Update)
    } else if first.is_keyword("DELETE") {
        dml::parse_delete(tokens, budget).map(Statement::Delete)
    } else {
        Err(ParseError::new("Invalid query type"))
    }
}

/// The SELECT-only entry point used by embedders that expect a query.
/// Rejects DML with the canonical message.
pub fn parse_select(sql: &str) -> Result<Query, ParseError> {
    parse_select_with_options(sql, &ParserOptions::default())
}

pub fn parse_select_with_options(
    sql: &str,
    options: &ParserOptions,
) -> Result<Query, ParseError> {
    let tokens = tokenize(sql)?;
    let tokens = strip_trailing_semicolon(&tokens);
    if tokens.is_empty() {
        return Err(ParseError::new("Empty query"));
    }
    select::parse_query(tokens, Budget::new(options.max_depth))
}

fn strip_trailing_semicolon(tokens: &[Token]) -> &[Token] {
    match tokens.split_last() {
        Some((last, rest)) if last.is_punct(";") => rest,
        _ => tokens,
    }
}

/// Keywords that end a table reference (and its optional bare alias).
pub(crate) fn is_clause_boundary(tok: &Token) -> bool {
    tok.is_any_keyword(CLAUSE_STARTERS)
        || tok.is_any_keyword(JOIN_STARTERS)
        || tok.is_any_keyword(&["ON", "USING", "SET", "RETURNING", "AS", "VALUES"])
}

/// Parses a possibly schema-qualified table name token into
/// `(schema, table)`.
pub(crate) fn parse_table_name(tok: &Token) -> Result<(Option<String>, String), ParseError> {
    let segments = split_dotted_name(tok.text())
        .ok_or_else(|| ParseError::new(format!("Invalid table reference: {}", tok.text())))?;
    match segments.len() {
        1 => Ok((None, segments.into_iter().next().unwrap())),
        2 => {
            let mut it = segments.into_iter();
            Ok((Some(it.next().unwrap()), it.next().unwrap()))
        }
        _ => Err(ParseError::new(format!(
            "Invalid table reference: {}",
            tok.text()
        ))),
    }
}

/// Parses a table reference with an optional `[AS] alias`. The alias
/// defaults to the table name.
pub(crate) fn parse_table_ref(tokens: &[Token]) -> Result<(TableRef, &[Token]), ParseError> {
    let Some((name_tok, mut rest)) = tokens.split_first() else {
        return Err(ParseError::eof("a table name"));
    };
    if is_clause_boundary(name_tok) || name_tok.is_punct("(") || name_tok.is_punct(")") {
        return Err(ParseError::new(format!(
            "Expected a table name, got: {name_tok}"
        )));
    }
    let (schema, table) = parse_table_name(name_tok)?;

    let mut alias = None;
    if let Some((tok, after)) = rest.split_first() {
        if tok.is_keyword("AS") {
            let Some((alias_tok, after_alias)) = after.split_first() else {
                return Err(ParseError::eof("an alias after AS"));
            };
            alias = Some(unquote_identifier(alias_tok.text()));
            rest = after_alias;
        } else if !is_clause_boundary(tok)
            && !tok.is_punct(",")
            && !tok.is_punct("(")
            && !tok.is_punct(")")
            && !tok.is_string_literal()
        {
            alias = Some(unquote_identifier(tok.text()));
            rest = after;
        }
    }

    let alias = alias.unwrap_or_else(|| table.clone());
    Ok((
        TableRef {
            schema,
            table,
            alias,
        },
        rest,
    ))
}

/// Parses a FROM/JOIN source: a derived table `( SELECT … ) alias` or a
/// plain table reference.
pub(crate) fn parse_table_source(
    tokens: &[Token],
    budget: Budget,
) -> Result<(TableSource, &[Token]), ParseError> {
    let Some(first) = tokens.first() else {
        return Err(ParseError::eof("a table source"));
    };

    if first.is_punct("(") {
        let close = matching_paren(tokens)
            .ok_or_else(|| ParseError::new("Unbalanced parentheses in FROM clause"))?;
        let query = select::parse_query(&tokens[1..close], budget.descend()?)?;
        let mut rest = &tokens[close + 1..];
        if let Some((tok, after)) = rest.split_first() {
            if tok.is_keyword("AS") {
                rest = after;
            }
        }
        let Some((alias_tok, rest)) = rest.split_first() else {
            return Err(ParseError::new("Derived table requires an alias"));
        };
        if is_clause_boundary(alias_tok) || alias_tok.is_punct(",") || alias_tok.is_punct(")") {
            return Err(ParseError::new("Derived table requires an alias"));
        }
        return Ok((
            TableSource::Derived {
                query: Box::new(query),
                alias: unquote_identifier(alias_tok.text()),
            },
            rest,
        ));
    }

    let (table, rest) = parse_table_ref(tokens)?;
    Ok((TableSource::Table(table), rest))
}

/// Parses a single numeric token, for LIMIT / OFFSET.
pub(crate) fn parse_count<'a>(
    tokens: &'a [Token],
    clause: &str,
) -> Result<(u64, &'a [Token]), ParseError> {
    let Some((tok, rest)) = tokens.split_first() else {
        return Err(ParseError::eof(&format!("a number after {clause}")));
    };
    let value = tok
        .text()
        .parse::<u64>()
        .map_err(|_| ParseError::new(format!("Expected a number after {clause}, got: {tok}")))?;
    Ok((value, rest))
}

/// Expects a bare keyword next, consuming it.
pub(crate) fn expect_keyword<'a>(
    tokens: &'a [Token],
    kw: &str,
) -> Result<&'a [Token], ParseError> {
    match tokens.split_first() {
        Some((tok, rest)) if tok.is_keyword(kw) => Ok(rest),
        Some((tok, _)) => Err(ParseError::new(format!("Expected {kw}, got: {tok}"))),
        None => Err(ParseError::eof(kw)),
    }
}

/// Expects an identifier-like token next, returning it unquoted.
pub(crate) fn expect_name<'a>(
    tokens: &'a [Token],
    what: &str,
) -> Result<(String, &'a [Token]), ParseError> {
    match tokens.split_first() {
        Some((tok, rest))
            if !tok.is_string_literal()
                && !tok.is_numeric_literal()
                && !keywords::is_operator(tok.text()) =>
        {
            Ok((unquote_identifier(tok.text()), rest))
        }
        Some((tok, _)) => Err(ParseError::new(format!("Expected {what}, got: {tok}"))),
        None => Err(ParseError::eof(what)),
    }
}
