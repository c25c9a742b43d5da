//! The expression recognizer: classifies one SELECT item or operand into
//! an AST node and extracts column references from free-form expressions.
//!
//! Expressions are *scanned* for identifiers, not parsed: the recognizer
//! keeps a keyword/operator/literal deny-list and a function-name filter
//! (identifier immediately before `(`) and retains everything else that
//! matches a column-reference pattern. The recognized set seeds the
//! validator only; result types come from `::type` casts or stay unknown.

use crate::ast::{
    AggregateArg, AggregateFunc, ColumnExpr, LiteralValue, ParsedCondition, SelectItem,
    SqlConstant,
};
use crate::error::ParseError;
use crate::keywords;
use crate::lexer::{matching_paren, Token};
use crate::parser::{parse_query, Budget};
use crate::types::HostType;

/// A classified expression plus the alias it carries when the query does
/// not name one.
pub(crate) struct Recognized {
    pub(crate) expr: ColumnExpr,
    pub(crate) default_alias: String,
}

/// Recognizes one SELECT item, honoring a trailing top-level `AS alias`.
pub(crate) fn recognize_select_item(
    tokens: &[Token],
    budget: Budget,
) -> Result<SelectItem, ParseError> {
    let (expr_tokens, explicit_alias) = split_alias(tokens)?;
    if expr_tokens.is_empty() {
        return Err(ParseError::new("Invalid SELECT clause"));
    }
    let recognized = recognize_expr(expr_tokens, budget)?;
    let alias = explicit_alias.unwrap_or(recognized.default_alias);
    Ok(SelectItem {
        expr: recognized.expr,
        alias,
    })
}

/// Splits a trailing top-level `AS alias` off an item. `CAST(x AS int)`
/// keeps its AS: only depth-zero occurrences count.
fn split_alias(tokens: &[Token]) -> Result<(&[Token], Option<String>), ParseError> {
    let mut depth: usize = 0;
    let mut alias_at = None;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tok.is_keyword("AS") {
            alias_at = Some(i);
        }
    }
    match alias_at {
        None => Ok((tokens, None)),
        Some(i) => {
            let rest = &tokens[i + 1..];
            let [alias_tok] = rest else {
                return Err(ParseError::new(format!(
                    "Expected a single alias after AS, got: {}",
                    join_tokens(rest)
                )));
            };
            Ok((&tokens[..i], Some(unquote_identifier(alias_tok.text()))))
        }
    }
}

/// Classifies an expression. The recognition order is significant; see
/// the match arms top to bottom.
pub(crate) fn recognize_expr(tokens: &[Token], budget: Budget) -> Result<Recognized, ParseError> {
    let Some(first) = tokens.first() else {
        return Err(ParseError::new("Invalid SELECT clause"));
    };

    // 1. `t.*` / `s.t.*`
    if tokens.len() == 1 {
        if let Some(ColumnExpr::TableWildcard { schema, table }) =
            parse_table_wildcard(first.text())
        {
            return Ok(Recognized {
                default_alias: table.clone(),
                expr: ColumnExpr::TableWildcard { schema, table },
            });
        }
    }

    // 2. Scalar subquery `( SELECT … ) [::type]`
    if first.is_punct("(") && starts_query(&tokens[1..]) {
        let close = matching_paren(tokens)
            .ok_or_else(|| ParseError::new("Unbalanced parentheses in expression"))?;
        let query = parse_query(&tokens[1..close], budget.descend()?)?;
        let rest = &tokens[close + 1..];
        if rest.is_empty() {
            return Ok(Recognized {
                expr: ColumnExpr::Subquery {
                    query: Box::new(query),
                    cast_type: None,
                },
                default_alias: "subquery".to_string(),
            });
        }
        if let Some(cast) = parse_cast_suffix(rest) {
            return Ok(Recognized {
                expr: ColumnExpr::Subquery {
                    query: Box::new(query),
                    cast_type: Some(cast),
                },
                default_alias: "subquery".to_string(),
            });
        }
        // Trailing operators make this a larger expression.
        return recognize_complex(tokens, budget);
    }

    // 3. `CAST ( expr AS type )`
    if first.is_keyword("CAST") && tokens.get(1).is_some_and(|t| t.is_punct("(")) {
        return recognize_cast_call(tokens, budget);
    }

    // 4. `[NOT] EXISTS ( SELECT … )`
    let (negated, exists_tokens) = if first.is_keyword("NOT")
        && tokens.get(1).is_some_and(|t| t.is_keyword("EXISTS"))
    {
        (true, &tokens[1..])
    } else {
        (false, tokens)
    };
    if exists_tokens
        .first()
        .is_some_and(|t| t.is_keyword("EXISTS"))
        && exists_tokens.get(1).is_some_and(|t| t.is_punct("("))
        && starts_query(&exists_tokens[2..])
    {
        let close = matching_paren(&exists_tokens[1..])
            .ok_or_else(|| ParseError::new("Unbalanced parentheses in expression"))?
            + 1;
        if close == exists_tokens.len() - 1 {
            let query = parse_query(&exists_tokens[2..close], budget.descend()?)?;
            return Ok(Recognized {
                expr: ColumnExpr::Exists {
                    query: Box::new(query),
                    negated,
                },
                default_alias: "exists".to_string(),
            });
        }
    }

    // 5. Aggregates: `COUNT ( * )`, `SUM ( col )`, …
    if let Some(func) = aggregate_head(tokens) {
        let close = matching_paren(&tokens[1..])
            .ok_or_else(|| ParseError::new("Unbalanced parentheses in expression"))?
            + 1;
        if close == tokens.len() - 1 {
            if let Some(arg) = parse_aggregate_arg(&tokens[2..close]) {
                return Ok(Recognized {
                    expr: ColumnExpr::Aggregate { func, arg },
                    default_alias: format!("{func}_result"),
                });
            }
        }
        // Complex argument or trailing tokens: fall through to scanning.
        return recognize_complex(tokens, budget);
    }

    // 6. `INTERVAL '…'`
    if first.is_keyword("INTERVAL")
        && tokens.len() == 2
        && tokens[1].is_string_literal()
    {
        return Ok(Recognized {
            expr: ColumnExpr::Interval {
                value: unquote_string(tokens[1].text()),
            },
            default_alias: "interval".to_string(),
        });
    }

    // 7. A single token, optionally with a `::type` suffix.
    if let Some(cast) = parse_cast_suffix(&tokens[1..]) {
        return Ok(recognize_single(first, Some(cast)));
    }
    if tokens.len() == 1 {
        return Ok(recognize_single(first, None));
    }

    // 8. Everything else is a complex expression.
    recognize_complex(tokens, budget)
}

/// Whether the token stream opens a SELECT-shaped query.
pub(crate) fn starts_query(tokens: &[Token]) -> bool {
    tokens
        .first()
        .is_some_and(|t| t.is_keyword("SELECT") || t.is_keyword("WITH"))
}

fn aggregate_head(tokens: &[Token]) -> Option<AggregateFunc> {
    let first = tokens.first()?;
    if first.is_double_quoted() || !tokens.get(1)?.is_punct("(") {
        return None;
    }
    AggregateFunc::from_name(first.text())
}

/// Parses an aggregate argument: `*`, `col`, or `DISTINCT col`. Returns
/// `None` for anything richer, which demotes the item to a complex
/// expression.
fn parse_aggregate_arg(inner: &[Token]) -> Option<AggregateArg> {
    let inner = match inner.first() {
        Some(tok) if tok.is_keyword("DISTINCT") => &inner[1..],
        _ => inner,
    };
    match inner {
        [tok] if tok.is_punct("*") => Some(AggregateArg::Star),
        [tok] => parse_column_name(tok.text()).map(|expr| AggregateArg::Column(Box::new(expr))),
        _ => None,
    }
}

fn recognize_cast_call(tokens: &[Token], budget: Budget) -> Result<Recognized, ParseError> {
    let close = matching_paren(&tokens[1..])
        .ok_or_else(|| ParseError::new("Unbalanced parentheses in expression"))?
        + 1;
    if close != tokens.len() - 1 {
        return recognize_complex(tokens, budget);
    }
    let inner = &tokens[2..close];

    // Split at the last top-level AS.
    let mut depth: usize = 0;
    let mut as_at = None;
    for (i, tok) in inner.iter().enumerate() {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tok.is_keyword("AS") {
            as_at = Some(i);
        }
    }
    let Some(as_at) = as_at else {
        return Err(ParseError::new("Expected AS in CAST expression"));
    };
    let (value, ty) = (&inner[..as_at], &inner[as_at + 1..]);
    if ty.is_empty() {
        return Err(ParseError::new("Expected a type after AS in CAST"));
    }

    // A CAST call is a complex expression; its default alias follows the
    // complex rule (last JSON key, else "expr").
    Ok(Recognized {
        expr: ColumnExpr::Complex {
            column_refs: scan_column_refs(value),
            cast_type: Some(join_tokens(ty)),
        },
        default_alias: json_key_alias(value).unwrap_or_else(|| "expr".to_string()),
    })
}

/// Classifies a lone token: literal, SQL constant, or column reference.
/// `cast` wraps the result in a complex expression carrying the cast
/// target, but a simple reference keeps its own default alias so
/// `id::text` still surfaces as `id`.
fn recognize_single(tok: &Token, cast: Option<String>) -> Recognized {
    let (inner, default_alias): (ColumnExpr, String) = if tok.is_string_literal() {
        (
            ColumnExpr::Literal {
                value: LiteralValue::String(unquote_string(tok.text())),
            },
            "literal".to_string(),
        )
    } else if tok.is_numeric_literal() {
        (
            ColumnExpr::Literal {
                value: LiteralValue::Number(tok.text().to_string()),
            },
            "literal".to_string(),
        )
    } else if tok.is_keyword("TRUE") || tok.is_keyword("FALSE") {
        (
            ColumnExpr::Literal {
                value: LiteralValue::Boolean(tok.is_keyword("TRUE")),
            },
            "literal".to_string(),
        )
    } else if tok.is_keyword("NULL") {
        (
            ColumnExpr::Literal {
                value: LiteralValue::Null,
            },
            "literal".to_string(),
        )
    } else if let Some(constant) = constant_head(tok) {
        (
            ColumnExpr::Constant { name: constant },
            constant.lower_name().to_string(),
        )
    } else if let Some(reference) = parse_column_name(tok.text()) {
        let alias = last_segment_alias(&reference);
        (reference, alias)
    } else {
        // Placeholders and anything else unclassifiable.
        (
            ColumnExpr::Complex {
                column_refs: Vec::new(),
                cast_type: None,
            },
            "expr".to_string(),
        )
    };

    match cast {
        None => Recognized {
            expr: inner,
            default_alias,
        },
        Some(cast) => {
            let column_refs = match &inner {
                ColumnExpr::UnboundColumn { .. } | ColumnExpr::TableColumn { .. } => {
                    vec![inner]
                }
                _ => Vec::new(),
            };
            Recognized {
                expr: ColumnExpr::Complex {
                    column_refs,
                    cast_type: Some(cast),
                },
                default_alias,
            }
        }
    }
}

fn constant_head(tok: &Token) -> Option<SqlConstant> {
    if tok.is_double_quoted() || tok.is_string_literal() {
        return None;
    }
    SqlConstant::from_name(tok.text())
}

/// The complex-expression fallback: scan for column references and detect
/// a trailing `::type`.
fn recognize_complex(tokens: &[Token], _budget: Budget) -> Result<Recognized, ParseError> {
    let (body, cast) = split_trailing_cast(tokens);
    Ok(Recognized {
        expr: ColumnExpr::Complex {
            column_refs: scan_column_refs(body),
            cast_type: cast,
        },
        default_alias: json_key_alias(body).unwrap_or_else(|| "expr".to_string()),
    })
}

/// Detects a trailing top-level `:: type` and splits it off. The type may
/// span several word tokens (`double precision`) and carry a precision
/// suffix (`varchar ( 255 )`).
fn split_trailing_cast(tokens: &[Token]) -> (&[Token], Option<String>) {
    let mut depth: usize = 0;
    let mut cast_at = None;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tok.is_punct("::") {
            cast_at = Some(i);
        }
    }
    let Some(cast_at) = cast_at else {
        return (tokens, None);
    };
    match parse_cast_suffix(&tokens[cast_at..]) {
        Some(cast) => (&tokens[..cast_at], Some(cast)),
        None => (tokens, None),
    }
}

/// Parses `:: word+ [( number )]` exactly; returns the joined type text.
fn parse_cast_suffix(tokens: &[Token]) -> Option<String> {
    let (first, rest) = tokens.split_first()?;
    if !first.is_punct("::") || rest.is_empty() {
        return None;
    }
    let mut words = 0;
    let mut i = 0;
    while i < rest.len() && is_type_word(&rest[i]) {
        words += 1;
        i += 1;
    }
    if words == 0 {
        return None;
    }
    // Optional precision suffix.
    if i < rest.len() {
        if !(rest[i].is_punct("(")
            && rest.get(i + 1).is_some_and(Token::is_numeric_literal)
            && rest.get(i + 2).is_some_and(|t| t.is_punct(")"))
            && i + 3 == rest.len())
        {
            return None;
        }
        i = rest.len();
    }
    Some(join_tokens(&rest[..i]))
}

fn is_type_word(tok: &Token) -> bool {
    !tok.is_double_quoted()
        && !tok.is_string_literal()
        && tok
            .text()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && tok.text().starts_with(|c: char| c.is_ascii_alphabetic())
}

/// The default alias for a JSON-operator expression: the final key,
/// quotes stripped, when it reads as an identifier.
fn json_key_alias(tokens: &[Token]) -> Option<String> {
    let mut key = None;
    for (i, tok) in tokens.iter().enumerate() {
        let text = tok.text();
        if matches!(text, "->" | "->>" | "#>" | "#>>") {
            key = tokens.get(i + 1).map(|k| (text == "#>" || text == "#>>", k));
        }
    }
    let (is_path, key_tok) = key?;
    if !key_tok.is_string_literal() {
        return None;
    }
    let raw = unquote_string(key_tok.text());
    let last = if is_path {
        // `'{a,b}'` paths take their last element.
        raw.trim_matches(|c| c == '{' || c == '}')
            .rsplit(',')
            .next()
            .unwrap_or("")
            .trim()
            .to_string()
    } else {
        raw
    };
    is_plain_identifier(&last).then_some(last)
}

/// Token-by-token column-reference scan over a free-form expression.
///
/// Skips keywords, operators, literals, placeholders, function names
/// (identifier immediately before `(`), cast target types, and whole
/// `( SELECT … )` groups — inner identifiers belong to the subquery's
/// scope. Duplicate references are collapsed.
pub(crate) fn scan_column_refs(tokens: &[Token]) -> Vec<ColumnExpr> {
    let mut refs: Vec<ColumnExpr> = Vec::new();
    let mut i = 0;
    let mut casting = false;
    while i < tokens.len() {
        let tok = &tokens[i];
        let text = tok.text();

        // Skip scalar subqueries wholesale.
        if tok.is_punct("(") && starts_query(&tokens[i + 1..]) {
            match matching_paren(&tokens[i..]) {
                Some(close) => {
                    i += close + 1;
                    casting = false;
                    continue;
                }
                None => break,
            }
        }

        if tok.is_punct("::") {
            casting = true;
            i += 1;
            continue;
        }
        if keywords::is_operator(text) {
            casting = false;
            i += 1;
            continue;
        }
        // Words directly after `::` are the cast target type.
        if casting && is_type_word(tok) {
            i += 1;
            continue;
        }
        casting = false;

        let skip = tok.is_numeric_literal()
            || tok.is_string_literal()
            || tok.is_placeholder()
            || (!tok.is_double_quoted() && keywords::is_scanner_keyword(text))
            || tokens.get(i + 1).is_some_and(|next| next.is_punct("("));
        if !skip {
            if let Some(reference) = parse_column_name(text) {
                if !refs.contains(&reference) {
                    refs.push(reference);
                }
            }
        }
        i += 1;
    }
    refs
}

/// Reduces a condition body to its column references.
pub(crate) fn parse_condition(tokens: &[Token]) -> ParsedCondition {
    ParsedCondition {
        column_refs: scan_column_refs(tokens),
    }
}

/// Parses `col`, `table.col`, or `schema.table.col` with any mix of
/// quoted and unquoted parts. Returns `None` when the text is not a
/// well-formed reference.
pub(crate) fn parse_column_name(text: &str) -> Option<ColumnExpr> {
    let segments = split_dotted_name(text)?;
    match segments.len() {
        1 => Some(ColumnExpr::UnboundColumn {
            name: segments.into_iter().next().unwrap(),
        }),
        2 => {
            let mut it = segments.into_iter();
            Some(ColumnExpr::TableColumn {
                schema: None,
                table: it.next().unwrap(),
                column: it.next().unwrap(),
            })
        }
        3 => {
            let mut it = segments.into_iter();
            Some(ColumnExpr::TableColumn {
                schema: Some(it.next().unwrap()),
                table: it.next().unwrap(),
                column: it.next().unwrap(),
            })
        }
        _ => None,
    }
}

/// Parses `t.*` / `s.t.*` into a wildcard node.
pub(crate) fn parse_table_wildcard(text: &str) -> Option<ColumnExpr> {
    let prefix = text.strip_suffix(".*")?;
    let segments = split_dotted_name(prefix)?;
    match segments.len() {
        1 => Some(ColumnExpr::TableWildcard {
            schema: None,
            table: segments.into_iter().next().unwrap(),
        }),
        2 => {
            let mut it = segments.into_iter();
            Some(ColumnExpr::TableWildcard {
                schema: Some(it.next().unwrap()),
                table: it.next().unwrap(),
            })
        }
        _ => None,
    }
}

/// Splits a dotted name on dots outside double quotes, unquoting each
/// segment. Unquoted segments must read as plain identifiers.
pub(crate) fn split_dotted_name(text: &str) -> Option<Vec<String>> {
    if text.is_empty() {
        return None;
    }
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_quoted = false;
    let mut chars = text.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        match c {
            '"' => {
                current_quoted = true;
                let mut closed = false;
                while let Some((_, inner)) = chars.next() {
                    if inner == '"' {
                        if chars.peek().map(|(_, next)| *next) == Some('"') {
                            current.push('"');
                            chars.next();
                            continue;
                        }
                        closed = true;
                        break;
                    }
                    current.push(inner);
                }
                if !closed {
                    return None;
                }
            }
            '.' => {
                if current.is_empty() || (!current_quoted && !is_plain_identifier(&current)) {
                    return None;
                }
                segments.push(std::mem::take(&mut current));
                current_quoted = false;
            }
            other => current.push(other),
        }
    }
    if current.is_empty() || (!current_quoted && !is_plain_identifier(&current)) {
        return None;
    }
    segments.push(current);
    Some(segments)
}

pub(crate) fn is_plain_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Strips surrounding double quotes and unescapes `""`.
pub(crate) fn unquote_identifier(text: &str) -> String {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text[1..text.len() - 1].replace("\"\"", "\"")
    } else {
        text.to_string()
    }
}

/// Strips surrounding single quotes (and a leading `N`/`E` prefix) and
/// unescapes `''`.
pub(crate) fn unquote_string(text: &str) -> String {
    let text = match text.as_bytes().first() {
        Some(b'N' | b'n' | b'E' | b'e') if text.as_bytes().get(1) == Some(&b'\'') => &text[1..],
        _ => text,
    };
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        text[1..text.len() - 1].replace("''", "'")
    } else {
        text.to_string()
    }
}

fn last_segment_alias(reference: &ColumnExpr) -> String {
    match reference {
        ColumnExpr::UnboundColumn { name } => name.clone(),
        ColumnExpr::TableColumn { column, .. } => column.clone(),
        _ => "expr".to_string(),
    }
}

fn join_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::text)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps a `::type` cast target to a host type. Unlisted types are
/// `Unknown`; a `(N)` precision suffix is ignored.
pub(crate) fn cast_target_type(raw: &str) -> HostType {
    let lowered = raw.to_ascii_lowercase();
    let base = lowered.split('(').next().unwrap_or("");
    let name = base.split_whitespace().collect::<Vec<_>>().join(" ");
    match name.as_str() {
        "text" | "varchar" | "char" | "character varying" | "character" => HostType::String,
        "int" | "integer" | "int4" | "int8" | "bigint" | "smallint" | "serial" | "bigserial" => {
            HostType::Number
        }
        "float" | "float4" | "float8" | "real" | "double precision" | "numeric" | "decimal" => {
            HostType::Number
        }
        "bool" | "boolean" => HostType::Boolean,
        "json" | "jsonb" => HostType::Object,
        "date" | "timestamp" | "timestamptz" | "time" | "timetz" => HostType::String,
        "uuid" => HostType::String,
        "bytea" => HostType::Bytes,
        _ => HostType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use rstest::rstest;

    fn recognize(sql: &str) -> SelectItem {
        let tokens = tokenize(sql).unwrap();
        recognize_select_item(&tokens, Budget::default()).unwrap()
    }

    fn refs_of(sql: &str) -> Vec<ColumnExpr> {
        let tokens = tokenize(sql).unwrap();
        scan_column_refs(&tokens)
    }

    #[test]
    fn test_simple_column() {
        let item = recognize("name");
        assert_eq!(
            item.expr,
            ColumnExpr::UnboundColumn {
                name: "name".into()
            }
        );
        assert_eq!(item.alias, "name");
    }

    #[test]
    fn test_qualified_column_with_alias() {
        let item = recognize("u.name AS display");
        assert_eq!(
            item.expr,
            ColumnExpr::TableColumn {
                schema: None,
                table: "u".into(),
                column: "name".into()
            }
        );
        assert_eq!(item.alias, "display");
    }

    #[test]
    fn test_schema_qualified_column() {
        let item = recognize("analytics.events.id");
        assert_eq!(
            item.expr,
            ColumnExpr::TableColumn {
                schema: Some("analytics".into()),
                table: "events".into(),
                column: "id".into()
            }
        );
        assert_eq!(item.alias, "id");
    }

    #[test]
    fn test_quoted_segments() {
        let item = recognize(r#""User Data".id"#);
        assert_eq!(
            item.expr,
            ColumnExpr::TableColumn {
                schema: None,
                table: "User Data".into(),
                column: "id".into()
            }
        );
    }

    #[test]
    fn test_table_wildcard() {
        let item = recognize("u.*");
        assert_eq!(
            item.expr,
            ColumnExpr::TableWildcard {
                schema: None,
                table: "u".into()
            }
        );
    }

    #[test]
    fn test_simple_cast_keeps_column_alias() {
        let item = recognize("id::text");
        match &item.expr {
            ColumnExpr::Complex {
                column_refs,
                cast_type,
            } => {
                assert_eq!(column_refs.len(), 1);
                assert_eq!(cast_type.as_deref(), Some("text"));
            }
            other => panic!("expected complex, got {other:?}"),
        }
        assert_eq!(item.alias, "id");
    }

    #[test]
    fn test_cast_function() {
        let item = recognize("CAST(views AS bigint)");
        match &item.expr {
            ColumnExpr::Complex {
                column_refs,
                cast_type,
            } => {
                assert_eq!(column_refs.len(), 1);
                assert_eq!(cast_type.as_deref(), Some("bigint"));
            }
            other => panic!("expected complex, got {other:?}"),
        }
        // Complex-expression default alias, not the inner column's name.
        assert_eq!(item.alias, "expr");
    }

    #[test]
    fn test_cast_function_with_json_key_alias() {
        let item = recognize("CAST(payload->>'age' AS int)");
        match &item.expr {
            ColumnExpr::Complex { cast_type, .. } => {
                assert_eq!(cast_type.as_deref(), Some("int"));
            }
            other => panic!("expected complex, got {other:?}"),
        }
        assert_eq!(item.alias, "age");
    }

    #[test]
    fn test_aggregate_star() {
        let item = recognize("COUNT(*)");
        assert_eq!(
            item.expr,
            ColumnExpr::Aggregate {
                func: AggregateFunc::Count,
                arg: AggregateArg::Star
            }
        );
        assert_eq!(item.alias, "COUNT_result");
    }

    #[test]
    fn test_aggregate_column_with_alias() {
        let item = recognize("AVG(views) AS avg_views");
        match &item.expr {
            ColumnExpr::Aggregate {
                func: AggregateFunc::Avg,
                arg: AggregateArg::Column(arg),
            } => {
                assert_eq!(
                    **arg,
                    ColumnExpr::UnboundColumn {
                        name: "views".into()
                    }
                );
            }
            other => panic!("expected aggregate, got {other:?}"),
        }
        assert_eq!(item.alias, "avg_views");
    }

    #[test]
    fn test_aggregate_distinct() {
        let item = recognize("COUNT(DISTINCT role)");
        assert!(matches!(
            item.expr,
            ColumnExpr::Aggregate {
                func: AggregateFunc::Count,
                arg: AggregateArg::Column(_)
            }
        ));
    }

    #[rstest]
    #[case("payload->'user'", "user")]
    #[case("payload->>'email'", "email")]
    #[case("payload#>'{contact,phone}'", "phone")]
    #[case("payload#>>'{a,b,c}'", "c")]
    fn test_json_operator_alias(#[case] sql: &str, #[case] alias: &str) {
        let item = recognize(sql);
        assert_eq!(item.alias, alias);
        match &item.expr {
            ColumnExpr::Complex { column_refs, .. } => {
                assert_eq!(
                    column_refs[0],
                    ColumnExpr::UnboundColumn {
                        name: "payload".into()
                    }
                );
            }
            other => panic!("expected complex, got {other:?}"),
        }
    }

    #[test]
    fn test_json_alias_falls_back_for_non_identifier() {
        let item = recognize("payload->'1 bad key'");
        assert_eq!(item.alias, "expr");
    }

    #[test]
    fn test_concat_is_complex() {
        let item = recognize("first_name || ' ' || last_name");
        match &item.expr {
            ColumnExpr::Complex { column_refs, .. } => {
                assert_eq!(column_refs.len(), 2);
            }
            other => panic!("expected complex, got {other:?}"),
        }
        assert_eq!(item.alias, "expr");
    }

    #[test]
    fn test_function_call_filters_function_name() {
        let refs = refs_of("lower(email)");
        assert_eq!(
            refs,
            vec![ColumnExpr::UnboundColumn {
                name: "email".into()
            }]
        );
    }

    #[test]
    fn test_scan_skips_literals_placeholders_keywords() {
        let refs = refs_of("status = 'active' AND views > 10 AND owner_id = $1 OR name = :n");
        let names: Vec<_> = refs
            .iter()
            .map(|r| match r {
                ColumnExpr::UnboundColumn { name } => name.as_str(),
                other => panic!("unexpected ref {other:?}"),
            })
            .collect();
        assert_eq!(names, ["status", "views", "owner_id", "name"]);
    }

    #[test]
    fn test_scan_skips_cast_targets() {
        let refs = refs_of("id::text = other_id::varchar(10)");
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_scan_skips_subquery_groups() {
        let refs = refs_of("views > (SELECT AVG(views) FROM posts) AND title <> ''");
        let names: Vec<_> = refs
            .iter()
            .map(|r| match r {
                ColumnExpr::UnboundColumn { name } => name.as_str(),
                other => panic!("unexpected ref {other:?}"),
            })
            .collect();
        assert_eq!(names, ["views", "title"]);
    }

    #[test]
    fn test_subquery_item() {
        let item = recognize("(SELECT name FROM users) AS top_name");
        assert!(matches!(item.expr, ColumnExpr::Subquery { .. }));
        assert_eq!(item.alias, "top_name");
    }

    #[test]
    fn test_subquery_default_alias_and_cast() {
        let item = recognize("(SELECT id FROM users)::text");
        match &item.expr {
            ColumnExpr::Subquery { cast_type, .. } => {
                assert_eq!(cast_type.as_deref(), Some("text"));
            }
            other => panic!("expected subquery, got {other:?}"),
        }
        assert_eq!(item.alias, "subquery");
    }

    #[test]
    fn test_exists() {
        let item = recognize("EXISTS (SELECT id FROM posts)");
        assert!(matches!(
            item.expr,
            ColumnExpr::Exists { negated: false, .. }
        ));
        assert_eq!(item.alias, "exists");

        let item = recognize("NOT EXISTS (SELECT id FROM posts)");
        assert!(matches!(item.expr, ColumnExpr::Exists { negated: true, .. }));
    }

    #[test]
    fn test_interval() {
        let item = recognize("INTERVAL '1 day'");
        assert_eq!(
            item.expr,
            ColumnExpr::Interval {
                value: "1 day".into()
            }
        );
        assert_eq!(item.alias, "interval");
    }

    #[rstest]
    #[case("'hello'", LiteralValue::String("hello".into()))]
    #[case("42", LiteralValue::Number("42".into()))]
    #[case("TRUE", LiteralValue::Boolean(true))]
    #[case("NULL", LiteralValue::Null)]
    fn test_literals(#[case] sql: &str, #[case] expected: LiteralValue) {
        let item = recognize(sql);
        assert_eq!(item.expr, ColumnExpr::Literal { value: expected });
        assert_eq!(item.alias, "literal");
    }

    #[test]
    fn test_sql_constant() {
        let item = recognize("CURRENT_DATE");
        assert_eq!(
            item.expr,
            ColumnExpr::Constant {
                name: SqlConstant::CurrentDate
            }
        );
        assert_eq!(item.alias, "current_date");
    }

    #[rstest]
    #[case("text", HostType::String)]
    #[case("VARCHAR(255)", HostType::String)]
    #[case("character varying", HostType::String)]
    #[case("int8", HostType::Number)]
    #[case("double precision", HostType::Number)]
    #[case("numeric", HostType::Number)]
    #[case("boolean", HostType::Boolean)]
    #[case("jsonb", HostType::Object)]
    #[case("timestamptz", HostType::String)]
    #[case("uuid", HostType::String)]
    #[case("bytea", HostType::Bytes)]
    #[case("money", HostType::Unknown)]
    fn test_cast_target_type(#[case] raw: &str, #[case] expected: HostType) {
        assert_eq!(cast_target_type(raw), expected);
    }

    #[test]
    fn test_unquote_helpers() {
        assert_eq!(unquote_identifier("\"My Col\""), "My Col");
        assert_eq!(unquote_identifier("\"a\"\"b\""), "a\"b");
        assert_eq!(unquote_identifier("plain"), "plain");
        assert_eq!(unquote_string("'it''s'"), "it's");
        assert_eq!(unquote_string("N'abc'"), "abc");
    }
}
