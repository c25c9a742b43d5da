//! INSERT / UPDATE / DELETE parsers. They reuse the tokenizer, the
//! expression recognizer, and the table-reference grammar of the SELECT
//! pipeline; only the clause skeletons differ.

use crate::ast::{
    Assignment, ColumnExpr, ConflictAction, DeleteStatement, InsertSource, InsertStatement,
    OnConflict, SelectColumns, UpdateStatement,
};
use crate::error::ParseError;
use crate::expression::{
    parse_condition, recognize_expr, recognize_select_item, split_dotted_name, starts_query,
    unquote_identifier,
};
use crate::lexer::{extract_until, matching_paren, split_by_comma, Token};
use crate::parser::{
    expect_keyword, parse_table_name, parse_table_ref, parse_table_source, select, Budget,
};

/// Parses `INSERT INTO table [(col, …)] VALUES … | SELECT …` with
/// optional ON CONFLICT and RETURNING tails.
pub(crate) fn parse_insert(
    tokens: &[Token],
    budget: Budget,
) -> Result<InsertStatement, ParseError> {
    let rest = expect_keyword(&tokens[1..], "INTO")?;
    let Some((name_tok, rest)) = rest.split_first() else {
        return Err(ParseError::eof("a table name"));
    };
    let (schema, table) = parse_table_name(name_tok)?;

    let (columns, rest) = match rest.first() {
        Some(tok) if tok.is_punct("(") && !starts_query(&rest[1..]) => {
            let close = matching_paren(rest)
                .ok_or_else(|| ParseError::new("Unbalanced parentheses in INSERT column list"))?;
            (parse_name_list(&rest[1..close])?, &rest[close + 1..])
        }
        _ => (Vec::new(), rest),
    };

    let (source, rest) = match rest.first() {
        Some(tok) if tok.is_keyword("VALUES") => {
            let (tuples, rest) = parse_values(&rest[1..], budget)?;
            (InsertSource::Values(tuples), rest)
        }
        Some(tok) if tok.is_keyword("SELECT") || tok.is_keyword("WITH") => {
            let (query_tokens, rest) = split_insert_tail(rest);
            let query = select::parse_query(query_tokens, budget.descend()?)?;
            (InsertSource::Select(Box::new(query)), rest)
        }
        Some(tok) => {
            return Err(ParseError::new(format!(
                "Expected VALUES or SELECT in INSERT, got: {tok}"
            )));
        }
        None => return Err(ParseError::eof("VALUES or SELECT")),
    };

    let (on_conflict, rest) = match rest {
        [on, conflict, rest @ ..] if on.is_keyword("ON") && conflict.is_keyword("CONFLICT") => {
            let (clause, rest) = parse_on_conflict(rest)?;
            (Some(clause), rest)
        }
        _ => (None, rest),
    };

    let (returning, rest) = parse_returning(rest, budget)?;
    expect_end(rest)?;

    Ok(InsertStatement {
        schema,
        table,
        columns,
        source,
        on_conflict,
        returning,
    })
}

/// Parses `UPDATE table [[AS] alias] SET … [FROM …] [WHERE …]
/// [RETURNING …]`.
pub(crate) fn parse_update(
    tokens: &[Token],
    budget: Budget,
) -> Result<UpdateStatement, ParseError> {
    let (table, rest) = parse_table_ref(&tokens[1..])?;
    let rest = expect_keyword(rest, "SET")?;

    let (set_tokens, rest) = extract_until(rest, &["FROM", "WHERE", "RETURNING"]);
    let assignments = parse_assignments(set_tokens)?;
    if assignments.is_empty() {
        return Err(ParseError::new("Expected assignments after SET"));
    }

    let (from, rest) = match rest.first() {
        Some(tok) if tok.is_keyword("FROM") => {
            let (source, rest) = parse_table_source(&rest[1..], budget)?;
            (Some(source), rest)
        }
        _ => (None, rest),
    };

    let (where_clause, rest) = parse_where(rest);
    let (returning, rest) = parse_returning(rest, budget)?;
    expect_end(rest)?;

    Ok(UpdateStatement {
        table,
        assignments,
        from,
        where_clause,
        returning,
    })
}

/// Parses `DELETE FROM table [[AS] alias] [USING …] [WHERE …]
/// [RETURNING …]`.
pub(crate) fn parse_delete(
    tokens: &[Token],
    budget: Budget,
) -> Result<DeleteStatement, ParseError> {
    let rest = expect_keyword(&tokens[1..], "FROM")?;
    let (table, rest) = parse_table_ref(rest)?;

    let (using, rest) = match rest.first() {
        Some(tok) if tok.is_keyword("USING") => {
            let (source, rest) = parse_table_source(&rest[1..], budget)?;
            (Some(source), rest)
        }
        _ => (None, rest),
    };

    let (where_clause, rest) = parse_where(rest);
    let (returning, rest) = parse_returning(rest, budget)?;
    expect_end(rest)?;

    Ok(DeleteStatement {
        table,
        using,
        where_clause,
        returning,
    })
}

fn parse_where(tokens: &[Token]) -> (Option<crate::ast::ParsedCondition>, &[Token]) {
    match tokens.first() {
        Some(tok) if tok.is_keyword("WHERE") => {
            let (condition_tokens, rest) = extract_until(&tokens[1..], &["RETURNING"]);
            (Some(parse_condition(condition_tokens)), rest)
        }
        _ => (None, tokens),
    }
}

/// Parses the VALUES tuple list. `DEFAULT` entries carry no references.
fn parse_values<'a>(
    mut tokens: &'a [Token],
    budget: Budget,
) -> Result<(Vec<Vec<ColumnExpr>>, &'a [Token]), ParseError> {
    let mut tuples = Vec::new();
    loop {
        match tokens.first() {
            Some(tok) if tok.is_punct("(") => {}
            Some(tok) => {
                return Err(ParseError::new(format!(
                    "Expected ( to open a VALUES tuple, got: {tok}"
                )));
            }
            None => return Err(ParseError::eof("a VALUES tuple")),
        }
        let close = matching_paren(tokens)
            .ok_or_else(|| ParseError::new("Unbalanced parentheses in VALUES"))?;
        let mut tuple = Vec::new();
        for piece in split_by_comma(&tokens[1..close]) {
            if piece.is_empty() {
                return Err(ParseError::new("Empty value in VALUES tuple"));
            }
            if let [tok] = piece {
                if tok.is_keyword("DEFAULT") {
                    tuple.push(ColumnExpr::Complex {
                        column_refs: Vec::new(),
                        cast_type: None,
                    });
                    continue;
                }
            }
            tuple.push(recognize_expr(piece, budget)?.expr);
        }
        if tuple.is_empty() {
            return Err(ParseError::new("Empty VALUES tuple"));
        }
        tuples.push(tuple);

        match tokens.get(close + 1) {
            Some(tok) if tok.is_punct(",") => tokens = &tokens[close + 2..],
            _ => {
                tokens = &tokens[close + 1..];
                break;
            }
        }
    }
    Ok((tuples, tokens))
}

/// Cuts an embedded SELECT off at the first top-level `RETURNING` or
/// `ON CONFLICT`; a join's `ON` never qualifies because it is not
/// followed by `CONFLICT`.
fn split_insert_tail(tokens: &[Token]) -> (&[Token], &[Token]) {
    let mut depth: usize = 0;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 {
            if tok.is_keyword("RETURNING") {
                return (&tokens[..i], &tokens[i..]);
            }
            if tok.is_keyword("ON")
                && tokens.get(i + 1).is_some_and(|t| t.is_keyword("CONFLICT"))
            {
                return (&tokens[..i], &tokens[i..]);
            }
        }
    }
    (tokens, &[])
}

/// Parses the clause after `ON CONFLICT`.
fn parse_on_conflict(tokens: &[Token]) -> Result<(OnConflict, &[Token]), ParseError> {
    let (target, rest) = match tokens.first() {
        Some(tok) if tok.is_punct("(") => {
            let close = matching_paren(tokens).ok_or_else(|| {
                ParseError::new("Unbalanced parentheses in ON CONFLICT target")
            })?;
            (parse_name_list(&tokens[1..close])?, &tokens[close + 1..])
        }
        _ => (Vec::new(), tokens),
    };

    let rest = expect_keyword(rest, "DO")?;
    match rest.first() {
        Some(tok) if tok.is_keyword("NOTHING") => Ok((
            OnConflict {
                target,
                action: ConflictAction::DoNothing,
                where_clause: None,
            },
            &rest[1..],
        )),
        Some(tok) if tok.is_keyword("UPDATE") => {
            let rest = expect_keyword(&rest[1..], "SET")?;
            let (set_tokens, rest) = extract_until(rest, &["WHERE", "RETURNING"]);
            let assignments = parse_assignments(set_tokens)?;
            if assignments.is_empty() {
                return Err(ParseError::new("Expected assignments after DO UPDATE SET"));
            }
            let (where_clause, rest) = parse_where(rest);
            Ok((
                OnConflict {
                    target,
                    action: ConflictAction::DoUpdate(assignments),
                    where_clause,
                },
                rest,
            ))
        }
        Some(tok) => Err(ParseError::new(format!(
            "Expected NOTHING or UPDATE after DO, got: {tok}"
        ))),
        None => Err(ParseError::eof("NOTHING or UPDATE")),
    }
}

/// Parses `col = expr` assignments, comma separated. A qualified target
/// keeps its last segment; the value is reduced to its column references.
fn parse_assignments(tokens: &[Token]) -> Result<Vec<Assignment>, ParseError> {
    let mut assignments = Vec::new();
    for piece in split_by_comma(tokens) {
        let [col_tok, eq, value @ ..] = piece else {
            return Err(ParseError::new("Expected column = expression in SET"));
        };
        if !eq.is_punct("=") {
            return Err(ParseError::new(format!(
                "Expected = in SET assignment, got: {eq}"
            )));
        }
        if value.is_empty() {
            return Err(ParseError::new("Expected an expression after = in SET"));
        }
        let column = split_dotted_name(col_tok.text())
            .and_then(|segments| segments.into_iter().next_back())
            .ok_or_else(|| {
                ParseError::new(format!("Invalid assignment target: {col_tok}"))
            })?;
        assignments.push(Assignment {
            column,
            value: parse_condition(value),
        });
    }
    Ok(assignments)
}

/// Parses a trailing `RETURNING items` clause; `RETURNING *` expands to
/// the statement's context.
fn parse_returning<'a>(
    tokens: &'a [Token],
    budget: Budget,
) -> Result<(Option<SelectColumns>, &'a [Token]), ParseError> {
    match tokens.first() {
        Some(tok) if tok.is_keyword("RETURNING") => {
            let items = &tokens[1..];
            if let [star] = items {
                if star.is_punct("*") {
                    return Ok((Some(SelectColumns::All), &[]));
                }
            }
            let pieces = split_by_comma(items);
            if pieces.is_empty() {
                return Err(ParseError::new("Expected items after RETURNING"));
            }
            let mut parsed = Vec::with_capacity(pieces.len());
            for piece in pieces {
                if piece.is_empty() {
                    return Err(ParseError::new("Expected items after RETURNING"));
                }
                parsed.push(recognize_select_item(piece, budget)?);
            }
            Ok((Some(SelectColumns::Items(parsed)), &[]))
        }
        _ => Ok((None, tokens)),
    }
}

/// A comma-separated list of bare (possibly quoted) column names.
fn parse_name_list(tokens: &[Token]) -> Result<Vec<String>, ParseError> {
    let pieces = split_by_comma(tokens);
    let mut names = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let [tok] = piece else {
            return Err(ParseError::new("Invalid column list"));
        };
        names.push(unquote_identifier(tok.text()));
    }
    Ok(names)
}

fn expect_end(tokens: &[Token]) -> Result<(), ParseError> {
    match tokens.first() {
        None => Ok(()),
        Some(tok) => Err(ParseError::new(format!(
            "Unexpected token after statement: {tok}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Statement;
    use crate::parser::parse_statement;

    fn insert(sql: &str) -> InsertStatement {
        match parse_statement(sql).unwrap() {
            Statement::Insert(stmt) => stmt,
            other => panic!("expected insert, got {other:?}"),
        }
    }

    fn update(sql: &str) -> UpdateStatement {
        match parse_statement(sql).unwrap() {
            Statement::Update(stmt) => stmt,
            other => panic!("expected update, got {other:?}"),
        }
    }

    fn delete(sql: &str) -> DeleteStatement {
        match parse_statement(sql).unwrap() {
            Statement::Delete(stmt) => stmt,
            other => panic!("expected delete, got {other:?}"),
        }
    }

    #[test]
    fn test_insert_values() {
        let stmt = insert("INSERT INTO users (name, email) VALUES ('a', 'a@x.io'), ('b', 'b@x.io')");
        assert_eq!(stmt.table, "users");
        assert_eq!(stmt.columns, ["name", "email"]);
        let InsertSource::Values(tuples) = &stmt.source else {
            panic!("expected values");
        };
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0].len(), 2);
        assert!(stmt.returning.is_none());
    }

    #[test]
    fn test_insert_without_column_list() {
        let stmt = insert("INSERT INTO posts VALUES (1, 2, 'hello', 0, 'draft')");
        assert!(stmt.columns.is_empty());
    }

    #[test]
    fn test_insert_default_value() {
        let stmt = insert("INSERT INTO users (name, is_active) VALUES ('a', DEFAULT)");
        let InsertSource::Values(tuples) = &stmt.source else {
            panic!();
        };
        assert!(matches!(
            tuples[0][1],
            ColumnExpr::Complex { ref column_refs, .. } if column_refs.is_empty()
        ));
    }

    #[test]
    fn test_insert_select() {
        let stmt = insert(
            "INSERT INTO archive (id, title) \
             SELECT p.id, p.title FROM posts p JOIN users u ON p.author_id = u.id \
             RETURNING id",
        );
        assert!(matches!(stmt.source, InsertSource::Select(_)));
        assert!(stmt.returning.is_some());
    }

    #[test]
    fn test_insert_schema_qualified() {
        let stmt = insert("INSERT INTO audit.events (at) VALUES ('now')");
        assert_eq!(stmt.schema.as_deref(), Some("audit"));
        assert_eq!(stmt.table, "events");
    }

    #[test]
    fn test_insert_on_conflict_do_nothing() {
        let stmt = insert("INSERT INTO users (name) VALUES ('a') ON CONFLICT (name) DO NOTHING");
        let clause = stmt.on_conflict.unwrap();
        assert_eq!(clause.target, ["name"]);
        assert_eq!(clause.action, ConflictAction::DoNothing);
    }

    #[test]
    fn test_insert_on_conflict_do_update() {
        let stmt = insert(
            "INSERT INTO users (name, email) VALUES ('a', 'a@x.io') \
             ON CONFLICT (name) DO UPDATE SET email = excluded.email \
             WHERE users.is_active RETURNING id, email",
        );
        let clause = stmt.on_conflict.unwrap();
        let ConflictAction::DoUpdate(assignments) = &clause.action else {
            panic!("expected do update");
        };
        assert_eq!(assignments[0].column, "email");
        assert_eq!(assignments[0].value.column_refs.len(), 1);
        assert!(clause.where_clause.is_some());
        assert!(stmt.returning.is_some());
    }

    #[test]
    fn test_insert_returning_star() {
        let stmt = insert("INSERT INTO users (name) VALUES ('a') RETURNING *");
        assert_eq!(stmt.returning, Some(SelectColumns::All));
    }

    #[test]
    fn test_update_basic() {
        let stmt = update("UPDATE users SET name = 'x', email = 'y' WHERE id = 1");
        assert_eq!(stmt.table.table, "users");
        assert_eq!(stmt.table.alias, "users");
        assert_eq!(stmt.assignments.len(), 2);
        assert_eq!(stmt.assignments[0].column, "name");
        assert!(stmt.where_clause.is_some());
    }

    #[test]
    fn test_update_with_alias_from_returning() {
        let stmt = update(
            "UPDATE posts AS p SET views = p.views FROM users u \
             WHERE p.author_id = u.id RETURNING p.id AS post_id",
        );
        assert_eq!(stmt.table.alias, "p");
        assert!(stmt.from.is_some());
        let Some(SelectColumns::Items(items)) = &stmt.returning else {
            panic!("expected returning items");
        };
        assert_eq!(items[0].alias, "post_id");
    }

    #[test]
    fn test_update_requires_set() {
        let err = parse_statement("UPDATE users WHERE id = 1").unwrap_err();
        assert!(err.message.starts_with("Expected SET"));
    }

    #[test]
    fn test_delete_basic() {
        let stmt = delete("DELETE FROM users WHERE deleted_at IS NOT NULL");
        assert_eq!(stmt.table.table, "users");
        assert!(stmt.using.is_none());
        assert!(stmt.where_clause.is_some());
    }

    #[test]
    fn test_delete_using_returning() {
        let stmt = delete(
            "DELETE FROM posts p USING users u \
             WHERE p.author_id = u.id RETURNING p.id",
        );
        assert_eq!(stmt.table.alias, "p");
        assert!(stmt.using.is_some());
        assert!(stmt.returning.is_some());
    }

    #[test]
    fn test_delete_requires_from() {
        let err = parse_statement("DELETE users").unwrap_err();
        assert!(err.message.starts_with("Expected FROM"));
    }

    #[test]
    fn test_values_arity_is_preserved() {
        let stmt = insert("INSERT INTO users (name) VALUES ('a', 'extra')");
        let InsertSource::Values(tuples) = &stmt.source else {
            panic!();
        };
        // Arity mismatch is a validation concern, not a parse error.
        assert_eq!(tuples[0].len(), 2);
    }
}
