//! The SELECT parser: CTE prefixes, the clause grammar, joins, and
//! set-operator chains.

use crate::ast::{
    CteDefinition, JoinClause, JoinType, OrderByItem, OrderDirection, Query, SelectClause,
    SelectColumns, SetOperator, UnionClause,
};
use crate::error::ParseError;
use crate::expression::{
    parse_column_name, parse_condition, recognize_select_item, scan_column_refs,
};
use crate::keywords::{JOIN_STARTERS, SELECT_TERMINATORS, SET_OPERATORS};
use crate::lexer::{extract_until, matching_paren, split_by_comma, Token};
use crate::parser::{expect_keyword, expect_name, parse_count, parse_table_source, Budget};

/// Terminators for join tables and ON conditions: the next clause or the
/// next join.
const JOIN_OR_CLAUSE: &[&str] = &[
    "WHERE",
    "GROUP",
    "HAVING",
    "ORDER",
    "LIMIT",
    "OFFSET",
    "UNION",
    "INTERSECT",
    "EXCEPT",
    "JOIN",
    "INNER",
    "LEFT",
    "RIGHT",
    "FULL",
    "CROSS",
];

/// Parses a complete SELECT-shaped query (with optional WITH prefix and
/// set-operator chain), consuming every token.
pub(crate) fn parse_query(tokens: &[Token], budget: Budget) -> Result<Query, ParseError> {
    let (query, rest) = parse_query_partial(tokens, budget)?;
    if let Some(tok) = rest.first() {
        return Err(ParseError::new(format!("Unexpected token after query: {tok}")));
    }
    Ok(query)
}

/// Parses a query, returning unconsumed tokens to the caller.
fn parse_query_partial(
    tokens: &[Token],
    budget: Budget,
) -> Result<(Query, &[Token]), ParseError> {
    let (ctes, tokens) = match tokens.first() {
        Some(tok) if tok.is_keyword("WITH") => parse_cte_list(&tokens[1..], budget)?,
        _ => (Vec::new(), tokens),
    };

    match tokens.first() {
        Some(tok) if tok.is_keyword("SELECT") => {}
        Some(tok) => {
            return Err(ParseError::new(format!(
                "Expected SELECT or WITH, got: {tok}"
            )));
        }
        None => return Err(ParseError::eof("SELECT")),
    }

    let (mut select, rest) = parse_select_body(&tokens[1..], budget)?;
    select.ctes = ctes;

    if let Some((operator, rest)) = parse_set_operator(rest) {
        let (right, rest) = parse_query_partial(rest, budget.descend()?)?;
        return Ok((
            Query::Union(UnionClause {
                left: Box::new(select),
                operator,
                right: Box::new(right),
            }),
            rest,
        ));
    }

    Ok((Query::Select(select), rest))
}

/// Parses the comma-separated `name AS ( query )` list after WITH.
/// Names must be unique within one list (later CTEs may reference
/// earlier ones, never the reverse).
fn parse_cte_list(
    mut tokens: &[Token],
    budget: Budget,
) -> Result<(Vec<CteDefinition>, &[Token]), ParseError> {
    if tokens.first().is_some_and(|t| t.is_keyword("RECURSIVE")) {
        return Err(ParseError::new("Recursive CTEs are not supported"));
    }

    let mut ctes: Vec<CteDefinition> = Vec::new();
    loop {
        let (name, rest) = expect_name(tokens, "a CTE name")?;
        if ctes.iter().any(|cte| cte.name == name) {
            return Err(ParseError::new(format!("Duplicate CTE name '{name}'")));
        }
        let rest = expect_keyword(rest, "AS")?;
        match rest.first() {
            Some(tok) if tok.is_punct("(") => {}
            Some(tok) => {
                return Err(ParseError::new(format!(
                    "Expected ( after AS in CTE '{name}', got: {tok}"
                )));
            }
            None => return Err(ParseError::eof("( after AS")),
        }
        let close = matching_paren(rest)
            .ok_or_else(|| ParseError::new(format!("Unbalanced parentheses in CTE '{name}'")))?;
        let query = parse_query(&rest[1..close], budget.descend()?)?;
        ctes.push(CteDefinition {
            name,
            query: Box::new(query),
        });

        tokens = &rest[close + 1..];
        match tokens.first() {
            Some(tok) if tok.is_punct(",") => tokens = &tokens[1..],
            _ => break,
        }
    }
    Ok((ctes, tokens))
}

/// Parses the SELECT body after the SELECT keyword, stopping before any
/// set operator.
fn parse_select_body(
    tokens: &[Token],
    budget: Budget,
) -> Result<(SelectClause, &[Token]), ParseError> {
    let (distinct, tokens) = match tokens.first() {
        Some(tok) if tok.is_keyword("DISTINCT") => (true, &tokens[1..]),
        _ => (false, tokens),
    };

    let (column_tokens, rest) = extract_until(tokens, SELECT_TERMINATORS);
    if rest.is_empty() {
        return Err(ParseError::new("Invalid SELECT clause"));
    }
    let columns = parse_columns(column_tokens, budget)?;
    let rest = &rest[1..];

    let (from, mut rest) = parse_table_source(rest, budget)?;

    let mut joins = Vec::new();
    while let Some((join_type, after)) = parse_join_type(rest)? {
        let (table, after) = parse_table_source(after, budget)?;
        let (on, after) = match after.first() {
            Some(tok) if tok.is_keyword("ON") => {
                let (condition_tokens, after) = extract_until(&after[1..], JOIN_OR_CLAUSE);
                (Some(parse_condition(condition_tokens)), after)
            }
            _ => (None, after),
        };
        if join_type == JoinType::Cross && on.is_some() {
            return Err(ParseError::new("CROSS JOIN cannot have an ON condition"));
        }
        joins.push(JoinClause {
            join_type,
            table,
            on,
        });
        rest = after;
    }

    let mut select = SelectClause {
        distinct,
        columns,
        from,
        joins,
        where_clause: None,
        group_by: Vec::new(),
        having: None,
        order_by: Vec::new(),
        limit: None,
        offset: None,
        ctes: Vec::new(),
    };

    if let Some(tok) = rest.first() {
        if tok.is_keyword("WHERE") {
            let (condition_tokens, after) = extract_until(
                &rest[1..],
                &[
                    "GROUP",
                    "HAVING",
                    "ORDER",
                    "LIMIT",
                    "OFFSET",
                    "UNION",
                    "INTERSECT",
                    "EXCEPT",
                ],
            );
            select.where_clause = Some(parse_condition(condition_tokens));
            rest = after;
        }
    }

    if let Some(tok) = rest.first() {
        if tok.is_keyword("GROUP") {
            let after = expect_keyword(&rest[1..], "BY")?;
            let (group_tokens, after) = extract_until(
                after,
                &[
                    "HAVING",
                    "ORDER",
                    "LIMIT",
                    "OFFSET",
                    "UNION",
                    "INTERSECT",
                    "EXCEPT",
                ],
            );
            select.group_by = split_by_comma(group_tokens)
                .into_iter()
                .map(parse_grouping_item)
                .collect::<Result<_, _>>()?;
            rest = after;
        }
    }

    if let Some(tok) = rest.first() {
        if tok.is_keyword("HAVING") {
            let (condition_tokens, after) = extract_until(
                &rest[1..],
                &["ORDER", "LIMIT", "OFFSET", "UNION", "INTERSECT", "EXCEPT"],
            );
            select.having = Some(parse_condition(condition_tokens));
            rest = after;
        }
    }

    if let Some(tok) = rest.first() {
        if tok.is_keyword("ORDER") {
            let after = expect_keyword(&rest[1..], "BY")?;
            let (order_tokens, after) =
                extract_until(after, &["LIMIT", "OFFSET", "UNION", "INTERSECT", "EXCEPT"]);
            select.order_by = split_by_comma(order_tokens)
                .into_iter()
                .map(parse_order_item)
                .collect::<Result<_, _>>()?;
            rest = after;
        }
    }

    // LIMIT and OFFSET accept either order.
    for _ in 0..2 {
        match rest.first() {
            Some(tok) if tok.is_keyword("LIMIT") && select.limit.is_none() => {
                let (n, after) = parse_count(&rest[1..], "LIMIT")?;
                select.limit = Some(n);
                rest = after;
            }
            Some(tok) if tok.is_keyword("OFFSET") && select.offset.is_none() => {
                let (n, after) = parse_count(&rest[1..], "OFFSET")?;
                select.offset = Some(n);
                rest = after;
            }
            _ => break,
        }
    }

    Ok((select, rest))
}

/// Parses the projected column list: `*` or comma-separated items.
fn parse_columns(tokens: &[Token], budget: Budget) -> Result<SelectColumns, ParseError> {
    if let [tok] = tokens {
        if tok.is_punct("*") {
            return Ok(SelectColumns::All);
        }
    }
    let pieces = split_by_comma(tokens);
    if pieces.is_empty() {
        return Err(ParseError::new("Invalid SELECT clause"));
    }
    let mut items = Vec::with_capacity(pieces.len());
    for piece in pieces {
        if piece.is_empty() || matches!(piece, [tok] if tok.is_punct("*")) {
            return Err(ParseError::new("Invalid SELECT clause"));
        }
        items.push(recognize_select_item(piece, budget)?);
    }
    Ok(SelectColumns::Items(items))
}

/// A GROUP BY element: a plain column reference, or a complex expression
/// reduced to its references.
fn parse_grouping_item(piece: &[Token]) -> Result<crate::ast::ColumnExpr, ParseError> {
    if piece.is_empty() {
        return Err(ParseError::new("Invalid GROUP BY clause"));
    }
    if let [tok] = piece {
        if let Some(reference) = parse_column_name(tok.text()) {
            return Ok(reference);
        }
    }
    Ok(crate::ast::ColumnExpr::Complex {
        column_refs: scan_column_refs(piece),
        cast_type: None,
    })
}

/// An ORDER BY element with its optional ASC/DESC suffix.
fn parse_order_item(piece: &[Token]) -> Result<OrderByItem, ParseError> {
    if piece.is_empty() {
        return Err(ParseError::new("Invalid ORDER BY clause"));
    }
    let (direction, expr_tokens) = match piece.split_last() {
        Some((tok, head)) if tok.is_keyword("ASC") => (OrderDirection::Asc, head),
        Some((tok, head)) if tok.is_keyword("DESC") => (OrderDirection::Desc, head),
        _ => (OrderDirection::Asc, piece),
    };
    let expr = parse_grouping_item(expr_tokens)
        .map_err(|_| ParseError::new("Invalid ORDER BY clause"))?;
    Ok(OrderByItem { expr, direction })
}

/// Parses the join-type prefix of a JOIN clause, if one starts here.
fn parse_join_type(tokens: &[Token]) -> Result<Option<(JoinType, &[Token])>, ParseError> {
    let Some(first) = tokens.first() else {
        return Ok(None);
    };
    if !first.is_any_keyword(JOIN_STARTERS) {
        return Ok(None);
    }

    if first.is_keyword("JOIN") {
        return Ok(Some((JoinType::Inner, &tokens[1..])));
    }
    if first.is_keyword("INNER") {
        let rest = expect_keyword(&tokens[1..], "JOIN")?;
        return Ok(Some((JoinType::Inner, rest)));
    }
    if first.is_keyword("CROSS") {
        let rest = expect_keyword(&tokens[1..], "JOIN")?;
        return Ok(Some((JoinType::Cross, rest)));
    }

    // LEFT / RIGHT / FULL with optional OUTER.
    let (outer, rest) = match tokens.get(1) {
        Some(tok) if tok.is_keyword("OUTER") => (true, &tokens[2..]),
        _ => (false, &tokens[1..]),
    };
    let rest = expect_keyword(rest, "JOIN")?;
    let join_type = if first.is_keyword("LEFT") {
        if outer {
            JoinType::LeftOuter
        } else {
            JoinType::Left
        }
    } else if first.is_keyword("RIGHT") {
        if outer {
            JoinType::RightOuter
        } else {
            JoinType::Right
        }
    } else {
        if outer {
            JoinType::FullOuter
        } else {
            JoinType::Full
        }
    };
    Ok(Some((join_type, rest)))
}

/// Parses a set operator, with its optional ALL.
fn parse_set_operator(tokens: &[Token]) -> Option<(SetOperator, &[Token])> {
    let first = tokens.first()?;
    if !first.is_any_keyword(SET_OPERATORS) {
        return None;
    }
    let all = tokens.get(1).is_some_and(|t| t.is_keyword("ALL"));
    let operator = if first.is_keyword("UNION") {
        if all {
            SetOperator::UnionAll
        } else {
            SetOperator::Union
        }
    } else if first.is_keyword("INTERSECT") {
        if all {
            SetOperator::IntersectAll
        } else {
            SetOperator::Intersect
        }
    } else if first.is_keyword("EXCEPT") {
        if all {
            SetOperator::ExceptAll
        } else {
            SetOperator::Except
        }
    } else {
        return None;
    };
    let rest = if all { &tokens[2..] } else { &tokens[1..] };
    Some((operator, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ColumnExpr, TableSource};
    use crate::lexer::tokenize;

    fn parse(sql: &str) -> Query {
        let tokens = tokenize(sql).unwrap();
        parse_query(&tokens, Budget::default()).unwrap()
    }

    fn parse_err(sql: &str) -> ParseError {
        let tokens = tokenize(sql).unwrap();
        parse_query(&tokens, Budget::default()).unwrap_err()
    }

    fn select(query: &Query) -> &SelectClause {
        match query {
            Query::Select(select) => select,
            Query::Union(_) => panic!("expected a plain select"),
        }
    }

    #[test]
    fn test_minimal_select() {
        let query = parse("SELECT id, name FROM users");
        let body = select(&query);
        assert!(!body.distinct);
        let SelectColumns::Items(items) = &body.columns else {
            panic!("expected items");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].alias, "id");
        assert_eq!(items[1].alias, "name");
        match &body.from {
            TableSource::Table(t) => {
                assert_eq!(t.table, "users");
                assert_eq!(t.alias, "users");
            }
            other => panic!("unexpected from {other:?}"),
        }
    }

    #[test]
    fn test_select_star() {
        let query = parse("SELECT * FROM users");
        assert_eq!(select(&query).columns, SelectColumns::All);
    }

    #[test]
    fn test_distinct_flag() {
        let query = parse("SELECT DISTINCT role FROM users");
        assert!(select(&query).distinct);
    }

    #[test]
    fn test_aliased_columns() {
        let query = parse("SELECT id AS user_id, name AS display FROM users");
        let SelectColumns::Items(items) = &select(&query).columns else {
            panic!();
        };
        assert_eq!(items[0].alias, "user_id");
        assert_eq!(items[1].alias, "display");
    }

    #[test]
    fn test_join_variants() {
        let query = parse(
            "SELECT u.name FROM users AS u \
             JOIN posts p ON u.id = p.author_id \
             LEFT JOIN posts p2 ON u.id = p2.author_id \
             LEFT OUTER JOIN posts p3 ON u.id = p3.author_id \
             CROSS JOIN posts p4",
        );
        let body = select(&query);
        assert_eq!(body.joins.len(), 4);
        assert_eq!(body.joins[0].join_type, JoinType::Inner);
        assert_eq!(body.joins[1].join_type, JoinType::Left);
        assert_eq!(body.joins[2].join_type, JoinType::LeftOuter);
        assert_eq!(body.joins[3].join_type, JoinType::Cross);
        assert!(body.joins[0].on.is_some());
        assert!(body.joins[3].on.is_none());
        let on = body.joins[0].on.as_ref().unwrap();
        assert_eq!(on.column_refs.len(), 2);
    }

    #[test]
    fn test_cross_join_with_on_is_rejected() {
        let err = parse_err("SELECT 1 FROM a CROSS JOIN b ON a.id = b.id");
        assert_eq!(err.message, "CROSS JOIN cannot have an ON condition");
    }

    #[test]
    fn test_where_captures_refs() {
        let query = parse("SELECT id FROM users WHERE is_active = TRUE AND role = 'admin'");
        let body = select(&query);
        let refs = &body.where_clause.as_ref().unwrap().column_refs;
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_group_having_order_limit_offset() {
        let query = parse(
            "SELECT role, COUNT(*) AS n FROM users \
             GROUP BY role HAVING COUNT(*) > 1 \
             ORDER BY n DESC, role LIMIT 10 OFFSET 20",
        );
        let body = select(&query);
        assert_eq!(body.group_by.len(), 1);
        assert!(body.having.is_some());
        assert_eq!(body.order_by.len(), 2);
        assert_eq!(body.order_by[0].direction, OrderDirection::Desc);
        assert_eq!(body.order_by[1].direction, OrderDirection::Asc);
        assert_eq!(body.limit, Some(10));
        assert_eq!(body.offset, Some(20));
    }

    #[test]
    fn test_offset_before_limit() {
        let query = parse("SELECT id FROM users OFFSET 5 LIMIT 10");
        let body = select(&query);
        assert_eq!(body.limit, Some(10));
        assert_eq!(body.offset, Some(5));
    }

    #[test]
    fn test_derived_table() {
        let query = parse("SELECT s.id FROM (SELECT id FROM users) AS s");
        match &select(&query).from {
            TableSource::Derived { alias, .. } => assert_eq!(alias, "s"),
            other => panic!("unexpected from {other:?}"),
        }
    }

    #[test]
    fn test_derived_table_requires_alias() {
        let err = parse_err("SELECT id FROM (SELECT id FROM users)");
        assert_eq!(err.message, "Derived table requires an alias");
        let err = parse_err("SELECT id FROM (SELECT id FROM users) WHERE id = 1");
        assert_eq!(err.message, "Derived table requires an alias");
    }

    #[test]
    fn test_cte_list() {
        let query = parse(
            "WITH active AS (SELECT id FROM users WHERE is_active = TRUE), \
             recent AS (SELECT id FROM active LIMIT 10) \
             SELECT * FROM recent",
        );
        let body = select(&query);
        assert_eq!(body.ctes.len(), 2);
        assert_eq!(body.ctes[0].name, "active");
        assert_eq!(body.ctes[1].name, "recent");
    }

    #[test]
    fn test_duplicate_cte_name() {
        let err = parse_err("WITH a AS (SELECT 1 FROM t), a AS (SELECT 2 FROM t) SELECT * FROM a");
        assert_eq!(err.message, "Duplicate CTE name 'a'");
    }

    #[test]
    fn test_recursive_cte_rejected() {
        let err = parse_err("WITH RECURSIVE r AS (SELECT 1 FROM t) SELECT * FROM r");
        assert_eq!(err.message, "Recursive CTEs are not supported");
    }

    #[test]
    fn test_union_chain_leans_right() {
        let query = parse("SELECT a FROM t UNION SELECT b FROM u UNION ALL SELECT c FROM v");
        let Query::Union(outer) = &query else {
            panic!("expected union");
        };
        assert_eq!(outer.operator, SetOperator::Union);
        let Query::Union(inner) = outer.right.as_ref() else {
            panic!("expected nested union");
        };
        assert_eq!(inner.operator, SetOperator::UnionAll);
        assert!(matches!(inner.right.as_ref(), Query::Select(_)));
    }

    #[test]
    fn test_intersect_and_except() {
        let query = parse("SELECT a FROM t INTERSECT SELECT a FROM u");
        let Query::Union(outer) = &query else {
            panic!();
        };
        assert_eq!(outer.operator, SetOperator::Intersect);

        let query = parse("SELECT a FROM t EXCEPT ALL SELECT a FROM u");
        let Query::Union(outer) = &query else {
            panic!();
        };
        assert_eq!(outer.operator, SetOperator::ExceptAll);
    }

    #[test]
    fn test_missing_from_is_invalid() {
        let err = parse_err("SELECT 1");
        assert_eq!(err.message, "Invalid SELECT clause");
    }

    #[test]
    fn test_empty_column_list() {
        let err = parse_err("SELECT FROM users");
        assert_eq!(err.message, "Invalid SELECT clause");
    }

    #[test]
    fn test_star_mixed_with_items() {
        let err = parse_err("SELECT *, id FROM users");
        assert_eq!(err.message, "Invalid SELECT clause");
    }

    #[test]
    fn test_trailing_garbage() {
        let err = parse_err("SELECT id FROM users garbage extra");
        assert!(err.message.starts_with("Unexpected token after query"));
    }

    #[test]
    fn test_subquery_in_where_keeps_clause_intact() {
        let query = parse(
            "SELECT id FROM users WHERE id IN (SELECT author_id FROM posts GROUP BY author_id)",
        );
        let body = select(&query);
        // GROUP BY inside the subquery must not terminate the WHERE scan.
        assert!(body.group_by.is_empty());
        let refs = &body.where_clause.as_ref().unwrap().column_refs;
        assert_eq!(refs.len(), 1);
        assert_eq!(
            refs[0],
            ColumnExpr::UnboundColumn { name: "id".into() }
        );
    }

    #[test]
    fn test_grouping_item_shapes() {
        let query = parse("SELECT role FROM users GROUP BY role, lower(email)");
        let body = select(&query);
        assert_eq!(
            body.group_by[0],
            ColumnExpr::UnboundColumn {
                name: "role".into()
            }
        );
        match &body.group_by[1] {
            ColumnExpr::Complex { column_refs, .. } => {
                assert_eq!(column_refs.len(), 1);
            }
            other => panic!("unexpected group item {other:?}"),
        }
    }
}
