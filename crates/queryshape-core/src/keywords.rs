//! Keyword and operator tables shared by the tokenizer, the parsers, and
//! the expression scanner.
//!
//! Keyword recognition is case-insensitive; identifier tokens preserve
//! their original casing, so membership checks here always fold to
//! uppercase first. Quoted identifiers are never keywords.

/// Keywords that terminate the SELECT column list.
pub(crate) const SELECT_TERMINATORS: &[&str] = &["FROM"];

/// Keywords that open a new clause after FROM. Used to delimit table
/// references, join tables, and ON conditions.
pub(crate) const CLAUSE_STARTERS: &[&str] = &[
    "WHERE",
    "GROUP",
    "HAVING",
    "ORDER",
    "LIMIT",
    "OFFSET",
    "UNION",
    "INTERSECT",
    "EXCEPT",
];

/// Keywords that may begin a JOIN clause.
pub(crate) const JOIN_STARTERS: &[&str] = &["JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS"];

/// Set operators that chain SELECT bodies.
pub(crate) const SET_OPERATORS: &[&str] = &["UNION", "INTERSECT", "EXCEPT"];

/// Aggregate function names recognized as `AggregateExpr`.
pub(crate) const AGGREGATE_FUNCTIONS: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX"];

/// Parameterless SQL constants with a fixed result type.
pub(crate) const SQL_CONSTANTS: &[&str] = &[
    "CURRENT_DATE",
    "CURRENT_TIMESTAMP",
    "CURRENT_TIME",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "CURRENT_USER",
    "SESSION_USER",
    "CURRENT_SCHEMA",
    "CURRENT_CATALOG",
    "CURRENT_ROLE",
];

/// Words the column-reference scanner must never mistake for a column.
///
/// This is a deny-list, not a full reserved-word table: extending the
/// recognizer with a new operator or clause keyword is an addition here,
/// not a grammar change.
const SCANNER_DENYLIST: &[&str] = &[
    // Statement and clause keywords
    "SELECT",
    "FROM",
    "WHERE",
    "GROUP",
    "BY",
    "HAVING",
    "ORDER",
    "LIMIT",
    "OFFSET",
    "DISTINCT",
    "AS",
    "ON",
    "USING",
    "JOIN",
    "INNER",
    "LEFT",
    "RIGHT",
    "FULL",
    "OUTER",
    "CROSS",
    "UNION",
    "INTERSECT",
    "EXCEPT",
    "ALL",
    "ANY",
    "SOME",
    "WITH",
    "ASC",
    "DESC",
    "INSERT",
    "INTO",
    "VALUES",
    "UPDATE",
    "SET",
    "DELETE",
    "RETURNING",
    "CONFLICT",
    "DO",
    "NOTHING",
    "DEFAULT",
    // Boolean / predicate vocabulary
    "AND",
    "OR",
    "NOT",
    "IN",
    "IS",
    "NULL",
    "TRUE",
    "FALSE",
    "LIKE",
    "ILIKE",
    "SIMILAR",
    "BETWEEN",
    "EXISTS",
    // Expression vocabulary
    "CASE",
    "WHEN",
    "THEN",
    "ELSE",
    "END",
    "CAST",
    "INTERVAL",
    "COLLATE",
    "ESCAPE",
];

/// Operator and punctuation tokens the scanner skips.
const SCANNER_OPERATORS: &[&str] = &[
    "(", ")", ",", "::", "->", "->>", "#>", "#>>", "||", "=", "!=", "<>", "<", ">", "<=", ">=",
    "*", "+", "-", "/", "%", ";",
];

/// Returns true when `word` (any casing, unquoted) is a SQL keyword the
/// scanner must skip.
pub(crate) fn is_scanner_keyword(word: &str) -> bool {
    in_set(word, SCANNER_DENYLIST)
        || in_set(word, AGGREGATE_FUNCTIONS)
        || in_set(word, SQL_CONSTANTS)
}

/// Returns true when `tok` is an operator or punctuator token.
pub(crate) fn is_operator(tok: &str) -> bool {
    SCANNER_OPERATORS.contains(&tok)
}

/// Returns true when `word` matches a name in `set` case-insensitively.
pub(crate) fn in_set(word: &str, set: &[&str]) -> bool {
    set.iter().any(|kw| word.eq_ignore_ascii_case(kw))
}
