//! Query normalization and tokenization.
//!
//! Normalization strips comments, folds whitespace, and pads every
//! structural punctuator with spaces so tokenization reduces to splitting
//! on spaces. Quoted identifiers (`"col"`) and string literals (`'txt'`,
//! `N'txt'`, `E'txt'`) are atomic: the normalizer copies their contents
//! verbatim and the splitter spans them to the closing quote, so a quoted
//! token survives intact even when it contains spaces or punctuation.
//!
//! The token stream exposes three primitives the parsers build on:
//! [`next_token`], [`extract_until`] (terminator keywords, top level
//! only), and [`split_by_comma`] (paren-depth aware).

use std::fmt;

use crate::error::{ParseError, ParseErrorKind};

/// One token of a normalized query. Keyword comparison folds case;
/// the stored text preserves the original casing and quoting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    text: String,
}

impl Token {
    pub(crate) fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Case-insensitive keyword match. Quoted tokens never match.
    pub(crate) fn is_keyword(&self, kw: &str) -> bool {
        !self.is_double_quoted() && !self.is_string_literal() && self.text.eq_ignore_ascii_case(kw)
    }

    pub(crate) fn is_any_keyword(&self, kws: &[&str]) -> bool {
        kws.iter().any(|kw| self.is_keyword(kw))
    }

    /// Exact punctuator match (`(`, `)`, `,`, `::`, …).
    pub(crate) fn is_punct(&self, punct: &str) -> bool {
        self.text == punct
    }

    pub(crate) fn is_double_quoted(&self) -> bool {
        self.text.starts_with('"')
    }

    pub(crate) fn is_string_literal(&self) -> bool {
        let bytes = self.text.as_bytes();
        match bytes.first() {
            Some(b'\'') => true,
            Some(b'N' | b'n' | b'E' | b'e') => bytes.get(1) == Some(&b'\''),
            _ => false,
        }
    }

    pub(crate) fn is_numeric_literal(&self) -> bool {
        let text = self.text.strip_prefix('-').unwrap_or(&self.text);
        text.starts_with(|c: char| c.is_ascii_digit() || c == '.') && text.parse::<f64>().is_ok()
    }

    /// Parameter placeholders: `$1`, `:name`, `@name`.
    pub(crate) fn is_placeholder(&self) -> bool {
        match self.text.as_bytes().first() {
            Some(b'$') => self.text[1..].bytes().all(|b| b.is_ascii_digit()),
            Some(b':' | b'@') => self.text.len() > 1,
            _ => false,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Punctuators padded with spaces during normalization, longest first so
/// `->>` wins over `->` and `<=` over `<`.
const PADDED_OPERATORS: &[&str] = &[
    "->>", "#>>", "->", "#>", "||", "::", "<=", ">=", "<>", "!=", "(", ")", ",", "=", "<", ">",
    ";",
];

/// Normalizes a query string: strips `--` and `/* … */` comments, folds
/// whitespace runs to single spaces, and pads structural punctuators so
/// the result splits on spaces. Quoted spans pass through verbatim.
///
/// Idempotent: `normalize(normalize(q)) == normalize(q)`.
pub fn normalize(sql: &str) -> String {
    let padded = pad_punctuators(sql);
    collapse_spaces(&padded)
}

fn pad_punctuators(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + 16);
    let mut i = 0;

    'outer: while i < bytes.len() {
        let c = bytes[i];

        // Quoted spans are copied verbatim, doubled quotes included.
        if c == b'\'' || c == b'"' {
            i = copy_quoted_span(sql, i, &mut out);
            continue;
        }

        // Line comment to end of line.
        if c == b'-' && bytes.get(i + 1) == Some(&b'-') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            out.push(' ');
            continue;
        }

        // Block comment.
        if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i < bytes.len() {
                if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    i += 2;
                    out.push(' ');
                    continue 'outer;
                }
                i += 1;
            }
            out.push(' ');
            continue;
        }

        if c.is_ascii_whitespace() {
            out.push(' ');
            i += 1;
            continue;
        }

        // `*` right after a dot is a wildcard suffix (`t.*`), everywhere
        // else it is a standalone token.
        if c == b'*' {
            if out.ends_with('.') {
                out.push('*');
            } else {
                out.push_str(" * ");
            }
            i += 1;
            continue;
        }

        for op in PADDED_OPERATORS {
            if bytes[i..].starts_with(op.as_bytes()) {
                out.push(' ');
                out.push_str(op);
                out.push(' ');
                i += op.len();
                continue 'outer;
            }
        }

        // Everything else (identifiers, dots, digits, `$1` / `:name`
        // placeholders) is copied through whole characters at a time.
        let len = utf8_char_len(c);
        out.push_str(&sql[i..i + len]);
        i += len;
    }

    out
}

/// Length of the UTF-8 character starting with `byte`. The input is a
/// valid `&str`, so lead bytes are the only bytes ever inspected.
fn utf8_char_len(byte: u8) -> usize {
    match byte {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

/// Index just past the closing quote of the span opening at `start`.
/// Doubled quotes stay inside the span; an unterminated span runs to the
/// end of input (`check_quotes` reports it before the tokenize path gets
/// here).
fn quoted_span_end(sql: &str, start: usize) -> usize {
    let bytes = sql.as_bytes();
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    i
}

/// Copies a quoted span starting at `start` (which must index a quote
/// byte) into `out` verbatim, returning the index just past it.
fn copy_quoted_span(sql: &str, start: usize, out: &mut String) -> usize {
    let end = quoted_span_end(sql, start);
    out.push_str(&sql[start..end]);
    end
}

/// Collapses runs of spaces outside quoted spans and trims the ends.
fn collapse_spaces(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\'' || c == b'"' {
            i = copy_quoted_span(sql, i, &mut out);
            continue;
        }
        if c == b' ' {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            i += 1;
            continue;
        }
        let len = utf8_char_len(c);
        out.push_str(&sql[i..i + len]);
        i += len;
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Scans for unterminated quoted identifiers and string literals,
/// reporting the byte offset of the opening quote. Comments are skipped
/// so an apostrophe inside one does not count.
fn check_quotes(sql: &str) -> Result<(), ParseError> {
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'\'' | b'"' => {
                let open = i;
                i += 1;
                let mut closed = false;
                while i < bytes.len() {
                    if bytes[i] == c {
                        if bytes.get(i + 1) == Some(&c) {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        closed = true;
                        break;
                    }
                    i += 1;
                }
                if !closed {
                    let what = if c == b'"' {
                        "Unterminated quoted identifier"
                    } else {
                        "Unterminated string literal"
                    };
                    return Err(ParseError::at_offset(what, open)
                        .with_kind(ParseErrorKind::UnterminatedQuote));
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() {
                    if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    Ok(())
}

/// Tokenizes a query into a flat stream.
pub fn tokenize(sql: &str) -> Result<Vec<Token>, ParseError> {
    check_quotes(sql)?;
    let normalized = normalize(sql);
    Ok(split_tokens(&normalized))
}

/// Splits a normalized query on spaces, spanning quoted regions so that
/// a quoted token containing spaces stays whole.
fn split_tokens(normalized: &str) -> Vec<Token> {
    let bytes = normalized.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b' ' {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i] != b' ' {
            let c = bytes[i];
            if c == b'\'' || c == b'"' {
                i = quoted_span_end(normalized, i);
            } else {
                i += 1;
            }
        }
        tokens.push(Token::new(&normalized[start..i]));
    }
    tokens
}


/// Peels the first token off the stream.
pub fn next_token(tokens: &[Token]) -> Option<(&Token, &[Token])> {
    tokens.split_first()
}

/// Consumes tokens until one matches a terminator keyword at parenthesis
/// depth zero. Returns `(consumed, rest)`; `rest` begins with the
/// terminator, or is empty when none was found.
pub fn extract_until<'a>(
    tokens: &'a [Token],
    terminators: &[&str],
) -> (&'a [Token], &'a [Token]) {
    let mut depth: usize = 0;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tok.is_any_keyword(terminators) {
            return (&tokens[..i], &tokens[i..]);
        }
    }
    (tokens, &[])
}

/// Splits at top-level commas, respecting parenthesis depth. The commas
/// themselves are dropped. An empty input yields no pieces.
pub fn split_by_comma(tokens: &[Token]) -> Vec<&[Token]> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth: usize = 0;
    let mut start = 0;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tok.is_punct(",") {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// For a stream starting with `(`, returns the index of the matching `)`.
pub(crate) fn matching_paren(tokens: &[Token]) -> Option<usize> {
    debug_assert!(tokens.first().is_some_and(|t| t.is_punct("(")));
    let mut depth: usize = 0;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(Token::text).collect()
    }

    #[test]
    fn test_basic_select_tokens() {
        let toks = tokenize("SELECT id, name FROM users").unwrap();
        assert_eq!(texts(&toks), ["SELECT", "id", ",", "name", "FROM", "users"]);
    }

    #[test]
    fn test_whitespace_folding() {
        let toks = tokenize("SELECT\n\tid ,\n  name\nFROM   users").unwrap();
        assert_eq!(texts(&toks), ["SELECT", "id", ",", "name", "FROM", "users"]);
    }

    #[test]
    fn test_comments_stripped() {
        let toks = tokenize("SELECT id -- the key\nFROM /* main table */ users").unwrap();
        assert_eq!(texts(&toks), ["SELECT", "id", "FROM", "users"]);
    }

    #[test]
    fn test_apostrophe_in_comment() {
        let toks = tokenize("SELECT id FROM users -- don't break").unwrap();
        assert_eq!(texts(&toks), ["SELECT", "id", "FROM", "users"]);
    }

    #[test]
    fn test_operators_padded() {
        let toks = tokenize("SELECT a::text,b->>'k' FROM t WHERE x<=1 AND y!=2").unwrap();
        assert_eq!(
            texts(&toks),
            [
                "SELECT", "a", "::", "text", ",", "b", "->>", "'k'", "FROM", "t", "WHERE", "x",
                "<=", "1", "AND", "y", "!=", "2"
            ]
        );
    }

    #[test]
    fn test_json_path_operators() {
        let toks = tokenize("SELECT doc#>>'{a,b}' FROM t").unwrap();
        assert_eq!(
            texts(&toks),
            ["SELECT", "doc", "#>>", "'{a,b}'", "FROM", "t"]
        );
    }

    #[test]
    fn test_wildcard_attachment() {
        let toks = tokenize("SELECT u.*, * , COUNT(*) FROM u").unwrap();
        assert_eq!(
            texts(&toks),
            ["SELECT", "u.*", ",", "*", ",", "COUNT", "(", "*", ")", "FROM", "u"]
        );
    }

    #[test]
    fn test_qualified_names_stay_whole() {
        let toks = tokenize("SELECT analytics.events.id FROM analytics.events").unwrap();
        assert_eq!(
            texts(&toks),
            ["SELECT", "analytics.events.id", "FROM", "analytics.events"]
        );
    }

    #[test]
    fn test_string_literal_atomic() {
        let toks = tokenize("SELECT 'a, (b)' FROM t").unwrap();
        assert_eq!(texts(&toks), ["SELECT", "'a, (b)'", "FROM", "t"]);
    }

    #[test]
    fn test_escaped_quotes_preserved() {
        let toks = tokenize("SELECT 'it''s' FROM t").unwrap();
        assert_eq!(texts(&toks), ["SELECT", "'it''s'", "FROM", "t"]);
        let toks = tokenize(r#"SELECT "we""ird" FROM t"#).unwrap();
        assert_eq!(texts(&toks), ["SELECT", r#""we""ird""#, "FROM", "t"]);
    }

    #[test]
    fn test_string_prefixes_attached() {
        let toks = tokenize("SELECT N'abc', E'x\\n' FROM t").unwrap();
        assert_eq!(
            texts(&toks),
            ["SELECT", "N'abc'", ",", "E'x\\n'", "FROM", "t"]
        );
        assert!(toks[1].is_string_literal());
        assert!(toks[3].is_string_literal());
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("SELECT 'oops FROM t").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedQuote);
        assert_eq!(err.offset, Some(7));
        assert_eq!(err.message, "Unterminated string literal");
    }

    #[test]
    fn test_unterminated_identifier() {
        let err = tokenize(r#"SELECT "oops FROM t"#).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedQuote);
        assert_eq!(err.offset, Some(7));
        assert_eq!(err.message, "Unterminated quoted identifier");
    }

    #[test]
    fn test_normalize_idempotent() {
        for sql in [
            "SELECT a,b FROM t",
            "SELECT  a :: text FROM t WHERE x -> 'k' = 1",
            "WITH c AS (SELECT 1 FROM t) SELECT * FROM c",
            "SELECT 'lit  eral', \"Quo ted\" FROM t",
        ] {
            let once = normalize(sql);
            assert_eq!(normalize(&once), once, "not idempotent for {sql}");
        }
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let tok = Token::new("select");
        assert!(tok.is_keyword("SELECT"));
        let quoted = Token::new("\"select\"");
        assert!(!quoted.is_keyword("SELECT"));
        let lit = Token::new("'select'");
        assert!(!lit.is_keyword("SELECT"));
    }

    #[test]
    fn test_numeric_and_placeholder_classification() {
        assert!(Token::new("42").is_numeric_literal());
        assert!(Token::new("-3.5").is_numeric_literal());
        assert!(Token::new("1e6").is_numeric_literal());
        assert!(!Token::new("a1").is_numeric_literal());
        assert!(Token::new("$1").is_placeholder());
        assert!(Token::new(":user_id").is_placeholder());
        assert!(Token::new("@name").is_placeholder());
        assert!(!Token::new("$x").is_placeholder());
    }

    #[test]
    fn test_extract_until_skips_parens() {
        let toks = tokenize("( SELECT x FROM y ) AS s FROM z").unwrap();
        let (head, rest) = extract_until(&toks, &["FROM"]);
        assert_eq!(texts(head), ["(", "SELECT", "x", "FROM", "y", ")", "AS", "s"]);
        assert_eq!(texts(rest), ["FROM", "z"]);
    }

    #[test]
    fn test_extract_until_no_terminator() {
        let toks = tokenize("a , b").unwrap();
        let (head, rest) = extract_until(&toks, &["FROM"]);
        assert_eq!(head.len(), 3);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_split_by_comma_depth() {
        let toks = tokenize("a, f(b, c), d").unwrap();
        let parts = split_by_comma(&toks);
        assert_eq!(parts.len(), 3);
        assert_eq!(texts(parts[0]), ["a"]);
        assert_eq!(texts(parts[1]), ["f", "(", "b", ",", "c", ")"]);
        assert_eq!(texts(parts[2]), ["d"]);
    }

    #[test]
    fn test_matching_paren() {
        let toks = tokenize("( a ( b ) c ) d").unwrap();
        assert_eq!(matching_paren(&toks), Some(5));
        let open = tokenize("( a ( b )").unwrap();
        assert_eq!(matching_paren(&open), None);
    }

    #[test]
    fn test_quoted_identifier_with_space_survives() {
        let toks = tokenize(r#"SELECT "audit logs".id FROM "audit logs""#).unwrap();
        assert_eq!(
            texts(&toks),
            ["SELECT", r#""audit logs".id"#, "FROM", r#""audit logs""#]
        );
    }

    #[test]
    fn test_semicolon_is_separate_token() {
        let toks = tokenize("SELECT 1 FROM t;").unwrap();
        assert_eq!(texts(&toks), ["SELECT", "1", "FROM", "t", ";"]);
    }
}
