//! Public types for the query analysis API: host types, row shapes,
//! verdicts, and options.
//!
//! Everything here serializes with serde (camelCase) and derives a JSON
//! schema, so the crate can sit behind any transport the embedder picks.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The representation of a SQL column's type in the host type system.
///
/// Catalogs declare these per column and the analyzer carries them through
/// verbatim; the only values the crate manufactures itself are the
/// `::type` cast targets and the fixed types of literals, aggregates, and
/// SQL constants.
///
/// Unit variants serialize as bare strings (`"number"`); structured
/// variants as single-key objects (`{"literal": "admin"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HostType {
    /// Text-like values, including dates and UUIDs rendered as strings.
    String,
    /// Integers and floating point numbers.
    Number,
    Boolean,
    /// JSON / JSONB payloads.
    Object,
    /// Binary payloads (`bytea`).
    Bytes,
    Null,
    /// An exact string constant, e.g. one arm of an enumerated union.
    Literal(String),
    /// A union of alternatives, e.g. `"admin" | "user"` or `string | null`.
    Union(Vec<HostType>),
    /// A nested object with named fields.
    Record(IndexMap<String, HostType>),
    /// The sentinel for "no precise type could be inferred"; callers treat
    /// it as any/opaque.
    Unknown,
}

impl HostType {
    /// Whether this type is acceptable as a SUM/AVG argument.
    pub fn is_numeric(&self) -> bool {
        matches!(self, HostType::Number)
    }

    /// Convenience constructor for enumerated string unions.
    pub fn string_union(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        HostType::Union(
            values
                .into_iter()
                .map(|v| HostType::Literal(v.into()))
                .collect(),
        )
    }

    /// Convenience constructor for nullable columns (`T | null`).
    pub fn nullable(inner: HostType) -> Self {
        HostType::Union(vec![inner, HostType::Null])
    }
}

/// One column position in a matched row shape: either a resolved host type
/// or an inline error marker.
///
/// Markers keep the rest of the shape inspectable when a single reference
/// fails to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ColumnShape {
    /// The column resolved to a host type.
    Type(HostType),
    /// The column could not be resolved; the message uses the fixed error
    /// templates.
    Error(String),
}

impl ColumnShape {
    pub fn is_error(&self) -> bool {
        matches!(self, ColumnShape::Error(_))
    }

    /// The resolved type, if any.
    pub fn host_type(&self) -> Option<&HostType> {
        match self {
            ColumnShape::Type(t) => Some(t),
            ColumnShape::Error(_) => None,
        }
    }
}

/// The row shape a query would return.
///
/// Keys are the query's output aliases in declaration order; values are
/// host types drawn from the catalog or the cast-target map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RowShape {
    /// Ordered alias → column shape mapping. May contain inline error
    /// markers.
    Columns(IndexMap<String, ColumnShape>),
    /// Open-ended record: the query was dynamic and nothing can be said
    /// about its columns statically.
    Open,
    /// The shape could not be derived at all, e.g. the FROM table does not
    /// exist. Carries the error message.
    Unresolved(String),
}

impl RowShape {
    /// Whether any error is present anywhere in the shape.
    pub fn has_errors(&self) -> bool {
        match self {
            RowShape::Columns(cols) => cols.values().any(ColumnShape::is_error),
            RowShape::Open => false,
            RowShape::Unresolved(_) => true,
        }
    }

    /// The column map, when the shape resolved.
    pub fn columns(&self) -> Option<&IndexMap<String, ColumnShape>> {
        match self {
            RowShape::Columns(cols) => Some(cols),
            _ => None,
        }
    }
}

/// Validation outcome: success, or the first error encountered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    Valid,
    Invalid(String),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    /// The error message, when invalid.
    pub fn message(&self) -> Option<&str> {
        match self {
            Verdict::Valid => None,
            Verdict::Invalid(msg) => Some(msg),
        }
    }
}

impl From<Result<(), String>> for Verdict {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Verdict::Valid,
            Err(msg) => Verdict::Invalid(msg),
        }
    }
}

/// Options controlling validation depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidateOptions {
    /// When true (the default), column references in WHERE / HAVING /
    /// JOIN-ON / GROUP BY / ORDER BY are checked against the context in
    /// addition to the SELECT list and table references.
    pub validate_all_fields: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            validate_all_fields: true,
        }
    }
}

/// The query handed to the analysis entry points.
///
/// `Sql` is the common case: a statically known query string. `Dynamic`
/// is the opt-out for queries assembled at runtime — parse yields
/// [`crate::ast::Statement::Dynamic`], matching yields [`RowShape::Open`],
/// and validation succeeds. That is the contract the caller opted into by
/// not providing an inspectable query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryInput<'a> {
    Sql(&'a str),
    Dynamic,
}

impl<'a> From<&'a str> for QueryInput<'a> {
    fn from(sql: &'a str) -> Self {
        QueryInput::Sql(sql)
    }
}

impl<'a> From<&'a String> for QueryInput<'a> {
    fn from(sql: &'a String) -> Self {
        QueryInput::Sql(sql.as_str())
    }
}
