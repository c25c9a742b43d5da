//! The AST vocabulary: the closed set of node shapes every later stage
//! consumes and produces.
//!
//! The tree is a tagged-variant structure built bottom-up by the parsers;
//! references are purely downward (parent to child, owning boxes) and
//! nothing is mutated after construction. Serialization tags every node
//! with a `kind` discriminator for tooling.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A column-position expression: the one alternative every later stage
/// enumerates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ColumnExpr {
    /// A bare column name: `col`.
    #[serde(rename_all = "camelCase")]
    UnboundColumn { name: String },
    /// A qualified reference: `t.c` or `s.t.c`. `table` may be either a
    /// real table name or an alias declared in the same query.
    #[serde(rename_all = "camelCase")]
    TableColumn {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<String>,
        table: String,
        column: String,
    },
    /// `t.*` or `s.t.*`.
    #[serde(rename_all = "camelCase")]
    TableWildcard {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<String>,
        table: String,
    },
    /// Any expression the recognizer could not simplify. The inner column
    /// references are retained for validation; `cast_type`, when present,
    /// overrides the result type.
    #[serde(rename_all = "camelCase")]
    Complex {
        column_refs: Vec<ColumnExpr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cast_type: Option<String>,
    },
    /// A parenthesized SELECT used as a scalar column.
    #[serde(rename_all = "camelCase")]
    Subquery {
        query: Box<Query>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cast_type: Option<String>,
    },
    /// `COUNT(*)`, `SUM(col)`, …
    #[serde(rename_all = "camelCase")]
    Aggregate {
        func: AggregateFunc,
        arg: AggregateArg,
    },
    /// A bare literal value.
    #[serde(rename_all = "camelCase")]
    Literal { value: LiteralValue },
    /// A parameterless SQL constant such as `CURRENT_DATE`.
    #[serde(rename_all = "camelCase")]
    Constant { name: SqlConstant },
    /// `[NOT] EXISTS (SELECT …)`.
    #[serde(rename_all = "camelCase")]
    Exists { query: Box<Query>, negated: bool },
    /// `INTERVAL '…'`.
    #[serde(rename_all = "camelCase")]
    Interval { value: String },
}

/// The aggregate functions the parser recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(Self::Count),
            "SUM" => Some(Self::Sum),
            "AVG" => Some(Self::Avg),
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            _ => None,
        }
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        };
        f.write_str(name)
    }
}

/// An aggregate's argument: `*` or a column reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum AggregateArg {
    Star,
    Column(Box<ColumnExpr>),
}

/// A literal value in a column position. Numbers keep their source
/// lexeme; nothing downstream evaluates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum LiteralValue {
    String(String),
    Number(String),
    Boolean(bool),
    Null,
}

/// The parameterless SQL constants with a fixed result type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlConstant {
    CurrentDate,
    CurrentTimestamp,
    CurrentTime,
    Localtime,
    Localtimestamp,
    CurrentUser,
    SessionUser,
    CurrentSchema,
    CurrentCatalog,
    CurrentRole,
}

impl SqlConstant {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "CURRENT_DATE" => Some(Self::CurrentDate),
            "CURRENT_TIMESTAMP" => Some(Self::CurrentTimestamp),
            "CURRENT_TIME" => Some(Self::CurrentTime),
            "LOCALTIME" => Some(Self::Localtime),
            "LOCALTIMESTAMP" => Some(Self::Localtimestamp),
            "CURRENT_USER" => Some(Self::CurrentUser),
            "SESSION_USER" => Some(Self::SessionUser),
            "CURRENT_SCHEMA" => Some(Self::CurrentSchema),
            "CURRENT_CATALOG" => Some(Self::CurrentCatalog),
            "CURRENT_ROLE" => Some(Self::CurrentRole),
            _ => None,
        }
    }

    /// The constant's lowercased SQL name, used as its default alias.
    pub(crate) fn lower_name(&self) -> &'static str {
        match self {
            Self::CurrentDate => "current_date",
            Self::CurrentTimestamp => "current_timestamp",
            Self::CurrentTime => "current_time",
            Self::Localtime => "localtime",
            Self::Localtimestamp => "localtimestamp",
            Self::CurrentUser => "current_user",
            Self::SessionUser => "session_user",
            Self::CurrentSchema => "current_schema",
            Self::CurrentCatalog => "current_catalog",
            Self::CurrentRole => "current_role",
        }
    }
}

/// One projected item: a column expression plus its output alias.
/// Aliases are mandatory in the AST; unaliased items carry a derived one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectItem {
    pub expr: ColumnExpr,
    pub alias: String,
}

/// The projected column list: the literal `*` or an ordered item list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum SelectColumns {
    All,
    Items(Vec<SelectItem>),
}

/// A plain table reference. The alias defaults to the table name when the
/// query declares none, so it is always the table's key in the resolution
/// context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
    pub alias: String,
}

/// A FROM/JOIN source: a table or a parenthesized SELECT. Derived tables
/// must declare an alias; the parser rejects them otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TableSource {
    Table(TableRef),
    #[serde(rename_all = "camelCase")]
    Derived { query: Box<Query>, alias: String },
}

impl TableSource {
    /// The alias under which this source appears in the context.
    pub fn alias(&self) -> &str {
        match self {
            TableSource::Table(table) => &table.alias,
            TableSource::Derived { alias, .. } => alias,
        }
    }
}

/// A WITH-bound name carrying its own query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CteDefinition {
    pub name: String,
    pub query: Box<Query>,
}

/// Join flavor. A plain `JOIN` parses as `Inner`; `CROSS JOIN` forbids an
/// ON condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    LeftOuter,
    RightOuter,
    FullOuter,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Full => "FULL",
            Self::Cross => "CROSS",
            Self::LeftOuter => "LEFT OUTER",
            Self::RightOuter => "RIGHT OUTER",
            Self::FullOuter => "FULL OUTER",
        };
        f.write_str(name)
    }
}

/// A WHERE / HAVING / ON body reduced to its column references. The full
/// boolean structure is discarded; no downstream stage needs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCondition {
    pub column_refs: Vec<ColumnExpr>,
}

/// One JOIN clause in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: TableSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<ParsedCondition>,
}

/// Sort direction for an ORDER BY item. ASC is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderByItem {
    pub expr: ColumnExpr,
    pub direction: OrderDirection,
}

/// A parsed SELECT body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectClause {
    pub distinct: bool,
    pub columns: SelectColumns,
    pub from: TableSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<JoinClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<ParsedCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<ColumnExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub having: Option<ParsedCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderByItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// CTEs in declaration order. On a union chain these live on the
    /// leftmost SELECT and the analyzer threads them to every branch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ctes: Vec<CteDefinition>,
}

/// A UNION / INTERSECT / EXCEPT pair; chains lean right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnionClause {
    pub left: Box<SelectClause>,
    pub operator: SetOperator,
    pub right: Box<Query>,
}

/// The set operators chaining SELECT bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
}

/// A SELECT-shaped query: a single body or a set-operator chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Query {
    Select(SelectClause),
    Union(UnionClause),
}

impl Query {
    /// The leftmost SELECT of the query, which owns the CTE list and
    /// nominates the row shape of a union chain.
    pub fn leftmost_select(&self) -> &SelectClause {
        match self {
            Query::Select(select) => select,
            Query::Union(union) => &union.left,
        }
    }
}

/// A SET assignment in UPDATE or ON CONFLICT DO UPDATE. The value
/// expression is kept as its column references only, like conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub column: String,
    pub value: ParsedCondition,
}

/// The data fed to an INSERT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum InsertSource {
    /// One or more VALUES tuples.
    Values(Vec<Vec<ColumnExpr>>),
    /// `INSERT INTO … SELECT …`.
    Select(Box<Query>),
}

/// `ON CONFLICT` handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnConflict {
    /// The conflict target column list, possibly empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<String>,
    pub action: ConflictAction,
    /// The optional WHERE guard on a DO UPDATE action, reduced to its
    /// column references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<ParsedCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ConflictAction {
    DoNothing,
    DoUpdate(Vec<Assignment>),
}

/// A parsed INSERT statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertStatement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
    /// The declared column list; empty when the statement omits it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    pub source: InsertSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_conflict: Option<OnConflict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returning: Option<SelectColumns>,
}

/// A parsed UPDATE statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatement {
    pub table: TableRef,
    pub assignments: Vec<Assignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<TableSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<ParsedCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returning: Option<SelectColumns>,
}

/// A parsed DELETE statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteStatement {
    pub table: TableRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using: Option<TableSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<ParsedCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returning: Option<SelectColumns>,
}

/// A parsed statement, or the dynamic-query marker for runtime-assembled
/// queries the analyzer cannot inspect.
///
/// Externally tagged: the statement kind is the single top-level key
/// (`Query` carries its own `kind` tag, so an internal tag would
/// collide).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Statement {
    Select(Query),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Dynamic,
}
