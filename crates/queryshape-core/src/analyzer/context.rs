//! Resolution contexts: the flat alias → columns dictionary built once
//! per SELECT, and the CTE environment layered over the catalog.
//!
//! Joins do not build a linked scope; they extend a single dictionary,
//! with duplicate aliases shadowing in parse order. Outer correlation for
//! scalar subqueries is a parent pointer: outer aliases stay visible and
//! inner aliases shadow them.

use indexmap::IndexMap;

use crate::analyzer::matcher;
use crate::ast::{CteDefinition, SelectClause, TableSource};
use crate::catalog::SchemaCatalog;
use crate::types::ColumnShape;

/// Ordered column → shape mapping for one resolved source. Shapes carry
/// inline error markers through from CTE and derived-table bodies.
pub(crate) type SourceColumns = IndexMap<String, ColumnShape>;

/// The alias → columns dictionary for one SELECT, chained to the
/// enclosing query's context for correlation.
pub(crate) struct Context<'a> {
    sources: IndexMap<String, SourceColumns>,
    parent: Option<&'a Context<'a>>,
}

impl<'a> Context<'a> {
    pub(crate) fn root() -> Self {
        Self {
            sources: IndexMap::new(),
            parent: None,
        }
    }

    pub(crate) fn with_parent(parent: Option<&'a Context<'a>>) -> Self {
        Self {
            sources: IndexMap::new(),
            parent,
        }
    }

    /// Registers a source under its alias. A repeated alias shadows the
    /// earlier source.
    pub(crate) fn insert_source(&mut self, alias: String, columns: SourceColumns) {
        self.sources.insert(alias, columns);
    }

    /// Looks up a source by alias, walking outward through enclosing
    /// contexts.
    pub(crate) fn source(&self, alias: &str) -> Option<&SourceColumns> {
        self.sources
            .get(alias)
            .or_else(|| self.parent.and_then(|parent| parent.source(alias)))
    }

    /// Resolves an unqualified column by linear search over sources in
    /// declaration order; the first match wins. Falls back to enclosing
    /// contexts.
    pub(crate) fn find_column(&self, name: &str) -> Option<&ColumnShape> {
        for columns in self.sources.values() {
            if let Some(shape) = columns.get(name) {
                return Some(shape);
            }
        }
        self.parent.and_then(|parent| parent.find_column(name))
    }

    /// Flattens this level's sources for `SELECT *`: the union of all
    /// columns in declaration order, duplicates overwritten left to
    /// right. Enclosing contexts do not participate.
    pub(crate) fn flatten(&self) -> SourceColumns {
        let mut out = SourceColumns::new();
        for columns in self.sources.values() {
            for (name, shape) in columns {
                out.insert(name.clone(), shape.clone());
            }
        }
        out
    }
}

/// The CTE namespace: WITH-bound names resolved before the catalog, with
/// later lists shadowing outer ones.
pub(crate) struct CteEnv<'a> {
    entries: IndexMap<String, SourceColumns>,
    parent: Option<&'a CteEnv<'a>>,
}

impl<'a> CteEnv<'a> {
    pub(crate) fn root() -> Self {
        Self {
            entries: IndexMap::new(),
            parent: None,
        }
    }

    /// A new empty layer over this environment.
    pub(crate) fn child(&'a self) -> CteEnv<'a> {
        Self {
            entries: IndexMap::new(),
            parent: Some(self),
        }
    }

    pub(crate) fn insert(&mut self, name: String, columns: SourceColumns) {
        self.entries.insert(name, columns);
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&SourceColumns> {
        self.entries
            .get(name)
            .or_else(|| self.parent.and_then(|parent| parent.lookup(name)))
    }
}

/// Resolves a table name to its columns: CTEs first (only for
/// unqualified names), then the catalog. Errors are the fixed message
/// templates.
pub(crate) fn table_columns(
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
    schema: Option<&str>,
    table: &str,
) -> Result<SourceColumns, String> {
    if schema.is_none() {
        if let Some(columns) = ctes.lookup(table) {
            return Ok(columns.clone());
        }
    }
    let columns = catalog.resolve_table(schema, table)?;
    Ok(columns
        .iter()
        .map(|(name, ty)| (name.clone(), ColumnShape::Type(ty.clone())))
        .collect())
}

/// Resolves one FROM/JOIN source to its columns. Derived tables build
/// their own inner context; they see the CTE environment but not the
/// enclosing aliases.
pub(crate) fn resolve_source(
    source: &TableSource,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
) -> Result<SourceColumns, String> {
    match source {
        TableSource::Table(table) => {
            table_columns(catalog, ctes, table.schema.as_deref(), &table.table)
        }
        TableSource::Derived { query, .. } => matcher::match_query(query, catalog, ctes, None),
    }
}

/// Resolves a WITH list in declaration order; each CTE sees the catalog
/// plus the CTEs declared before it.
pub(crate) fn build_cte_env<'p>(
    ctes: &[CteDefinition],
    catalog: &SchemaCatalog,
    parent: &'p CteEnv<'p>,
) -> Result<CteEnv<'p>, String> {
    let mut env = parent.child();
    for cte in ctes {
        let shape = matcher::match_query(&cte.query, catalog, &env, None)?;
        env.insert(cte.name.clone(), shape);
    }
    Ok(env)
}

/// Builds the alias → columns context for one SELECT: the FROM source,
/// then each JOIN source, shadowing in parse order.
pub(crate) fn build_context<'o>(
    select: &SelectClause,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
    outer: Option<&'o Context<'o>>,
) -> Result<Context<'o>, String> {
    let mut ctx = Context::with_parent(outer);
    let columns = resolve_source(&select.from, catalog, ctes)?;
    ctx.insert_source(select.from.alias().to_string(), columns);
    for join in &select.joins {
        let columns = resolve_source(&join.table, catalog, ctes)?;
        ctx.insert_source(join.table.alias().to_string(), columns);
    }
    Ok(ctx)
}
