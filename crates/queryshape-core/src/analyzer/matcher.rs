//! The matcher: walks a parsed statement with a resolution context and
//! produces the row shape the query would return.
//!
//! Resolution failures become inline error markers at the failing column
//! position so the rest of the shape stays inspectable. Only an
//! unresolvable FROM-clause table is fatal, collapsing the whole shape to
//! a standalone error.

use crate::analyzer::context::{
    build_context, build_cte_env, table_columns, Context, CteEnv, SourceColumns,
};
use crate::ast::{
    AggregateArg, AggregateFunc, ColumnExpr, DeleteStatement, InsertStatement, LiteralValue,
    Query, SelectColumns, SelectItem, Statement, UpdateStatement,
};
use crate::catalog::SchemaCatalog;
use crate::expression::cast_target_type;
use crate::types::{ColumnShape, HostType, RowShape};

/// Derives the row shape of a parsed statement.
pub(crate) fn match_statement(stmt: &Statement, catalog: &SchemaCatalog) -> RowShape {
    match stmt {
        Statement::Select(query) => {
            match match_query(query, catalog, &CteEnv::root(), None) {
                Ok(columns) => RowShape::Columns(columns),
                Err(message) => RowShape::Unresolved(message),
            }
        }
        Statement::Insert(stmt) => match_insert(stmt, catalog),
        Statement::Update(stmt) => match_update(stmt, catalog),
        Statement::Delete(stmt) => match_delete(stmt, catalog),
        Statement::Dynamic => RowShape::Open,
    }
}

/// Matches a SELECT-shaped query. A union chain takes the left branch's
/// shape; every branch is still resolved so a fatal error anywhere in
/// the chain surfaces.
pub(crate) fn match_query(
    query: &Query,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
    outer: Option<&Context<'_>>,
) -> Result<SourceColumns, String> {
    match query {
        Query::Select(select) => match_select_columns(select, catalog, ctes, outer),
        Query::Union(union) => {
            let left = match_select_columns(&union.left, catalog, ctes, outer)?;
            // The left arm owns the WITH list; thread it to the right.
            let env = build_cte_env(&union.left.ctes, catalog, ctes)?;
            match_query(&union.right, catalog, &env, outer)?;
            Ok(left)
        }
    }
}

fn match_select_columns(
    select: &crate::ast::SelectClause,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
    outer: Option<&Context<'_>>,
) -> Result<SourceColumns, String> {
    let env = build_cte_env(&select.ctes, catalog, ctes)?;
    let ctx = build_context(select, catalog, &env, outer)?;

    match &select.columns {
        SelectColumns::All => Ok(ctx.flatten()),
        SelectColumns::Items(items) => {
            let mut shape = SourceColumns::new();
            for item in items {
                project_item(item, &ctx, catalog, &env, &mut shape);
            }
            Ok(shape)
        }
    }
}

/// Projects one SELECT item into the shape. Wildcards inline their
/// source's full column map; everything else lands under its alias.
fn project_item(
    item: &SelectItem,
    ctx: &Context<'_>,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
    shape: &mut SourceColumns,
) {
    if let ColumnExpr::TableWildcard { schema, table } = &item.expr {
        match wildcard_columns(schema.as_deref(), table, ctx, catalog, ctes) {
            Ok(columns) => {
                for (name, column) in columns {
                    shape.insert(name, column);
                }
            }
            Err(message) => {
                shape.insert(item.alias.clone(), ColumnShape::Error(message));
            }
        }
        return;
    }
    let column = resolve_column_expr(&item.expr, ctx, catalog, ctes);
    shape.insert(item.alias.clone(), column);
}

/// Resolves a `t.*` / `s.t.*` wildcard to its source's columns.
fn wildcard_columns(
    schema: Option<&str>,
    table: &str,
    ctx: &Context<'_>,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
) -> Result<SourceColumns, String> {
    match schema {
        None => ctx
            .source(table)
            .cloned()
            .ok_or_else(|| format!("Table or alias '{table}' not found")),
        Some(schema) => table_columns(catalog, ctes, Some(schema), table),
    }
}

/// Resolves one column-position expression to a shape entry. This is the
/// single resolution walk both the matcher and the validator build on.
pub(crate) fn resolve_column_expr(
    expr: &ColumnExpr,
    ctx: &Context<'_>,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
) -> ColumnShape {
    match expr {
        ColumnExpr::UnboundColumn { name } => ctx.find_column(name).cloned().unwrap_or_else(|| {
            ColumnShape::Error(format!("Column '{name}' not found in any table"))
        }),

        ColumnExpr::TableColumn {
            schema: Some(schema),
            table,
            column,
        } => match catalog.resolve_table(Some(schema), table) {
            Err(message) => ColumnShape::Error(message),
            Ok(columns) => columns.get(column).map_or_else(
                || {
                    ColumnShape::Error(format!(
                        "Column '{column}' not found in '{schema}.{table}'"
                    ))
                },
                |ty| ColumnShape::Type(ty.clone()),
            ),
        },

        ColumnExpr::TableColumn {
            schema: None,
            table,
            column,
        } => match ctx.source(table) {
            None => ColumnShape::Error(format!("Table or alias '{table}' not found")),
            Some(columns) => columns.get(column).cloned().unwrap_or_else(|| {
                ColumnShape::Error(format!("Column '{column}' not found in '{table}'"))
            }),
        },

        ColumnExpr::TableWildcard { schema, table } => {
            match wildcard_columns(schema.as_deref(), table, ctx, catalog, ctes) {
                Ok(_) => ColumnShape::Type(HostType::Unknown),
                Err(message) => ColumnShape::Error(message),
            }
        }

        ColumnExpr::Complex {
            column_refs,
            cast_type,
        } => {
            for reference in column_refs {
                if let ColumnShape::Error(message) =
                    resolve_column_expr(reference, ctx, catalog, ctes)
                {
                    return ColumnShape::Error(message);
                }
            }
            match cast_type {
                Some(cast) => ColumnShape::Type(cast_target_type(cast)),
                None => ColumnShape::Type(HostType::Unknown),
            }
        }

        ColumnExpr::Subquery { query, cast_type } => {
            let columns = match match_query(query, catalog, ctes, Some(ctx)) {
                Ok(columns) => columns,
                Err(message) => return ColumnShape::Error(message),
            };
            if let Some(cast) = cast_type {
                return ColumnShape::Type(cast_target_type(cast));
            }
            match columns.values().next() {
                None => ColumnShape::Type(HostType::Unknown),
                Some(ColumnShape::Error(message)) => ColumnShape::Error(message.clone()),
                Some(ColumnShape::Type(ty)) => ColumnShape::Type(ty.clone()),
            }
        }

        ColumnExpr::Aggregate { func, arg } => resolve_aggregate(*func, arg, ctx, catalog, ctes),

        ColumnExpr::Literal { value } => ColumnShape::Type(match value {
            LiteralValue::String(text) => HostType::Literal(text.clone()),
            LiteralValue::Number(_) => HostType::Number,
            LiteralValue::Boolean(_) => HostType::Boolean,
            LiteralValue::Null => HostType::Null,
        }),

        ColumnExpr::Constant { .. } => ColumnShape::Type(HostType::String),

        ColumnExpr::Exists { query, .. } => match match_query(query, catalog, ctes, Some(ctx)) {
            Ok(_) => ColumnShape::Type(HostType::Boolean),
            Err(message) => ColumnShape::Error(message),
        },

        ColumnExpr::Interval { .. } => ColumnShape::Type(HostType::String),
    }
}

/// Aggregate typing: COUNT is numeric regardless of its argument,
/// SUM/AVG demand a numeric column, MIN/MAX propagate the argument type.
fn resolve_aggregate(
    func: AggregateFunc,
    arg: &AggregateArg,
    ctx: &Context<'_>,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
) -> ColumnShape {
    match func {
        AggregateFunc::Count => ColumnShape::Type(HostType::Number),
        AggregateFunc::Sum | AggregateFunc::Avg => match arg {
            AggregateArg::Star => {
                ColumnShape::Error("SUM/AVG requires numeric column".to_string())
            }
            AggregateArg::Column(reference) => {
                match resolve_column_expr(reference, ctx, catalog, ctes) {
                    ColumnShape::Error(message) => ColumnShape::Error(message),
                    ColumnShape::Type(ty) if ty.is_numeric() => {
                        ColumnShape::Type(HostType::Number)
                    }
                    ColumnShape::Type(_) => {
                        ColumnShape::Error("SUM/AVG requires numeric column".to_string())
                    }
                }
            }
        },
        AggregateFunc::Min | AggregateFunc::Max => match arg {
            AggregateArg::Star => ColumnShape::Type(HostType::Unknown),
            AggregateArg::Column(reference) => {
                resolve_column_expr(reference, ctx, catalog, ctes)
            }
        },
    }
}

// --- DML shapes ---
//
// A statement without RETURNING produces an empty shape; RETURNING runs
// the same projection walk against the statement's own context.

fn match_insert(stmt: &InsertStatement, catalog: &SchemaCatalog) -> RowShape {
    let env = CteEnv::root();
    let target = match table_columns(catalog, &env, stmt.schema.as_deref(), &stmt.table) {
        Ok(columns) => columns,
        Err(message) => return RowShape::Unresolved(message),
    };
    let mut ctx = Context::root();
    ctx.insert_source(stmt.table.clone(), target);
    returning_shape(stmt.returning.as_ref(), &stmt.table, &ctx, catalog, &env)
}

fn match_update(stmt: &UpdateStatement, catalog: &SchemaCatalog) -> RowShape {
    let env = CteEnv::root();
    let mut ctx = Context::root();
    match table_columns(catalog, &env, stmt.table.schema.as_deref(), &stmt.table.table) {
        Ok(columns) => ctx.insert_source(stmt.table.alias.clone(), columns),
        Err(message) => return RowShape::Unresolved(message),
    }
    if let Some(from) = &stmt.from {
        match crate::analyzer::context::resolve_source(from, catalog, &env) {
            Ok(columns) => ctx.insert_source(from.alias().to_string(), columns),
            Err(message) => return RowShape::Unresolved(message),
        }
    }
    returning_shape(
        stmt.returning.as_ref(),
        &stmt.table.alias,
        &ctx,
        catalog,
        &env,
    )
}

fn match_delete(stmt: &DeleteStatement, catalog: &SchemaCatalog) -> RowShape {
    let env = CteEnv::root();
    let mut ctx = Context::root();
    match table_columns(catalog, &env, stmt.table.schema.as_deref(), &stmt.table.table) {
        Ok(columns) => ctx.insert_source(stmt.table.alias.clone(), columns),
        Err(message) => return RowShape::Unresolved(message),
    }
    if let Some(using) = &stmt.using {
        match crate::analyzer::context::resolve_source(using, catalog, &env) {
            Ok(columns) => ctx.insert_source(using.alias().to_string(), columns),
            Err(message) => return RowShape::Unresolved(message),
        }
    }
    returning_shape(
        stmt.returning.as_ref(),
        &stmt.table.alias,
        &ctx,
        catalog,
        &env,
    )
}

fn returning_shape(
    returning: Option<&SelectColumns>,
    target_alias: &str,
    ctx: &Context<'_>,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
) -> RowShape {
    match returning {
        None => RowShape::Columns(SourceColumns::new()),
        Some(SelectColumns::All) => RowShape::Columns(ctx.flatten()),
        Some(SelectColumns::Items(items)) => {
            let mut shape = SourceColumns::new();
            for item in items {
                let rewritten = rewrite_old_new(&item.expr, target_alias);
                let item = SelectItem {
                    expr: rewritten,
                    alias: item.alias.clone(),
                };
                project_item(&item, ctx, catalog, ctes, &mut shape);
            }
            RowShape::Columns(shape)
        }
    }
}

/// RETURNING may qualify columns with `OLD` / `NEW`; both resolve to the
/// target table's row shape.
pub(crate) fn rewrite_old_new(expr: &ColumnExpr, target_alias: &str) -> ColumnExpr {
    match expr {
        ColumnExpr::TableColumn {
            schema: None,
            table,
            column,
        } if is_old_new(table) => ColumnExpr::TableColumn {
            schema: None,
            table: target_alias.to_string(),
            column: column.clone(),
        },
        ColumnExpr::TableWildcard {
            schema: None,
            table,
        } if is_old_new(table) => ColumnExpr::TableWildcard {
            schema: None,
            table: target_alias.to_string(),
        },
        ColumnExpr::Complex {
            column_refs,
            cast_type,
        } => ColumnExpr::Complex {
            column_refs: column_refs
                .iter()
                .map(|reference| rewrite_old_new(reference, target_alias))
                .collect(),
            cast_type: cast_type.clone(),
        },
        other => other.clone(),
    }
}

fn is_old_new(table: &str) -> bool {
    table.eq_ignore_ascii_case("old") || table.eq_ignore_ascii_case("new")
}
