//! The validator: the same resolution walk as the matcher under a
//! stricter policy — the first error aborts and becomes the verdict.
//!
//! The error order is deterministic by traversal: CTE bodies, then FROM
//! tables, then JOIN tables, then the SELECT list, then (when
//! `validate_all_fields` is on) JOIN-ON, WHERE, GROUP BY, HAVING, and
//! ORDER BY references.

use crate::analyzer::context::{table_columns, Context, CteEnv, SourceColumns};
use crate::analyzer::matcher::{self, resolve_column_expr, rewrite_old_new};
use crate::ast::{
    AggregateArg, AggregateFunc, ColumnExpr, ConflictAction, DeleteStatement, InsertSource,
    InsertStatement, ParsedCondition, Query, SelectClause, SelectColumns, Statement, TableSource,
    UpdateStatement,
};
use crate::catalog::SchemaCatalog;
use crate::types::{ColumnShape, ValidateOptions, Verdict};

/// Validates a parsed statement against the catalog.
pub(crate) fn validate_statement(
    stmt: &Statement,
    catalog: &SchemaCatalog,
    options: &ValidateOptions,
) -> Verdict {
    let result = match stmt {
        Statement::Select(query) => {
            validate_query(query, catalog, &CteEnv::root(), None, options)
        }
        Statement::Insert(stmt) => validate_insert(stmt, catalog, options),
        Statement::Update(stmt) => validate_update(stmt, catalog, options),
        Statement::Delete(stmt) => validate_delete(stmt, catalog, options),
        Statement::Dynamic => Ok(()),
    };
    result.into()
}

/// Validates a SELECT-shaped query; every branch of a union chain is
/// checked.
pub(crate) fn validate_query(
    query: &Query,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
    outer: Option<&Context<'_>>,
    options: &ValidateOptions,
) -> Result<(), String> {
    match query {
        Query::Select(select) => validate_select(select, catalog, ctes, outer, options),
        Query::Union(union) => {
            validate_select(&union.left, catalog, ctes, outer, options)?;
            let env = crate::analyzer::context::build_cte_env(&union.left.ctes, catalog, ctes)?;
            validate_query(&union.right, catalog, &env, outer, options)
        }
    }
}

fn validate_select(
    select: &SelectClause,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
    outer: Option<&Context<'_>>,
    options: &ValidateOptions,
) -> Result<(), String> {
    // CTE bodies in declaration order; each sees its predecessors.
    let mut env = ctes.child();
    for cte in &select.ctes {
        validate_query(&cte.query, catalog, &env, None, options)?;
        let shape = matcher::match_query(&cte.query, catalog, &env, None)?;
        env.insert(cte.name.clone(), shape);
    }

    // FROM first, then each JOIN, validating derived bodies in place.
    let mut ctx = Context::with_parent(outer);
    let columns = validated_source(&select.from, catalog, &env, options)?;
    ctx.insert_source(select.from.alias().to_string(), columns);
    for join in &select.joins {
        let columns = validated_source(&join.table, catalog, &env, options)?;
        ctx.insert_source(join.table.alias().to_string(), columns);
    }

    // The SELECT list.
    if let SelectColumns::Items(items) = &select.columns {
        for item in items {
            validate_expr(&item.expr, &ctx, catalog, &env, options)?;
        }
    }

    if !options.validate_all_fields {
        return Ok(());
    }

    for join in &select.joins {
        if let Some(on) = &join.on {
            validate_condition(on, &ctx, catalog, &env, options)?;
        }
    }
    if let Some(where_clause) = &select.where_clause {
        validate_condition(where_clause, &ctx, catalog, &env, options)?;
    }
    for expr in &select.group_by {
        validate_expr(expr, &ctx, catalog, &env, options)?;
    }
    if let Some(having) = &select.having {
        validate_condition(having, &ctx, catalog, &env, options)?;
    }
    for item in &select.order_by {
        validate_expr(&item.expr, &ctx, catalog, &env, options)?;
    }

    Ok(())
}

/// Resolves a FROM/JOIN source, fully validating a derived table's body
/// before taking its shape.
fn validated_source(
    source: &TableSource,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
    options: &ValidateOptions,
) -> Result<SourceColumns, String> {
    match source {
        TableSource::Table(table) => {
            table_columns(catalog, ctes, table.schema.as_deref(), &table.table)
        }
        TableSource::Derived { query, .. } => {
            validate_query(query, catalog, ctes, None, options)?;
            matcher::match_query(query, catalog, ctes, None)
        }
    }
}

fn validate_condition(
    condition: &ParsedCondition,
    ctx: &Context<'_>,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
    options: &ValidateOptions,
) -> Result<(), String> {
    for reference in &condition.column_refs {
        validate_expr(reference, ctx, catalog, ctes, options)?;
    }
    Ok(())
}

/// Validates one column-position expression, descending into subqueries.
fn validate_expr(
    expr: &ColumnExpr,
    ctx: &Context<'_>,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
    options: &ValidateOptions,
) -> Result<(), String> {
    match expr {
        ColumnExpr::Literal { .. }
        | ColumnExpr::Constant { .. }
        | ColumnExpr::Interval { .. } => Ok(()),

        ColumnExpr::Subquery { query, .. } | ColumnExpr::Exists { query, .. } => {
            validate_query(query, catalog, ctes, Some(ctx), options)
        }

        ColumnExpr::Complex { column_refs, .. } => {
            for reference in column_refs {
                validate_expr(reference, ctx, catalog, ctes, options)?;
            }
            Ok(())
        }

        ColumnExpr::Aggregate { func, arg } => match (func, arg) {
            // COUNT accepts anything, including unresolvable columns.
            (AggregateFunc::Count, _) => Ok(()),
            (_, AggregateArg::Star)
                if matches!(func, AggregateFunc::Min | AggregateFunc::Max) =>
            {
                Ok(())
            }
            _ => shape_to_result(resolve_column_expr(expr, ctx, catalog, ctes)),
        },

        _ => shape_to_result(resolve_column_expr(expr, ctx, catalog, ctes)),
    }
}

fn shape_to_result(shape: ColumnShape) -> Result<(), String> {
    match shape {
        ColumnShape::Type(_) => Ok(()),
        ColumnShape::Error(message) => Err(message),
    }
}

// --- DML validation ---

fn validate_insert(
    stmt: &InsertStatement,
    catalog: &SchemaCatalog,
    options: &ValidateOptions,
) -> Result<(), String> {
    let env = CteEnv::root();
    let target = table_columns(catalog, &env, stmt.schema.as_deref(), &stmt.table)?;

    for column in &stmt.columns {
        if !target.contains_key(column) {
            return Err(format!(
                "Column '{column}' not found in '{}'",
                stmt.table
            ));
        }
    }
    let expected = if stmt.columns.is_empty() {
        target.len()
    } else {
        stmt.columns.len()
    };

    let mut ctx = Context::root();
    ctx.insert_source(stmt.table.clone(), target.clone());

    match &stmt.source {
        InsertSource::Values(tuples) => {
            for tuple in tuples {
                if tuple.len() != expected {
                    return Err(format!(
                        "Value count ({}) does not match column count ({expected})",
                        tuple.len()
                    ));
                }
            }
            if options.validate_all_fields {
                // VALUES expressions cannot reference table columns; any
                // captured reference is an unresolvable name.
                let empty = Context::root();
                for tuple in tuples {
                    for value in tuple {
                        validate_expr(value, &empty, catalog, &env, options)?;
                    }
                }
            }
        }
        InsertSource::Select(query) => {
            validate_query(query, catalog, &env, None, options)?;
            if let SelectColumns::Items(items) = &query.leftmost_select().columns {
                if !stmt.columns.is_empty() && items.len() != expected {
                    return Err(format!(
                        "Value count ({}) does not match column count ({expected})",
                        items.len()
                    ));
                }
            }
        }
    }

    if let Some(conflict) = &stmt.on_conflict {
        for column in &conflict.target {
            if !target.contains_key(column) {
                return Err(format!(
                    "Column '{column}' not found in '{}'",
                    stmt.table
                ));
            }
        }
        if let ConflictAction::DoUpdate(assignments) = &conflict.action {
            // The conflict SET list may address the incoming row as
            // `excluded`.
            let mut conflict_ctx = Context::root();
            conflict_ctx.insert_source(stmt.table.clone(), target.clone());
            conflict_ctx.insert_source("excluded".to_string(), target.clone());
            for assignment in assignments {
                if !target.contains_key(&assignment.column) {
                    return Err(format!(
                        "Column '{}' not found in '{}'",
                        assignment.column, stmt.table
                    ));
                }
                if options.validate_all_fields {
                    validate_condition(
                        &assignment.value,
                        &conflict_ctx,
                        catalog,
                        &env,
                        options,
                    )?;
                }
            }
            if options.validate_all_fields {
                if let Some(where_clause) = &conflict.where_clause {
                    validate_condition(where_clause, &conflict_ctx, catalog, &env, options)?;
                }
            }
        }
    }

    validate_returning(stmt.returning.as_ref(), &stmt.table, &ctx, catalog, &env, options)
}

fn validate_update(
    stmt: &UpdateStatement,
    catalog: &SchemaCatalog,
    options: &ValidateOptions,
) -> Result<(), String> {
    let env = CteEnv::root();
    let target = table_columns(
        catalog,
        &env,
        stmt.table.schema.as_deref(),
        &stmt.table.table,
    )?;

    let mut ctx = Context::root();
    ctx.insert_source(stmt.table.alias.clone(), target.clone());
    if let Some(from) = &stmt.from {
        let columns = validated_source(from, catalog, &env, options)?;
        ctx.insert_source(from.alias().to_string(), columns);
    }

    for assignment in &stmt.assignments {
        if !target.contains_key(&assignment.column) {
            return Err(format!(
                "Column '{}' not found in '{}'",
                assignment.column, stmt.table.alias
            ));
        }
        if options.validate_all_fields {
            validate_condition(&assignment.value, &ctx, catalog, &env, options)?;
        }
    }

    if options.validate_all_fields {
        if let Some(where_clause) = &stmt.where_clause {
            validate_condition(where_clause, &ctx, catalog, &env, options)?;
        }
    }

    validate_returning(
        stmt.returning.as_ref(),
        &stmt.table.alias,
        &ctx,
        catalog,
        &env,
        options,
    )
}

fn validate_delete(
    stmt: &DeleteStatement,
    catalog: &SchemaCatalog,
    options: &ValidateOptions,
) -> Result<(), String> {
    let env = CteEnv::root();
    let target = table_columns(
        catalog,
        &env,
        stmt.table.schema.as_deref(),
        &stmt.table.table,
    )?;

    let mut ctx = Context::root();
    ctx.insert_source(stmt.table.alias.clone(), target);
    if let Some(using) = &stmt.using {
        let columns = validated_source(using, catalog, &env, options)?;
        ctx.insert_source(using.alias().to_string(), columns);
    }

    if options.validate_all_fields {
        if let Some(where_clause) = &stmt.where_clause {
            validate_condition(where_clause, &ctx, catalog, &env, options)?;
        }
    }

    validate_returning(
        stmt.returning.as_ref(),
        &stmt.table.alias,
        &ctx,
        catalog,
        &env,
        options,
    )
}

fn validate_returning(
    returning: Option<&SelectColumns>,
    target_alias: &str,
    ctx: &Context<'_>,
    catalog: &SchemaCatalog,
    ctes: &CteEnv<'_>,
    options: &ValidateOptions,
) -> Result<(), String> {
    match returning {
        None | Some(SelectColumns::All) => Ok(()),
        Some(SelectColumns::Items(items)) => {
            for item in items {
                let rewritten = rewrite_old_new(&item.expr, target_alias);
                validate_expr(&rewritten, ctx, catalog, ctes, options)?;
            }
            Ok(())
        }
    }
}
