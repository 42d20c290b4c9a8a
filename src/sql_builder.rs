use std::collections::BTreeSet;

use serde_json::Value;

use crate::dialect::Dialect;
use crate::error::{HtnqlError, Result};
use crate::report_spec::{FilterOp, FilterSpec, ReportSpec};
use crate::state::JoinEdge;

/// A rendered statement plus its bound values, in placeholder order. Filter
/// values never appear literally in the SQL text.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltSql {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Emit the auto-mode SELECT: group-by columns and metrics over the join
/// forest, rooted at the lexicographically first inferred table.
pub fn build_auto_sql(
    spec: &ReportSpec,
    tables: &BTreeSet<String>,
    forest: &[JoinEdge],
    dialect: &dyn Dialect,
) -> Result<BuiltSql> {
    let root = tables.iter().next().ok_or_else(|| {
        HtnqlError::Spec("cannot build SQL without at least one inferred table".to_string())
    })?;

    let mut sql = format!(
        "SELECT {} FROM {}",
        render_select_list(spec, dialect)?,
        dialect.quote_ident(root)
    );
    for clause in render_joins(root, tables, forest, dialect)? {
        sql.push(' ');
        sql.push_str(&clause);
    }

    let mut params = Vec::new();
    finish_statement(&mut sql, &mut params, spec, dialect)?;
    Ok(BuiltSql { sql, params })
}

/// Emit the base-mode scaffold: metrics and filters over `(<base_sql>)
/// __base__`, no join planning.
pub fn build_base_sql(
    spec: &ReportSpec,
    base_sql: &str,
    dialect: &dyn Dialect,
) -> Result<BuiltSql> {
    let mut sql = format!(
        "SELECT {} FROM ({}) __base__",
        render_select_list(spec, dialect)?,
        base_sql
    );
    let mut params = Vec::new();
    finish_statement(&mut sql, &mut params, spec, dialect)?;
    Ok(BuiltSql { sql, params })
}

fn finish_statement(
    sql: &mut String,
    params: &mut Vec<Value>,
    spec: &ReportSpec,
    dialect: &dyn Dialect,
) -> Result<()> {
    if !spec.filters.is_empty() {
        let mut predicates = Vec::with_capacity(spec.filters.len());
        for filter in &spec.filters {
            predicates.push(render_filter(filter, params, dialect)?);
        }
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
    if !spec.group_by.is_empty() {
        let groups: Vec<String> = spec
            .group_by
            .iter()
            .map(|g| quote_column_ref(g, dialect))
            .collect();
        sql.push_str(" GROUP BY ");
        sql.push_str(&groups.join(", "));
    }
    if let Some(limit) = spec.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok(())
}

fn render_select_list(spec: &ReportSpec, dialect: &dyn Dialect) -> Result<String> {
    let mut items: Vec<String> = spec
        .group_by
        .iter()
        .map(|g| quote_column_ref(g, dialect))
        .collect();
    for metric in &spec.metrics {
        items.push(format!(
            "{} AS {}",
            metric.expr,
            quote_alias(&metric.alias, dialect)
        ));
    }
    if items.is_empty() {
        return Err(HtnqlError::Spec(format!(
            "report {} selects no columns and no metrics",
            spec.name
        )));
    }
    Ok(items.join(", "))
}

/// Walk the forest from the root, emitting one INNER JOIN per edge that
/// attaches a new table. Edges whose tables are both already present are
/// elided so each table appears exactly once.
fn render_joins(
    root: &str,
    tables: &BTreeSet<String>,
    forest: &[JoinEdge],
    dialect: &dyn Dialect,
) -> Result<Vec<String>> {
    let mut joined: BTreeSet<&str> = BTreeSet::new();
    joined.insert(root);

    let mut clauses = Vec::new();
    let mut pending: Vec<&JoinEdge> = forest.iter().collect();
    while !pending.is_empty() {
        let mut progressed = false;
        pending.retain(|edge| {
            let has_left = joined.contains(edge.left_table.as_str());
            let has_right = joined.contains(edge.right_table.as_str());
            match (has_left, has_right) {
                (true, true) => {
                    progressed = true;
                    false
                }
                (true, false) | (false, true) => {
                    let new_table = if has_left {
                        edge.right_table.as_str()
                    } else {
                        edge.left_table.as_str()
                    };
                    joined.insert(new_table);
                    clauses.push(format!(
                        "INNER JOIN {} ON {}.{} = {}.{}",
                        dialect.quote_ident(new_table),
                        dialect.quote_ident(&edge.left_table),
                        dialect.quote_ident(&edge.left_column),
                        dialect.quote_ident(&edge.right_table),
                        dialect.quote_ident(&edge.right_column)
                    ));
                    progressed = true;
                    false
                }
                (false, false) => true,
            }
        });
        if !progressed {
            let table = pending
                .first()
                .map(|e| e.left_table.clone())
                .unwrap_or_default();
            return Err(HtnqlError::Join {
                table,
                message: "join edge does not attach to the query".to_string(),
            });
        }
    }

    // Every inferred table must have been reached by the walk.
    if let Some(missing) = tables.iter().find(|t| !joined.contains(t.as_str())) {
        return Err(HtnqlError::Join {
            table: missing.clone(),
            message: "table is not covered by the join forest".to_string(),
        });
    }
    Ok(clauses)
}

fn render_filter(
    filter: &FilterSpec,
    params: &mut Vec<Value>,
    dialect: &dyn Dialect,
) -> Result<String> {
    let column = quote_column_ref(&filter.column, dialect);
    match filter.op {
        FilterOp::In => {
            let Value::Array(values) = &filter.value else {
                return Err(HtnqlError::Spec(format!(
                    "IN filter on {} requires a list value",
                    filter.column
                )));
            };
            if values.is_empty() {
                return Err(HtnqlError::Spec(format!(
                    "IN filter on {} has an empty value list",
                    filter.column
                )));
            }
            let mut slots = Vec::with_capacity(values.len());
            for value in values {
                params.push(value.clone());
                slots.push(dialect.placeholder(params.len()));
            }
            Ok(format!("{} IN ({})", column, slots.join(", ")))
        }
        op => {
            params.push(filter.value.clone());
            Ok(format!(
                "{} {} {}",
                column,
                op.as_sql(),
                dialect.placeholder(params.len())
            ))
        }
    }
}

/// Quote a `table.column` reference, or a bare column (base mode).
pub(crate) fn quote_column_ref(reference: &str, dialect: &dyn Dialect) -> String {
    match reference.split_once('.') {
        Some((table, column)) => format!(
            "{}.{}",
            dialect.quote_ident(table),
            dialect.quote_ident(column)
        ),
        None => dialect.quote_ident(reference),
    }
}

fn quote_alias(alias: &str, dialect: &dyn Dialect) -> String {
    if is_identifier(alias) {
        alias.to_string()
    } else {
        dialect.quote_ident(alias)
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
