//! Catalog of named primitive operations. Each one maps `(state) -> state`
//! deterministically, reading nothing but the schema graph.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::dialect::Dialect;
use crate::error::{HtnqlError, Result};
use crate::report_spec::{ExecutionMode, FilterOp};
use crate::schema_graph::SchemaGraph;
use crate::shape_suggestion::{bridge_tables, fk_to_join_edge};
use crate::sql_builder;
use crate::state::{Complexity, JoinEdge, PlanningState};

/// IN lists longer than this push a spec into the `complex` tier.
const IN_LIST_COMPLEXITY_THRESHOLD: usize = 32;

/// Read-only resources a primitive may consult.
pub struct PrimitiveCtx<'a> {
    pub graph: &'a SchemaGraph,
    pub dialect: &'a dyn Dialect,
}

pub type PrimitiveFn = fn(&PrimitiveCtx<'_>, &PlanningState) -> Result<PlanningState>;

/// Immutable name-to-operation table, populated before the first plan runs.
#[derive(Debug, Clone)]
pub struct PrimitiveRegistry {
    ops: BTreeMap<&'static str, PrimitiveFn>,
}

impl PrimitiveRegistry {
    /// The full standard operation catalog.
    pub fn standard() -> Self {
        let mut ops: BTreeMap<&'static str, PrimitiveFn> = BTreeMap::new();
        ops.insert("ChooseExecutionMode", choose_execution_mode);
        ops.insert("ValidateSpecStructurally", validate_spec_structurally);
        ops.insert("InferTablesFromSpec", infer_tables_from_spec);
        ops.insert("AnalyzeComplexity", analyze_complexity);
        ops.insert("FindJoinForest.StrictFK", find_join_forest_strict);
        ops.insert("FindJoinForest.Heuristic", find_join_forest_heuristic);
        ops.insert("BuildSqlFromPlan", build_sql_from_plan);
        ops.insert("ExecutePlannedSql", execute_planned_sql);
        ops.insert("PassThroughRawSql", pass_through_raw_sql);
        ops.insert("WrapBaseSql", wrap_base_sql);
        Self { ops }
    }

    pub fn get(&self, name: &str) -> Option<PrimitiveFn> {
        self.ops.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ops.keys().copied()
    }
}

fn choose_execution_mode(_ctx: &PrimitiveCtx<'_>, state: &PlanningState) -> Result<PlanningState> {
    let spec = state.spec();
    let mode = if spec.raw_sql.is_some() {
        ExecutionMode::Raw
    } else if spec.base_sql.is_some() {
        ExecutionMode::Base
    } else {
        ExecutionMode::Auto
    };
    let mut next = state.clone();
    next.mode = Some(mode);
    Ok(next)
}

fn validate_spec_structurally(
    _ctx: &PrimitiveCtx<'_>,
    state: &PlanningState,
) -> Result<PlanningState> {
    let spec = state.spec();
    let mut next = state.clone();

    let mut aliases: BTreeSet<&str> = BTreeSet::new();
    for metric in &spec.metrics {
        if !aliases.insert(metric.alias.as_str()) {
            return Err(HtnqlError::Spec(format!(
                "duplicate metric alias {}",
                metric.alias
            )));
        }
    }
    if spec.metrics.is_empty() {
        next.diagnostics
            .push("report defines no metrics".to_string());
    }

    for filter in &spec.filters {
        if filter.op == FilterOp::In {
            match &filter.value {
                Value::Array(values) if !values.is_empty() => {}
                Value::Array(_) => {
                    return Err(HtnqlError::Spec(format!(
                        "IN filter on {} has an empty value list",
                        filter.column
                    )))
                }
                _ => {
                    return Err(HtnqlError::Spec(format!(
                        "IN filter on {} requires a list value",
                        filter.column
                    )))
                }
            }
        }
    }

    for item in &spec.group_by {
        match item.split_once('.') {
            Some((table, column)) if !table.is_empty() && !column.is_empty() => {}
            _ => next.diagnostics.push(format!(
                "group_by item {item} does not parse as table.column"
            )),
        }
    }

    Ok(next)
}

fn infer_tables_from_spec(ctx: &PrimitiveCtx<'_>, state: &PlanningState) -> Result<PlanningState> {
    let spec = state.spec();
    let auto = state.mode == Some(ExecutionMode::Auto);
    let mut tables: BTreeSet<String> = BTreeSet::new();

    for metric in &spec.metrics {
        for (table, _column) in qualified_refs(&metric.expr) {
            tables.insert(table);
        }
    }
    for item in &spec.group_by {
        match item.split_once('.') {
            Some((table, _)) if !table.is_empty() => {
                tables.insert(table.to_string());
            }
            _ if auto => {
                return Err(HtnqlError::Spec(format!(
                    "group_by item {item} is not table-qualified"
                )))
            }
            _ => {}
        }
    }
    for filter in &spec.filters {
        match filter.column.split_once('.') {
            Some((table, _)) if !table.is_empty() => {
                tables.insert(table.to_string());
            }
            _ if auto => {
                return Err(HtnqlError::Spec(format!(
                    "filter column {} is not table-qualified",
                    filter.column
                )))
            }
            _ => {}
        }
    }

    if auto {
        if tables.is_empty() {
            return Err(HtnqlError::Spec(format!(
                "report {} references no tables; nothing to select from",
                spec.name
            )));
        }
        for table in &tables {
            if !ctx.graph.has_table(table) {
                return Err(HtnqlError::Spec(format!(
                    "report {} references unknown table {table}",
                    spec.name
                )));
            }
        }
    }

    let mut next = state.clone();
    next.inferred_tables = tables;
    Ok(next)
}

fn analyze_complexity(_ctx: &PrimitiveCtx<'_>, state: &PlanningState) -> Result<PlanningState> {
    let spec = state.spec();
    let table_count = state.inferred_tables.len();
    let uses_in_or_like = spec
        .filters
        .iter()
        .any(|f| matches!(f.op, FilterOp::In | FilterOp::Like));
    let heavy = spec.filters.iter().any(|f| match f.op {
        FilterOp::Like => true,
        FilterOp::In => match &f.value {
            Value::Array(values) => values.len() > IN_LIST_COMPLEXITY_THRESHOLD,
            _ => false,
        },
        _ => false,
    });

    let complexity = if table_count <= 1 {
        Complexity::Trivial
    } else if table_count <= 3 && !uses_in_or_like {
        Complexity::Simple
    } else if heavy {
        Complexity::Complex
    } else {
        Complexity::Standard
    };

    let mut next = state.clone();
    next.complexity = Some(complexity);
    Ok(next)
}

/// Union of pairwise shortest FK paths over a table set, plus the set of all
/// tables the paths touch (intermediates included).
fn strict_forest(
    graph: &SchemaGraph,
    tables: &BTreeSet<String>,
) -> Result<(Vec<JoinEdge>, BTreeSet<String>)> {
    let mut forest: Vec<JoinEdge> = Vec::new();
    let mut covered: BTreeSet<String> = tables.clone();

    let names: Vec<&String> = tables.iter().collect();
    for (i, a) in names.iter().enumerate() {
        for b in names.iter().skip(i + 1) {
            let path = graph.shortest_path(a, b).ok_or_else(|| HtnqlError::Join {
                table: (**b).clone(),
                message: format!("no foreign-key path connects {a} and {b}"),
            })?;
            for edge in &path {
                covered.insert(edge.child_table.clone());
                covered.insert(edge.parent_table.clone());
                let join = fk_to_join_edge(edge);
                if !forest.contains(&join) {
                    forest.push(join);
                }
            }
        }
    }
    Ok((forest, covered))
}

fn apply_forest(
    state: &PlanningState,
    forest: Vec<JoinEdge>,
    covered: BTreeSet<String>,
) -> PlanningState {
    let mut next = state.clone();
    let added: Vec<String> = covered
        .iter()
        .filter(|t| !state.inferred_tables.contains(*t))
        .cloned()
        .collect();
    if !added.is_empty() {
        next.diagnostics.push(format!(
            "tables joined in to satisfy foreign-key paths: {}",
            added.join(", ")
        ));
    }
    next.inferred_tables = covered;
    next.join_forest = forest;
    next
}

fn find_join_forest_strict(
    ctx: &PrimitiveCtx<'_>,
    state: &PlanningState,
) -> Result<PlanningState> {
    let (forest, covered) = strict_forest(ctx.graph, &state.inferred_tables)?;
    Ok(apply_forest(state, forest, covered))
}

fn find_join_forest_heuristic(
    ctx: &PrimitiveCtx<'_>,
    state: &PlanningState,
) -> Result<PlanningState> {
    match strict_forest(ctx.graph, &state.inferred_tables) {
        Ok((forest, covered)) => Ok(apply_forest(state, forest, covered)),
        // Path search already spans the whole schema graph, so bridge
        // candidates cannot reconnect a split table set; shape suggestion
        // only sharpens the failure report.
        Err(HtnqlError::Join { table, message }) => {
            let components = ctx.graph.connected_components(&state.inferred_tables);
            let bridges = bridge_tables(ctx.graph, &state.inferred_tables);
            let mut message = format!(
                "{message}; the referenced tables split into {} disconnected groups",
                components.len()
            );
            if !bridges.is_empty() {
                message.push_str(&format!(
                    " (bridge candidates within reach: {})",
                    bridges.join(", ")
                ));
            }
            Err(HtnqlError::Join { table, message })
        }
        Err(other) => Err(other),
    }
}

fn build_sql_from_plan(ctx: &PrimitiveCtx<'_>, state: &PlanningState) -> Result<PlanningState> {
    if state.mode != Some(ExecutionMode::Auto) {
        return Err(HtnqlError::Primitive {
            name: "BuildSqlFromPlan".to_string(),
            message: "only auto mode plans a join forest".to_string(),
        });
    }
    let built = sql_builder::build_auto_sql(
        state.spec(),
        &state.inferred_tables,
        &state.join_forest,
        ctx.dialect,
    )?;
    let mut next = state.clone();
    next.sql = Some(built.sql);
    next.params = built.params;
    Ok(next)
}

fn execute_planned_sql(_ctx: &PrimitiveCtx<'_>, state: &PlanningState) -> Result<PlanningState> {
    // Execution happens in the facade; the planner only marks the state done.
    if state.sql.is_none() {
        return Err(HtnqlError::Primitive {
            name: "ExecutePlannedSql".to_string(),
            message: "no SQL was planned".to_string(),
        });
    }
    let mut next = state.clone();
    next.ready = true;
    Ok(next)
}

fn pass_through_raw_sql(_ctx: &PrimitiveCtx<'_>, state: &PlanningState) -> Result<PlanningState> {
    let raw = state
        .spec()
        .raw_sql
        .clone()
        .ok_or_else(|| HtnqlError::Primitive {
            name: "PassThroughRawSql".to_string(),
            message: "spec carries no raw_sql".to_string(),
        })?;
    let mut next = state.clone();
    next.sql = Some(raw);
    next.params = Vec::new();
    Ok(next)
}

fn wrap_base_sql(ctx: &PrimitiveCtx<'_>, state: &PlanningState) -> Result<PlanningState> {
    let spec = state.spec();
    let base = spec.base_sql.as_deref().ok_or_else(|| HtnqlError::Primitive {
        name: "WrapBaseSql".to_string(),
        message: "spec carries no base_sql".to_string(),
    })?;
    let built = sql_builder::build_base_sql(spec, base, ctx.dialect)?;
    let mut next = state.clone();
    next.sql = Some(built.sql);
    next.params = built.params;
    Ok(next)
}

/// Mine `table.column` occurrences from an opaque SQL fragment, skipping
/// single-quoted string literals.
fn qualified_refs(expr: &str) -> Vec<(String, String)> {
    let chars: Vec<char> = expr.chars().collect();
    let mut refs = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                i += 1;
            }
            i += 1;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let is_qualified = i < chars.len()
                && chars[i] == '.'
                && i + 1 < chars.len()
                && (chars[i + 1].is_ascii_alphabetic() || chars[i + 1] == '_');
            if is_qualified {
                let table: String = chars[start..i].iter().collect();
                i += 1;
                let col_start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let column: String = chars[col_start..i].iter().collect();
                refs.push((table, column));
            }
        } else {
            i += 1;
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mines_qualified_references() {
        let refs = qualified_refs("SUM(orders.amount_cents) + COUNT(*)");
        assert_eq!(
            refs,
            vec![("orders".to_string(), "amount_cents".to_string())]
        );
    }

    #[test]
    fn skips_string_literals() {
        let refs = qualified_refs("COUNT(CASE WHEN status = 'a.b' THEN 1 END)");
        assert!(refs.is_empty());
    }

    #[test]
    fn standard_registry_is_complete() {
        let registry = PrimitiveRegistry::standard();
        for name in [
            "ChooseExecutionMode",
            "ValidateSpecStructurally",
            "InferTablesFromSpec",
            "AnalyzeComplexity",
            "FindJoinForest.StrictFK",
            "FindJoinForest.Heuristic",
            "BuildSqlFromPlan",
            "ExecutePlannedSql",
            "PassThroughRawSql",
            "WrapBaseSql",
        ] {
            assert!(registry.contains(name), "missing primitive {name}");
        }
    }
}
