use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::report_spec::{ExecutionMode, ReportSpec};

/// Complexity tag derived from spec shape, consumed only by method guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Trivial,
    Simple,
    Standard,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Trivial => "trivial",
            Complexity::Simple => "simple",
            Complexity::Standard => "standard",
            Complexity::Complex => "complex",
        }
    }
}

/// One edge of the join plan. Orientation follows the foreign key: left is
/// the referencing side, right the referenced side.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct JoinEdge {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
}

/// The record threaded through primitives. Conceptually immutable: each
/// primitive clones the state, sets the fields it owns, and returns the
/// copy. The kernel diffs consecutive states to fill trace entries.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningState {
    spec: Arc<ReportSpec>,
    pub mode: Option<ExecutionMode>,
    pub inferred_tables: BTreeSet<String>,
    pub complexity: Option<Complexity>,
    pub join_forest: Vec<JoinEdge>,
    pub sql: Option<String>,
    pub params: Vec<Value>,
    pub diagnostics: Vec<String>,
    pub ready: bool,
}

impl PlanningState {
    pub fn new(spec: ReportSpec) -> Self {
        Self {
            spec: Arc::new(spec),
            mode: None,
            inferred_tables: BTreeSet::new(),
            complexity: None,
            join_forest: Vec::new(),
            sql: None,
            params: Vec::new(),
            diagnostics: Vec::new(),
            ready: false,
        }
    }

    pub fn spec(&self) -> &ReportSpec {
        &self.spec
    }

    /// Keyed view over the state for guard predicates. Field names match the
    /// [`StateKey`] spelling used in traces.
    pub fn field(&self, name: &str) -> Option<FieldView<'_>> {
        match name {
            "mode" => self.mode.map(|m| FieldView::Text(m.as_str())),
            "complexity" => self.complexity.map(|c| FieldView::Text(c.as_str())),
            "inferred_tables" => Some(FieldView::TextSet(&self.inferred_tables)),
            "join_forest" => Some(FieldView::Size(self.join_forest.len())),
            "sql" => self.sql.as_deref().map(FieldView::Text),
            "params" => Some(FieldView::Size(self.params.len())),
            "diagnostics" => Some(FieldView::Size(self.diagnostics.len())),
            "ready" => Some(FieldView::Text(if self.ready { "true" } else { "false" })),
            _ => None,
        }
    }

    /// Keys whose values differ between `self` (before) and `after`.
    pub fn changed_keys(&self, after: &PlanningState) -> Vec<StateKey> {
        let mut changed = Vec::new();
        if self.mode != after.mode {
            changed.push(StateKey::Mode);
        }
        if self.inferred_tables != after.inferred_tables {
            changed.push(StateKey::InferredTables);
        }
        if self.complexity != after.complexity {
            changed.push(StateKey::Complexity);
        }
        if self.join_forest != after.join_forest {
            changed.push(StateKey::JoinForest);
        }
        if self.sql != after.sql {
            changed.push(StateKey::Sql);
        }
        if self.params != after.params {
            changed.push(StateKey::Params);
        }
        if self.diagnostics != after.diagnostics {
            changed.push(StateKey::Diagnostics);
        }
        if self.ready != after.ready {
            changed.push(StateKey::Ready);
        }
        changed
    }
}

/// Guard-visible value of a state field.
#[derive(Debug, Clone, Copy)]
pub enum FieldView<'a> {
    Text(&'a str),
    Size(usize),
    TextSet(&'a BTreeSet<String>),
}

impl FieldView<'_> {
    pub fn size(&self) -> Option<usize> {
        match self {
            FieldView::Size(n) => Some(*n),
            FieldView::TextSet(set) => Some(set.len()),
            FieldView::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            FieldView::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Well-known state keys, as reported in trace entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
    Mode,
    InferredTables,
    Complexity,
    JoinForest,
    Sql,
    Params,
    Diagnostics,
    Ready,
}

impl StateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::Mode => "mode",
            StateKey::InferredTables => "inferred_tables",
            StateKey::Complexity => "complexity",
            StateKey::JoinForest => "join_forest",
            StateKey::Sql => "sql",
            StateKey::Params => "params",
            StateKey::Diagnostics => "diagnostics",
            StateKey::Ready => "ready",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the plan trace: a method firing or a primitive applying.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    pub task: String,
    pub method: Option<String>,
    pub depth: usize,
    pub changed: Vec<StateKey>,
}

impl fmt::Display for TraceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.depth {
            f.write_str("  ")?;
        }
        match &self.method {
            Some(method) => write!(f, "{} -> {}", self.task, method),
            None => {
                let changed: Vec<&str> = self.changed.iter().map(|k| k.as_str()).collect();
                write!(f, "{} [{}]", self.task, changed.join(", "))
            }
        }
    }
}
