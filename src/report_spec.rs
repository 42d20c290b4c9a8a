use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named report request: aggregate metrics, grouping columns, and filter
/// predicates. Joins are never written down; the planner infers them from the
/// columns referenced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSpec {
    pub name: String,
    pub metrics: Vec<MetricSpec>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub limit: Option<u64>,
    /// SQL expression used as a subquery alias `__base__`; metrics and
    /// filters apply over it. Mutually exclusive with `raw_sql`.
    #[serde(default)]
    pub base_sql: Option<String>,
    /// Complete SQL executed verbatim. Mutually exclusive with `base_sql`.
    #[serde(default)]
    pub raw_sql: Option<String>,
}

impl ReportSpec {
    /// A minimal spec with just a name and metrics; the remaining fields
    /// default to empty.
    pub fn new(name: impl Into<String>, metrics: Vec<MetricSpec>) -> Self {
        Self {
            name: name.into(),
            metrics,
            group_by: Vec::new(),
            filters: Vec::new(),
            limit: None,
            base_sql: None,
            raw_sql: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Aggregate SQL fragment, e.g. `SUM(orders.amount_cents)` or `COUNT(*)`.
    pub expr: String,
    pub alias: String,
}

impl MetricSpec {
    pub fn new(expr: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            alias: alias.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Column reference, `table.column` in auto mode.
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FilterSpec {
    pub fn new(column: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "LIKE")]
    Like,
}

impl FilterOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Neq => "!=",
            FilterOp::Lt => "<",
            FilterOp::Gt => ">",
            FilterOp::Lte => "<=",
            FilterOp::Gte => ">=",
            FilterOp::In => "IN",
            FilterOp::Like => "LIKE",
        }
    }
}

/// How a spec is turned into SQL. `raw_sql` forces `Raw`, `base_sql` forces
/// `Base`, otherwise the planner runs the full auto pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Raw,
    Base,
    Auto,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Raw => "raw",
            ExecutionMode::Base => "base",
            ExecutionMode::Auto => "auto",
        }
    }
}
