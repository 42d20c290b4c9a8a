pub mod backend;
pub mod config;
pub mod dialect;
pub mod error;
pub mod planner;
pub mod query_engine;
pub mod report_spec;
pub mod schema_graph;
pub mod shape_suggestion;
pub mod sql_builder;
pub mod state;

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::planner::AgentConfig;

/// Load agent catalogs from a directory of YAML files, keyed by file stem.
pub fn load_agents<P: AsRef<Path>>(dir: P) -> Result<BTreeMap<String, AgentConfig>> {
    planner::load_agents_from_dir(dir)
}

pub use backend::{ColumnMeta, Database, QueryResult};
#[cfg(feature = "duckdb")]
pub use backend::DuckDbDatabase;
pub use config::HtnqlConfig;
pub use error::HtnqlError;
pub use planner::{builtin_agents, CancellationToken};
pub use query_engine::{PlannedReport, QueryEngine};
pub use report_spec::{ExecutionMode, FilterOp, FilterSpec, MetricSpec, ReportSpec};
pub use schema_graph::{FkEdge, SchemaGraph, SchemaMetadata};
pub use shape_suggestion::{suggest_shapes, ShapeCandidate, ShapeIntent};
pub use state::{Complexity, JoinEdge, PlanningState, StateKey, TraceStep};
