use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::backend::{Database, QueryResult};
use crate::config::HtnqlConfig;
use crate::dialect::{AnsiDialect, Dialect};
use crate::error::{HtnqlError, Result};
use crate::planner::{
    builtin_agents, compile, plan, AgentConfig, CancellationToken, MethodCatalog, PrimitiveCtx,
    PrimitiveRegistry, ROOT_TASK,
};
use crate::report_spec::ReportSpec;
use crate::schema_graph::SchemaGraph;
use crate::state::{PlanningState, TraceStep};

/// A completed plan: the statement, its bound values, and the trace that
/// produced them. Planning is pure, so this can be inspected, cached, or
/// executed later.
#[derive(Debug, Clone)]
pub struct PlannedReport {
    pub sql: String,
    pub params: Vec<Value>,
    pub trace: Vec<TraceStep>,
    pub state: PlanningState,
}

/// Accepts report specs, drives the HTN kernel with the chosen agent, and
/// executes the resulting SQL through the database boundary.
pub struct QueryEngine {
    db: Arc<dyn Database>,
    graph: Arc<SchemaGraph>,
    dialect: Box<dyn Dialect + Send + Sync>,
    registry: PrimitiveRegistry,
    agents: BTreeMap<String, MethodCatalog>,
    config: HtnqlConfig,
}

impl QueryEngine {
    pub fn new(db: Arc<dyn Database>, graph: SchemaGraph) -> Result<Self> {
        Self::with_config(db, graph, HtnqlConfig::default())
    }

    pub fn with_config(
        db: Arc<dyn Database>,
        graph: SchemaGraph,
        config: HtnqlConfig,
    ) -> Result<Self> {
        let registry = PrimitiveRegistry::standard();
        let mut agents = BTreeMap::new();
        for (name, agent) in builtin_agents() {
            agents.insert(name, compile(&agent, &registry)?);
        }
        Ok(Self {
            db,
            graph: Arc::new(graph),
            dialect: Box::new(AnsiDialect),
            registry,
            agents,
            config,
        })
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(|s| s.as_str())
    }

    /// Register (or override) one agent catalog under a policy name.
    pub fn register_agent(&mut self, name: impl Into<String>, agent: &AgentConfig) -> Result<()> {
        let catalog = compile(agent, &self.registry)?;
        self.agents.insert(name.into(), catalog);
        Ok(())
    }

    /// Register a whole `agents_config` map, overriding built-ins on name
    /// collision.
    pub fn register_agents(&mut self, agents: &BTreeMap<String, AgentConfig>) -> Result<()> {
        for (name, agent) in agents {
            self.register_agent(name.clone(), agent)?;
        }
        Ok(())
    }

    /// Plan a spec with the configured default agent.
    pub fn plan_report(&self, spec: &ReportSpec) -> Result<PlannedReport> {
        let agent = self.config.planner.default_agent.clone();
        self.plan_report_with(spec, &agent, None)
    }

    /// Plan a spec with a named agent, optionally under a cancellation token.
    pub fn plan_report_with(
        &self,
        spec: &ReportSpec,
        agent: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<PlannedReport> {
        if spec.raw_sql.is_some() && spec.base_sql.is_some() {
            return Err(HtnqlError::Spec(format!(
                "report {} supplies both raw_sql and base_sql",
                spec.name
            )));
        }
        if self.config.query.max_row_limit > 0 {
            if let Some(limit) = spec.limit {
                if limit > self.config.query.max_row_limit {
                    return Err(HtnqlError::Spec(format!(
                        "report {} requests limit {limit} above the configured cap {}",
                        spec.name, self.config.query.max_row_limit
                    )));
                }
            }
        }

        let catalog = self
            .agents
            .get(agent)
            .ok_or_else(|| HtnqlError::Agent(format!("unknown agent {agent}")))?;
        let ctx = PrimitiveCtx {
            graph: &self.graph,
            dialect: self.dialect.as_ref(),
        };
        let initial = PlanningState::new(spec.clone());
        let (state, trace) = plan(ROOT_TASK, initial, catalog, &self.registry, &ctx, cancel)?;

        let sql = state.sql.clone().ok_or_else(|| {
            HtnqlError::Agent(format!("agent {agent} completed without emitting SQL"))
        })?;
        tracing::debug!(report = spec.name.as_str(), sql = sql.as_str(), "planned report");
        Ok(PlannedReport {
            sql,
            params: state.params.clone(),
            trace,
            state,
        })
    }

    pub async fn run_report(&self, spec: &ReportSpec) -> Result<QueryResult> {
        let (rows, _trace) = self.run_report_with_trace(spec).await?;
        Ok(rows)
    }

    /// Like [`run_report`](Self::run_report), but also returns the plan
    /// trace. Database failures are wrapped as execution errors carrying the
    /// trace.
    pub async fn run_report_with_trace(
        &self,
        spec: &ReportSpec,
    ) -> Result<(QueryResult, Vec<TraceStep>)> {
        let planned = self.plan_report(spec)?;
        let rows = self
            .db
            .execute(&planned.sql, &planned.params)
            .await
            .map_err(|e| match e {
                HtnqlError::Execution { message, .. } => HtnqlError::Execution {
                    message,
                    trace: planned.trace.clone(),
                },
                other => HtnqlError::Execution {
                    message: other.to_string(),
                    trace: planned.trace.clone(),
                },
            })?;
        Ok((rows, planned.trace))
    }
}
