//! The agent DSL: serde records describing method catalogs, compiled into
//! executable methods with guarded steps.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use glob::glob;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HtnqlError, Result};
use crate::state::PlanningState;

use super::primitives::PrimitiveRegistry;

/// An agent as written down: `{ tasks: { name: { methods: [...] } } }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    pub tasks: BTreeMap<String, TaskConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    pub methods: Vec<MethodConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodConfig {
    pub name: String,
    /// Guard predicates, combined conjunctively. Empty means always applicable.
    #[serde(default)]
    pub when: Vec<PredicateConfig>,
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepConfig {
    Task { task: String },
    Primitive { primitive: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredicateConfig {
    pub field: String,
    pub op: PredicateOp,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateOp {
    Equals,
    NotEquals,
    SizeLte,
    SizeGte,
    Contains,
    IsSet,
    IsUnset,
    In,
}

/// Load agent configs from a directory of YAML files, keyed by file stem.
pub fn load_agents_from_dir<P: AsRef<Path>>(dir: P) -> Result<BTreeMap<String, AgentConfig>> {
    let dir = dir.as_ref();
    let mut agents = BTreeMap::new();
    for pattern in ["yml", "yaml"] {
        for entry in glob(&format!("{}/*.{pattern}", dir.display()))
            .map_err(|e| HtnqlError::Other(e.into()))?
            .flatten()
        {
            let name = entry
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    HtnqlError::Agent(format!("unusable agent file name {}", entry.display()))
                })?;
            let contents = fs::read_to_string(&entry)?;
            let config: AgentConfig = serde_yaml::from_str(&contents).map_err(|e| {
                HtnqlError::Agent(format!("failed to parse agent {}: {e}", entry.display()))
            })?;
            agents.insert(name, config);
        }
    }
    if agents.is_empty() {
        return Err(HtnqlError::Agent(format!(
            "no agent definitions found in {}",
            dir.display()
        )));
    }
    Ok(agents)
}

/// A compiled child step: recurse into a compound task or apply a primitive.
#[derive(Debug, Clone)]
pub enum Step {
    Task(String),
    Primitive(String),
}

/// Closed sum of guard predicate kinds.
#[derive(Debug, Clone)]
pub enum Predicate {
    Equals { field: String, value: String },
    NotEquals { field: String, value: String },
    SizeLte { field: String, limit: usize },
    SizeGte { field: String, limit: usize },
    Contains { field: String, value: String },
    IsSet { field: String },
    IsUnset { field: String },
    In { field: String, values: Vec<String> },
}

impl Predicate {
    pub fn eval(&self, state: &PlanningState) -> bool {
        match self {
            Predicate::Equals { field, value } => {
                field_text(state, field).as_deref() == Some(value.as_str())
            }
            Predicate::NotEquals { field, value } => {
                field_text(state, field).as_deref() != Some(value.as_str())
            }
            Predicate::SizeLte { field, limit } => state
                .field(field)
                .and_then(|v| v.size())
                .is_some_and(|n| n <= *limit),
            Predicate::SizeGte { field, limit } => state
                .field(field)
                .and_then(|v| v.size())
                .is_some_and(|n| n >= *limit),
            Predicate::Contains { field, value } => match state.field(field) {
                Some(crate::state::FieldView::TextSet(set)) => set.contains(value),
                _ => false,
            },
            Predicate::IsSet { field } => state.field(field).is_some(),
            Predicate::IsUnset { field } => state.field(field).is_none(),
            Predicate::In { field, values } => field_text(state, field)
                .map(|text| values.iter().any(|v| *v == text))
                .unwrap_or(false),
        }
    }
}

fn field_text(state: &PlanningState, field: &str) -> Option<String> {
    match state.field(field)? {
        crate::state::FieldView::Text(s) => Some(s.to_string()),
        crate::state::FieldView::Size(n) => Some(n.to_string()),
        crate::state::FieldView::TextSet(_) => None,
    }
}

/// A compiled decomposition rule.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub guard: Vec<Predicate>,
    pub steps: Vec<Step>,
}

impl Method {
    pub fn guard_passes(&self, state: &PlanningState) -> bool {
        self.guard.iter().all(|p| p.eval(state))
    }
}

/// Methods per task name, in registration order. Task references resolve
/// lazily at plan time; primitive references were checked at compile time.
#[derive(Debug, Clone, Default)]
pub struct MethodCatalog {
    tasks: BTreeMap<String, Vec<Method>>,
}

impl MethodCatalog {
    pub fn methods_for(&self, task: &str) -> Option<&[Method]> {
        self.tasks.get(task).map(|m| m.as_slice())
    }
}

/// Compile an agent config against a primitive registry. Unknown primitives
/// and malformed predicates fail here, before any plan runs.
pub fn compile(config: &AgentConfig, registry: &PrimitiveRegistry) -> Result<MethodCatalog> {
    let mut tasks = BTreeMap::new();
    for (task_name, task) in &config.tasks {
        let mut methods = Vec::with_capacity(task.methods.len());
        for method in &task.methods {
            let mut guard = Vec::with_capacity(method.when.len());
            for predicate in &method.when {
                guard.push(compile_predicate(task_name, &method.name, predicate)?);
            }
            let mut steps = Vec::with_capacity(method.steps.len());
            for step in &method.steps {
                steps.push(match step {
                    StepConfig::Task { task } => Step::Task(task.clone()),
                    StepConfig::Primitive { primitive } => {
                        if !registry.contains(primitive) {
                            return Err(HtnqlError::Agent(format!(
                                "method {} of task {task_name} references unknown primitive {primitive}",
                                method.name
                            )));
                        }
                        Step::Primitive(primitive.clone())
                    }
                });
            }
            methods.push(Method {
                name: method.name.clone(),
                guard,
                steps,
            });
        }
        tasks.insert(task_name.clone(), methods);
    }
    Ok(MethodCatalog { tasks })
}

fn compile_predicate(
    task: &str,
    method: &str,
    predicate: &PredicateConfig,
) -> Result<Predicate> {
    let field = predicate.field.clone();
    let context = format!(
        "predicate on {} in method {method} of task {task}",
        predicate.field
    );

    let text_value = || -> Result<String> {
        match &predicate.value {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            _ => Err(HtnqlError::Agent(format!(
                "{context} requires a scalar value"
            ))),
        }
    };

    Ok(match predicate.op {
        PredicateOp::Equals => Predicate::Equals {
            value: text_value()?,
            field,
        },
        PredicateOp::NotEquals => Predicate::NotEquals {
            value: text_value()?,
            field,
        },
        PredicateOp::SizeLte | PredicateOp::SizeGte => {
            let limit = predicate
                .value
                .as_ref()
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    HtnqlError::Agent(format!("{context} requires a non-negative integer"))
                })? as usize;
            if predicate.op == PredicateOp::SizeLte {
                Predicate::SizeLte { field, limit }
            } else {
                Predicate::SizeGte { field, limit }
            }
        }
        PredicateOp::Contains => Predicate::Contains {
            value: text_value()?,
            field,
        },
        PredicateOp::IsSet => {
            if predicate.value.is_some() {
                return Err(HtnqlError::Agent(format!("{context} takes no value")));
            }
            Predicate::IsSet { field }
        }
        PredicateOp::IsUnset => {
            if predicate.value.is_some() {
                return Err(HtnqlError::Agent(format!("{context} takes no value")));
            }
            Predicate::IsUnset { field }
        }
        PredicateOp::In => {
            let values = match &predicate.value {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.clone()),
                        Value::Number(n) => Ok(n.to_string()),
                        Value::Bool(b) => Ok(b.to_string()),
                        _ => Err(HtnqlError::Agent(format!(
                            "{context} requires scalar list items"
                        ))),
                    })
                    .collect::<Result<Vec<String>>>()?,
                _ => {
                    return Err(HtnqlError::Agent(format!(
                        "{context} requires a list value"
                    )))
                }
            };
            Predicate::In { field, values }
        }
    })
}
