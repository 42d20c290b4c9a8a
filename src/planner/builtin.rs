//! Built-in agent catalogs, constructed programmatically in the same record
//! types the YAML loader produces and compiled through the same path.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::agent::{AgentConfig, MethodConfig, PredicateConfig, PredicateOp, StepConfig, TaskConfig};

/// The compound task every plan starts from.
pub const ROOT_TASK: &str = "AnswerReport";

/// Name of the agent used when the caller does not pick one.
pub const DEFAULT_AGENT: &str = "default";

fn task(name: &str) -> StepConfig {
    StepConfig::Task {
        task: name.to_string(),
    }
}

fn primitive(name: &str) -> StepConfig {
    StepConfig::Primitive {
        primitive: name.to_string(),
    }
}

fn when(field: &str, op: PredicateOp, value: Value) -> PredicateConfig {
    PredicateConfig {
        field: field.to_string(),
        op,
        value: Some(value),
    }
}

fn method(name: &str, guard: Vec<PredicateConfig>, steps: Vec<StepConfig>) -> MethodConfig {
    MethodConfig {
        name: name.to_string(),
        when: guard,
        steps,
    }
}

fn answer_report() -> (String, TaskConfig) {
    (
        ROOT_TASK.to_string(),
        TaskConfig {
            methods: vec![method(
                "Default",
                vec![],
                vec![
                    primitive("ChooseExecutionMode"),
                    task("PlanExecution"),
                    primitive("ExecutePlannedSql"),
                ],
            )],
        },
    )
}

fn plan_execution() -> (String, TaskConfig) {
    (
        "PlanExecution".to_string(),
        TaskConfig {
            methods: vec![
                method(
                    "RawPath",
                    vec![when("mode", PredicateOp::Equals, json!("raw"))],
                    vec![primitive("PassThroughRawSql")],
                ),
                method(
                    "BasePath",
                    vec![when("mode", PredicateOp::Equals, json!("base"))],
                    vec![
                        primitive("ValidateSpecStructurally"),
                        primitive("WrapBaseSql"),
                    ],
                ),
                method("AutoPath", vec![], vec![task("PlanAutoSql")]),
            ],
        },
    )
}

fn plan_auto_sql() -> (String, TaskConfig) {
    (
        "PlanAutoSql".to_string(),
        TaskConfig {
            methods: vec![method(
                "Default",
                vec![],
                vec![
                    primitive("ValidateSpecStructurally"),
                    primitive("InferTablesFromSpec"),
                    primitive("AnalyzeComplexity"),
                    task("FindJoinForest"),
                    primitive("BuildSqlFromPlan"),
                ],
            )],
        },
    )
}

fn find_join_forest(heuristic: bool) -> (String, TaskConfig) {
    let mut methods = vec![];
    if heuristic {
        methods.push(method(
            "Strict",
            vec![when(
                "complexity",
                PredicateOp::In,
                json!(["trivial", "simple", "standard"]),
            )],
            vec![primitive("FindJoinForest.StrictFK")],
        ));
        methods.push(method(
            "Heuristic",
            vec![when("complexity", PredicateOp::Equals, json!("complex"))],
            vec![primitive("FindJoinForest.Heuristic")],
        ));
    } else {
        methods.push(method(
            "Strict",
            vec![],
            vec![primitive("FindJoinForest.StrictFK")],
        ));
    }
    ("FindJoinForest".to_string(), TaskConfig { methods })
}

fn catalog(heuristic: bool) -> AgentConfig {
    let mut tasks = BTreeMap::new();
    for (name, config) in [
        answer_report(),
        plan_execution(),
        plan_auto_sql(),
        find_join_forest(heuristic),
    ] {
        tasks.insert(name, config);
    }
    AgentConfig { tasks }
}

/// The default method catalogs, keyed by policy name. `default` routes
/// complex specs through the heuristic join search; `strict` never does.
pub fn builtin_agents() -> BTreeMap<String, AgentConfig> {
    let mut agents = BTreeMap::new();
    agents.insert(DEFAULT_AGENT.to_string(), catalog(true));
    agents.insert("strict".to_string(), catalog(false));
    agents
}
