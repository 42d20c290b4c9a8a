//! Agent DSL tests: parsing, compilation, guard evaluation, and overrides.

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use htnql::error::Result;
use htnql::planner::{
    compile, load_agents_from_dir, AgentConfig, Predicate, PrimitiveRegistry,
};
use htnql::schema_graph::{ForeignKeyMeta, SchemaMetadata, TableMeta};
use htnql::state::PlanningState;
use htnql::{
    Database, ExecutionMode, HtnqlError, MetricSpec, QueryEngine, QueryResult, ReportSpec,
    SchemaGraph,
};

const DEFAULT_AGENT_YAML: &str = r#"
tasks:
  AnswerReport:
    methods:
      - name: Default
        steps:
          - primitive: ChooseExecutionMode
          - task: PlanExecution
          - primitive: ExecutePlannedSql
  PlanExecution:
    methods:
      - name: RawPath
        when:
          - { field: mode, op: equals, value: raw }
        steps:
          - primitive: PassThroughRawSql
      - name: BasePath
        when:
          - { field: mode, op: equals, value: base }
        steps:
          - primitive: ValidateSpecStructurally
          - primitive: WrapBaseSql
      - name: AutoPath
        steps:
          - task: PlanAutoSql
  PlanAutoSql:
    methods:
      - name: Default
        steps:
          - primitive: ValidateSpecStructurally
          - primitive: InferTablesFromSpec
          - primitive: AnalyzeComplexity
          - task: FindJoinForest
          - primitive: BuildSqlFromPlan
  FindJoinForest:
    methods:
      - name: Strict
        when:
          - { field: complexity, op: in, value: [trivial, simple, standard] }
        steps:
          - primitive: FindJoinForest.StrictFK
      - name: Heuristic
        when:
          - { field: complexity, op: equals, value: complex }
        steps:
          - primitive: FindJoinForest.Heuristic
"#;

struct NullDb;

#[async_trait]
impl Database for NullDb {
    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::default())
    }
}

fn schema() -> SchemaGraph {
    let metadata = SchemaMetadata {
        tables: vec![
            TableMeta {
                name: "customers".to_string(),
                columns: vec!["id".to_string(), "region".to_string()],
                primary_key: vec!["id".to_string()],
                foreign_keys: vec![],
            },
            TableMeta {
                name: "orders".to_string(),
                columns: vec![
                    "id".to_string(),
                    "customer_id".to_string(),
                    "amount_cents".to_string(),
                    "status".to_string(),
                ],
                primary_key: vec!["id".to_string()],
                foreign_keys: vec![ForeignKeyMeta {
                    column: "customer_id".to_string(),
                    references_table: "customers".to_string(),
                    references_column: "id".to_string(),
                }],
            },
        ],
    };
    SchemaGraph::from_metadata(&metadata).unwrap()
}

#[test]
fn yaml_agents_compile_and_plan() {
    let agent: AgentConfig = serde_yaml::from_str(DEFAULT_AGENT_YAML).unwrap();
    let mut engine = QueryEngine::new(Arc::new(NullDb), schema()).unwrap();
    engine.register_agent("yaml", &agent).unwrap();

    let mut spec = ReportSpec::new("r", vec![MetricSpec::new("COUNT(*)", "n")]);
    spec.group_by = vec!["orders.status".to_string()];
    let planned = engine.plan_report_with(&spec, "yaml", None).unwrap();
    assert!(planned.sql.starts_with("SELECT \"orders\".\"status\""));
}

#[test]
fn unknown_primitives_fail_at_compile_time() {
    let yaml = r#"
tasks:
  AnswerReport:
    methods:
      - name: Default
        steps:
          - primitive: DoesNotExist
"#;
    let agent: AgentConfig = serde_yaml::from_str(yaml).unwrap();
    let err = compile(&agent, &PrimitiveRegistry::standard()).unwrap_err();
    match err {
        HtnqlError::Agent(message) => assert!(message.contains("DoesNotExist")),
        other => panic!("expected agent error, got {other:?}"),
    }
}

#[test]
fn malformed_predicates_fail_at_compile_time() {
    let yaml = r#"
tasks:
  AnswerReport:
    methods:
      - name: Default
        when:
          - { field: inferred_tables, op: size_lte, value: lots }
        steps:
          - primitive: ChooseExecutionMode
"#;
    let agent: AgentConfig = serde_yaml::from_str(yaml).unwrap();
    assert!(matches!(
        compile(&agent, &PrimitiveRegistry::standard()),
        Err(HtnqlError::Agent(_))
    ));
}

#[test]
fn unknown_task_references_surface_at_plan_time() {
    let yaml = r#"
tasks:
  AnswerReport:
    methods:
      - name: Default
        steps:
          - primitive: ChooseExecutionMode
          - task: NoSuchTask
"#;
    let agent: AgentConfig = serde_yaml::from_str(yaml).unwrap();
    let mut engine = QueryEngine::new(Arc::new(NullDb), schema()).unwrap();
    engine.register_agent("dangling", &agent).unwrap();

    let spec = ReportSpec::new("r", vec![MetricSpec::new("COUNT(*)", "n")]);
    let err = engine.plan_report_with(&spec, "dangling", None).unwrap_err();
    match err {
        HtnqlError::NoApplicableMethod { task } => assert_eq!(task, "NoSuchTask"),
        other => panic!("expected planner error, got {other:?}"),
    }
}

#[test]
fn first_matching_method_wins() {
    let yaml = r#"
tasks:
  AnswerReport:
    methods:
      - name: First
        steps:
          - primitive: ChooseExecutionMode
          - task: Emit
      - name: Second
        steps:
          - primitive: ChooseExecutionMode
  Emit:
    methods:
      - name: Raw
        steps:
          - primitive: PassThroughRawSql
          - primitive: ExecutePlannedSql
"#;
    let agent: AgentConfig = serde_yaml::from_str(yaml).unwrap();
    let mut engine = QueryEngine::new(Arc::new(NullDb), schema()).unwrap();
    engine.register_agent("ordered", &agent).unwrap();

    let mut spec = ReportSpec::new("r", vec![MetricSpec::new("COUNT(*)", "n")]);
    spec.raw_sql = Some("SELECT 42".to_string());
    let planned = engine.plan_report_with(&spec, "ordered", None).unwrap();
    assert_eq!(planned.trace[0].method.as_deref(), Some("First"));
    assert_eq!(planned.sql, "SELECT 42");
}

#[test]
fn predicates_evaluate_against_state_fields() {
    let mut state = PlanningState::new(ReportSpec::new(
        "r",
        vec![MetricSpec::new("COUNT(*)", "n")],
    ));
    state.mode = Some(ExecutionMode::Auto);
    state.inferred_tables = ["customers", "orders"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let eq = Predicate::Equals {
        field: "mode".to_string(),
        value: "auto".to_string(),
    };
    assert!(eq.eval(&state));

    let neq = Predicate::NotEquals {
        field: "mode".to_string(),
        value: "raw".to_string(),
    };
    assert!(neq.eval(&state));

    let lte = Predicate::SizeLte {
        field: "inferred_tables".to_string(),
        limit: 3,
    };
    assert!(lte.eval(&state));

    let gte = Predicate::SizeGte {
        field: "inferred_tables".to_string(),
        limit: 3,
    };
    assert!(!gte.eval(&state));

    let contains = Predicate::Contains {
        field: "inferred_tables".to_string(),
        value: "orders".to_string(),
    };
    assert!(contains.eval(&state));

    let is_set = Predicate::IsSet {
        field: "complexity".to_string(),
    };
    assert!(!is_set.eval(&state));

    let is_unset = Predicate::IsUnset {
        field: "sql".to_string(),
    };
    assert!(is_unset.eval(&state));

    let in_list = Predicate::In {
        field: "mode".to_string(),
        values: vec!["auto".to_string(), "base".to_string()],
    };
    assert!(in_list.eval(&state));
}

#[test]
fn agents_load_from_a_directory_keyed_by_file_stem() {
    let dir = std::env::temp_dir().join(format!("htnql_agents_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("reporting.yml"), DEFAULT_AGENT_YAML).unwrap();

    let agents = load_agents_from_dir(&dir).unwrap();
    assert!(agents.contains_key("reporting"));
    assert_eq!(agents["reporting"].tasks["PlanExecution"].methods.len(), 3);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn step_configs_round_trip_through_json() {
    let agent: AgentConfig = serde_yaml::from_str(DEFAULT_AGENT_YAML).unwrap();
    let as_json = serde_json::to_value(&agent).unwrap();
    assert_eq!(
        as_json["tasks"]["AnswerReport"]["methods"][0]["steps"][0],
        json!({ "primitive": "ChooseExecutionMode" })
    );
    let back: AgentConfig = serde_json::from_value(as_json).unwrap();
    assert_eq!(
        back.tasks["AnswerReport"].methods[0].name,
        agent.tasks["AnswerReport"].methods[0].name
    );
}
