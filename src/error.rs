use thiserror::Error;

use crate::state::TraceStep;

pub type Result<T> = std::result::Result<T, HtnqlError>;

#[derive(Debug, Error)]
pub enum HtnqlError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spec error: {0}")]
    Spec(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("join error: {message} (table {table})")]
    Join { table: String, message: String },
    #[error("agent error: {0}")]
    Agent(String),
    #[error("no applicable method for task {task}")]
    NoApplicableMethod { task: String },
    #[error("primitive {name} failed: {message}")]
    Primitive { name: String, message: String },
    #[error("planning cancelled after {} trace steps", .trace.len())]
    Cancelled { trace: Vec<TraceStep> },
    #[error("execution error: {message}")]
    Execution {
        message: String,
        trace: Vec<TraceStep>,
    },
    #[error("config error: {0}")]
    Config(String),
    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
