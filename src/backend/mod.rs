//! The database boundary. The core plans SQL and hands it here; rows come
//! back unchanged as JSON maps.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Map<String, Value>>,
}

/// Executes a planned statement with its bound values. Implementations must
/// be thread-safe; the engine never retains more than a shared handle.
#[async_trait]
pub trait Database: Send + Sync {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;
}

#[cfg(feature = "duckdb")]
mod duckdb;
#[cfg(feature = "duckdb")]
pub use self::duckdb::DuckDbDatabase;
