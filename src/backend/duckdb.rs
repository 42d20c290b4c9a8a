use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use duckdb::types::Value as DuckValue;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use crate::error::{HtnqlError, Result};

use super::{ColumnMeta, Database, QueryResult};

/// DuckDB implementation of the database boundary: a small connection pool
/// behind a concurrency limiter, statements run on the blocking pool.
#[derive(Clone)]
pub struct DuckDbDatabase {
    database_path: PathBuf,
    limiter: Arc<Semaphore>,
    pool: Arc<Mutex<Vec<duckdb::Connection>>>,
}

impl DuckDbDatabase {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            database_path: path.as_ref().to_path_buf(),
            limiter: Arc::new(Semaphore::new(16)),
            pool: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure maximum concurrent executions; callers tune for hardware.
    pub fn with_max_concurrency(mut self, max_in_flight: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(max_in_flight));
        self
    }

    async fn acquire_slot(&self) -> Result<SemaphorePermit<'_>> {
        self.limiter.acquire().await.map_err(|e| HtnqlError::Execution {
            message: format!("limiter closed: {e}"),
            trace: Vec::new(),
        })
    }

    async fn checkout_connection(&self) -> Result<duckdb::Connection> {
        if let Some(conn) = self.pool.lock().await.pop() {
            return Ok(conn);
        }
        duckdb::Connection::open(self.database_path.clone()).map_err(|e| HtnqlError::Execution {
            message: format!("open duckdb: {e}"),
            trace: Vec::new(),
        })
    }
}

#[async_trait]
impl Database for DuckDbDatabase {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let sql = sql.to_string();
        let bound: Vec<DuckValue> = params.iter().map(json_to_duck).collect();
        let _permit = self.acquire_slot().await?;
        let conn = self.checkout_connection().await?;
        let pool = self.pool.clone();

        let result =
            tokio::task::spawn_blocking(move || -> Result<(QueryResult, duckdb::Connection)> {
                let start = Instant::now();
                let mut conn = conn;
                let mut stmt = conn.prepare(&sql)?;
                let mut rows_iter = stmt.query(duckdb::params_from_iter(bound))?;
                let stmt_ref = rows_iter.as_ref().ok_or_else(|| HtnqlError::Execution {
                    message: "statement missing".to_string(),
                    trace: Vec::new(),
                })?;
                let mut column_names = Vec::new();
                for idx in 0..stmt_ref.column_count() {
                    let name = stmt_ref
                        .column_name(idx)
                        .map_err(|e| HtnqlError::Execution {
                            message: e.to_string(),
                            trace: Vec::new(),
                        })?;
                    column_names.push(name.to_string());
                }
                let mut rows = Vec::new();
                while let Some(row) = rows_iter.next()? {
                    let mut map = Map::new();
                    for (idx, name) in column_names.iter().enumerate() {
                        let value = cell_to_json(row.get_ref(idx)?.to_owned());
                        map.insert(name.clone(), value);
                    }
                    rows.push(map);
                }

                let columns: Vec<_> = column_names
                    .into_iter()
                    .map(|name| ColumnMeta { name })
                    .collect();
                let elapsed = start.elapsed();
                tracing::debug!(
                    rows = rows.len(),
                    columns = columns.len(),
                    ms = elapsed.as_millis(),
                    "duckdb execute"
                );
                Ok((QueryResult { columns, rows }, conn))
            })
            .await
            .map_err(|e| HtnqlError::Execution {
                message: format!("task join error: {e}"),
                trace: Vec::new(),
            })?;

        let (result, conn) = result?;
        {
            let mut guard = pool.lock().await;
            guard.push(conn);
        }
        Ok(result)
    }
}

fn json_to_duck(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Bool(b) => DuckValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                DuckValue::BigInt(i)
            } else {
                DuckValue::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => DuckValue::Text(s.clone()),
        other => DuckValue::Text(other.to_string()),
    }
}

/// Convert one result cell to JSON. Report rows are aggregate scalars
/// (counts, sums, grouping keys), so those map onto native JSON types;
/// composite values fall back to their debug rendering.
fn cell_to_json(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => b.into(),
        DuckValue::TinyInt(i) => i64::from(i).into(),
        DuckValue::SmallInt(i) => i64::from(i).into(),
        DuckValue::Int(i) => i64::from(i).into(),
        DuckValue::BigInt(i) => i.into(),
        DuckValue::UTinyInt(u) => u64::from(u).into(),
        DuckValue::USmallInt(u) => u64::from(u).into(),
        DuckValue::UInt(u) => u64::from(u).into(),
        DuckValue::UBigInt(u) => u.into(),
        DuckValue::Float(f) => f64::from(f).into(),
        DuckValue::Double(f) => f.into(),
        DuckValue::Date32(d) => i64::from(d).into(),
        // Wider than i64/f64; keep the textual form rather than lose digits.
        DuckValue::HugeInt(i) => Value::String(i.to_string()),
        DuckValue::Decimal(d) => Value::String(d.to_string()),
        DuckValue::Text(s) | DuckValue::Enum(s) => Value::String(s),
        DuckValue::Blob(bytes) => Value::String(hex::encode(bytes)),
        DuckValue::Timestamp(unit, raw) | DuckValue::Time64(unit, raw) => {
            Value::String(format!("{raw} {unit:?}"))
        }
        DuckValue::List(items) | DuckValue::Array(items) => {
            Value::Array(items.into_iter().map(cell_to_json).collect())
        }
        other => Value::String(format!("{other:?}")),
    }
}
