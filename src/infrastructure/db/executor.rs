//! Read-only query execution against Postgres.
//!
//! Statements arrive already validated; the executor still refuses anything
//! that does not start with SELECT or WITH, and the database role it connects
//! as is expected to hold a read-only grant. That grant is the real security
//! boundary.

use crate::domain::entities::ExecutionResult;
use crate::domain::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Pool and query limits.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub query_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_rows: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            connect_timeout_secs: 10,
            query_timeout_secs: 60,
            idle_timeout_secs: 300,
            max_rows: 1000,
        }
    }
}

/// Runs validated SQL and reports rows plus job metadata.
#[async_trait]
pub trait QueryExecutor {
    async fn execute(&self, sql: &str) -> Result<ExecutionResult>;
}

pub struct PostgresExecutor {
    pool: PgPool,
    config: ExecutorConfig,
}

impl PostgresExecutor {
    pub async fn connect(database_url: &str, config: ExecutorConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| {
                AppError::ExecutionError(format!("Failed to connect to database: {}", e))
            })?;

        info!(max_connections = config.max_connections, "Connected to warehouse database");
        Ok(Self { pool, config })
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute(&self, sql: &str) -> Result<ExecutionResult> {
        ensure_executable(sql)?;

        let started = Instant::now();
        let fetched = tokio::time::timeout(
            Duration::from_secs(self.config.query_timeout_secs),
            sqlx::query(sql).fetch_all(&self.pool),
        )
        .await
        .map_err(|_| {
            AppError::ExecutionError(format!(
                "Query timed out after {} seconds",
                self.config.query_timeout_secs
            ))
        })?
        .map_err(|e| AppError::ExecutionError(format!("Query execution failed: {}", e)))?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let fetched_count = fetched.len();

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<HashMap<String, serde_json::Value>> = Vec::new();
        for row in fetched.iter().take(self.config.max_rows) {
            if columns.is_empty() {
                columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }

            let mut row_map = HashMap::new();
            for (i, column) in row.columns().iter().enumerate() {
                row_map.insert(column.name().to_string(), extract_column_value(row, i));
            }
            rows.push(row_map);
        }

        if fetched_count > self.config.max_rows {
            warn!(
                fetched = fetched_count,
                max_rows = self.config.max_rows,
                "Result truncated to the row cap"
            );
        }

        let bytes_processed = rows.iter().map(estimate_row_bytes).sum();
        let result = ExecutionResult {
            columns,
            row_count: rows.len(),
            rows,
            bytes_processed,
            elapsed_ms,
            cache_hit: false,
            job_id: Some(Uuid::new_v4().to_string()),
        };

        info!(
            row_count = result.row_count,
            elapsed_ms = result.elapsed_ms,
            bytes_processed = result.bytes_processed,
            "Query executed"
        );
        Ok(result)
    }
}

fn ensure_executable(sql: &str) -> Result<()> {
    let sql_upper = sql.trim().to_uppercase();
    if sql_upper.starts_with("SELECT") || sql_upper.starts_with("WITH") {
        Ok(())
    } else {
        Err(AppError::ExecutionError(
            "Only SELECT and WITH statements are executed".to_string(),
        ))
    }
}

/// Extract a column value from a row as serde_json::Value
fn extract_column_value(row: &PgRow, index: usize) -> serde_json::Value {
    // Try different types in order of likelihood
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v
            .map(|n| serde_json::Value::Number(n.into()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return v
            .map(|n| serde_json::Value::Number(n.into()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v
            .map(serde_json::Value::Bool)
            .unwrap_or(serde_json::Value::Null);
    }
    // NUMERIC aggregates (SUM, AVG) come back as BigDecimal; render losslessly.
    if let Ok(v) = row.try_get::<Option<sqlx::types::BigDecimal>, _>(index) {
        return v
            .map(|n| serde_json::Value::String(n.to_string()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index) {
        return v
            .map(|dt| serde_json::Value::String(dt.to_rfc3339()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
        return v
            .map(|dt| serde_json::Value::String(dt.to_string()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
        return v
            .map(|d| serde_json::Value::String(d.to_string()))
            .unwrap_or(serde_json::Value::Null);
    }

    // Default to null for unsupported types
    serde_json::Value::Null
}

fn estimate_row_bytes(row: &HashMap<String, serde_json::Value>) -> u64 {
    serde_json::to_string(row)
        .map(|s| s.len() as u64)
        .unwrap_or(0)
}
