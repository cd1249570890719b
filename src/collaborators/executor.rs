//! SQL Executor Collaborator
//!
//! Runs generated SQL against the profile's warehouse. Statement failures
//! come back as a structured result with a non-200 status so the machine can
//! surface them (and feed auto-correction); `Err` is reserved for
//! infrastructure faults like unreachable hosts.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row, TypeInfo};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{GenBiError, Result};
use crate::profile::{ConnectionConfig, DatabaseProfile};

/// Result of running one statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlRunResult {
    /// Row objects as JSON. Null on failure.
    pub data: serde_json::Value,
    /// 200 on success, the warehouse failure status otherwise.
    pub status_code: u16,
    #[serde(default)]
    pub error_info: String,
}

impl SqlRunResult {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            data,
            status_code: 200,
            error_info: String::new(),
        }
    }

    pub fn failure(status_code: u16, error_info: impl Into<String>) -> Self {
        Self {
            data: serde_json::Value::Null,
            status_code,
            error_info: error_info.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, profile: &DatabaseProfile, sql: &str) -> Result<SqlRunResult>;
}

/// MySQL adapter over a lazily-connected sqlx pool per connection config.
pub struct MySqlExecutor {
    pools: Mutex<HashMap<String, MySqlPool>>,
}

impl MySqlExecutor {
    pub fn new() -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
        }
    }

    fn pool_for(&self, connection: &ConnectionConfig) -> Result<MySqlPool> {
        let url = format!(
            "mysql://{}:{}@{}:{}/{}",
            connection.username, connection.password, connection.host, connection.port, connection.database
        );
        let mut pools = self.pools.lock().unwrap();
        if let Some(pool) = pools.get(&url) {
            return Ok(pool.clone());
        }
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy(&url)
            .map_err(|e| GenBiError::Execution(format!("Invalid MySQL connection config: {}", e)))?;
        pools.insert(url, pool.clone());
        Ok(pool)
    }
}

impl Default for MySqlExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn mysql_row_to_json(row: &MySqlRow) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = mysql_value(row, index, column.type_info().name());
        object.insert(column.name().to_string(), value);
    }
    serde_json::Value::Object(object)
}

fn mysql_value(row: &MySqlRow, index: usize, type_name: &str) -> serde_json::Value {
    use serde_json::Value;
    match type_name {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row
            .try_get::<Option<u64>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT" | "DOUBLE" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "DECIMAL" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .or_else(|| {
                row.try_get::<Option<String>, _>(index)
                    .ok()
                    .flatten()
                    .map(Value::String)
            })
            .unwrap_or(Value::Null),
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)
            .ok()
            .flatten()
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),
        "DATETIME" => row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .ok()
            .flatten()
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .ok()
            .flatten()
            .map(|d| Value::String(d.to_rfc3339()))
            .unwrap_or(Value::Null),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)
            .ok()
            .flatten()
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null),
        "JSON" => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .ok()
            .flatten()
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

#[async_trait]
impl SqlExecutor for MySqlExecutor {
    async fn execute(&self, profile: &DatabaseProfile, sql: &str) -> Result<SqlRunResult> {
        info!("Executing on MySQL: {}", sql);
        let pool = self.pool_for(&profile.connection)?;
        match sqlx::query(sql).fetch_all(&pool).await {
            Ok(rows) => {
                debug!("MySQL returned {} rows", rows.len());
                let data: Vec<serde_json::Value> = rows.iter().map(mysql_row_to_json).collect();
                Ok(SqlRunResult::success(serde_json::Value::Array(data)))
            }
            Err(sqlx::Error::Database(db_err)) => {
                Ok(SqlRunResult::failure(500, db_err.message()))
            }
            Err(e) => Err(GenBiError::Execution(format!("MySQL execution failed: {}", e))),
        }
    }
}

/// ClickHouse adapter over the HTTP interface with `FORMAT JSON` output.
#[derive(Clone)]
pub struct ClickHouseHttpExecutor {
    client: Client,
}

impl ClickHouseHttpExecutor {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GenBiError::Execution(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn clickhouse_rows(body: &str) -> Result<serde_json::Value> {
    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| GenBiError::Execution(format!("Failed to parse ClickHouse response: {}", e)))?;
    Ok(parsed
        .get("data")
        .cloned()
        .unwrap_or_else(|| serde_json::Value::Array(Vec::new())))
}

#[async_trait]
impl SqlExecutor for ClickHouseHttpExecutor {
    async fn execute(&self, profile: &DatabaseProfile, sql: &str) -> Result<SqlRunResult> {
        info!("Executing on ClickHouse: {}", sql);
        let connection = &profile.connection;
        let base = if connection.host.starts_with("http") {
            connection.host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", connection.host)
        };
        let url = format!("{}:{}/", base, connection.port);
        let statement = format!("{} FORMAT JSON", sql.trim_end_matches(';'));

        let response = self
            .client
            .post(&url)
            .query(&[("database", connection.database.as_str())])
            .header("X-ClickHouse-User", &connection.username)
            .header("X-ClickHouse-Key", &connection.password)
            .body(statement)
            .send()
            .await
            .map_err(|e| GenBiError::Execution(format!("ClickHouse request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenBiError::Execution(format!("Failed to read ClickHouse response: {}", e)))?;
        if !status.is_success() {
            return Ok(SqlRunResult::failure(status.as_u16(), text));
        }
        Ok(SqlRunResult::success(clickhouse_rows(&text)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_failure_results() {
        let ok = SqlRunResult::success(serde_json::json!([{"n": 1}]));
        assert!(ok.is_success());
        assert_eq!(ok.status_code, 200);

        let failed = SqlRunResult::failure(500, "SQL is empty");
        assert!(!failed.is_success());
        assert_eq!(failed.error_info, "SQL is empty");
        assert!(failed.data.is_null());
    }

    #[test]
    fn clickhouse_body_unwraps_data_array() {
        let body = r#"{"meta": [{"name": "n"}], "data": [{"n": "1"}], "rows": 1}"#;
        let rows = clickhouse_rows(body).unwrap();
        assert_eq!(rows, serde_json::json!([{"n": "1"}]));
    }

    #[test]
    fn clickhouse_body_without_data_is_empty() {
        let rows = clickhouse_rows("{}").unwrap();
        assert_eq!(rows, serde_json::json!([]));
    }
}
