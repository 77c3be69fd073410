use std::time::Instant;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row};
use tokio::sync::RwLock;

use crate::analytics;
use crate::error::{clean_sqlx_message, CoreError, CoreResult};
use crate::models::{
    AnalyticsSnapshot, ColumnInfo, ConnectionProfile, EngineKind, QueryOutput, TableStat,
    TestConnectionResult,
};

use super::{returns_rows, Connector};

fn connection_string(profile: &ConnectionProfile) -> String {
    if profile.database == ":memory:" {
        "sqlite::memory:".to_string()
    } else {
        format!("sqlite://{}?mode=rwc", profile.database)
    }
}

async fn open_pool(profile: &ConnectionProfile) -> CoreResult<SqlitePool> {
    // In-memory databases exist per connection, so the pool is pinned to a
    // single connection to keep one coherent database.
    SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(&connection_string(profile))
        .await
        .map_err(|e| CoreError::Connection(clean_sqlx_message(&e.to_string())))
}

pub struct SqliteConnector {
    pool: RwLock<Option<SqlitePool>>,
}

impl SqliteConnector {
    pub fn new() -> Self {
        SqliteConnector {
            pool: RwLock::new(None),
        }
    }

    async fn pool(&self) -> CoreResult<SqlitePool> {
        self.pool
            .read()
            .await
            .clone()
            .ok_or_else(|| CoreError::Connection("not connected".into()))
    }
}

impl Default for SqliteConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    fn engine(&self) -> EngineKind {
        EngineKind::Sqlite
    }

    async fn connect(&self, profile: &ConnectionProfile) -> CoreResult<()> {
        let pool = open_pool(profile).await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| CoreError::Connection(clean_sqlx_message(&e.to_string())))?;
        *self.pool.write().await = Some(pool);
        log::info!("sqlite connection established ({})", profile.name);
        Ok(())
    }

    async fn disconnect(&self) -> CoreResult<()> {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
            log::info!("sqlite connection closed");
        }
        Ok(())
    }

    async fn test_connection(&self, profile: &ConnectionProfile) -> TestConnectionResult {
        let start = Instant::now();
        match open_pool(profile).await {
            Ok(pool) => {
                let result = sqlx::query("SELECT 1").execute(&pool).await;
                pool.close().await;
                match result {
                    Ok(_) => TestConnectionResult {
                        success: true,
                        message: "Connection successful".into(),
                        latency_ms: Some(start.elapsed().as_millis() as u64),
                    },
                    Err(e) => TestConnectionResult {
                        success: false,
                        message: clean_sqlx_message(&e.to_string()),
                        latency_ms: None,
                    },
                }
            }
            Err(e) => TestConnectionResult {
                success: false,
                message: e.to_string(),
                latency_ms: None,
            },
        }
    }

    async fn get_schemas(&self) -> CoreResult<Vec<String>> {
        // SQLite has no schema hierarchy; everything lives in "main".
        self.pool().await?;
        Ok(vec!["main".to_string()])
    }

    async fn get_tables(&self, _schema: Option<&str>) -> CoreResult<Vec<String>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.get("name")).collect())
    }

    async fn get_columns(&self, table: &str, _schema: Option<&str>) -> CoreResult<Vec<ColumnInfo>> {
        let pool = self.pool().await?;
        let quoted = table.replace('"', "\"\"");
        let rows = sqlx::query(&format!("PRAGMA table_info(\"{}\")", quoted))
            .fetch_all(&pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let notnull: i64 = row.get("notnull");
                ColumnInfo {
                    name: row.get("name"),
                    data_type: row.get("type"),
                    is_nullable: notnull == 0,
                    column_default: row.try_get("dflt_value").ok(),
                }
            })
            .collect())
    }

    async fn execute_query(&self, query: &str) -> CoreResult<QueryOutput> {
        let pool = self.pool().await?;
        if returns_rows(query) {
            let rows = sqlx::query(query).fetch_all(&pool).await?;
            Ok(rows_to_output(&rows))
        } else {
            let result = sqlx::query(query).execute(&pool).await?;
            Ok(QueryOutput {
                rows_affected: result.rows_affected(),
                ..QueryOutput::default()
            })
        }
    }

    async fn collect_metrics(&self) -> CoreResult<AnalyticsSnapshot> {
        let pool = self.pool().await?;
        analytics::sqlite::collect(&pool).await
    }

    async fn table_statistics(&self) -> CoreResult<Vec<TableStat>> {
        let pool = self.pool().await?;
        analytics::sqlite::table_stats(&pool).await
    }

    // query_plan and kill_query keep their defaults: a local file database
    // has no sessions to terminate and no JSON plan format.
}

fn rows_to_output(rows: &[SqliteRow]) -> QueryOutput {
    let Some(first) = rows.first() else {
        return QueryOutput::default();
    };
    let columns: Vec<String> = first
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let data = rows
        .iter()
        .map(|row| (0..columns.len()).map(|i| extract_value(row, i)).collect())
        .collect();
    QueryOutput {
        columns,
        rows: data,
        rows_affected: 0,
    }
}

/// SQLite columns are dynamically typed, so decoding walks the storage
/// classes in order instead of trusting the declared type.
fn extract_value(row: &SqliteRow, index: usize) -> serde_json::Value {
    use serde_json::Value;

    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return match v {
            Some(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(n.to_string())),
            None => Value::Null,
        };
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v
            .map(|bytes| Value::String(format!("0x{}", hex::encode(bytes))))
            .unwrap_or(Value::Null);
    }
    serde_json::Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_profile() -> ConnectionProfile {
        ConnectionProfile {
            id: "s1".into(),
            name: "memory".into(),
            engine: EngineKind::Sqlite,
            host: String::new(),
            port: 0,
            username: String::new(),
            password: String::new(),
            database: ":memory:".into(),
            timeout_secs: 30,
        }
    }

    #[tokio::test]
    async fn connects_and_lists_tables() {
        let connector = SqliteConnector::new();
        connector.connect(&memory_profile()).await.unwrap();
        connector
            .execute_query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .await
            .unwrap();
        let tables = connector.get_tables(None).await.unwrap();
        assert_eq!(tables, vec!["users".to_string()]);

        let columns = connector.get_columns("users", None).await.unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "id");
        assert!(!columns[1].is_nullable);
        connector.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn query_output_decodes_storage_classes() {
        let connector = SqliteConnector::new();
        connector.connect(&memory_profile()).await.unwrap();
        let output = connector
            .execute_query("SELECT 1 AS n, 2.5 AS f, 'hi' AS s, NULL AS missing")
            .await
            .unwrap();
        assert_eq!(output.columns, vec!["n", "f", "s", "missing"]);
        assert_eq!(output.rows[0][0], serde_json::json!(1));
        assert_eq!(output.rows[0][1], serde_json::json!(2.5));
        assert_eq!(output.rows[0][2], serde_json::json!("hi"));
        assert_eq!(output.rows[0][3], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn statements_report_rows_affected() {
        let connector = SqliteConnector::new();
        connector.connect(&memory_profile()).await.unwrap();
        connector
            .execute_query("CREATE TABLE t (x INTEGER)")
            .await
            .unwrap();
        let output = connector
            .execute_query("INSERT INTO t VALUES (1), (2), (3)")
            .await
            .unwrap();
        assert_eq!(output.rows_affected, 3);
    }

    #[tokio::test]
    async fn calls_fail_cleanly_when_not_connected() {
        let connector = SqliteConnector::new();
        let err = connector.get_tables(None).await.unwrap_err();
        assert_eq!(err.kind(), "connection");
    }
}
