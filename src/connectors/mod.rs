pub mod mongodb;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};
use crate::models::{
    AnalyticsSnapshot, ColumnInfo, ConnectionProfile, EngineKind, QueryOutput, QueryPlan,
    TableStat, TestConnectionResult,
};

pub use self::mongodb::MongoDbConnector;
pub use self::mysql::{MariaDbConnector, MySqlConnector};
pub use self::postgres::PostgresConnector;
pub use self::sqlite::SqliteConnector;

fn not_implemented(method: &str) -> CoreError {
    CoreError::Unsupported(format!("{} is not implemented for this engine", method))
}

/// Capability contract implemented once per engine. Every method has a
/// failing default so a new engine only overrides the subset it supports;
/// engine-native errors are normalized to `CoreError` before they leave an
/// implementation.
#[async_trait]
pub trait Connector: Send + Sync {
    fn engine(&self) -> EngineKind;

    async fn connect(&self, _profile: &ConnectionProfile) -> CoreResult<()> {
        Err(not_implemented("connect"))
    }

    async fn disconnect(&self) -> CoreResult<()> {
        Err(not_implemented("disconnect"))
    }

    async fn test_connection(&self, _profile: &ConnectionProfile) -> TestConnectionResult {
        TestConnectionResult {
            success: false,
            message: "test_connection is not implemented for this engine".into(),
            latency_ms: None,
        }
    }

    async fn get_schemas(&self) -> CoreResult<Vec<String>> {
        Err(not_implemented("get_schemas"))
    }

    async fn get_tables(&self, _schema: Option<&str>) -> CoreResult<Vec<String>> {
        Err(not_implemented("get_tables"))
    }

    async fn get_columns(&self, _table: &str, _schema: Option<&str>) -> CoreResult<Vec<ColumnInfo>> {
        Err(not_implemented("get_columns"))
    }

    async fn execute_query(&self, _query: &str) -> CoreResult<QueryOutput> {
        Err(not_implemented("execute_query"))
    }

    /// Point-in-time operational metrics, normalized across engines.
    async fn collect_metrics(&self) -> CoreResult<AnalyticsSnapshot> {
        Err(not_implemented("collect_metrics"))
    }

    async fn table_statistics(&self) -> CoreResult<Vec<TableStat>> {
        Err(not_implemented("table_statistics"))
    }

    async fn query_plan(&self, _query: &str) -> CoreResult<QueryPlan> {
        Ok(QueryPlan::Unsupported {
            message: format!("query plans are not supported for {}", self.engine()),
        })
    }

    async fn kill_query(&self, _pid: &str) -> CoreResult<()> {
        Err(not_implemented("kill_query"))
    }
}

/// Single registration point mapping the closed engine enumeration to its
/// concrete connector.
pub fn create_connector(engine: EngineKind) -> Box<dyn Connector> {
    match engine {
        EngineKind::Postgres => Box::new(PostgresConnector::new()),
        EngineKind::MySql => Box::new(MySqlConnector::new(EngineKind::MySql)),
        EngineKind::MariaDb => Box::new(MariaDbConnector::new()),
        EngineKind::Sqlite => Box::new(SqliteConnector::new()),
        EngineKind::MongoDb => Box::new(MongoDbConnector::new()),
    }
}

pub fn supported_engines() -> &'static [EngineKind] {
    &EngineKind::ALL
}

/// True when the statement produces a result set and should be fetched
/// rather than executed for its side effects.
pub(crate) fn returns_rows(query: &str) -> bool {
    let verb = query
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();
    matches!(
        verb.as_str(),
        "SELECT" | "WITH" | "SHOW" | "EXPLAIN" | "DESCRIBE" | "DESC" | "PRAGMA" | "VALUES"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareConnector;

    #[async_trait]
    impl Connector for BareConnector {
        fn engine(&self) -> EngineKind {
            EngineKind::Postgres
        }
    }

    #[tokio::test]
    async fn default_methods_fail_with_unsupported() {
        let connector = BareConnector;
        let err = connector.get_schemas().await.unwrap_err();
        assert_eq!(err.kind(), "unsupported");
        let err = connector.execute_query("SELECT 1").await.unwrap_err();
        assert_eq!(err.kind(), "unsupported");
    }

    #[tokio::test]
    async fn default_query_plan_is_typed_unsupported() {
        let connector = BareConnector;
        match connector.query_plan("SELECT 1").await.unwrap() {
            QueryPlan::Unsupported { message } => assert!(message.contains("postgresql")),
            QueryPlan::Available { .. } => panic!("expected unsupported"),
        }
    }

    #[test]
    fn factory_covers_every_engine() {
        for engine in supported_engines() {
            assert_eq!(create_connector(*engine).engine(), *engine);
        }
    }

    #[test]
    fn returns_rows_detects_result_sets() {
        assert!(returns_rows("SELECT 1"));
        assert!(returns_rows("  with x as (select 1) select * from x"));
        assert!(!returns_rows("UPDATE t SET x = 1"));
        assert!(!returns_rows("INSERT INTO t VALUES (1)"));
    }
}
