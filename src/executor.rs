use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::connectors::Connector;
use crate::error::CoreError;
use crate::history::QueryHistory;
use crate::models::{
    ConnectionProfile, EngineKind, QueryRequest, QueryResponse, QuerySettings,
};

/// Runs ad-hoc statements through a connector: validates, bounds, times out,
/// and records outcomes to the query history.
pub struct QueryExecutor {
    history: Arc<QueryHistory>,
}

impl QueryExecutor {
    pub fn new(history: Arc<QueryHistory>) -> Self {
        QueryExecutor { history }
    }

    pub async fn execute(
        &self,
        profile: &ConnectionProfile,
        connector: &dyn Connector,
        request: &QueryRequest,
        defaults: &QuerySettings,
    ) -> QueryResponse {
        // The confirmation gate short-circuits before anything touches the
        // engine; gated statements are not recorded either.
        if !request.skip_validation
            && defaults.confirm_destructive
            && is_destructive_unbounded(&request.query)
        {
            return QueryResponse::confirmation_required();
        }

        let limit = request.limit.unwrap_or(defaults.default_limit);
        let offset = request.offset.unwrap_or(0);
        let bounded = apply_limit(&request.query, profile.engine, limit, offset);

        let timeout_secs = request.timeout.unwrap_or(if profile.timeout_secs > 0 {
            profile.timeout_secs
        } else {
            defaults.timeout_seconds
        });

        let start = Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            connector.execute_query(&bounded),
        )
        .await;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        let response = match result {
            // Dropping the raced future abandons the engine call; the
            // caller gets a distinct timeout kind, never partial rows.
            Err(_) => {
                let error = CoreError::QueryTimeout(timeout_secs);
                QueryResponse {
                    success: false,
                    columns: Vec::new(),
                    rows: Vec::new(),
                    row_count: 0,
                    execution_time_ms,
                    error_kind: Some(error.kind().to_string()),
                    error: Some(error.to_string()),
                    requires_confirmation: false,
                }
            }
            Ok(Err(error)) => QueryResponse {
                success: false,
                columns: Vec::new(),
                rows: Vec::new(),
                row_count: 0,
                execution_time_ms,
                error_kind: Some(error.kind().to_string()),
                error: Some(error.to_string()),
                requires_confirmation: false,
            },
            Ok(Ok(output)) => {
                let row_count = if output.rows.is_empty() {
                    output.rows_affected as usize
                } else {
                    output.rows.len()
                };
                QueryResponse {
                    success: true,
                    columns: output.columns,
                    rows: output.rows,
                    row_count,
                    execution_time_ms,
                    error: None,
                    error_kind: None,
                    requires_confirmation: false,
                }
            }
        };

        self.history.add(
            &profile.id,
            &request.query,
            response.success,
            execution_time_ms,
            response.row_count,
            response.error.clone(),
        );

        response
    }

    pub fn history(&self) -> &QueryHistory {
        &self.history
    }
}

/// Skip leading whitespace and SQL comments so classification sees the
/// first real token.
fn strip_leading_trivia(query: &str) -> &str {
    let mut rest = query;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            return trimmed;
        }
    }
}

fn contains_keyword(query: &str, keyword: &str) -> bool {
    query
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .any(|word| word.eq_ignore_ascii_case(keyword))
}

/// Data-mutating statements without a bounding clause must be confirmed
/// explicitly before they run. DROP and TRUNCATE have no bounding clause to
/// give, so they are always gated.
pub fn is_destructive_unbounded(query: &str) -> bool {
    let body = strip_leading_trivia(query);
    let verb = body
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();
    match verb.as_str() {
        "UPDATE" | "DELETE" => {
            !contains_keyword(body, "where") && !contains_keyword(body, "limit")
        }
        "DROP" | "TRUNCATE" => true,
        _ => false,
    }
}

/// Append LIMIT/OFFSET to unbounded SELECTs on engines that accept it. The
/// document store bounds results inside its own connector.
fn apply_limit(query: &str, engine: EngineKind, limit: u32, offset: u32) -> String {
    if engine == EngineKind::MongoDb {
        return query.to_string();
    }
    let body = strip_leading_trivia(query);
    let verb = body
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();
    if verb != "SELECT" && verb != "WITH" {
        return query.to_string();
    }
    if contains_keyword(body, "limit") {
        return query.to_string();
    }
    let trimmed = query.trim_end().trim_end_matches(';');
    if offset > 0 {
        format!("{} LIMIT {} OFFSET {}", trimmed, limit, offset)
    } else {
        format!("{} LIMIT {}", trimmed, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, CoreResult};
    use crate::models::QueryOutput;
    use crate::storage::AppStorage;
    use async_trait::async_trait;
    use tempfile::tempdir;

    #[test]
    fn unbounded_mutations_are_flagged() {
        assert!(is_destructive_unbounded("DELETE FROM t"));
        assert!(is_destructive_unbounded("update t set x = 1"));
        assert!(is_destructive_unbounded("  -- cleanup\nDELETE FROM t"));
        assert!(is_destructive_unbounded("DROP TABLE t"));
        assert!(is_destructive_unbounded("TRUNCATE t"));
    }

    #[test]
    fn bounded_mutations_pass() {
        assert!(!is_destructive_unbounded("DELETE FROM t WHERE id = 1"));
        assert!(!is_destructive_unbounded("UPDATE t SET x = 1 WHERE id = 2"));
        assert!(!is_destructive_unbounded("DELETE FROM t LIMIT 10"));
        assert!(!is_destructive_unbounded("SELECT * FROM t"));
        assert!(!is_destructive_unbounded("INSERT INTO t VALUES (1)"));
    }

    #[test]
    fn apply_limit_bounds_bare_selects() {
        assert_eq!(
            apply_limit("SELECT * FROM t;", EngineKind::Sqlite, 100, 0),
            "SELECT * FROM t LIMIT 100"
        );
        assert_eq!(
            apply_limit("SELECT * FROM t", EngineKind::Postgres, 50, 25),
            "SELECT * FROM t LIMIT 50 OFFSET 25"
        );
        // Caller-specified limits and non-selects are untouched.
        assert_eq!(
            apply_limit("SELECT * FROM t LIMIT 5", EngineKind::Postgres, 100, 0),
            "SELECT * FROM t LIMIT 5"
        );
        assert_eq!(
            apply_limit("UPDATE t SET x = 1 WHERE id = 1", EngineKind::MySql, 100, 0),
            "UPDATE t SET x = 1 WHERE id = 1"
        );
        assert_eq!(
            apply_limit("{}", EngineKind::MongoDb, 100, 0),
            "{}"
        );
    }

    struct SlowConnector;

    #[async_trait]
    impl Connector for SlowConnector {
        fn engine(&self) -> EngineKind {
            EngineKind::Sqlite
        }

        async fn execute_query(&self, _query: &str) -> CoreResult<QueryOutput> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(QueryOutput::default())
        }
    }

    struct FailingConnector;

    #[async_trait]
    impl Connector for FailingConnector {
        fn engine(&self) -> EngineKind {
            EngineKind::Sqlite
        }

        async fn execute_query(&self, _query: &str) -> CoreResult<QueryOutput> {
            Err(CoreError::Query("no such table: missing".into()))
        }
    }

    fn executor() -> (QueryExecutor, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(AppStorage::new(dir.path()).unwrap());
        let history = Arc::new(QueryHistory::load(storage));
        (QueryExecutor::new(history), dir)
    }

    fn profile() -> ConnectionProfile {
        ConnectionProfile {
            id: "c1".into(),
            name: "test".into(),
            engine: EngineKind::Sqlite,
            host: String::new(),
            port: 0,
            username: String::new(),
            password: String::new(),
            database: ":memory:".into(),
            timeout_secs: 30,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn user_timeout_beats_the_engine_call() {
        let (executor, _dir) = executor();
        let request = QueryRequest {
            query: "SELECT slow()".into(),
            timeout: Some(2),
            ..QueryRequest::default()
        };

        let response = executor
            .execute(&profile(), &SlowConnector, &request, &QuerySettings::default())
            .await;

        assert!(!response.success);
        assert_eq!(response.error_kind.as_deref(), Some("queryTimeout"));
        // The timeout lands in history as a failed execution.
        let history = executor.history().get_history("c1", 10);
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);
    }

    #[tokio::test]
    async fn gated_statement_is_not_executed_or_recorded() {
        let (executor, _dir) = executor();
        let request = QueryRequest {
            query: "DELETE FROM t".into(),
            ..QueryRequest::default()
        };

        let response = executor
            .execute(&profile(), &FailingConnector, &request, &QuerySettings::default())
            .await;

        assert!(response.requires_confirmation);
        assert!(!response.success);
        assert!(executor.history().get_history("c1", 10).is_empty());
    }

    #[tokio::test]
    async fn failures_are_structured_and_recorded() {
        let (executor, _dir) = executor();
        let request = QueryRequest {
            query: "SELECT * FROM missing".into(),
            ..QueryRequest::default()
        };

        let response = executor
            .execute(&profile(), &FailingConnector, &request, &QuerySettings::default())
            .await;

        assert!(!response.success);
        assert_eq!(response.error_kind.as_deref(), Some("query"));
        let history = executor.history().get_history("c1", 10);
        assert_eq!(history.len(), 1);
        assert!(history[0].error.as_deref().unwrap().contains("missing"));
    }
}
