use chrono::Utc;
use sqlx::{MySqlPool, Row};

use crate::error::{CoreError, CoreResult};
use crate::models::{
    ActiveQuery, AnalyticsSnapshot, BlockedQuery, QueryPlan, QueryStats, TableStat,
};

use super::{BLOCKED_CAP, CURRENT_CAP, LONG_RUNNING_CAP, SLOW_QUERY_THRESHOLD_SECS};

pub async fn collect(pool: &MySqlPool) -> CoreResult<AnalyticsSnapshot> {
    let processes = sqlx::query(
        r#"
        SELECT
            id,
            COALESCE(user, '') AS user,
            COALESCE(command, '') AS command,
            COALESCE(state, '') AS state,
            COALESCE(time, 0) AS time,
            info
        FROM information_schema.processlist
        WHERE id <> CONNECTION_ID()
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut current_queries = Vec::new();
    let mut blocked_queries = Vec::new();
    let mut query_stats = QueryStats::default();
    let mut idle_connections = 0u32;

    for row in &processes {
        let command: String = row.get("command");
        if command == "Sleep" {
            idle_connections += 1;
            continue;
        }
        let Some(info) = row.try_get::<Option<String>, _>("info").ok().flatten() else {
            continue;
        };
        let state: String = row.get("state");
        query_stats.record(&info);
        let query = ActiveQuery {
            pid: row.get::<u64, _>("id").to_string(),
            user: row.get("user"),
            state: state.clone(),
            query: info,
            duration_secs: row.get::<i64, _>("time") as f64,
        };
        // The processlist has no blocker attribution, so lock waits surface
        // with an unresolved blocking side.
        if state.to_lowercase().contains("lock") {
            blocked_queries.push(BlockedQuery {
                blocked_pid: query.pid.clone(),
                blocked_user: query.user.clone(),
                blocked_query: query.query.clone(),
                blocking_pid: "N/A".into(),
                blocking_user: "N/A".into(),
                blocking_query: "Lock wait".into(),
            });
        }
        current_queries.push(query);
    }

    let active_connections = (processes.len() as u32).saturating_sub(idle_connections);
    let long_running_queries: Vec<ActiveQuery> = current_queries
        .iter()
        .filter(|q| q.duration_secs > SLOW_QUERY_THRESHOLD_SECS)
        .take(LONG_RUNNING_CAP)
        .cloned()
        .collect();

    let database_size: i64 = sqlx::query_scalar(
        r#"
        SELECT CAST(COALESCE(SUM(data_length + index_length), 0) AS SIGNED)
        FROM information_schema.tables
        WHERE table_schema = DATABASE()
        "#,
    )
    .fetch_one(pool)
    .await?;

    current_queries.truncate(CURRENT_CAP);
    blocked_queries.truncate(BLOCKED_CAP);

    Ok(AnalyticsSnapshot {
        current_queries,
        idle_connections,
        long_running_queries,
        blocked_queries,
        database_size,
        active_connections,
        query_stats,
        timestamp: Utc::now(),
    })
}

pub async fn table_stats(pool: &MySqlPool) -> CoreResult<Vec<TableStat>> {
    let rows = sqlx::query(
        r#"
        SELECT
            table_schema,
            table_name,
            table_rows,
            CAST(COALESCE(data_length + index_length, 0) AS SIGNED) AS size_bytes
        FROM information_schema.tables
        WHERE table_schema = DATABASE()
        ORDER BY data_length + index_length DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| TableStat {
            schema: row.try_get("table_schema").ok(),
            table: row.get("table_name"),
            row_count: row.try_get::<i64, _>("table_rows").ok(),
            size_bytes: row.try_get::<i64, _>("size_bytes").ok(),
        })
        .collect())
}

pub async fn query_plan(pool: &MySqlPool, query: &str) -> CoreResult<QueryPlan> {
    let explain = format!("EXPLAIN FORMAT=JSON {}", query);
    let row = sqlx::query(&explain).fetch_one(pool).await?;
    // The EXPLAIN column decodes as JSON on 8.x and as text on older servers.
    let plan = match row.try_get::<serde_json::Value, _>(0) {
        Ok(plan) => plan,
        Err(_) => {
            let raw: String = row.try_get(0)?;
            serde_json::from_str(&raw)
                .map_err(|e| CoreError::Query(format!("unparsable explain output: {}", e)))?
        }
    };
    Ok(QueryPlan::Available { plan })
}
