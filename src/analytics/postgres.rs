use chrono::Utc;
use sqlx::{PgPool, Row};

use crate::error::CoreResult;
use crate::models::{
    ActiveQuery, AnalyticsSnapshot, BlockedQuery, QueryPlan, QueryStats, TableStat,
};

use super::{BLOCKED_CAP, CURRENT_CAP, LONG_RUNNING_CAP, SLOW_QUERY_THRESHOLD_SECS};

pub async fn collect(pool: &PgPool) -> CoreResult<AnalyticsSnapshot> {
    let activity = sqlx::query(
        r#"
        SELECT
            pid,
            COALESCE(usename, '') AS usename,
            COALESCE(state, '') AS state,
            COALESCE(query, '') AS query,
            COALESCE(EXTRACT(EPOCH FROM (now() - query_start))::float8, 0) AS duration
        FROM pg_stat_activity
        WHERE datname = current_database() AND pid <> pg_backend_pid()
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut current_queries = Vec::new();
    let mut query_stats = QueryStats::default();
    let mut idle_connections = 0u32;

    for row in &activity {
        let state: String = row.get("state");
        if state == "idle" {
            idle_connections += 1;
            continue;
        }
        let query: String = row.get("query");
        if query.is_empty() {
            continue;
        }
        query_stats.record(&query);
        current_queries.push(ActiveQuery {
            pid: row.get::<i32, _>("pid").to_string(),
            user: row.get("usename"),
            state,
            query,
            duration_secs: row.get("duration"),
        });
    }

    let active_connections = activity.len() as u32;
    let long_running_queries: Vec<ActiveQuery> = current_queries
        .iter()
        .filter(|q| q.duration_secs > SLOW_QUERY_THRESHOLD_SECS)
        .take(LONG_RUNNING_CAP)
        .cloned()
        .collect();

    let blocked = sqlx::query(
        r#"
        SELECT
            blocked.pid AS blocked_pid,
            COALESCE(blocked.usename, '') AS blocked_user,
            COALESCE(blocked.query, '') AS blocked_query,
            blocking.pid AS blocking_pid,
            COALESCE(blocking.usename, '') AS blocking_user,
            COALESCE(blocking.query, '') AS blocking_query
        FROM pg_stat_activity blocked
        JOIN LATERAL unnest(pg_blocking_pids(blocked.pid)) AS b(pid) ON true
        JOIN pg_stat_activity blocking ON blocking.pid = b.pid
        "#,
    )
    .fetch_all(pool)
    .await?;

    let blocked_queries: Vec<BlockedQuery> = blocked
        .into_iter()
        .take(BLOCKED_CAP)
        .map(|row| BlockedQuery {
            blocked_pid: row.get::<i32, _>("blocked_pid").to_string(),
            blocked_user: row.get("blocked_user"),
            blocked_query: row.get("blocked_query"),
            blocking_pid: row.get::<i32, _>("blocking_pid").to_string(),
            blocking_user: row.get("blocking_user"),
            blocking_query: row.get("blocking_query"),
        })
        .collect();

    let database_size: i64 = sqlx::query_scalar("SELECT pg_database_size(current_database())")
        .fetch_one(pool)
        .await?;

    current_queries.truncate(CURRENT_CAP);

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

pub async fn table_stats(pool: &PgPool) -> CoreResult<Vec<TableStat>> {
    let rows = sqlx::query(
        r#"
        SELECT
            schemaname,
            relname,
            n_live_tup,
            pg_total_relation_size(relid) AS size_bytes
        FROM pg_stat_user_tables
        ORDER BY pg_total_relation_size(relid) DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| TableStat {
            schema: Some(row.get("schemaname")),
            table: row.get("relname"),
            row_count: row.try_get::<i64, _>("n_live_tup").ok(),
            size_bytes: row.try_get::<i64, _>("size_bytes").ok(),
        })
        .collect())
}

pub async fn query_plan(pool: &PgPool, query: &str) -> CoreResult<QueryPlan> {
    let explain = format!("EXPLAIN (FORMAT JSON, ANALYZE) {}", query);
    let row = sqlx::query(&explain).fetch_one(pool).await?;
    let plan: serde_json::Value = row.try_get(0)?;
    Ok(QueryPlan::Available { plan })
}
