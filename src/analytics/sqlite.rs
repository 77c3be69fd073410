use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::error::CoreResult;
use crate::models::{AnalyticsSnapshot, QueryStats, TableStat};

/// SQLite is an embedded engine: one session, no server-side process list.
/// The snapshot still fills the normalized shape so the UI renders the same
/// dashboard for every engine.
pub async fn collect(pool: &SqlitePool) -> CoreResult<AnalyticsSnapshot> {
    let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
        .fetch_one(pool)
        .await?;
    let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
        .fetch_one(pool)
        .await?;

    Ok(AnalyticsSnapshot {
        current_queries: Vec::new(),
        idle_connections: 0,
        long_running_queries: Vec::new(),
        blocked_queries: Vec::new(),
        database_size: page_count * page_size,
        active_connections: 1,
        query_stats: QueryStats::default(),
        timestamp: Utc::now(),
    })
}

pub async fn table_stats(pool: &SqlitePool) -> CoreResult<Vec<TableStat>> {
    let tables = sqlx::query(
        r#"
        SELECT name FROM sqlite_master
        WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut stats = Vec::with_capacity(tables.len());
    for row in tables {
        let table: String = row.get("name");
        let quoted = table.replace('"', "\"\"");
        let row_count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{}\"", quoted))
            .fetch_one(pool)
            .await?;
        stats.push(TableStat {
            schema: Some("main".into()),
            table,
            row_count: Some(row_count),
            size_bytes: None,
        });
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_reports_file_size_and_single_session() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        let snapshot = collect(&pool).await.unwrap();
        assert_eq!(snapshot.active_connections, 1);
        assert!(snapshot.database_size > 0);
        assert!(snapshot.current_queries.is_empty());
    }

    #[tokio::test]
    async fn table_stats_counts_rows() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO t VALUES (1), (2)")
            .execute(&pool)
            .await
            .unwrap();
        let stats = table_stats(&pool).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].row_count, Some(2));
    }
}
