use chrono::Utc;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Client;

use crate::error::{CoreError, CoreResult};
use crate::models::{
    ActiveQuery, AnalyticsSnapshot, BlockedQuery, QueryStats, TableStat,
};

use super::{BLOCKED_CAP, CURRENT_CAP, LONG_RUNNING_CAP, SLOW_QUERY_THRESHOLD_SECS};

fn numeric(doc: &Document, key: &str) -> i64 {
    match doc.get(key) {
        Some(Bson::Int32(v)) => *v as i64,
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) => *v as i64,
        _ => 0,
    }
}

pub async fn collect(client: &Client, database: &str) -> CoreResult<AnalyticsSnapshot> {
    let admin = client.database("admin");
    let current_ops = admin
        .run_command(doc! { "currentOp": 1, "$all": true })
        .await
        .map_err(|e| CoreError::Query(e.to_string()))?;

    let mut current_queries = Vec::new();
    let mut blocked_queries = Vec::new();
    let mut query_stats = QueryStats::default();

    if let Ok(inprog) = current_ops.get_array("inprog") {
        for op in inprog.iter().filter_map(|b| b.as_document()) {
            let op_type = op.get_str("op").unwrap_or("none");
            if op_type == "none" || op_type == "getmore" {
                continue;
            }
            let command = op
                .get_document("command")
                .map(|d| Bson::Document(d.clone()).to_string())
                .unwrap_or_default();
            let verb = match op_type {
                "query" | "find" => "FIND",
                "insert" => "INSERT",
                "update" => "UPDATE",
                "remove" | "delete" => "DELETE",
                other => other,
            };
            query_stats.record(verb);

            let query = ActiveQuery {
                pid: numeric(op, "opid").to_string(),
                user: op.get_str("client").unwrap_or("").to_string(),
                state: op_type.to_string(),
                query: command,
                duration_secs: numeric(op, "secs_running") as f64,
            };
            if op.get_bool("waitingForLock").unwrap_or(false) {
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
    }

    let long_running_queries: Vec<ActiveQuery> = current_queries
        .iter()
        .filter(|q| q.duration_secs > SLOW_QUERY_THRESHOLD_SECS)
        .take(LONG_RUNNING_CAP)
        .cloned()
        .collect();

    let server_status = admin
        .run_command(doc! { "serverStatus": 1 })
        .await
        .map_err(|e| CoreError::Query(e.to_string()))?;
    let connections = server_status
        .get_document("connections")
        .ok()
        .cloned()
        .unwrap_or_default();
    let active_connections = numeric(&connections, "current") as u32;
    let available = numeric(&connections, "available") as u32;
    let idle_connections = available.saturating_sub(active_connections);

    let db_stats = client
        .database(database)
        .run_command(doc! { "dbStats": 1 })
        .await
        .map_err(|e| CoreError::Query(e.to_string()))?;
    let database_size = numeric(&db_stats, "dataSize") + numeric(&db_stats, "indexSize");

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

pub async fn table_stats(client: &Client, database: &str) -> CoreResult<Vec<TableStat>> {
    let db = client.database(database);
    let collections = db
        .list_collection_names()
        .await
        .map_err(|e| CoreError::Query(e.to_string()))?;

    let mut stats = Vec::with_capacity(collections.len());
    for name in collections {
        let coll_stats = db
            .run_command(doc! { "collStats": &name })
            .await
            .map_err(|e| CoreError::Query(e.to_string()))?;
        stats.push(TableStat {
            schema: Some(database.to_string()),
            table: name,
            row_count: Some(numeric(&coll_stats, "count")),
            size_bytes: Some(numeric(&coll_stats, "size") + numeric(&coll_stats, "totalIndexSize")),
        });
    }
    Ok(stats)
}
