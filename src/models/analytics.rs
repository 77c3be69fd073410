use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One in-flight statement as reported by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveQuery {
    pub pid: String,
    pub user: String,
    pub state: String,
    pub query: String,
    /// Seconds the statement has been running.
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedQuery {
    pub blocked_pid: String,
    pub blocked_user: String,
    pub blocked_query: String,
    pub blocking_pid: String,
    pub blocking_user: String,
    pub blocking_query: String,
}

/// Running-statement counts bucketed by leading verb.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct QueryStats {
    pub select: u32,
    pub insert: u32,
    pub update: u32,
    pub delete: u32,
    pub other: u32,
}

impl QueryStats {
    pub fn record(&mut self, query: &str) {
        let verb = query
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();
        match verb.as_str() {
            "SELECT" | "FIND" => self.select += 1,
            "INSERT" => self.insert += 1,
            "UPDATE" => self.update += 1,
            "DELETE" | "REMOVE" => self.delete += 1,
            _ => self.other += 1,
        }
    }
}

/// Normalized point-in-time metrics snapshot, identical in shape across all
/// engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub current_queries: Vec<ActiveQuery>,
    pub idle_connections: u32,
    pub long_running_queries: Vec<ActiveQuery>,
    pub blocked_queries: Vec<BlockedQuery>,
    pub database_size: i64,
    pub active_connections: u32,
    pub query_stats: QueryStats,
    pub timestamp: DateTime<Utc>,
}

/// Trimmed sample retained in the 3-hour historical ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalSample {
    pub timestamp: DateTime<Utc>,
    pub active_connections: u32,
    pub idle_connections: u32,
    pub database_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowQueryRecord {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub duration_secs: f64,
    pub user: String,
}

/// Result of a query-plan request. Engines without plan support return the
/// `Unsupported` variant rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum QueryPlan {
    Available { plan: serde_json::Value },
    Unsupported { message: String },
}
