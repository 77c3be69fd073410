use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, Utc};

use crate::models::SlowQueryRecord;

const RETENTION_HOURS: i64 = 24;

/// In-memory slow-query log, one list per connection, trimmed to the last
/// 24 hours on both insert and read.
pub struct SlowQueryLog {
    entries: Mutex<HashMap<String, Vec<SlowQueryRecord>>>,
}

impl SlowQueryLog {
    pub fn new() -> Self {
        SlowQueryLog {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn log(&self, connection_id: &str, query: &str, duration_secs: f64, user: &str) {
        self.push(
            connection_id,
            SlowQueryRecord {
                timestamp: Utc::now(),
                query: query.to_string(),
                duration_secs,
                user: user.to_string(),
            },
        );
    }

    pub fn push(&self, connection_id: &str, record: SlowQueryRecord) {
        let cutoff = Utc::now() - Duration::hours(RETENTION_HOURS);
        let mut entries = self.entries.lock().unwrap();
        let list = entries.entry(connection_id.to_string()).or_default();
        list.push(record);
        list.retain(|r| r.timestamp > cutoff);
    }

    pub fn get(&self, connection_id: &str, hours: i64) -> Vec<SlowQueryRecord> {
        let cutoff = Utc::now() - Duration::hours(hours);
        let entries = self.entries.lock().unwrap();
        entries
            .get(connection_id)
            .map(|list| {
                list.iter()
                    .filter(|r| r.timestamp > cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn clear(&self, connection_id: &str) {
        self.entries.lock().unwrap().remove(connection_id);
    }
}

impl Default for SlowQueryLog {
    fn default() -> Self {
        Self::new()
    }
}
