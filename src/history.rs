use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::models::QueryHistoryEntry;
use crate::storage::AppStorage;

/// Append-only per-connection query history, pruned by the retention policy
/// and persisted as one JSON document so it survives restarts.
pub struct QueryHistory {
    entries: Mutex<HashMap<String, Vec<QueryHistoryEntry>>>,
    storage: Arc<AppStorage>,
}

impl QueryHistory {
    pub fn load(storage: Arc<AppStorage>) -> Self {
        let entries = storage.load_history();
        QueryHistory {
            entries: Mutex::new(entries),
            storage,
        }
    }

    pub fn add(
        &self,
        connection_id: &str,
        query: &str,
        success: bool,
        execution_time_ms: u64,
        row_count: usize,
        error: Option<String>,
    ) {
        self.insert(QueryHistoryEntry {
            id: Uuid::new_v4().to_string(),
            connection_id: connection_id.to_string(),
            query: query.to_string(),
            success,
            execution_time_ms,
            row_count,
            error,
            executed_at: Utc::now(),
        });
    }

    fn insert(&self, entry: QueryHistoryEntry) {
        {
            let mut entries = self.entries.lock().unwrap();
            entries
                .entry(entry.connection_id.clone())
                .or_default()
                .push(entry);
        }
        self.persist();
    }

    /// Most recent entries first, capped at `limit`.
    pub fn get_history(&self, connection_id: &str, limit: usize) -> Vec<QueryHistoryEntry> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(connection_id)
            .map(|list| list.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear_history(&self, connection_id: &str) -> bool {
        let removed = self
            .entries
            .lock()
            .unwrap()
            .remove(connection_id)
            .is_some();
        if removed {
            self.persist();
        }
        removed
    }

    /// Delete one entry by its index in the newest-first view.
    pub fn delete_query(&self, connection_id: &str, index: usize) -> bool {
        let deleted = {
            let mut entries = self.entries.lock().unwrap();
            match entries.get_mut(connection_id) {
                Some(list) if index < list.len() => {
                    list.remove(list.len() - 1 - index);
                    true
                }
                _ => false,
            }
        };
        if deleted {
            self.persist();
        }
        deleted
    }

    /// Case-insensitive substring match over the stored query text.
    pub fn search_history(&self, connection_id: &str, term: &str) -> Vec<QueryHistoryEntry> {
        let needle = term.to_lowercase();
        let entries = self.entries.lock().unwrap();
        entries
            .get(connection_id)
            .map(|list| {
                list.iter()
                    .rev()
                    .filter(|e| e.query.to_lowercase().contains(&needle))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop entries older than the retention window across all connections;
    /// returns how many were removed. Retention enforcement must actually
    /// land on disk, so persistence failures propagate here.
    pub fn cleanup_old_history(&self, retention_days: u32) -> crate::error::CoreResult<usize> {
        let cutoff = Utc::now() - Duration::days(retention_days as i64);
        let removed = {
            let mut entries = self.entries.lock().unwrap();
            let mut removed = 0;
            for list in entries.values_mut() {
                let before = list.len();
                list.retain(|e| e.executed_at > cutoff);
                removed += before - list.len();
            }
            entries.retain(|_, list| !list.is_empty());
            removed
        };
        if removed > 0 {
            self.save_to_disk()?;
        }
        Ok(removed)
    }

    fn save_to_disk(&self) -> crate::error::CoreResult<()> {
        let entries = self.entries.lock().unwrap().clone();
        self.storage.save_history(&entries)
    }

    fn persist(&self) {
        if let Err(e) = self.save_to_disk() {
            log::warn!("failed to persist query history: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn history() -> (QueryHistory, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(AppStorage::new(dir.path()).unwrap());
        (QueryHistory::load(storage), dir)
    }

    fn backdated(connection_id: &str, query: &str, days_ago: i64) -> QueryHistoryEntry {
        QueryHistoryEntry {
            id: Uuid::new_v4().to_string(),
            connection_id: connection_id.to_string(),
            query: query.to_string(),
            success: true,
            execution_time_ms: 12,
            row_count: 1,
            error: None,
            executed_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn history_is_newest_first_and_capped() {
        let (history, _dir) = history();
        history.add("c1", "SELECT 1", true, 5, 1, None);
        history.add("c1", "SELECT 2", true, 5, 1, None);
        history.add("c1", "SELECT 3", true, 5, 1, None);

        let entries = history.get_history("c1", 2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].query, "SELECT 3");
        assert_eq!(entries[1].query, "SELECT 2");
    }

    #[test]
    fn cleanup_respects_the_retention_cutoff() {
        let (history, _dir) = history();
        history.insert(backdated("c1", "old one", 45));
        history.insert(backdated("c1", "recent", 5));
        history.insert(backdated("c2", "ancient", 400));

        let removed = history.cleanup_old_history(30).unwrap();
        assert_eq!(removed, 2);

        let remaining = history.get_history("c1", 50);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].query, "recent");
        assert!(history.get_history("c2", 50).is_empty());
    }

    #[test]
    fn search_matches_substrings_case_insensitively() {
        let (history, _dir) = history();
        history.add("c1", "SELECT * FROM orders", true, 5, 10, None);
        history.add("c1", "DELETE FROM users WHERE id = 1", true, 5, 1, None);

        let results = history.search_history("c1", "from users");
        assert_eq!(results.len(), 1);
        assert!(results[0].query.starts_with("DELETE"));
    }

    #[test]
    fn delete_query_uses_newest_first_indexing() {
        let (history, _dir) = history();
        history.add("c1", "first", true, 5, 0, None);
        history.add("c1", "second", true, 5, 0, None);

        assert!(history.delete_query("c1", 0));
        let entries = history.get_history("c1", 10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].query, "first");
        assert!(!history.delete_query("c1", 5));
    }

    #[test]
    fn history_survives_a_reload() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(AppStorage::new(dir.path()).unwrap());
        {
            let history = QueryHistory::load(storage.clone());
            history.add("c1", "SELECT 1", true, 5, 1, None);
        }
        let reloaded = QueryHistory::load(storage);
        assert_eq!(reloaded.get_history("c1", 10).len(), 1);
    }
}
