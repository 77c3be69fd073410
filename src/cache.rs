use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Generic time-boxed key→value cache. Reads lazily evict expired entries;
/// the cleanup task sweeps the rest. Shared across callers, so all mutation
/// goes through its own lock.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    default_ttl: Duration,
}

struct Entry<V> {
    data: V,
    expiry: Instant,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl_secs: u64) -> Self {
        TtlCache {
            entries: Mutex::new(HashMap::new()),
            default_ttl: Duration::from_secs(default_ttl_secs),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expiry > Instant::now() => Some(entry.data.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: &str, data: V, ttl_secs: Option<u64>) {
        let ttl = ttl_secs.map(Duration::from_secs).unwrap_or(self.default_ttl);
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                data,
                expiry: Instant::now() + ttl,
            },
        );
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().unwrap().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn get_keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    /// Delete every entry whose key starts with `prefix`; returns the number
    /// removed. Used to invalidate all cached metadata for one connection.
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn size(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Remove expired entries and return how many were evicted.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.expiry > now);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_fresh_values() {
        let cache = TtlCache::new(600);
        cache.set("k", 42, None);
        assert_eq!(cache.get("k"), Some(42));
        assert!(cache.has("k"));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn expired_entries_are_evicted_on_read() {
        let cache = TtlCache::new(600);
        cache.set("k", 1, Some(0));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn delete_prefix_removes_only_matching_keys() {
        let cache = TtlCache::new(600);
        cache.set("c1_schema", 1, None);
        cache.set("c1_table_public_users", 2, None);
        cache.set("c2_schema", 3, None);
        assert_eq!(cache.delete_prefix("c1_"), 2);
        assert_eq!(cache.get("c2_schema"), Some(3));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn cleanup_expired_counts_evictions() {
        let cache = TtlCache::new(600);
        cache.set("old", 1, Some(0));
        cache.set("fresh", 2, Some(60));
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.get("fresh"), Some(2));
    }
}
