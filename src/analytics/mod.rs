pub mod mongodb;
pub mod mysql;
pub mod postgres;
mod slow_log;
pub mod sqlite;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::connectors::Connector;
use crate::error::CoreResult;
use crate::events::{EventHub, RuntimeEvent};
use crate::models::{AnalyticsSnapshot, HistoricalSample, QueryPlan, SlowQueryRecord, TableStat};
use crate::registry::ConnectionRegistry;

pub use slow_log::SlowQueryLog;

/// Seconds after which a running statement counts as long-running.
pub(crate) const SLOW_QUERY_THRESHOLD_SECS: f64 = 30.0;
pub(crate) const CURRENT_CAP: usize = 50;
pub(crate) const LONG_RUNNING_CAP: usize = 20;
pub(crate) const BLOCKED_CAP: usize = 20;

const HISTORY_WINDOW_HOURS: i64 = 3;

/// Wraps the per-engine collectors: every successful snapshot feeds the
/// 3-hour historical buffer and promotes long-running statements into the
/// slow-query log.
pub struct AnalyticsEngine {
    historical: Mutex<HashMap<String, Vec<HistoricalSample>>>,
    slow_log: SlowQueryLog,
}

impl AnalyticsEngine {
    pub fn new() -> Self {
        AnalyticsEngine {
            historical: Mutex::new(HashMap::new()),
            slow_log: SlowQueryLog::new(),
        }
    }

    pub async fn get_analytics(
        &self,
        connection_id: &str,
        connector: &dyn Connector,
    ) -> CoreResult<AnalyticsSnapshot> {
        let snapshot = connector.collect_metrics().await?;
        self.store_historical(connection_id, &snapshot);
        for query in &snapshot.long_running_queries {
            self.slow_log
                .log(connection_id, &query.query, query.duration_secs, &query.user);
        }
        Ok(snapshot)
    }

    fn store_historical(&self, connection_id: &str, snapshot: &AnalyticsSnapshot) {
        let cutoff = Utc::now() - chrono::Duration::hours(HISTORY_WINDOW_HOURS);
        let mut historical = self.historical.lock().unwrap();
        let samples = historical.entry(connection_id.to_string()).or_default();
        samples.push(HistoricalSample {
            timestamp: snapshot.timestamp,
            active_connections: snapshot.active_connections,
            idle_connections: snapshot.idle_connections,
            database_size: snapshot.database_size,
        });
        samples.retain(|s| s.timestamp > cutoff);
    }

    pub fn get_historical(&self, connection_id: &str, hours: i64) -> Vec<HistoricalSample> {
        let cutoff = Utc::now() - chrono::Duration::hours(hours.min(HISTORY_WINDOW_HOURS));
        let historical = self.historical.lock().unwrap();
        historical
            .get(connection_id)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| s.timestamp > cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_slow_queries(&self, connection_id: &str, hours: i64) -> Vec<SlowQueryRecord> {
        self.slow_log.get(connection_id, hours)
    }

    pub fn clear_slow_queries(&self, connection_id: &str) {
        self.slow_log.clear(connection_id);
    }

    pub async fn get_table_statistics(&self, connector: &dyn Connector) -> CoreResult<Vec<TableStat>> {
        connector.table_statistics().await
    }

    pub async fn get_query_plan(
        &self,
        connector: &dyn Connector,
        query: &str,
    ) -> CoreResult<QueryPlan> {
        connector.query_plan(query).await
    }

    pub async fn kill_query(&self, connector: &dyn Connector, pid: &str) -> CoreResult<()> {
        connector.kill_query(pid).await
    }

    /// Drop a connection's in-memory metrics, used when the profile is
    /// deleted.
    pub fn forget_connection(&self, connection_id: &str) {
        self.historical.lock().unwrap().remove(connection_id);
        self.slow_log.clear(connection_id);
    }
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-connection polling loops that publish `analytics:update` events. A
/// failed poll surfaces the error once and stops that connection's stream
/// instead of erroring every tick.
pub struct AnalyticsStreamer {
    streams: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl AnalyticsStreamer {
    pub fn new() -> Self {
        AnalyticsStreamer {
            streams: Mutex::new(HashMap::new()),
        }
    }

    pub fn start(
        self: &Arc<Self>,
        connection_id: &str,
        registry: Arc<ConnectionRegistry>,
        engine: Arc<AnalyticsEngine>,
        hub: Arc<EventHub>,
        poll_interval: Duration,
    ) {
        let mut streams = self.streams.lock().unwrap();
        if streams.contains_key(connection_id) {
            return;
        }
        log::info!("starting analytics stream for connection {}", connection_id);

        let id = connection_id.to_string();
        let streamer = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;

                let Some(connector) = registry.get_connector(&id) else {
                    log::info!("connection {} is gone, stopping analytics stream", id);
                    break;
                };
                match engine.get_analytics(&id, connector.as_ref()).await {
                    Ok(snapshot) => hub.publish(RuntimeEvent::AnalyticsUpdate {
                        connection_id: id.clone(),
                        data: Box::new(snapshot),
                    }),
                    Err(e) => {
                        log::error!("analytics stream error for connection {}: {}", id, e);
                        hub.publish(RuntimeEvent::AnalyticsError {
                            connection_id: id.clone(),
                            error: e.to_string(),
                        });
                        break;
                    }
                }
            }
            streamer.streams.lock().unwrap().remove(&id);
        });
        streams.insert(connection_id.to_string(), handle);
    }

    pub fn stop(&self, connection_id: &str) {
        if let Some(handle) = self.streams.lock().unwrap().remove(connection_id) {
            log::info!("stopping analytics stream for connection {}", connection_id);
            handle.abort();
        }
    }

    pub fn stop_all(&self) {
        let mut streams = self.streams.lock().unwrap();
        for (id, handle) in streams.drain() {
            log::info!("stopping analytics stream for connection {}", id);
            handle.abort();
        }
    }

    pub fn is_streaming(&self, connection_id: &str) -> bool {
        self.streams.lock().unwrap().contains_key(connection_id)
    }
}

impl Default for AnalyticsStreamer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::SqliteConnector;
    use crate::models::{ConnectionProfile, EngineKind};

    fn memory_profile(id: &str) -> ConnectionProfile {
        ConnectionProfile {
            id: id.into(),
            name: format!("mem-{}", id),
            engine: EngineKind::Sqlite,
            host: String::new(),
            port: 0,
            username: String::new(),
            password: String::new(),
            database: ":memory:".into(),
            timeout_secs: 30,
        }
    }

    #[tokio::test]
    async fn snapshots_feed_the_historical_buffer() {
        let engine = AnalyticsEngine::new();
        let connector = SqliteConnector::new();
        connector.connect(&memory_profile("c1")).await.unwrap();

        engine.get_analytics("c1", &connector).await.unwrap();
        engine.get_analytics("c1", &connector).await.unwrap();

        let samples = engine.get_historical("c1", 3);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].active_connections, 1);
    }

    #[tokio::test]
    async fn stream_stops_after_disconnect_without_error_loop() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = Arc::new(AnalyticsEngine::new());
        let hub = Arc::new(EventHub::default());
        let streamer = Arc::new(AnalyticsStreamer::new());
        let profile = memory_profile("c1");

        registry.connect(&profile).await.unwrap();
        let mut events = hub.subscribe("c1");
        streamer.start(
            "c1",
            registry.clone(),
            engine.clone(),
            hub.clone(),
            Duration::from_millis(10),
        );

        // First tick delivers a snapshot.
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, RuntimeEvent::AnalyticsUpdate { .. }));

        registry.disconnect("c1").await;

        // The loop notices the missing connection and unregisters itself.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!streamer.is_streaming("c1"));
    }

    #[tokio::test]
    async fn start_is_idempotent_per_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = Arc::new(AnalyticsEngine::new());
        let hub = Arc::new(EventHub::default());
        let streamer = Arc::new(AnalyticsStreamer::new());
        registry.connect(&memory_profile("c1")).await.unwrap();

        for _ in 0..3 {
            streamer.start(
                "c1",
                registry.clone(),
                engine.clone(),
                hub.clone(),
                Duration::from_secs(60),
            );
        }
        assert!(streamer.is_streaming("c1"));
        streamer.stop_all();
        assert!(!streamer.is_streaming("c1"));
    }
}
