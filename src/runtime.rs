use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::analytics::{AnalyticsEngine, AnalyticsStreamer};
use crate::backup::BackupManager;
use crate::cache::TtlCache;
use crate::error::CoreResult;
use crate::events::EventHub;
use crate::explorer::{MetadataCache, SchemaExplorer};
use crate::history::QueryHistory;
use crate::models::AppSettings;
use crate::profiles::ProfileStore;
use crate::registry::ConnectionRegistry;
use crate::scheduler::{AdaptiveScheduler, BackgroundTasks, TaskContext};
use crate::storage::AppStorage;

/// Process-wide runtime: owns every service and the background loops. The
/// command boundary is a thin layer over this.
pub struct CoreRuntime {
    pub storage: Arc<AppStorage>,
    pub settings: Arc<Mutex<AppSettings>>,
    pub profiles: Arc<ProfileStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub cache: Arc<MetadataCache>,
    pub explorer: SchemaExplorer,
    pub history: Arc<QueryHistory>,
    pub executor: crate::executor::QueryExecutor,
    pub analytics: Arc<AnalyticsEngine>,
    pub streamer: Arc<AnalyticsStreamer>,
    pub events: Arc<EventHub>,
    pub backups: Arc<BackupManager>,
    pub scheduler: Arc<AdaptiveScheduler>,
    tasks: Mutex<Option<BackgroundTasks>>,
}

impl CoreRuntime {
    /// Build against the default per-user data directory.
    pub fn new() -> CoreResult<Self> {
        Self::with_data_dir(AppStorage::default_dir()?, true)
    }

    pub fn with_data_dir(data_dir: PathBuf, use_keychain: bool) -> CoreResult<Self> {
        let storage = Arc::new(AppStorage::new(data_dir)?);
        let settings = Arc::new(Mutex::new(storage.load_settings()));
        let profiles = Arc::new(ProfileStore::load(storage.clone(), use_keychain));
        let registry = Arc::new(ConnectionRegistry::new());
        let cache = Arc::new(TtlCache::new(crate::explorer::TABLE_TTL_SECS));
        let explorer = SchemaExplorer::new(registry.clone(), cache.clone());
        let history = Arc::new(QueryHistory::load(storage.clone()));
        let executor = crate::executor::QueryExecutor::new(history.clone());
        let analytics = Arc::new(AnalyticsEngine::new());
        let streamer = Arc::new(AnalyticsStreamer::new());
        let events = Arc::new(EventHub::default());
        let backups = Arc::new(BackupManager::new(
            storage.clone(),
            profiles.clone(),
            registry.clone(),
            events.clone(),
            settings.clone(),
        ));
        let scheduler = Arc::new(AdaptiveScheduler::new());

        Ok(CoreRuntime {
            storage,
            settings,
            profiles,
            registry,
            cache,
            explorer,
            history,
            executor,
            analytics,
            streamer,
            events,
            backups,
            scheduler,
            tasks: Mutex::new(None),
        })
    }

    /// Restore the previous session best-effort and start the maintenance
    /// loops.
    pub async fn start(&self) {
        let profiles = self.profiles.list();
        self.registry.restore_session(&self.storage, &profiles).await;
        self.start_background_tasks();
    }

    pub fn start_background_tasks(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.is_some() {
            return;
        }
        *tasks = Some(BackgroundTasks::start(TaskContext {
            scheduler: self.scheduler.clone(),
            history: self.history.clone(),
            cache: self.cache.clone(),
            backups: self.backups.clone(),
            settings: self.settings.clone(),
        }));
    }

    /// Clean shutdown: stop streams and loops, snapshot the active ids, then
    /// disconnect everything.
    pub async fn shutdown(&self) {
        self.streamer.stop_all();
        let tasks = self.tasks.lock().unwrap().take();
        if let Some(tasks) = tasks {
            tasks.stop().await;
        }
        if let Err(e) = self.registry.save_session(&self.storage) {
            log::warn!("failed to persist session snapshot: {}", e);
        }
        self.registry.disconnect_all().await;
    }

    /// Every interactive operation flows through here so maintenance work
    /// backs off while the user is active.
    pub fn record_activity(&self) {
        self.scheduler.record_activity();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionProfile, EngineKind};
    use tempfile::tempdir;

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
    async fn shutdown_snapshots_and_disconnects() {
        let dir = tempdir().unwrap();
        let runtime = CoreRuntime::with_data_dir(dir.path().to_path_buf(), false).unwrap();
        runtime.profiles.save(memory_profile("c1")).unwrap();
        runtime.registry.connect(&memory_profile("c1")).await.unwrap();

        runtime.shutdown().await;
        assert!(!runtime.registry.is_connected("c1"));
        assert_eq!(runtime.storage.load_session(), vec!["c1".to_string()]);

        // A fresh runtime resumes the snapshotted session.
        let next = CoreRuntime::with_data_dir(dir.path().to_path_buf(), false).unwrap();
        next.start().await;
        assert!(next.registry.is_connected("c1"));
        next.shutdown().await;
    }

    #[tokio::test]
    async fn background_tasks_start_once_and_stop() {
        let dir = tempdir().unwrap();
        let runtime = CoreRuntime::with_data_dir(dir.path().to_path_buf(), false).unwrap();
        runtime.start_background_tasks();
        runtime.start_background_tasks();
        runtime.shutdown().await;
    }
}
