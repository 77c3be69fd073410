use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backup::BackupManager;
use crate::explorer::MetadataCache;
use crate::history::QueryHistory;
use crate::models::AppSettings;

const IDLE_THRESHOLD: Duration = Duration::from_secs(5 * 60);
const CLEANUP_BASE_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);
const CLEANUP_IDLE_MULTIPLIER: f64 = 1.5;
const CLEANUP_ERROR_BACKOFF: Duration = Duration::from_secs(60);
const BACKUP_ERROR_BACKOFF: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub executions: u64,
    pub total_duration_ms: u64,
    pub total_items: u64,
    pub last_execution: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub task_stats: HashMap<String, TaskStats>,
    pub last_activity: DateTime<Utc>,
    pub is_idle: bool,
}

/// Tracks global interactive activity and stretches maintenance intervals
/// while the user is working; background tasks report their executions here.
pub struct AdaptiveScheduler {
    last_activity: Mutex<(Instant, DateTime<Utc>)>,
    task_stats: Mutex<HashMap<String, TaskStats>>,
    idle_threshold: Duration,
}

impl AdaptiveScheduler {
    pub fn new() -> Self {
        Self::with_idle_threshold(IDLE_THRESHOLD)
    }

    pub fn with_idle_threshold(idle_threshold: Duration) -> Self {
        AdaptiveScheduler {
            last_activity: Mutex::new((Instant::now(), Utc::now())),
            task_stats: Mutex::new(HashMap::new()),
            idle_threshold,
        }
    }

    /// Bumped by every interactive operation at the command boundary.
    pub fn record_activity(&self) {
        *self.last_activity.lock().unwrap() = (Instant::now(), Utc::now());
    }

    pub fn is_system_idle(&self) -> bool {
        self.last_activity.lock().unwrap().0.elapsed() > self.idle_threshold
    }

    /// Base interval stretched by the idle multiplier when nobody is using
    /// the app.
    pub fn get_adaptive_interval(
        &self,
        _task: &str,
        base: Duration,
        idle_multiplier: f64,
    ) -> Duration {
        if self.is_system_idle() {
            base.mul_f64(idle_multiplier)
        } else {
            base
        }
    }

    pub fn record_task_execution(&self, task: &str, duration: Duration, items_processed: u64) {
        let mut stats = self.task_stats.lock().unwrap();
        let entry = stats.entry(task.to_string()).or_default();
        entry.executions += 1;
        entry.total_duration_ms += duration.as_millis() as u64;
        entry.total_items += items_processed;
        entry.last_execution = Some(Utc::now());
    }

    pub fn get_stats(&self) -> SchedulerStats {
        SchedulerStats {
            task_stats: self.task_stats.lock().unwrap().clone(),
            last_activity: self.last_activity.lock().unwrap().1,
            is_idle: self.is_system_idle(),
        }
    }
}

impl Default for AdaptiveScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the maintenance loops touch.
pub struct TaskContext {
    pub scheduler: Arc<AdaptiveScheduler>,
    pub history: Arc<QueryHistory>,
    pub cache: Arc<MetadataCache>,
    pub backups: Arc<BackupManager>,
    pub settings: Arc<Mutex<AppSettings>>,
}

/// Supervised handles for the two long-running maintenance loops. An error
/// inside an iteration is logged and followed by a fixed backoff; the loops
/// only exit on shutdown.
pub struct BackgroundTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn start(ctx: TaskContext) -> Self {
        let (shutdown, _) = watch::channel(false);
        let ctx = Arc::new(ctx);

        let cleanup = tokio::spawn(cleanup_loop(ctx.clone(), shutdown.subscribe()));
        let backup = tokio::spawn(backup_scheduler_loop(ctx, shutdown.subscribe()));
        log::info!("background tasks started");

        BackgroundTasks {
            shutdown,
            handles: vec![cleanup, backup],
        }
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        log::info!("background tasks stopped");
    }
}

/// Sleep that returns true when shutdown was requested instead.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = shutdown.changed() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

/// Purges history past the retention setting and sweeps expired cache
/// entries every few hours, backing off while the user is active.
async fn cleanup_loop(ctx: Arc<TaskContext>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let interval = ctx.scheduler.get_adaptive_interval(
            "history_cleanup",
            CLEANUP_BASE_INTERVAL,
            CLEANUP_IDLE_MULTIPLIER,
        );
        if sleep_or_shutdown(interval, &mut shutdown).await {
            return;
        }

        let started = Instant::now();
        let retention_days = ctx.settings.lock().unwrap().history.retention_days;
        let removed_history = match ctx.history.cleanup_old_history(retention_days) {
            Ok(removed) => removed,
            Err(e) => {
                log::error!("error in history cleanup task: {}", e);
                if sleep_or_shutdown(CLEANUP_ERROR_BACKOFF, &mut shutdown).await {
                    return;
                }
                continue;
            }
        };
        let removed_cache = ctx.cache.cleanup_expired();

        ctx.scheduler.record_task_execution(
            "history_cleanup",
            started.elapsed(),
            (removed_history + removed_cache) as u64,
        );
        if removed_history > 0 || removed_cache > 0 {
            log::info!(
                "cleaned up {} history entries, {} expired cache entries",
                removed_history,
                removed_cache
            );
        }
    }
}

/// Runs due backup schedules and re-paces itself from the schedule state;
/// failures never terminate the loop.
async fn backup_scheduler_loop(ctx: Arc<TaskContext>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let started = Instant::now();
        let wake = match ctx.backups.run_due_schedules().await {
            Ok(ran) => {
                if ran > 0 {
                    ctx.scheduler.record_task_execution(
                        "backup_scheduler",
                        started.elapsed(),
                        ran as u64,
                    );
                }
                ctx.backups.next_wake()
            }
            Err(e) => {
                log::error!("backup scheduler iteration failed: {}", e);
                BACKUP_ERROR_BACKOFF
            }
        };
        if sleep_or_shutdown(wake, &mut shutdown).await {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_resets_the_idle_clock() {
        let scheduler = AdaptiveScheduler::with_idle_threshold(Duration::from_millis(10));
        scheduler.record_activity();
        assert!(!scheduler.is_system_idle());
        std::thread::sleep(Duration::from_millis(20));
        assert!(scheduler.is_system_idle());
        scheduler.record_activity();
        assert!(!scheduler.is_system_idle());
    }

    #[test]
    fn intervals_stretch_only_while_idle() {
        let scheduler = AdaptiveScheduler::with_idle_threshold(Duration::from_millis(5));
        let base = Duration::from_secs(100);

        scheduler.record_activity();
        assert_eq!(
            scheduler.get_adaptive_interval("cleanup", base, 1.5),
            base
        );

        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(
            scheduler.get_adaptive_interval("cleanup", base, 1.5),
            Duration::from_secs(150)
        );
    }

    #[test]
    fn task_executions_accumulate() {
        let scheduler = AdaptiveScheduler::new();
        scheduler.record_task_execution("cleanup", Duration::from_millis(30), 4);
        scheduler.record_task_execution("cleanup", Duration::from_millis(20), 1);

        let stats = scheduler.get_stats();
        let cleanup = stats.task_stats.get("cleanup").unwrap();
        assert_eq!(cleanup.executions, 2);
        assert_eq!(cleanup.total_duration_ms, 50);
        assert_eq!(cleanup.total_items, 5);
        assert!(cleanup.last_execution.is_some());
    }
}
