mod tools;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::events::{EventHub, RuntimeEvent};
use crate::models::{
    AppSettings, BackupKind, BackupRecord, BackupSchedule, BackupStatus, ConnectionProfile,
    EngineKind,
};
use crate::profiles::ProfileStore;
use crate::registry::ConnectionRegistry;
use crate::storage::AppStorage;

pub use tools::{compress_file, decompress_file};

const EXPORT_FORMAT: &str = "quay-export";

/// Executes full/partial backups on demand or for the scheduler, preferring
/// engine-native dump tools and falling back to a driver-level export.
/// Lifecycle transitions go out through the event hub.
pub struct BackupManager {
    storage: Arc<AppStorage>,
    profiles: Arc<ProfileStore>,
    registry: Arc<ConnectionRegistry>,
    events: Arc<EventHub>,
    settings: Arc<Mutex<AppSettings>>,
    schedules: Mutex<Vec<BackupSchedule>>,
    index: Mutex<Vec<BackupRecord>>,
}

impl BackupManager {
    pub fn new(
        storage: Arc<AppStorage>,
        profiles: Arc<ProfileStore>,
        registry: Arc<ConnectionRegistry>,
        events: Arc<EventHub>,
        settings: Arc<Mutex<AppSettings>>,
    ) -> Self {
        let schedules = storage.load_schedules();
        let index = storage.load_backup_index();
        BackupManager {
            storage,
            profiles,
            registry,
            events,
            settings,
            schedules: Mutex::new(schedules),
            index: Mutex::new(index),
        }
    }

    fn backup_dir(&self) -> PathBuf {
        let settings = self.settings.lock().unwrap();
        settings
            .backup
            .directory
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.storage.backups_dir())
    }

    fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.lock().unwrap().backup.tool_timeout_secs)
    }

    fn publish(&self, backup_id: &str, connection_id: &str, status: BackupStatus, message: Option<String>) {
        self.events.publish(RuntimeEvent::BackupUpdate {
            backup_id: backup_id.to_string(),
            connection_id: connection_id.to_string(),
            status,
            message,
        });
    }

    pub async fn create_backup(
        &self,
        connection_id: &str,
        name: &str,
        kind: BackupKind,
        tables: Option<Vec<String>>,
        compress: bool,
    ) -> CoreResult<BackupRecord> {
        let profile = self.profiles.get(connection_id).ok_or_else(|| {
            CoreError::Connection(format!("connection not found: {}", connection_id))
        })?;
        let backup_id = Uuid::new_v4().to_string();
        self.publish(&backup_id, connection_id, BackupStatus::Running, None);

        let result = self
            .produce_artifact(&profile, name, tables.as_deref(), compress)
            .await;

        match result {
            Ok(path) => {
                let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                let record = BackupRecord {
                    id: backup_id.clone(),
                    connection_id: connection_id.to_string(),
                    name: name.to_string(),
                    path: path.display().to_string(),
                    backup_kind: kind,
                    tables,
                    compressed: compress,
                    size_bytes,
                    status: BackupStatus::Completed,
                    error: None,
                    created_at: Utc::now(),
                };
                self.push_record(record.clone());
                self.publish(&backup_id, connection_id, BackupStatus::Completed, None);
                log::info!("backup {} completed ({} bytes)", record.name, size_bytes);
                Ok(record)
            }
            Err(e) => {
                let record = BackupRecord {
                    id: backup_id.clone(),
                    connection_id: connection_id.to_string(),
                    name: name.to_string(),
                    path: String::new(),
                    backup_kind: kind,
                    tables,
                    compressed: compress,
                    size_bytes: 0,
                    status: BackupStatus::Failed,
                    error: Some(e.to_string()),
                    created_at: Utc::now(),
                };
                self.push_record(record);
                self.publish(
                    &backup_id,
                    connection_id,
                    BackupStatus::Failed,
                    Some(e.to_string()),
                );
                log::error!("backup {} failed: {}", name, e);
                Err(e)
            }
        }
    }

    async fn produce_artifact(
        &self,
        profile: &ConnectionProfile,
        name: &str,
        tables: Option<&[String]>,
        compress: bool,
    ) -> CoreResult<PathBuf> {
        let dir = self.backup_dir();
        std::fs::create_dir_all(&dir)?;
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let safe_name: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();

        let native = tools::dump_tool(profile.engine).and_then(|tool| tools::find_tool(tool));
        let path = match native {
            Some(tool_path) => {
                let ext = match profile.engine {
                    EngineKind::MongoDb => "archive",
                    _ => "sql",
                };
                let path = dir.join(format!("{}-{}.{}", safe_name, stamp, ext));
                tools::run_native_dump(profile, &tool_path, &path, tables, self.tool_timeout())
                    .await?;
                path
            }
            None => {
                let path = dir.join(format!("{}-{}.json", safe_name, stamp));
                self.fallback_export(profile, &path, tables).await?;
                path
            }
        };

        if compress {
            return compress_file(path).await;
        }
        Ok(path)
    }

    /// Driver-level export used when no native tool is installed: walk the
    /// tables through the connector and serialize columns plus rows.
    async fn fallback_export(
        &self,
        profile: &ConnectionProfile,
        path: &std::path::Path,
        tables: Option<&[String]>,
    ) -> CoreResult<()> {
        self.registry.connect(profile).await?;
        let connector = self
            .registry
            .get_connector(&profile.id)
            .ok_or_else(|| CoreError::Connection("not connected".into()))?;

        let all_tables = connector.get_tables(None).await?;
        let selected: Vec<String> = match tables {
            Some(filter) => all_tables
                .into_iter()
                .filter(|t| filter.contains(t))
                .collect(),
            None => all_tables,
        };

        let mut table_docs = serde_json::Map::new();
        for table in selected {
            let columns = connector.get_columns(&table, None).await?;
            let query = match profile.engine {
                EngineKind::MongoDb => {
                    format!(r#"{{"collection": "{}", "filter": {{}}}}"#, table)
                }
                _ => format!("SELECT * FROM {}", quote_ident(profile.engine, &table)),
            };
            let output = connector.execute_query(&query).await?;
            table_docs.insert(
                table,
                json!({
                    "columns": columns,
                    "resultColumns": output.columns,
                    "rows": output.rows,
                }),
            );
        }

        let doc = json!({
            "format": EXPORT_FORMAT,
            "engine": profile.engine,
            "database": profile.database,
            "createdAt": Utc::now(),
            "tables": table_docs,
        });
        tokio::fs::write(path, serde_json::to_vec_pretty(&doc)?)
            .await
            .map_err(|e| CoreError::Backup(format!("failed to write export: {}", e)))?;
        Ok(())
    }

    pub async fn restore_backup(&self, backup_id: &str) -> CoreResult<()> {
        let record = self
            .index
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == backup_id)
            .cloned()
            .ok_or_else(|| CoreError::Backup(format!("backup not found: {}", backup_id)))?;
        let profile = self.profiles.get(&record.connection_id).ok_or_else(|| {
            CoreError::Connection(format!("connection not found: {}", record.connection_id))
        })?;

        self.publish(backup_id, &record.connection_id, BackupStatus::Running, None);

        let artifact = PathBuf::from(&record.path);
        let inflated = if record.compressed {
            Some(decompress_file(artifact.clone()).await?)
        } else {
            None
        };
        let work = inflated.clone().unwrap_or(artifact);

        let result = if work.extension().and_then(|e| e.to_str()) == Some("json") {
            self.fallback_restore(&profile, &work).await
        } else {
            match tools::restore_tool(profile.engine).and_then(tools::find_tool) {
                Some(tool_path) => {
                    tools::run_native_restore(&profile, &tool_path, &work, self.tool_timeout())
                        .await
                }
                None => Err(CoreError::Backup(format!(
                    "no restore tool available for {}",
                    profile.engine
                ))),
            }
        };

        // The decompressed intermediate is scratch space either way.
        if let Some(inflated) = inflated {
            let _ = std::fs::remove_file(inflated);
        }

        match &result {
            Ok(()) => self.publish(
                backup_id,
                &record.connection_id,
                BackupStatus::Completed,
                None,
            ),
            Err(e) => self.publish(
                backup_id,
                &record.connection_id,
                BackupStatus::Failed,
                Some(e.to_string()),
            ),
        }
        result
    }

    /// Mirror of the driver-level export: recreate missing tables and
    /// re-insert the serialized rows through the connector.
    async fn fallback_restore(
        &self,
        profile: &ConnectionProfile,
        path: &std::path::Path,
    ) -> CoreResult<()> {
        if profile.engine == EngineKind::MongoDb {
            return Err(CoreError::Unsupported(
                "driver-level restore is not supported for document stores; install mongorestore"
                    .into(),
            ));
        }

        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::Backup(format!("cannot read backup file: {}", e)))?;
        let doc: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Backup(format!("malformed export file: {}", e)))?;
        if doc.get("format").and_then(|f| f.as_str()) != Some(EXPORT_FORMAT) {
            return Err(CoreError::Backup("unrecognized export format".into()));
        }

        self.registry.connect(profile).await?;
        let connector = self
            .registry
            .get_connector(&profile.id)
            .ok_or_else(|| CoreError::Connection("not connected".into()))?;

        let tables = doc
            .get("tables")
            .and_then(|t| t.as_object())
            .ok_or_else(|| CoreError::Backup("export file has no tables".into()))?;

        for (table, entry) in tables {
            let quoted = quote_ident(profile.engine, table);

            let columns = entry.get("columns").and_then(|c| c.as_array());
            if let Some(columns) = columns {
                let defs: Vec<String> = columns
                    .iter()
                    .filter_map(|c| {
                        let name = c.get("name")?.as_str()?;
                        let data_type = c.get("dataType")?.as_str()?;
                        Some(format!(
                            "{} {}",
                            quote_ident(profile.engine, name),
                            data_type
                        ))
                    })
                    .collect();
                if !defs.is_empty() {
                    let create = format!(
                        "CREATE TABLE IF NOT EXISTS {} ({})",
                        quoted,
                        defs.join(", ")
                    );
                    connector.execute_query(&create).await?;
                }
            }

            let result_columns: Vec<String> = entry
                .get("resultColumns")
                .and_then(|c| c.as_array())
                .map(|list| {
                    list.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            let rows = entry
                .get("rows")
                .and_then(|r| r.as_array())
                .cloned()
                .unwrap_or_default();
            if result_columns.is_empty() || rows.is_empty() {
                continue;
            }

            let column_list: Vec<String> = result_columns
                .iter()
                .map(|c| quote_ident(profile.engine, c))
                .collect();
            for row in rows {
                let Some(cells) = row.as_array() else { continue };
                let values: Vec<String> = cells.iter().map(sql_literal).collect();
                let insert = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quoted,
                    column_list.join(", "),
                    values.join(", ")
                );
                connector.execute_query(&insert).await?;
            }
        }
        Ok(())
    }

    fn push_record(&self, record: BackupRecord) {
        let records = {
            let mut index = self.index.lock().unwrap();
            index.push(record);
            index.clone()
        };
        if let Err(e) = self.storage.save_backup_index(&records) {
            log::warn!("failed to persist backup index: {}", e);
        }
    }

    pub fn list_backups(&self, connection_id: Option<&str>) -> Vec<BackupRecord> {
        let index = self.index.lock().unwrap();
        index
            .iter()
            .filter(|r| connection_id.map_or(true, |id| r.connection_id == id))
            .cloned()
            .collect()
    }

    pub fn delete_backup(&self, backup_id: &str) -> CoreResult<bool> {
        let removed = {
            let mut index = self.index.lock().unwrap();
            let before = index.len();
            index.retain(|r| {
                if r.id == backup_id {
                    if !r.path.is_empty() {
                        let _ = std::fs::remove_file(&r.path);
                    }
                    false
                } else {
                    true
                }
            });
            if before != index.len() {
                Some(index.clone())
            } else {
                None
            }
        };
        match removed {
            Some(records) => {
                self.storage.save_backup_index(&records)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ---- schedules ----

    pub fn list_schedules(&self) -> Vec<BackupSchedule> {
        self.schedules.lock().unwrap().clone()
    }

    pub fn save_schedule(&self, schedule: BackupSchedule) -> CoreResult<()> {
        let schedules = {
            let mut schedules = self.schedules.lock().unwrap();
            match schedules.iter_mut().find(|s| s.id == schedule.id) {
                Some(existing) => *existing = schedule,
                None => schedules.push(schedule),
            }
            schedules.clone()
        };
        self.storage.save_schedules(&schedules)
    }

    pub fn delete_schedule(&self, schedule_id: &str) -> CoreResult<bool> {
        let schedules = {
            let mut schedules = self.schedules.lock().unwrap();
            let before = schedules.len();
            schedules.retain(|s| s.id != schedule_id);
            if before != schedules.len() {
                Some(schedules.clone())
            } else {
                None
            }
        };
        match schedules {
            Some(schedules) => {
                self.storage.save_schedules(&schedules)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// One scheduler tick: run a backup for every enabled schedule whose
    /// `next_run` has passed and advance it from now by its cadence. A
    /// failing backup is logged and the schedule still advances, so a broken
    /// target cannot hot-loop the scheduler.
    pub async fn run_due_schedules(&self) -> CoreResult<usize> {
        let now = Utc::now();
        let due: Vec<BackupSchedule> = self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();

        for schedule in &due {
            let name = format!(
                "scheduled-{}-{}",
                schedule.connection_id,
                now.format("%Y%m%d-%H%M%S")
            );
            if let Err(e) = self
                .create_backup(
                    &schedule.connection_id,
                    &name,
                    schedule.backup_kind,
                    schedule.tables.clone(),
                    schedule.compress,
                )
                .await
            {
                log::error!("scheduled backup for {} failed: {}", schedule.connection_id, e);
            }

            let schedules = {
                let mut schedules = self.schedules.lock().unwrap();
                if let Some(entry) = schedules.iter_mut().find(|s| s.id == schedule.id) {
                    entry.advance(Utc::now());
                }
                schedules.clone()
            };
            self.storage.save_schedules(&schedules)?;
        }
        Ok(due.len())
    }

    /// Loop pacing: a short beat while anything is due, otherwise half the
    /// gap to the nearest schedule, clamped to [5 min, 30 min].
    pub fn next_wake(&self) -> Duration {
        let now = Utc::now();
        let schedules = self.schedules.lock().unwrap();
        let enabled: Vec<&BackupSchedule> = schedules.iter().filter(|s| s.enabled).collect();

        if enabled.iter().any(|s| s.is_due(now)) {
            return Duration::from_secs(60);
        }
        let nearest = enabled.iter().map(|s| s.next_run).min();
        match nearest {
            Some(next_run) => {
                let remaining = (next_run - now).num_seconds().max(0) as u64;
                Duration::from_secs((remaining / 2).clamp(300, 1800))
            }
            None => Duration::from_secs(1800),
        }
    }
}

fn quote_ident(engine: EngineKind, name: &str) -> String {
    match engine {
        EngineKind::MySql | EngineKind::MariaDb => format!("`{}`", name.replace('`', "``")),
        _ => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

fn sql_literal(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackupCadence;
    use tempfile::tempdir;

    struct Fixture {
        manager: BackupManager,
        registry: Arc<ConnectionRegistry>,
        profiles: Arc<ProfileStore>,
        hub: Arc<EventHub>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let storage = Arc::new(AppStorage::new(dir.path()).unwrap());
        let profiles = Arc::new(ProfileStore::load(storage.clone(), false));
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = Arc::new(EventHub::default());
        let settings = Arc::new(Mutex::new(AppSettings::default()));
        let manager = BackupManager::new(
            storage,
            profiles.clone(),
            registry.clone(),
            hub.clone(),
            settings,
        );
        Fixture {
            manager,
            registry,
            profiles,
            hub,
            _dir: dir,
        }
    }

    fn sqlite_profile(id: &str) -> ConnectionProfile {
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

    async fn seed_connection(fixture: &Fixture, id: &str) {
        fixture.profiles.save(sqlite_profile(id)).unwrap();
        fixture.registry.connect(&sqlite_profile(id)).await.unwrap();
        let connector = fixture.registry.get_connector(id).unwrap();
        connector
            .execute_query("CREATE TABLE notes (id INTEGER, body TEXT)")
            .await
            .unwrap();
        connector
            .execute_query("INSERT INTO notes VALUES (1, 'hello'), (2, 'it''s fine')")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sqlite_backup_uses_the_driver_level_export() {
        let fixture = fixture();
        seed_connection(&fixture, "c1").await;

        let record = fixture
            .manager
            .create_backup("c1", "nightly", BackupKind::Full, None, false)
            .await
            .unwrap();

        assert_eq!(record.status, BackupStatus::Completed);
        let contents = std::fs::read_to_string(&record.path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(doc["format"], "quay-export");
        assert_eq!(doc["tables"]["notes"]["rows"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn compressed_backups_remove_the_intermediate() {
        let fixture = fixture();
        seed_connection(&fixture, "c1").await;

        let record = fixture
            .manager
            .create_backup("c1", "nightly", BackupKind::Full, None, true)
            .await
            .unwrap();

        assert!(record.path.ends_with(".json.gz"));
        let plain = record.path.trim_end_matches(".gz");
        assert!(!std::path::Path::new(plain).exists());
    }

    #[tokio::test]
    async fn backup_restore_round_trips_rows() {
        let fixture = fixture();
        seed_connection(&fixture, "c1").await;

        let record = fixture
            .manager
            .create_backup("c1", "snap", BackupKind::Full, None, false)
            .await
            .unwrap();

        // Wipe the table, then restore from the artifact.
        let connector = fixture.registry.get_connector("c1").unwrap();
        connector
            .execute_query("DELETE FROM notes WHERE 1 = 1")
            .await
            .unwrap();
        fixture.manager.restore_backup(&record.id).await.unwrap();

        let output = connector
            .execute_query("SELECT body FROM notes ORDER BY id")
            .await
            .unwrap();
        assert_eq!(output.rows.len(), 2);
        assert_eq!(output.rows[1][0], serde_json::json!("it's fine"));
    }

    #[tokio::test]
    async fn backup_events_mark_start_and_completion() {
        let fixture = fixture();
        seed_connection(&fixture, "c1").await;
        let mut events = fixture.hub.subscribe("c1");

        fixture
            .manager
            .create_backup("c1", "evt", BackupKind::Full, None, false)
            .await
            .unwrap();

        let first = events.try_recv().unwrap();
        let second = events.try_recv().unwrap();
        assert!(matches!(
            first,
            RuntimeEvent::BackupUpdate {
                status: BackupStatus::Running,
                ..
            }
        ));
        assert!(matches!(
            second,
            RuntimeEvent::BackupUpdate {
                status: BackupStatus::Completed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_connection_fails_and_records_the_error() {
        let fixture = fixture();
        let err = fixture
            .manager
            .create_backup("ghost", "x", BackupKind::Full, None, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "connection");
        assert!(fixture.manager.list_backups(Some("ghost")).is_empty());
    }

    #[tokio::test]
    async fn due_schedule_runs_once_and_advances_a_day() {
        let fixture = fixture();
        seed_connection(&fixture, "c1").await;

        let now = Utc::now();
        fixture
            .manager
            .save_schedule(BackupSchedule {
                id: "due".into(),
                connection_id: "c1".into(),
                cadence: BackupCadence::Daily,
                enabled: true,
                last_run: None,
                next_run: now - chrono::Duration::hours(2),
                backup_kind: BackupKind::Full,
                tables: None,
                compress: false,
            })
            .unwrap();
        let future_run = now + chrono::Duration::hours(6);
        fixture
            .manager
            .save_schedule(BackupSchedule {
                id: "future".into(),
                connection_id: "c1".into(),
                cadence: BackupCadence::Weekly,
                enabled: true,
                last_run: None,
                next_run: future_run,
                backup_kind: BackupKind::Full,
                tables: None,
                compress: false,
            })
            .unwrap();
        let disabled_run = now - chrono::Duration::hours(5);
        fixture
            .manager
            .save_schedule(BackupSchedule {
                id: "disabled".into(),
                connection_id: "c1".into(),
                cadence: BackupCadence::Daily,
                enabled: false,
                last_run: None,
                next_run: disabled_run,
                backup_kind: BackupKind::Full,
                tables: None,
                compress: false,
            })
            .unwrap();

        let ran = fixture.manager.run_due_schedules().await.unwrap();
        assert_eq!(ran, 1);
        assert_eq!(fixture.manager.list_backups(Some("c1")).len(), 1);

        let schedules = fixture.manager.list_schedules();
        let due = schedules.iter().find(|s| s.id == "due").unwrap();
        let advanced_by = due.next_run - Utc::now();
        assert!(advanced_by > chrono::Duration::hours(23));
        assert!(advanced_by <= chrono::Duration::hours(24));
        assert!(due.last_run.is_some());

        // Untouched neighbours.
        assert_eq!(
            schedules.iter().find(|s| s.id == "future").unwrap().next_run,
            future_run
        );
        assert_eq!(
            schedules
                .iter()
                .find(|s| s.id == "disabled")
                .unwrap()
                .next_run,
            disabled_run
        );
    }

    #[tokio::test]
    async fn next_wake_clamps_to_the_window() {
        let fixture = fixture();
        // No schedules: settle at the 30-minute ceiling.
        assert_eq!(fixture.manager.next_wake(), Duration::from_secs(1800));

        let now = Utc::now();
        fixture
            .manager
            .save_schedule(BackupSchedule {
                id: "soon".into(),
                connection_id: "c1".into(),
                cadence: BackupCadence::Daily,
                enabled: true,
                last_run: None,
                next_run: now + chrono::Duration::minutes(2),
                backup_kind: BackupKind::Full,
                tables: None,
                compress: false,
            })
            .unwrap();
        // Half of two minutes is below the floor.
        assert_eq!(fixture.manager.next_wake(), Duration::from_secs(300));

        fixture
            .manager
            .save_schedule(BackupSchedule {
                id: "soon".into(),
                connection_id: "c1".into(),
                cadence: BackupCadence::Daily,
                enabled: true,
                last_run: None,
                next_run: now - chrono::Duration::minutes(1),
                backup_kind: BackupKind::Full,
                tables: None,
                compress: false,
            })
            .unwrap();
        assert_eq!(fixture.manager.next_wake(), Duration::from_secs(60));
    }

    #[test]
    fn sql_literals_escape_quotes() {
        assert_eq!(sql_literal(&serde_json::json!(null)), "NULL");
        assert_eq!(sql_literal(&serde_json::json!(42)), "42");
        assert_eq!(sql_literal(&serde_json::json!("o'clock")), "'o''clock'");
        assert_eq!(sql_literal(&serde_json::json!(true)), "TRUE");
    }
}
