use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::models::{
    AppSettings, BackupRecord, BackupSchedule, ConnectionGroup, ConnectionProfile,
    QueryHistoryEntry,
};

/// On-disk layout: one JSON document per concern under the per-user app
/// directory. Every write goes to a temp file first and is renamed into
/// place, so a forced kill never leaves a partial document.
pub struct AppStorage {
    base: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfilesDoc {
    #[serde(default)]
    connections: Vec<ConnectionProfile>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GroupsDoc {
    #[serde(default)]
    groups: Vec<ConnectionGroup>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SchedulesDoc {
    #[serde(default)]
    schedules: Vec<BackupSchedule>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionDoc {
    #[serde(default)]
    active_connections: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDoc {
    #[serde(default)]
    history: HashMap<String, Vec<QueryHistoryEntry>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BackupIndexDoc {
    #[serde(default)]
    backups: Vec<BackupRecord>,
}

impl AppStorage {
    pub fn new(base: impl Into<PathBuf>) -> CoreResult<Self> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(AppStorage { base })
    }

    /// Per-user data directory for the application.
    pub fn default_dir() -> CoreResult<PathBuf> {
        ProjectDirs::from("com", "quay", "quay")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| CoreError::Storage("could not determine user data directory".into()))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.base.join("backups")
    }

    fn read_doc<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.base.join(name);
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                log::warn!("ignoring malformed {}: {}", name, e);
                T::default()
            }),
            Err(_) => T::default(),
        }
    }

    fn write_doc<T: Serialize>(&self, name: &str, value: &T) -> CoreResult<()> {
        let path = self.base.join(name);
        let tmp = self.base.join(format!("{}.tmp", name));
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn load_profiles(&self) -> Vec<ConnectionProfile> {
        self.read_doc::<ProfilesDoc>("connections.json").connections
    }

    pub fn save_profiles(&self, profiles: &[ConnectionProfile]) -> CoreResult<()> {
        self.write_doc(
            "connections.json",
            &ProfilesDoc {
                connections: profiles.to_vec(),
            },
        )
    }

    pub fn load_groups(&self) -> Vec<ConnectionGroup> {
        self.read_doc::<GroupsDoc>("groups.json").groups
    }

    pub fn save_groups(&self, groups: &[ConnectionGroup]) -> CoreResult<()> {
        self.write_doc(
            "groups.json",
            &GroupsDoc {
                groups: groups.to_vec(),
            },
        )
    }

    pub fn load_schedules(&self) -> Vec<BackupSchedule> {
        self.read_doc::<SchedulesDoc>("backup_schedules.json")
            .schedules
    }

    pub fn save_schedules(&self, schedules: &[BackupSchedule]) -> CoreResult<()> {
        self.write_doc(
            "backup_schedules.json",
            &SchedulesDoc {
                schedules: schedules.to_vec(),
            },
        )
    }

    pub fn load_session(&self) -> Vec<String> {
        self.read_doc::<SessionDoc>("session.json").active_connections
    }

    pub fn save_session(&self, active_connections: &[String]) -> CoreResult<()> {
        self.write_doc(
            "session.json",
            &SessionDoc {
                active_connections: active_connections.to_vec(),
            },
        )
    }

    pub fn load_settings(&self) -> AppSettings {
        self.read_doc("settings.json")
    }

    pub fn save_settings(&self, settings: &AppSettings) -> CoreResult<()> {
        self.write_doc("settings.json", settings)
    }

    pub fn load_history(&self) -> HashMap<String, Vec<QueryHistoryEntry>> {
        self.read_doc::<HistoryDoc>("query_history.json").history
    }

    pub fn save_history(&self, history: &HashMap<String, Vec<QueryHistoryEntry>>) -> CoreResult<()> {
        self.write_doc(
            "query_history.json",
            &HistoryDoc {
                history: history.clone(),
            },
        )
    }

    pub fn load_backup_index(&self) -> Vec<BackupRecord> {
        self.read_doc::<BackupIndexDoc>("backups.json").backups
    }

    pub fn save_backup_index(&self, backups: &[BackupRecord]) -> CoreResult<()> {
        self.write_doc(
            "backups.json",
            &BackupIndexDoc {
                backups: backups.to_vec(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EngineKind;
    use tempfile::tempdir;

    fn profile(id: &str) -> ConnectionProfile {
        ConnectionProfile {
            id: id.into(),
            name: format!("conn-{}", id),
            engine: EngineKind::Sqlite,
            host: String::new(),
            port: 0,
            username: String::new(),
            password: String::new(),
            database: ":memory:".into(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn profiles_round_trip() {
        let dir = tempdir().unwrap();
        let storage = AppStorage::new(dir.path()).unwrap();
        storage.save_profiles(&[profile("a"), profile("b")]).unwrap();
        let loaded = storage.load_profiles();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "a");
    }

    #[test]
    fn missing_documents_yield_defaults() {
        let dir = tempdir().unwrap();
        let storage = AppStorage::new(dir.path()).unwrap();
        assert!(storage.load_profiles().is_empty());
        assert!(storage.load_session().is_empty());
        assert_eq!(storage.load_settings().query.default_limit, 1000);
    }

    #[test]
    fn malformed_documents_are_ignored() {
        let dir = tempdir().unwrap();
        let storage = AppStorage::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("session.json"), "{not json").unwrap();
        assert!(storage.load_session().is_empty());
    }

    #[test]
    fn writes_replace_rather_than_append() {
        let dir = tempdir().unwrap();
        let storage = AppStorage::new(dir.path()).unwrap();
        storage.save_session(&["a".into(), "b".into()]).unwrap();
        storage.save_session(&["c".into()]).unwrap();
        assert_eq!(storage.load_session(), vec!["c".to_string()]);
        assert!(!dir.path().join("session.json.tmp").exists());
    }
}
