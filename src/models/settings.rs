use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySettings {
    pub default_limit: u32,
    pub timeout_seconds: u64,
    pub confirm_destructive: bool,
}

impl Default for QuerySettings {
    fn default() -> Self {
        QuerySettings {
            default_limit: 1000,
            timeout_seconds: 30,
            confirm_destructive: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySettings {
    pub retention_days: u32,
}

impl Default for HistorySettings {
    fn default() -> Self {
        HistorySettings { retention_days: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSettings {
    pub poll_interval_secs: u64,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        AnalyticsSettings {
            poll_interval_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSettings {
    /// Overrides the default `<data dir>/backups` artifact directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    /// Hard timeout for native dump/restore subprocesses, in seconds.
    pub tool_timeout_secs: u64,
}

impl Default for BackupSettings {
    fn default() -> Self {
        BackupSettings {
            directory: None,
            tool_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub query: QuerySettings,
    pub history: HistorySettings,
    pub analytics: AnalyticsSettings,
    pub backup: BackupSettings,
}
