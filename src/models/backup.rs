use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupCadence {
    Daily,
    Weekly,
    Monthly,
}

impl BackupCadence {
    /// Calendar offset added to "now" when a run completes. Advancing from
    /// now rather than from the previous `next_run` is deliberate: a
    /// scheduler that was offline does not replay missed runs.
    pub fn offset(&self) -> Duration {
        match self {
            BackupCadence::Daily => Duration::days(1),
            BackupCadence::Weekly => Duration::weeks(1),
            BackupCadence::Monthly => Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Full,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSchedule {
    pub id: String,
    pub connection_id: String,
    pub cadence: BackupCadence,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    pub backup_kind: BackupKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
    #[serde(default)]
    pub compress: bool,
}

impl BackupSchedule {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run <= now
    }

    /// Mark a completed run and advance `next_run` by the cadence offset
    /// from `now`, keeping the invariant next_run >= max(now, last_run).
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
        self.next_run = now + self.cadence.offset();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Running,
    Completed,
    Failed,
}

/// One backup artifact tracked in the on-disk index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: String,
    pub connection_id: String,
    pub name: String,
    pub path: String,
    pub backup_kind: BackupKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
    pub compressed: bool,
    pub size_bytes: u64,
    pub status: BackupStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
