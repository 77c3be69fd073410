use serde::Deserialize;

use crate::models::{BackupKind, BackupRecord, BackupSchedule};
use crate::runtime::CoreRuntime;

use super::CommandResult;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackupRequest {
    pub name: String,
    #[serde(default = "default_kind")]
    pub backup_kind: BackupKind,
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    #[serde(default)]
    pub compress: bool,
}

fn default_kind() -> BackupKind {
    BackupKind::Full
}

pub async fn create(
    rt: &CoreRuntime,
    connection_id: &str,
    request: CreateBackupRequest,
) -> CommandResult<BackupRecord> {
    rt.record_activity();
    Ok(rt
        .backups
        .create_backup(
            connection_id,
            &request.name,
            request.backup_kind,
            request.tables,
            request.compress,
        )
        .await?)
}

pub async fn restore(rt: &CoreRuntime, backup_id: &str) -> CommandResult<()> {
    rt.record_activity();
    Ok(rt.backups.restore_backup(backup_id).await?)
}

pub async fn list(
    rt: &CoreRuntime,
    connection_id: Option<&str>,
) -> CommandResult<Vec<BackupRecord>> {
    Ok(rt.backups.list_backups(connection_id))
}

pub async fn delete(rt: &CoreRuntime, backup_id: &str) -> CommandResult<bool> {
    Ok(rt.backups.delete_backup(backup_id)?)
}

pub async fn list_schedules(rt: &CoreRuntime) -> CommandResult<Vec<BackupSchedule>> {
    Ok(rt.backups.list_schedules())
}

pub async fn save_schedule(rt: &CoreRuntime, schedule: BackupSchedule) -> CommandResult<()> {
    Ok(rt.backups.save_schedule(schedule)?)
}

pub async fn delete_schedule(rt: &CoreRuntime, schedule_id: &str) -> CommandResult<bool> {
    Ok(rt.backups.delete_schedule(schedule_id)?)
}
