use crate::models::{EngineKind, QueryHistoryEntry, QueryRequest, QueryResponse};
use crate::runtime::CoreRuntime;

use super::{CommandError, CommandResult};

/// Execute an ad-hoc statement. Destructive statements without a bounding
/// clause come back with `requiresConfirmation` and must be re-sent with
/// `skipValidation` once the user has confirmed.
pub async fn execute(
    rt: &CoreRuntime,
    connection_id: &str,
    request: QueryRequest,
) -> CommandResult<QueryResponse> {
    rt.record_activity();
    let profile = rt
        .profiles
        .get(connection_id)
        .ok_or_else(|| CommandError::not_found(connection_id))?;

    rt.registry.connect(&profile).await?;
    let connector = rt
        .registry
        .get_connector(connection_id)
        .ok_or_else(|| CommandError::not_found(connection_id))?;

    // SQLite rides a single session, so statements for one connection are
    // serialized through its per-connection lock rather than queuing on the
    // pool until they time out.
    let _guard = if profile.engine == EngineKind::Sqlite {
        Some(rt.registry.operation_lock(connection_id).lock_owned().await)
    } else {
        None
    };

    let defaults = rt.settings.lock().unwrap().query.clone();
    log::info!(
        "executing query on '{}': {:.100}",
        profile.name,
        request.query
    );
    let response = rt
        .executor
        .execute(&profile, connector.as_ref(), &request, &defaults)
        .await;
    if let Some(error) = &response.error {
        log::error!("query failed: {}", error);
    }
    Ok(response)
}

pub async fn get_history(
    rt: &CoreRuntime,
    connection_id: &str,
    limit: Option<usize>,
) -> CommandResult<Vec<QueryHistoryEntry>> {
    Ok(rt.history.get_history(connection_id, limit.unwrap_or(50)))
}

pub async fn clear_history(rt: &CoreRuntime, connection_id: &str) -> CommandResult<bool> {
    Ok(rt.history.clear_history(connection_id))
}

pub async fn delete_query(
    rt: &CoreRuntime,
    connection_id: &str,
    index: usize,
) -> CommandResult<bool> {
    Ok(rt.history.delete_query(connection_id, index))
}

pub async fn search_history(
    rt: &CoreRuntime,
    connection_id: &str,
    term: &str,
) -> CommandResult<Vec<QueryHistoryEntry>> {
    Ok(rt.history.search_history(connection_id, term))
}

/// Purge entries older than the retention window; returns the removed count.
pub async fn cleanup_history(rt: &CoreRuntime, retention_days: u32) -> CommandResult<usize> {
    let removed = rt.history.cleanup_old_history(retention_days)?;
    log::info!("removed {} old queries from history", removed);
    Ok(removed)
}
