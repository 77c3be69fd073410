use crate::connectors::create_connector;
use crate::models::{
    ConnectionGroup, ConnectionInfo, ConnectionProfile, ConnectionStatus, TestConnectionResult,
};
use crate::runtime::CoreRuntime;

use super::{sanitize_error, CommandError, CommandResult};

/// Save a new or updated connection profile. The password moves to the OS
/// keychain; the profile document never contains it.
pub async fn save_connection(rt: &CoreRuntime, profile: ConnectionProfile) -> CommandResult<()> {
    rt.profiles.save(profile)?;
    Ok(())
}

/// Delete a profile: tear down any live session and in-memory metrics
/// before the profile and its password go away.
pub async fn delete_connection(rt: &CoreRuntime, connection_id: &str) -> CommandResult<bool> {
    rt.streamer.stop(connection_id);
    rt.registry.disconnect(connection_id).await;
    rt.explorer.refresh_schema(connection_id);
    rt.analytics.forget_connection(connection_id);
    Ok(rt.profiles.delete(connection_id)?)
}

pub async fn load_connections(rt: &CoreRuntime) -> CommandResult<Vec<ConnectionProfile>> {
    Ok(rt.profiles.list())
}

/// Open a session for a profile; a no-op success when already connected.
/// Failures come back as a status payload, not an exception.
pub async fn connect(rt: &CoreRuntime, connection_id: &str) -> CommandResult<ConnectionInfo> {
    rt.record_activity();
    let profile = rt
        .profiles
        .get(connection_id)
        .ok_or_else(|| CommandError::not_found(connection_id))?;

    match rt.registry.connect(&profile).await {
        Ok(()) => Ok(ConnectionInfo::from_profile(
            &profile,
            ConnectionStatus::Connected,
        )),
        Err(e) => {
            let mut info = ConnectionInfo::from_profile(&profile, ConnectionStatus::Error);
            info.error = Some(sanitize_error(&e.to_string()));
            Ok(info)
        }
    }
}

pub async fn disconnect(rt: &CoreRuntime, connection_id: &str) -> CommandResult<bool> {
    rt.record_activity();
    rt.streamer.stop(connection_id);
    Ok(rt.registry.disconnect(connection_id).await)
}

/// Probe a configuration without installing a session.
pub async fn test_connection(
    rt: &CoreRuntime,
    profile: ConnectionProfile,
) -> CommandResult<TestConnectionResult> {
    rt.record_activity();
    let connector = create_connector(profile.engine);
    let mut result = connector.test_connection(&profile).await;
    result.message = sanitize_error(&result.message);
    Ok(result)
}

pub async fn get_connection_status(
    rt: &CoreRuntime,
    connection_id: &str,
) -> CommandResult<ConnectionInfo> {
    let profile = rt
        .profiles
        .get(connection_id)
        .ok_or_else(|| CommandError::not_found(connection_id))?;
    Ok(rt.registry.get_connection_status(&profile))
}

pub async fn load_groups(rt: &CoreRuntime) -> CommandResult<Vec<ConnectionGroup>> {
    Ok(rt.profiles.list_groups())
}

pub async fn save_group(rt: &CoreRuntime, group: ConnectionGroup) -> CommandResult<()> {
    rt.profiles.save_group(group)?;
    Ok(())
}

pub async fn delete_group(rt: &CoreRuntime, group_id: &str) -> CommandResult<bool> {
    Ok(rt.profiles.delete_group(group_id)?)
}
