use std::time::Duration;

use crate::models::{
    AnalyticsSnapshot, HistoricalSample, QueryPlan, SlowQueryRecord, TableStat,
};
use crate::runtime::CoreRuntime;
use crate::scheduler::SchedulerStats;

use super::{CommandError, CommandResult};

fn live_connector(
    rt: &CoreRuntime,
    connection_id: &str,
) -> CommandResult<std::sync::Arc<dyn crate::connectors::Connector>> {
    rt.registry
        .get_connector(connection_id)
        .ok_or_else(|| CommandError::not_found(connection_id))
}

pub async fn get(rt: &CoreRuntime, connection_id: &str) -> CommandResult<AnalyticsSnapshot> {
    let connector = live_connector(rt, connection_id)?;
    Ok(rt
        .analytics
        .get_analytics(connection_id, connector.as_ref())
        .await?)
}

pub async fn historical(
    rt: &CoreRuntime,
    connection_id: &str,
    hours: Option<i64>,
) -> CommandResult<Vec<HistoricalSample>> {
    Ok(rt.analytics.get_historical(connection_id, hours.unwrap_or(3)))
}

pub async fn slow_queries(
    rt: &CoreRuntime,
    connection_id: &str,
    hours: Option<i64>,
) -> CommandResult<Vec<SlowQueryRecord>> {
    Ok(rt
        .analytics
        .get_slow_queries(connection_id, hours.unwrap_or(24)))
}

pub async fn clear_slow_queries(rt: &CoreRuntime, connection_id: &str) -> CommandResult<()> {
    rt.analytics.clear_slow_queries(connection_id);
    Ok(())
}

pub async fn table_stats(rt: &CoreRuntime, connection_id: &str) -> CommandResult<Vec<TableStat>> {
    let connector = live_connector(rt, connection_id)?;
    Ok(rt.analytics.get_table_statistics(connector.as_ref()).await?)
}

/// Engine-native explain; engines without one answer with a typed
/// unsupported result instead of an error.
pub async fn query_plan(
    rt: &CoreRuntime,
    connection_id: &str,
    query: &str,
) -> CommandResult<QueryPlan> {
    rt.record_activity();
    let connector = live_connector(rt, connection_id)?;
    Ok(rt.analytics.get_query_plan(connector.as_ref(), query).await?)
}

pub async fn kill_query(rt: &CoreRuntime, connection_id: &str, pid: &str) -> CommandResult<()> {
    rt.record_activity();
    let connector = live_connector(rt, connection_id)?;
    Ok(rt.analytics.kill_query(connector.as_ref(), pid).await?)
}

/// Subscribe-side of the streaming mode: ensure the poll loop for this
/// connection is running. Snapshots arrive through the event hub.
pub async fn start_stream(rt: &CoreRuntime, connection_id: &str) -> CommandResult<()> {
    if rt.registry.get_connector(connection_id).is_none() {
        return Err(CommandError::not_found(connection_id));
    }
    let poll_interval = Duration::from_secs(rt.settings.lock().unwrap().analytics.poll_interval_secs);
    rt.streamer.start(
        connection_id,
        rt.registry.clone(),
        rt.analytics.clone(),
        rt.events.clone(),
        poll_interval,
    );
    Ok(())
}

pub async fn stop_stream(rt: &CoreRuntime, connection_id: &str) -> CommandResult<()> {
    rt.streamer.stop(connection_id);
    Ok(())
}

pub async fn scheduler_stats(rt: &CoreRuntime) -> CommandResult<SchedulerStats> {
    Ok(rt.scheduler.get_stats())
}
