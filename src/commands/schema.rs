use crate::models::{SchemaTree, TableDetails};
use crate::runtime::CoreRuntime;

use super::{CommandError, CommandResult};

pub async fn get_tree(
    rt: &CoreRuntime,
    connection_id: &str,
    use_cache: bool,
) -> CommandResult<SchemaTree> {
    rt.record_activity();
    let profile = rt
        .profiles
        .get(connection_id)
        .ok_or_else(|| CommandError::not_found(connection_id))?;
    Ok(rt.explorer.get_schema_tree(&profile, use_cache).await?)
}

pub async fn get_table_info(
    rt: &CoreRuntime,
    connection_id: &str,
    schema: &str,
    table: &str,
) -> CommandResult<TableDetails> {
    rt.record_activity();
    let profile = rt
        .profiles
        .get(connection_id)
        .ok_or_else(|| CommandError::not_found(connection_id))?;
    Ok(rt.explorer.get_table_info(&profile, schema, table).await?)
}

/// Invalidate every cached metadata entry for the connection; the next read
/// recomputes. Returns the number of evicted keys.
pub async fn refresh(rt: &CoreRuntime, connection_id: &str) -> CommandResult<usize> {
    rt.record_activity();
    Ok(rt.explorer.refresh_schema(connection_id))
}
