use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::TtlCache;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    ConnectionProfile, EngineKind, SchemaNode, SchemaTree, TableDetails, TableNode,
};
use crate::registry::ConnectionRegistry;

pub const SCHEMA_TTL_SECS: u64 = 900;
pub const TABLE_TTL_SECS: u64 = 600;
const SAMPLE_ROWS: usize = 5;

/// Shared metadata cache; values are stored serialized so a hit returns the
/// exact bytes of the original walk.
pub type MetadataCache = TtlCache<serde_json::Value>;

/// Builds the schema/table/column hierarchy through the connector contract,
/// memoized in the TTL cache.
pub struct SchemaExplorer {
    registry: Arc<ConnectionRegistry>,
    cache: Arc<MetadataCache>,
}

impl SchemaExplorer {
    pub fn new(registry: Arc<ConnectionRegistry>, cache: Arc<MetadataCache>) -> Self {
        SchemaExplorer { registry, cache }
    }

    pub async fn get_schema_tree(
        &self,
        profile: &ConnectionProfile,
        use_cache: bool,
    ) -> CoreResult<SchemaTree> {
        let cache_key = format!("{}_schema", profile.id);
        if use_cache {
            if let Some(cached) = self.cache.get(&cache_key) {
                if let Ok(tree) = serde_json::from_value(cached) {
                    return Ok(tree);
                }
            }
        }

        // Auto-connect on demand; a no-op when the session is already live.
        self.registry.connect(profile).await?;
        let connector = self
            .registry
            .get_connector(&profile.id)
            .ok_or_else(|| CoreError::Connection("not connected".into()))?;

        // Any failure mid-walk aborts the whole tree rather than returning
        // partial data.
        let mut schemas = BTreeMap::new();
        for schema_name in connector.get_schemas().await? {
            let tables = connector.get_tables(Some(&schema_name)).await?;
            let mut nodes = BTreeMap::new();
            for table_name in tables {
                let columns = connector
                    .get_columns(&table_name, Some(&schema_name))
                    .await?;
                nodes.insert(
                    table_name,
                    TableNode {
                        column_count: columns.len(),
                        columns,
                    },
                );
            }
            schemas.insert(
                schema_name,
                SchemaNode {
                    table_count: nodes.len(),
                    tables: nodes,
                },
            );
        }

        let tree = SchemaTree {
            connection_id: profile.id.clone(),
            engine: profile.engine,
            schemas,
        };
        self.cache
            .set(&cache_key, serde_json::to_value(&tree)?, Some(SCHEMA_TTL_SECS));
        Ok(tree)
    }

    pub async fn get_table_info(
        &self,
        profile: &ConnectionProfile,
        schema: &str,
        table: &str,
    ) -> CoreResult<TableDetails> {
        let cache_key = format!("{}_table_{}_{}", profile.id, schema, table);
        if let Some(cached) = self.cache.get(&cache_key) {
            if let Ok(details) = serde_json::from_value(cached) {
                return Ok(details);
            }
        }

        self.registry.connect(profile).await?;
        let connector = self
            .registry
            .get_connector(&profile.id)
            .ok_or_else(|| CoreError::Connection("not connected".into()))?;

        let columns = connector.get_columns(table, Some(schema)).await?;
        let sample = connector
            .execute_query(&sample_query(profile.engine, schema, table))
            .await?;
        let sample_rows = sample.rows.into_iter().take(SAMPLE_ROWS).collect();

        let details = TableDetails {
            schema: schema.to_string(),
            table: table.to_string(),
            columns,
            sample_rows,
        };
        self.cache
            .set(&cache_key, serde_json::to_value(&details)?, Some(TABLE_TTL_SECS));
        Ok(details)
    }

    /// Drop every cached entry for a connection, forcing the next read to
    /// recompute.
    pub fn refresh_schema(&self, connection_id: &str) -> usize {
        self.cache.delete_prefix(&format!("{}_", connection_id))
    }

    pub fn cached_keys(&self) -> Vec<String> {
        self.cache.get_keys()
    }
}

/// Bounded sample query per engine; the document store takes an
/// empty-filter find against the collection instead of SQL.
fn sample_query(engine: EngineKind, schema: &str, table: &str) -> String {
    match engine {
        EngineKind::MongoDb => format!(r#"{{"collection": "{}", "filter": {{}}}}"#, table),
        EngineKind::Sqlite => format!("SELECT * FROM \"{}\" LIMIT {}", table, SAMPLE_ROWS),
        _ => format!(
            "SELECT * FROM {}.{} LIMIT {}",
            schema, table, SAMPLE_ROWS
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EngineKind;

    fn memory_profile(id: &str) -> ConnectionProfile {
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

    fn explorer() -> (SchemaExplorer, Arc<ConnectionRegistry>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let cache = Arc::new(MetadataCache::new(600));
        (SchemaExplorer::new(registry.clone(), cache), registry)
    }

    #[test]
    fn sample_queries_are_engine_shaped() {
        assert_eq!(
            sample_query(EngineKind::Postgres, "public", "users"),
            "SELECT * FROM public.users LIMIT 5"
        );
        assert_eq!(
            sample_query(EngineKind::Sqlite, "main", "users"),
            "SELECT * FROM \"users\" LIMIT 5"
        );
        assert_eq!(
            sample_query(EngineKind::MongoDb, "app", "users"),
            r#"{"collection": "users", "filter": {}}"#
        );
    }

    #[tokio::test]
    async fn schema_tree_walks_tables_and_columns() {
        let (explorer, registry) = explorer();
        let profile = memory_profile("c1");
        registry.connect(&profile).await.unwrap();
        let connector = registry.get_connector("c1").unwrap();
        connector
            .execute_query("CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT)")
            .await
            .unwrap();
        connector
            .execute_query("CREATE TABLE orders (id INTEGER, user_id INTEGER, total REAL)")
            .await
            .unwrap();

        let tree = explorer.get_schema_tree(&profile, true).await.unwrap();
        let main = tree.schemas.get("main").unwrap();
        assert_eq!(main.table_count, 2);
        assert_eq!(main.tables.get("users").unwrap().column_count, 2);
        assert_eq!(main.tables.get("orders").unwrap().column_count, 3);
    }

    #[tokio::test]
    async fn cached_tree_is_served_until_refresh() {
        let (explorer, registry) = explorer();
        let profile = memory_profile("c1");
        registry.connect(&profile).await.unwrap();
        let connector = registry.get_connector("c1").unwrap();
        connector
            .execute_query("CREATE TABLE first (id INTEGER)")
            .await
            .unwrap();

        let tree = explorer.get_schema_tree(&profile, true).await.unwrap();
        assert_eq!(tree.schemas["main"].table_count, 1);

        // A table added behind the cache's back stays invisible...
        connector
            .execute_query("CREATE TABLE second (id INTEGER)")
            .await
            .unwrap();
        let cached = explorer.get_schema_tree(&profile, true).await.unwrap();
        assert_eq!(cached, tree);

        // ...until the connection's keys are invalidated.
        assert_eq!(explorer.refresh_schema("c1"), 1);
        let fresh = explorer.get_schema_tree(&profile, true).await.unwrap();
        assert_eq!(fresh.schemas["main"].table_count, 2);
    }

    #[tokio::test]
    async fn table_info_includes_bounded_samples() {
        let (explorer, registry) = explorer();
        let profile = memory_profile("c1");
        registry.connect(&profile).await.unwrap();
        let connector = registry.get_connector("c1").unwrap();
        connector
            .execute_query("CREATE TABLE nums (n INTEGER)")
            .await
            .unwrap();
        connector
            .execute_query("INSERT INTO nums VALUES (1), (2), (3), (4), (5), (6), (7)")
            .await
            .unwrap();

        let details = explorer.get_table_info(&profile, "main", "nums").await.unwrap();
        assert_eq!(details.columns.len(), 1);
        assert_eq!(details.sample_rows.len(), 5);
    }

    #[tokio::test]
    async fn explorer_auto_connects_on_demand() {
        let (explorer, registry) = explorer();
        let profile = memory_profile("c1");
        assert!(!registry.is_connected("c1"));
        explorer.get_schema_tree(&profile, false).await.unwrap();
        assert!(registry.is_connected("c1"));
    }
}
