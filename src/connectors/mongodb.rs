use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::Client;
use tokio::sync::RwLock;

use crate::analytics;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    AnalyticsSnapshot, ColumnInfo, ConnectionProfile, EngineKind, QueryOutput, TableStat,
    TestConnectionResult,
};

use super::Connector;

const SAMPLE_LIMIT: i64 = 100;

fn connection_string(profile: &ConnectionProfile) -> String {
    let username = urlencoding::encode(&profile.username);
    let password = urlencoding::encode(&profile.password);
    let port = if profile.port == 0 {
        profile.engine.default_port()
    } else {
        profile.port
    };
    if profile.username.is_empty() {
        format!("mongodb://{}:{}", profile.host, port)
    } else {
        format!(
            "mongodb://{}:{}@{}:{}",
            username, password, profile.host, port
        )
    }
}

async fn open_client(profile: &ConnectionProfile) -> CoreResult<Client> {
    let client = Client::with_uri_str(connection_string(profile))
        .await
        .map_err(|e| CoreError::Connection(e.to_string()))?;
    // The driver connects lazily; a ping against admin proves reachability.
    tokio::time::timeout(
        Duration::from_secs(10),
        client.database("admin").run_command(doc! { "ping": 1 }),
    )
    .await
    .map_err(|_| CoreError::Connection("timed out waiting for server ping".into()))?
    .map_err(|e| CoreError::Connection(e.to_string()))?;
    Ok(client)
}

pub struct MongoDbConnector {
    state: RwLock<Option<(Client, String)>>,
}

impl MongoDbConnector {
    pub fn new() -> Self {
        MongoDbConnector {
            state: RwLock::new(None),
        }
    }

    async fn client(&self) -> CoreResult<(Client, String)> {
        self.state
            .read()
            .await
            .clone()
            .ok_or_else(|| CoreError::Connection("not connected".into()))
    }
}

impl Default for MongoDbConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MongoDbConnector {
    fn engine(&self) -> EngineKind {
        EngineKind::MongoDb
    }

    async fn connect(&self, profile: &ConnectionProfile) -> CoreResult<()> {
        let client = open_client(profile).await?;
        *self.state.write().await = Some((client, profile.database.clone()));
        log::info!("mongodb connection established ({})", profile.name);
        Ok(())
    }

    async fn disconnect(&self) -> CoreResult<()> {
        if let Some((client, _)) = self.state.write().await.take() {
            client.shutdown().await;
            log::info!("mongodb connection closed");
        }
        Ok(())
    }

    async fn test_connection(&self, profile: &ConnectionProfile) -> TestConnectionResult {
        let start = Instant::now();
        match open_client(profile).await {
            Ok(client) => {
                client.shutdown().await;
                TestConnectionResult {
                    success: true,
                    message: "Connection successful".into(),
                    latency_ms: Some(start.elapsed().as_millis() as u64),
                }
            }
            Err(e) => TestConnectionResult {
                success: false,
                message: e.to_string(),
                latency_ms: None,
            },
        }
    }

    async fn get_schemas(&self) -> CoreResult<Vec<String>> {
        let (client, _) = self.client().await?;
        let names = client
            .list_database_names()
            .await
            .map_err(|e| CoreError::Query(e.to_string()))?;
        Ok(names
            .into_iter()
            .filter(|name| !matches!(name.as_str(), "admin" | "local" | "config"))
            .collect())
    }

    async fn get_tables(&self, schema: Option<&str>) -> CoreResult<Vec<String>> {
        let (client, database) = self.client().await?;
        let database = schema.unwrap_or(&database);
        if database.is_empty() {
            return Ok(Vec::new());
        }
        client
            .database(database)
            .list_collection_names()
            .await
            .map_err(|e| CoreError::Query(e.to_string()))
    }

    async fn get_columns(&self, table: &str, schema: Option<&str>) -> CoreResult<Vec<ColumnInfo>> {
        let (client, database) = self.client().await?;
        let database = schema.unwrap_or(&database);
        if database.is_empty() {
            return Ok(Vec::new());
        }
        let collection = client.database(database).collection::<Document>(table);
        let sample = collection
            .find_one(doc! {})
            .await
            .map_err(|e| CoreError::Query(e.to_string()))?;

        // Document stores have no fixed columns; a sampled document stands
        // in for the field list.
        Ok(sample
            .map(|doc| {
                doc.iter()
                    .map(|(key, value)| ColumnInfo {
                        name: key.clone(),
                        data_type: bson_type_name(value).to_string(),
                        is_nullable: true,
                        column_default: None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn execute_query(&self, query: &str) -> CoreResult<QueryOutput> {
        let (client, database) = self.client().await?;
        if database.is_empty() {
            return Err(CoreError::Query("no database specified".into()));
        }
        let db = client.database(&database);

        let (collection_name, filter) = parse_query(query)?;
        let collection_name = match collection_name {
            Some(name) => name,
            None => {
                let collections = db
                    .list_collection_names()
                    .await
                    .map_err(|e| CoreError::Query(e.to_string()))?;
                collections
                    .into_iter()
                    .next()
                    .ok_or_else(|| CoreError::Query("no collections found".into()))?
            }
        };

        let collection = db.collection::<Document>(&collection_name);
        let documents: Vec<Document> = collection
            .find(filter)
            .limit(SAMPLE_LIMIT)
            .await
            .map_err(|e| CoreError::Query(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| CoreError::Query(e.to_string()))?;

        Ok(documents_to_output(&documents))
    }

    async fn collect_metrics(&self) -> CoreResult<AnalyticsSnapshot> {
        let (client, database) = self.client().await?;
        analytics::mongodb::collect(&client, &database).await
    }

    async fn table_statistics(&self) -> CoreResult<Vec<TableStat>> {
        let (client, database) = self.client().await?;
        analytics::mongodb::table_stats(&client, &database).await
    }

    async fn kill_query(&self, pid: &str) -> CoreResult<()> {
        let (client, _) = self.client().await?;
        let op: i64 = pid
            .parse()
            .map_err(|_| CoreError::Query(format!("invalid operation id: {}", pid)))?;
        client
            .database("admin")
            .run_command(doc! { "killOp": 1, "op": op })
            .await
            .map_err(|e| CoreError::Query(e.to_string()))?;
        Ok(())
    }
}

/// Ad-hoc query text is a JSON document: either a bare filter, or
/// `{"collection": "...", "filter": {...}}` to name the target collection.
/// Blank text means an empty filter against the first collection.
fn parse_query(query: &str) -> CoreResult<(Option<String>, Document)> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Ok((None, Document::new()));
    }
    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| CoreError::Query(format!("invalid filter document: {}", e)))?;

    if let Some(object) = value.as_object() {
        if let Some(collection) = object.get("collection").and_then(|v| v.as_str()) {
            let filter = object.get("filter").cloned().unwrap_or(serde_json::json!({}));
            let filter: Document = mongodb::bson::to_document(&filter)
                .map_err(|e| CoreError::Query(format!("invalid filter document: {}", e)))?;
            return Ok((Some(collection.to_string()), filter));
        }
    }

    let filter: Document = mongodb::bson::to_document(&value)
        .map_err(|e| CoreError::Query(format!("invalid filter document: {}", e)))?;
    Ok((None, filter))
}

fn documents_to_output(documents: &[Document]) -> QueryOutput {
    if documents.is_empty() {
        return QueryOutput::default();
    }

    // Union of keys across all returned documents, in first-seen order.
    let mut columns: Vec<String> = Vec::new();
    for doc in documents {
        for key in doc.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = documents
        .iter()
        .map(|doc| {
            columns
                .iter()
                .map(|column| {
                    doc.get(column)
                        .map(|bson| serde_json::to_value(bson).unwrap_or(serde_json::Value::Null))
                        .unwrap_or(serde_json::Value::Null)
                })
                .collect()
        })
        .collect();

    QueryOutput {
        columns,
        rows,
        rows_affected: 0,
    }
}

fn bson_type_name(value: &mongodb::bson::Bson) -> &'static str {
    use mongodb::bson::Bson;
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        Bson::Boolean(_) => "bool",
        Bson::Null => "null",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Decimal128(_) => "decimal",
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Timestamp(_) => "timestamp",
        Bson::Binary(_) => "binData",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_accepts_blank_and_bare_filters() {
        let (collection, filter) = parse_query("").unwrap();
        assert!(collection.is_none());
        assert!(filter.is_empty());

        let (collection, filter) = parse_query(r#"{"age": {"$gt": 21}}"#).unwrap();
        assert!(collection.is_none());
        assert!(filter.contains_key("age"));
    }

    #[test]
    fn parse_query_extracts_named_collection() {
        let (collection, filter) =
            parse_query(r#"{"collection": "users", "filter": {"active": true}}"#).unwrap();
        assert_eq!(collection.as_deref(), Some("users"));
        assert_eq!(filter.get_bool("active").unwrap(), true);
    }

    #[test]
    fn parse_query_rejects_invalid_json() {
        assert!(parse_query("{not json").is_err());
    }

    #[test]
    fn documents_output_unions_keys() {
        let docs = vec![
            doc! { "a": 1, "b": "x" },
            doc! { "a": 2, "c": true },
        ];
        let output = documents_to_output(&docs);
        assert_eq!(output.columns, vec!["a", "b", "c"]);
        assert_eq!(output.rows[0][2], serde_json::Value::Null);
        assert_eq!(output.rows[1][0], serde_json::json!(2));
    }
}
