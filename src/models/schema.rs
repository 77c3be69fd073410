use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::EngineKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub column_default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableNode {
    pub columns: Vec<ColumnInfo>,
    pub column_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    pub tables: BTreeMap<String, TableNode>,
    pub table_count: usize,
}

/// Full schema → table → column hierarchy for one connection, as returned by
/// the schema explorer and held in the TTL cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTree {
    pub connection_id: String,
    pub engine: EngineKind,
    pub schemas: BTreeMap<String, SchemaNode>,
}

/// Table-level detail: columns plus up to five sample rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableDetails {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub sample_rows: Vec<Vec<serde_json::Value>>,
}

/// Per-table size/row-count statistics used by the analytics views.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStat {
    pub schema: Option<String>,
    pub table: String,
    pub row_count: Option<i64>,
    pub size_bytes: Option<i64>,
}
