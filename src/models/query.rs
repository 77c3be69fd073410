use serde::{Deserialize, Serialize};

/// Raw result shape produced by a connector: column names plus a row matrix
/// of JSON cells. The executor layers timing, limits and the confirmation
/// gate on top of this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    /// Rows affected for statements that return no result set.
    pub rows_affected: u64,
}

/// Arguments for `query.execute` at the command boundary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Wall-clock timeout in seconds; always wins over any engine default.
    pub timeout: Option<u64>,
    #[serde(default)]
    pub skip_validation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub success: bool,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Set when a destructive statement lacked a bounding clause; nothing was
    /// executed and the caller must re-invoke with `skip_validation` after
    /// explicit user confirmation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_confirmation: bool,
}

impl QueryResponse {
    pub fn confirmation_required() -> Self {
        QueryResponse {
            success: false,
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            execution_time_ms: 0,
            error: None,
            error_kind: None,
            requires_confirmation: true,
        }
    }
}
