use thiserror::Error;

/// Unified error type for the runtime. Engine-specific errors are normalized
/// into these variants at the connector boundary; raw driver errors never
/// cross it.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("query timed out after {0}s")]
    QueryTimeout(u64),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("backup error: {0}")]
    Backup(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Stable kind string surfaced to the command boundary as `errorKind`.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Connection(_) => "connection",
            CoreError::Query(_) => "query",
            CoreError::QueryTimeout(_) => "queryTimeout",
            CoreError::Unsupported(_) => "unsupported",
            CoreError::Backup(_) => "backup",
            CoreError::Storage(_) => "storage",
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        CoreError::Query(clean_sqlx_message(&e.to_string()))
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}

/// Strip the "error returned from database:" prefix that sqlx adds so the
/// UI sees the engine's own message.
pub fn clean_sqlx_message(msg: &str) -> String {
    msg.strip_prefix("error returned from database: ")
        .unwrap_or(msg)
        .to_string()
}

pub type CoreResult<T> = Result<T, CoreError>;
