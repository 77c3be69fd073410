use serde::{Deserialize, Serialize};

/// Supported database engines. Connector selection is keyed on this enum at
/// a single factory registration point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[serde(rename = "postgresql")]
    Postgres,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "mariadb")]
    MariaDb,
    Sqlite,
    #[serde(rename = "mongodb")]
    MongoDb,
}

impl EngineKind {
    pub fn default_port(&self) -> u16 {
        match self {
            EngineKind::Postgres => 5432,
            EngineKind::MySql | EngineKind::MariaDb => 3306,
            EngineKind::Sqlite => 0,
            EngineKind::MongoDb => 27017,
        }
    }

    pub const ALL: [EngineKind; 5] = [
        EngineKind::Postgres,
        EngineKind::MySql,
        EngineKind::MariaDb,
        EngineKind::Sqlite,
        EngineKind::MongoDb,
    ];
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Postgres => write!(f, "postgresql"),
            EngineKind::MySql => write!(f, "mysql"),
            EngineKind::MariaDb => write!(f, "mariadb"),
            EngineKind::Sqlite => write!(f, "sqlite"),
            EngineKind::MongoDb => write!(f, "mongodb"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub id: String,
    pub name: String,
    pub engine: EngineKind,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    /// Password lives in the OS keychain, not with the persisted profile.
    /// This field is only used in transit from the configuration UI.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Database name for server engines, file path for SQLite.
    #[serde(default)]
    pub database: String,
    /// Default statement timeout in seconds, used when a request carries none.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub id: String,
    pub name: String,
    pub engine: EngineKind,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub status: ConnectionStatus,
    pub error: Option<String>,
}

impl ConnectionInfo {
    pub fn from_profile(profile: &ConnectionProfile, status: ConnectionStatus) -> Self {
        ConnectionInfo {
            id: profile.id.clone(),
            name: profile.name.clone(),
            engine: profile.engine,
            host: profile.host.clone(),
            port: profile.port,
            database: profile.database.clone(),
            status,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionResult {
    pub success: bool,
    pub message: String,
    pub latency_ms: Option<u64>,
}

/// User-defined grouping of connection profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub connection_ids: Vec<String>,
}
