use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;

use crate::connectors::{create_connector, Connector};
use crate::error::CoreResult;
use crate::models::{ConnectionInfo, ConnectionProfile, ConnectionStatus};
use crate::storage::AppStorage;

/// An open, usable session bound to one connection profile.
pub struct LiveConnection {
    pub profile_id: String,
    pub connector: Arc<dyn Connector>,
    pub connected_at: DateTime<Utc>,
}

/// Single source of truth for which profiles are connected and through what
/// connector. Owns every `LiveConnection`; other components borrow the
/// connector per call and never hold it across operations.
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, Arc<LiveConnection>>>,
    /// Serializes connect/disconnect per profile id so concurrent connect
    /// attempts cannot both install a LiveConnection.
    connect_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    /// Per-connection operation locks for drivers that are not safe for
    /// concurrent use. Never a global lock.
    operation_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry {
            connections: Mutex::new(HashMap::new()),
            connect_locks: Mutex::new(HashMap::new()),
            operation_locks: Mutex::new(HashMap::new()),
        }
    }

    fn connect_lock(&self, connection_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.connect_locks.lock().unwrap();
        locks
            .entry(connection_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Lock callers may take around driver access when the underlying engine
    /// client cannot interleave operations.
    pub fn operation_lock(&self, connection_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.operation_locks.lock().unwrap();
        locks
            .entry(connection_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Connect a profile. A no-op success when already connected; otherwise
    /// instantiates the engine's connector and installs the LiveConnection.
    pub async fn connect(&self, profile: &ConnectionProfile) -> CoreResult<()> {
        let lock = self.connect_lock(&profile.id);
        let _guard = lock.lock().await;

        if self.is_connected(&profile.id) {
            return Ok(());
        }

        let connector: Arc<dyn Connector> = Arc::from(create_connector(profile.engine));
        connector.connect(profile).await?;

        let live = Arc::new(LiveConnection {
            profile_id: profile.id.clone(),
            connector,
            connected_at: Utc::now(),
        });
        self.connections
            .lock()
            .unwrap()
            .insert(profile.id.clone(), live);
        Ok(())
    }

    /// Tear down the LiveConnection for an id. In-flight holders of the
    /// connector finish on their own clone; new callers see it gone.
    pub async fn disconnect(&self, connection_id: &str) -> bool {
        let lock = self.connect_lock(connection_id);
        let _guard = lock.lock().await;

        let removed = self.connections.lock().unwrap().remove(connection_id);
        self.operation_locks.lock().unwrap().remove(connection_id);
        match removed {
            Some(live) => {
                if let Err(e) = live.connector.disconnect().await {
                    log::warn!("error closing connection {}: {}", connection_id, e);
                }
                true
            }
            None => false,
        }
    }

    /// Used at shutdown.
    pub async fn disconnect_all(&self) {
        let ids: Vec<String> = self
            .connections
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        for id in ids {
            self.disconnect(&id).await;
        }
    }

    /// Live connector for an id, or None. Callers must reconnect rather than
    /// assume availability.
    pub fn get_connector(&self, connection_id: &str) -> Option<Arc<dyn Connector>> {
        self.connections
            .lock()
            .unwrap()
            .get(connection_id)
            .map(|live| live.connector.clone())
    }

    pub fn get_all_active_connections(&self) -> Vec<String> {
        self.connections.lock().unwrap().keys().cloned().collect()
    }

    pub fn is_connected(&self, connection_id: &str) -> bool {
        self.connections.lock().unwrap().contains_key(connection_id)
    }

    pub fn get_connection_status(&self, profile: &ConnectionProfile) -> ConnectionInfo {
        let status = if self.is_connected(&profile.id) {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
        ConnectionInfo::from_profile(profile, status)
    }

    /// Snapshot the set of active ids to disk for the next launch.
    pub fn save_session(&self, storage: &AppStorage) -> CoreResult<()> {
        let active = self.get_all_active_connections();
        storage.save_session(&active)
    }

    /// Reconnect each profile from the previous session, best-effort.
    /// Failures are logged and surfaced as disconnected, never fatal.
    pub async fn restore_session(&self, storage: &AppStorage, profiles: &[ConnectionProfile]) {
        let snapshot = storage.load_session();
        for id in snapshot {
            let Some(profile) = profiles.iter().find(|p| p.id == id) else {
                log::warn!("session snapshot references unknown profile {}", id);
                continue;
            };
            if let Err(e) = self.connect(profile).await {
                log::warn!("failed to restore connection {}: {}", profile.name, e);
            }
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
