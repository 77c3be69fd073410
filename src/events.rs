use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use tokio::sync::broadcast::{self, Receiver, Sender};

use crate::models::{AnalyticsSnapshot, BackupStatus};

/// Fire-and-forget notification pushed from the runtime to the UI boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum RuntimeEvent {
    #[serde(rename = "analytics:update")]
    AnalyticsUpdate {
        connection_id: String,
        data: Box<AnalyticsSnapshot>,
    },
    #[serde(rename = "analytics:error")]
    AnalyticsError {
        connection_id: String,
        error: String,
    },
    #[serde(rename = "backup:update")]
    BackupUpdate {
        backup_id: String,
        connection_id: String,
        status: BackupStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl RuntimeEvent {
    pub fn connection_id(&self) -> &str {
        match self {
            RuntimeEvent::AnalyticsUpdate { connection_id, .. } => connection_id,
            RuntimeEvent::AnalyticsError { connection_id, .. } => connection_id,
            RuntimeEvent::BackupUpdate { connection_id, .. } => connection_id,
        }
    }
}

/// Per-connection publish/subscribe hub. The runtime publishes snapshots and
/// backup transitions; zero or more subscribers receive them. Publishing to
/// a channel nobody listens on is a no-op.
pub struct EventHub {
    capacity: usize,
    channels: RwLock<HashMap<String, Sender<RuntimeEvent>>>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        EventHub {
            capacity,
            channels: RwLock::new(HashMap::new()),
        }
    }

    fn ensure_channel(&self, connection_id: &str) -> Sender<RuntimeEvent> {
        let mut channels = self.channels.write().unwrap();
        channels
            .entry(connection_id.to_string())
            .or_insert_with(|| {
                let (sender, _receiver) = broadcast::channel(self.capacity);
                sender
            })
            .clone()
    }

    pub fn publish(&self, event: RuntimeEvent) {
        let sender = {
            let channels = self.channels.read().unwrap();
            channels.get(event.connection_id()).cloned()
        };
        if let Some(sender) = sender {
            // Send fails only when no receiver is currently subscribed.
            let _ = sender.send(event);
        }
    }

    pub fn subscribe(&self, connection_id: &str) -> Receiver<RuntimeEvent> {
        self.ensure_channel(connection_id).subscribe()
    }

    /// Drop channels whose subscribers have all gone away.
    pub fn prune(&self) {
        let mut channels = self.channels.write().unwrap();
        channels.retain(|_, sender| sender.receiver_count() > 0);
    }

    pub fn subscriber_count(&self, connection_id: &str) -> usize {
        self.channels
            .read()
            .unwrap()
            .get(connection_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for EventHub {
    fn default() -> Self {
        EventHub::new(256)
    }
}
