//! Core runtime of the Quay database client: connection lifecycle, ad-hoc
//! query execution, schema introspection caching, operational metrics, and
//! the self-pacing maintenance/backup scheduler. The UI talks to this crate
//! through the `commands` boundary and listens on the `events` hub; no other
//! layer holds engine connections.

pub mod analytics;
pub mod backup;
pub mod cache;
pub mod commands;
pub mod connectors;
pub mod credentials;
pub mod error;
pub mod events;
pub mod executor;
pub mod explorer;
pub mod history;
pub mod models;
pub mod profiles;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod storage;

pub use error::{CoreError, CoreResult};
pub use events::{EventHub, RuntimeEvent};
pub use runtime::CoreRuntime;

/// Initialize logging for embedders that have no logger of their own.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
