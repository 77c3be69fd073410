pub mod analytics;
pub mod backup;
pub mod connection;
pub mod history;
pub mod query;
pub mod schema;
pub mod settings;

pub use analytics::*;
pub use backup::*;
pub use connection::*;
pub use history::*;
pub use query::*;
pub use schema::*;
pub use settings::*;
