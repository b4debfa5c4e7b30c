//! Graph persistence: the gateway trait and its SQLite store.

pub mod gateway;
pub mod store;

pub use gateway::{GraphGateway, PersistSummary};
pub use store::{SqliteGraphStore, StoredGraphStats};
