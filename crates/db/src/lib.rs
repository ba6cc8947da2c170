pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_storage, connect_with_settings, DbPool};
pub use repositories::{kv::KeyEntry, InMemoryKeyValueStore, RepositoryError, SqlKeyValueStore};
