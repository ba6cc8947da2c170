use thiserror::Error;

use quotebot_core::errors::HostError;

pub mod kv;
pub mod memory;

pub use kv::SqlKeyValueStore;
pub use memory::InMemoryKeyValueStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for HostError {
    fn from(error: RepositoryError) -> Self {
        HostError::Unavailable(error.to_string())
    }
}
