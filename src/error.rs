use thiserror::Error;

use moneystore_core::{AccountId, StorageError};
use moneystore_postgres::ConnectionError;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0} store is not available")]
    Unavailable(&'static str),
    #[error("migrated account {source_id} does not match its copy {target_id}: {reason}")]
    Verification {
        source_id: AccountId,
        target_id: AccountId,
        reason: String,
    },
}
