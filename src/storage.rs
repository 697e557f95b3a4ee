mod file;
#[cfg(test)]
mod memory;
mod sqlite;

use futures_core::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use file::FileStorage;
#[cfg(test)]
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        source: std::io::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("couldn't serialize {key}: {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Key-value store holding JSON documents. Each write replaces the whole
/// value of a key.
pub trait Storage: Send + Sync {
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StorageError>>;

    fn write<'a>(&'a self, key: &'a str, value: String)
        -> BoxFuture<'a, Result<(), StorageError>>;
}

/// Reads and decodes `key`. Corrupt documents are logged and reported as
/// absent, only backend failures are errors.
pub async fn read_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(content) = storage.read(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&content) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::warn!("Corrupt document {key}, falling back to default: {e}");
            Ok(None)
        }
    }
}

pub async fn write_json<T: Serialize>(
    storage: &dyn Storage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let content = serde_json::to_string_pretty(value).map_err(|source| StorageError::Serialize {
        key: key.to_string(),
        source,
    })?;
    storage.write(key, content).await
}
