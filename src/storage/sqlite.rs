use std::str::FromStr;

use futures_core::future::BoxFuture;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{query, query_scalar};

use super::{Storage, StorageError};

#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // A single connection keeps `sqlite::memory:` databases shared and
        // matches the sequential access of a cycle.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        query(
            "CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

impl Storage for SqliteStorage {
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StorageError>> {
        Box::pin(async move {
            let value = query_scalar::<_, String>("SELECT value FROM documents WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
            Ok(value)
        })
    }

    fn write<'a>(
        &'a self,
        key: &'a str,
        value: String,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            query(
                "INSERT INTO documents (key, value)
                VALUES ($1, $2)
                ON CONFLICT(key)
                DO UPDATE SET value = $2",
            )
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_replaces_document() {
        let storage = SqliteStorage::new("sqlite::memory:").await.unwrap();

        assert_eq!(storage.read("chat_ids").await.unwrap(), None);

        storage.write("chat_ids", r#"["7"]"#.to_string()).await.unwrap();
        storage
            .write("chat_ids", r#"["7","8"]"#.to_string())
            .await
            .unwrap();

        assert_eq!(
            storage.read("chat_ids").await.unwrap().as_deref(),
            Some(r#"["7","8"]"#)
        );
    }
}
