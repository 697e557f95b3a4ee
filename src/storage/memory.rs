use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use futures_core::future::BoxFuture;

use super::{Storage, StorageError};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn insert(&self, key: &str, value: &str) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl Storage for MemoryStorage {
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StorageError>> {
        let value = self.get(key);
        Box::pin(async move { Ok(value) })
    }

    fn write<'a>(
        &'a self,
        key: &'a str,
        value: String,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        self.insert(key, &value);
        Box::pin(async { Ok(()) })
    }
}
