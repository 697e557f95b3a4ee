use std::collections::HashSet;

use teloxide::types::ChatId;

use crate::storage::{read_json, write_json, Storage, StorageError};

const REGISTRY_KEY: &str = "chat_ids";

/// Every chat that ever sent `/start`. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRegistry {
    order: Vec<ChatId>,
    members: HashSet<ChatId>,
}

impl ChatRegistry {
    pub async fn load(storage: &dyn Storage) -> Result<Self, StorageError> {
        let stored: Vec<String> = read_json(storage, REGISTRY_KEY).await?.unwrap_or_default();

        let mut registry = Self::default();
        for id in stored {
            let Ok(id) = id.trim().parse() else {
                log::info!("Invalid chat id {id:?} in registry, skipping");
                continue;
            };
            registry.register(ChatId(id));
        }

        Ok(registry)
    }

    /// Writes the whole registry in one go.
    pub async fn save(&self, storage: &dyn Storage) -> Result<(), StorageError> {
        let ids: Vec<String> = self.order.iter().map(|id| id.0.to_string()).collect();
        write_json(storage, REGISTRY_KEY, &ids).await
    }

    /// Returns whether `id` was newly added.
    pub fn register(&mut self, id: ChatId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.order.push(id);
        true
    }

    pub fn merge(&mut self, ids: impl IntoIterator<Item = ChatId>) -> usize {
        ids.into_iter().filter(|id| self.register(*id)).count()
    }

    pub fn contains(&self, id: ChatId) -> bool {
        self.members.contains(&id)
    }

    pub fn ids(&self) -> &[ChatId] {
        &self.order
    }
}
