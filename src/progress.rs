use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use teloxide::types::ChatId;

use crate::storage::{read_json, write_json, Storage, StorageError};
use crate::vocabulary::Level;

/// Study state of one chat. Created with defaults on first contact and never
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    #[serde(with = "chat_id_text")]
    pub chat_id: ChatId,
    /// Headwords per level in the order they were learned.
    #[serde(default)]
    pub learned_words: BTreeMap<Level, Vec<String>>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_study_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_update_id: i64,
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_welcome_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_digest_date: Option<NaiveDate>,
}

impl UserProgress {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            learned_words: Level::ALL.into_iter().map(|l| (l, Vec::new())).collect(),
            last_study_date: None,
            last_update_id: 0,
            last_welcome_date: None,
            last_digest_date: None,
        }
    }

    pub fn learned(&self, level: Level) -> &[String] {
        self.learned_words
            .get(&level)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Appends `headword` unless the level already holds it. Returns whether
    /// it was added.
    pub fn add_learned(&mut self, level: Level, headword: &str) -> bool {
        let words = self.learned_words.entry(level).or_default();
        if words.iter().any(|w| w == headword) {
            return false;
        }
        words.push(headword.to_string());
        true
    }

    pub fn total_learned(&self) -> usize {
        self.learned_words.values().map(Vec::len).sum()
    }

    /// Moves the update cursor forward, never backwards.
    pub fn advance_offset(&mut self, update_id: i64) {
        self.last_update_id = self.last_update_id.max(update_id);
    }
}

mod chat_id_text {
    use serde::de::Error;

    use super::*;

    pub fn serialize<S: Serializer>(id: &ChatId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.0.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ChatId, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.trim().parse().map(ChatId).map_err(D::Error::custom)
    }
}

// Anything that isn't an ISO date (e.g. a "never" placeholder) reads as None.
fn lenient_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text.and_then(|t| NaiveDate::parse_from_str(t.trim(), "%Y-%m-%d").ok()))
}

pub struct ProgressStore<'a> {
    storage: &'a dyn Storage,
}

impl<'a> ProgressStore<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    fn key(chat_id: ChatId) -> String {
        format!("user_progress/{}_progress", chat_id.0)
    }

    /// Missing or corrupt records load as a fresh default. Only a failing
    /// backend is reported, so callers never overwrite real state with it.
    pub async fn load(&self, chat_id: ChatId) -> Result<UserProgress, StorageError> {
        let stored: Option<UserProgress> = read_json(self.storage, &Self::key(chat_id)).await?;

        Ok(match stored {
            Some(mut progress) => {
                progress.chat_id = chat_id;
                progress
            }
            None => UserProgress::new(chat_id),
        })
    }

    pub async fn save(&self, progress: &UserProgress) -> Result<(), StorageError> {
        write_json(self.storage, &Self::key(progress.chat_id), progress).await
    }
}
