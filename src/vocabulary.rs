use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CEFR tier partitioning the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    A1,
    A2,
    B1,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::A1, Level::A2, Level::B1];

    fn file_name(self) -> &'static str {
        match self {
            Level::A1 => "a1_words.json",
            Level::A2 => "a2_words.json",
            Level::B1 => "b1_words.json",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::A1 => "A1",
            Level::A2 => "A2",
            Level::B1 => "B1",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabEntry {
    pub headword: String,
    pub translation: String,
    pub level: Level,
    pub examples: Vec<String>,
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
}

impl VocabEntry {
    pub fn new(headword: &str, translation: &str, level: Level) -> Self {
        Self {
            headword: headword.to_string(),
            translation: translation.to_string(),
            level,
            examples: Vec::new(),
            synonyms: Vec::new(),
            antonyms: Vec::new(),
        }
    }
}

// On-disk shape of a catalog entry. The `level` field of the file is ignored,
// the file an entry comes from decides its level.
#[derive(Deserialize)]
struct RawEntry {
    german: String,
    english: String,
    #[serde(default)]
    examples: Vec<String>,
    #[serde(default)]
    synonyms: Vec<String>,
    #[serde(default)]
    antonyms: Vec<String>,
}

impl RawEntry {
    fn into_entry(self, level: Level) -> VocabEntry {
        VocabEntry {
            examples: self.examples,
            synonyms: self.synonyms,
            antonyms: self.antonyms,
            ..VocabEntry::new(self.german.trim(), self.english.trim(), level)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WiseSentence {
    pub german: String,
    pub english: String,
}

/// Read-only word lists per level, plus the lookup tables used when
/// recording learned words.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    levels: BTreeMap<Level, Vec<VocabEntry>>,
    members: HashMap<Level, HashSet<String>>,
    sentences: Vec<WiseSentence>,
    index: HashMap<String, Level>,
    folded: HashMap<String, (Level, String)>,
}

impl Catalog {
    /// Loads all levels from `dir`. Missing or malformed files yield empty
    /// lists, so one broken file never stops a cycle.
    pub fn load(dir: &Path) -> Self {
        let levels = Level::ALL.into_iter().map(|level| {
            let raw: Vec<RawEntry> = read_list(&dir.join(level.file_name()));
            let entries = raw.into_iter().map(|e| e.into_entry(level)).collect();
            (level, entries)
        });
        let levels: Vec<_> = levels.collect();
        let sentences = read_list(&dir.join("sentences.json"));

        let catalog = Self::from_entries(levels, sentences);
        log::info!(
            "Loaded vocabulary from {}: {}",
            dir.display(),
            Level::ALL
                .iter()
                .map(|l| format!("{l}={}", catalog.total(*l)))
                .collect::<Vec<_>>()
                .join(", ")
        );
        catalog
    }

    pub fn from_entries(
        levels: impl IntoIterator<Item = (Level, Vec<VocabEntry>)>,
        sentences: Vec<WiseSentence>,
    ) -> Self {
        let mut catalog = Self {
            sentences,
            ..Default::default()
        };

        for (level, entries) in levels {
            catalog.levels.entry(level).or_default().extend(entries);
        }

        // Ascending level order, so a headword listed in several levels
        // resolves to the highest one.
        for (level, entries) in &catalog.levels {
            let members = catalog.members.entry(*level).or_default();
            for entry in entries {
                members.insert(entry.headword.clone());
                catalog.index.insert(entry.headword.clone(), *level);
                catalog
                    .folded
                    .insert(entry.headword.to_lowercase(), (*level, entry.headword.clone()));
            }
        }

        catalog
    }

    pub fn level(&self, level: Level) -> &[VocabEntry] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn total(&self, level: Level) -> usize {
        self.level(level).len()
    }

    pub fn contains(&self, level: Level, headword: &str) -> bool {
        self.members
            .get(&level)
            .is_some_and(|members| members.contains(headword))
    }

    pub fn sentences(&self) -> &[WiseSentence] {
        &self.sentences
    }

    /// Resolves a user supplied token to its level and the catalog's spelling
    /// of the headword. Exact matches win over case-insensitive ones.
    pub fn lookup<'a>(&'a self, token: &'a str) -> Option<(Level, &'a str)> {
        if let Some(level) = self.index.get(token) {
            return Some((*level, token));
        }
        self.folded
            .get(&token.to_lowercase())
            .map(|(level, headword)| (*level, headword.as_str()))
    }
}

fn read_list<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::warn!("Vocabulary file {} not found", path.display());
            return Vec::new();
        }
        Err(e) => {
            log::warn!("Couldn't read vocabulary file {}: {e}", path.display());
            return Vec::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(list) => list,
        Err(e) => {
            log::warn!("Invalid vocabulary file {}: {e}", path.display());
            Vec::new()
        }
    }
}
