use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::RngCore;

use crate::progress::UserProgress;
use crate::vocabulary::{Catalog, Level, VocabEntry};

pub const LESSON_QUOTA: usize = 10;

/// Words per level in the daily digest.
pub const DIGEST_QUOTAS: [(Level, usize); 3] = [(Level::A1, 3), (Level::A2, 3), (Level::B1, 4)];

#[derive(Debug, PartialEq, Eq)]
pub enum Selection<'a> {
    /// The catalog has no words for the requested scope.
    Unavailable,
    /// Every catalog word in scope has been learned.
    Complete,
    Words(Vec<&'a VocabEntry>),
}

fn unlearned<'a>(catalog: &'a Catalog, progress: &UserProgress, level: Level) -> Vec<&'a VocabEntry> {
    let learned: HashSet<&str> = progress.learned(level).iter().map(String::as_str).collect();
    catalog
        .level(level)
        .iter()
        .filter(|entry| !learned.contains(entry.headword.as_str()))
        .collect()
}

fn sample<'a>(
    mut pool: Vec<&'a VocabEntry>,
    quota: usize,
    rng: &mut dyn RngCore,
) -> Vec<&'a VocabEntry> {
    pool.shuffle(rng);
    pool.truncate(quota);
    pool
}

/// Up to [`LESSON_QUOTA`] random words of `level` the user hasn't learned.
pub fn select_level<'a>(
    catalog: &'a Catalog,
    progress: &UserProgress,
    level: Level,
    rng: &mut dyn RngCore,
) -> Selection<'a> {
    if catalog.total(level) == 0 {
        return Selection::Unavailable;
    }

    let pool = unlearned(catalog, progress, level);
    if pool.is_empty() {
        return Selection::Complete;
    }

    Selection::Words(sample(pool, LESSON_QUOTA, rng))
}

/// Words across all levels, each level capped by its own quota.
pub fn select_digest<'a>(
    catalog: &'a Catalog,
    progress: &UserProgress,
    rng: &mut dyn RngCore,
) -> Selection<'a> {
    if Level::ALL.iter().all(|level| catalog.total(*level) == 0) {
        return Selection::Unavailable;
    }

    let mut words = Vec::new();
    for (level, quota) in DIGEST_QUOTAS {
        words.extend(sample(unlearned(catalog, progress, level), quota, rng));
    }

    if words.is_empty() {
        Selection::Complete
    } else {
        Selection::Words(words)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LearnedReport {
    /// Newly recorded headwords per level, catalog spelling.
    pub added: BTreeMap<Level, Vec<String>>,
    pub unknown: Vec<String>,
    pub total_learned: usize,
}

impl LearnedReport {
    pub fn added_count(&self) -> usize {
        self.added.values().map(Vec::len).sum()
    }
}

/// Records `words` as learned. Words already on record are skipped, so
/// replaying the same command never double counts. Tokens not in the catalog
/// are reported back and never stored.
pub fn record_learned(
    catalog: &Catalog,
    progress: &mut UserProgress,
    words: &[String],
    today: NaiveDate,
) -> LearnedReport {
    let mut report = LearnedReport::default();
    let mut matched_any = false;

    for word in words {
        let Some((level, headword)) = catalog.lookup(word) else {
            if !report.unknown.contains(word) {
                report.unknown.push(word.clone());
            }
            continue;
        };

        matched_any = true;
        if progress.add_learned(level, headword) {
            report
                .added
                .entry(level)
                .or_default()
                .push(headword.to_string());
        }
    }

    if matched_any {
        progress.last_study_date = Some(today);
    }
    report.total_learned = progress.total_learned();
    report
}
