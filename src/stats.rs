use chrono::NaiveDate;

use crate::progress::UserProgress;
use crate::vocabulary::{Catalog, Level};

/// `floor(100 * learned / total)`, 0 for an empty catalog.
pub fn percentage(learned: usize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    learned * 100 / total
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelStats {
    pub level: Level,
    pub learned: usize,
    pub total: usize,
}

impl LevelStats {
    pub fn percentage(&self) -> usize {
        percentage(self.learned, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub levels: Vec<LevelStats>,
    pub last_study_date: Option<NaiveDate>,
}

impl Stats {
    pub fn learned(&self) -> usize {
        self.levels.iter().map(|l| l.learned).sum()
    }

    pub fn total(&self) -> usize {
        self.levels.iter().map(|l| l.total).sum()
    }

    pub fn remaining(&self) -> usize {
        self.total().saturating_sub(self.learned())
    }

    pub fn percentage(&self) -> usize {
        percentage(self.learned(), self.total())
    }
}

/// Only learned words still present in the catalog count, so a shrinking
/// word list can't push a level above 100%.
pub fn compute(catalog: &Catalog, progress: &UserProgress) -> Stats {
    let levels = Level::ALL
        .into_iter()
        .map(|level| LevelStats {
            level,
            learned: progress
                .learned(level)
                .iter()
                .filter(|w| catalog.contains(level, w.as_str()))
                .count(),
            total: catalog.total(level),
        })
        .collect();

    Stats {
        levels,
        last_study_date: progress.last_study_date,
    }
}
