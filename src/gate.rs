use chrono::{DateTime, Datelike, NaiveDate, Timelike, Weekday};
use chrono_tz::Tz;

use crate::progress::UserProgress;

/// Recurring messages limited to one per chat and calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    WeeklyGuide,
    Digest,
}

impl Notification {
    fn last_sent(self, progress: &mut UserProgress) -> &mut Option<NaiveDate> {
        match self {
            Notification::WeeklyGuide => &mut progress.last_welcome_date,
            Notification::Digest => &mut progress.last_digest_date,
        }
    }
}

pub fn should_send(kind: Notification, progress: &UserProgress, today: NaiveDate) -> bool {
    let last = match kind {
        Notification::WeeklyGuide => progress.last_welcome_date,
        Notification::Digest => progress.last_digest_date,
    };
    last != Some(today)
}

pub fn mark_sent(kind: Notification, progress: &mut UserProgress, today: NaiveDate) {
    *kind.last_sent(progress) = Some(today);
}

/// Local weekday and hour at which the weekly guide goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuideSchedule {
    pub weekday: Weekday,
    pub hour: u32,
}

impl GuideSchedule {
    pub fn is_due(&self, now: &DateTime<Tz>) -> bool {
        now.weekday() == self.weekday && now.hour() == self.hour
    }
}
