use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use rand::seq::SliceRandom;
use rand::RngCore;
use teloxide::types::ChatId;
use thiserror::Error;

use crate::chat_registry::ChatRegistry;
use crate::commands::{self, Command, LevelArg};
use crate::gate::{self, GuideSchedule, Notification};
use crate::messages::{self, MarkdownString};
use crate::progress::{ProgressStore, UserProgress};
use crate::selector::{self, Selection};
use crate::stats;
use crate::storage::{Storage, StorageError};
use crate::transport::{Transport, TransportError};
use crate::vocabulary::{Catalog, Level};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Username of the bot, for `/command@bot` addressing.
    pub bot_name: String,
    pub guide: GuideSchedule,
    /// Pause between consecutive broadcast sends.
    pub send_delay: Duration,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub chats_processed: usize,
    pub chats_failed: usize,
    pub updates_handled: usize,
    pub broadcasts_sent: usize,
    pub new_users: usize,
}

/// Runs one polling cycle against a snapshot of "now". Chats are handled one
/// after another; a failure for one chat is logged and never stops the rest.
pub struct Dispatcher<'a> {
    transport: &'a dyn Transport,
    storage: &'a dyn Storage,
    catalog: &'a Catalog,
    settings: &'a Settings,
    rng: &'a mut dyn RngCore,
    now: DateTime<Tz>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        storage: &'a dyn Storage,
        catalog: &'a Catalog,
        settings: &'a Settings,
        rng: &'a mut dyn RngCore,
        now: DateTime<Tz>,
    ) -> Self {
        Self {
            transport,
            storage,
            catalog,
            settings,
            rng,
            now,
        }
    }

    fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    /// Weekly guide (when due), commands of every registered chat, then
    /// registration of new users.
    pub async fn run_cycle(&mut self) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let registry = match ChatRegistry::load(self.storage).await {
            Ok(registry) => registry,
            Err(e) => {
                log::error!("Couldn't load chat registry, skipping cycle: {e}");
                return summary;
            }
        };

        if self.settings.guide.is_due(&self.now) {
            summary.broadcasts_sent = self.broadcast(Notification::WeeklyGuide, &registry).await;
        }

        for chat_id in registry.ids() {
            match self.process_chat(*chat_id).await {
                Ok(handled) => {
                    summary.chats_processed += 1;
                    summary.updates_handled += handled;
                }
                Err(e) => {
                    log::warn!("Skipping chat {chat_id} this cycle: {e}");
                    summary.chats_failed += 1;
                }
            }
        }

        summary.new_users = self.register_new_users(registry).await;

        log::info!("Cycle finished: {summary:?}");
        summary
    }

    /// Sends the daily multi-level digest to every registered chat.
    pub async fn run_digest(&mut self) -> usize {
        match ChatRegistry::load(self.storage).await {
            Ok(registry) => self.broadcast(Notification::Digest, &registry).await,
            Err(e) => {
                log::error!("Couldn't load chat registry, skipping digest: {e}");
                0
            }
        }
    }

    /// Handles all pending updates of one chat and commits the cursor once,
    /// after the whole batch. Returns the number of updates handled.
    pub async fn process_chat(&mut self, chat_id: ChatId) -> Result<usize, ChatError> {
        let store = ProgressStore::new(self.storage);
        let mut progress = store.load(chat_id).await?;

        let updates = self
            .transport
            .fetch_updates(Some(progress.last_update_id + 1))
            .await?;

        let mut batch: Vec<_> = updates
            .into_iter()
            .filter(|u| u.chat_id == chat_id && u.update_id > progress.last_update_id)
            .collect();
        if batch.is_empty() {
            return Ok(0);
        }
        batch.sort_by_key(|u| u.update_id);

        let mut max_seen = progress.last_update_id;
        for update in &batch {
            match commands::parse(&update.text, &self.settings.bot_name) {
                Some(command) => {
                    log::info!("{chat_id}: {command:?}");
                    self.handle(&mut progress, command).await;
                }
                None => log::debug!("{chat_id}: ignoring update {}", update.update_id),
            }
            max_seen = max_seen.max(update.update_id);
        }

        progress.advance_offset(max_seen);
        store.save(&progress).await?;

        Ok(batch.len())
    }

    async fn handle(&mut self, progress: &mut UserProgress, command: Command) {
        let chat_id = progress.chat_id;
        let catalog = self.catalog;

        let replies = match command {
            // Registration happens on the unscoped stream, see `register_new_users`.
            Command::Start => return,
            Command::Help => vec![messages::help()],
            Command::Learn { level } => match level {
                LevelArg::Missing => vec![messages::learn_usage()],
                LevelArg::Unsupported(token) => vec![messages::unsupported_level(&token)],
                LevelArg::Known(level) => self.lesson(progress, level),
            },
            Command::Learned { words } => {
                if words.is_empty() {
                    vec![messages::learned_usage()]
                } else {
                    let report = selector::record_learned(catalog, progress, &words, self.today());
                    log::info!(
                        "{chat_id}: {} new words, {} unknown",
                        report.added_count(),
                        report.unknown.len()
                    );
                    match ProgressStore::new(self.storage).save(progress).await {
                        Ok(()) => vec![messages::learned_report(&report)],
                        Err(e) => {
                            log::error!("Couldn't save progress of {chat_id}: {e}");
                            vec![messages::internal_error()]
                        }
                    }
                }
            }
            Command::Stats => vec![messages::stats(&stats::compute(catalog, progress))],
        };

        self.reply(chat_id, &replies).await;
    }

    fn lesson(&mut self, progress: &UserProgress, level: Level) -> Vec<MarkdownString> {
        let catalog = self.catalog;
        match selector::select_level(catalog, progress, level, &mut *self.rng) {
            Selection::Unavailable => vec![messages::level_unavailable(level)],
            Selection::Complete => vec![messages::level_complete(level)],
            Selection::Words(words) => {
                let sentence = catalog.sentences().choose(&mut *self.rng);
                messages::lesson(level, &words, sentence)
            }
        }
    }

    fn digest(&mut self, progress: &UserProgress) -> Option<Vec<MarkdownString>> {
        let catalog = self.catalog;
        match selector::select_digest(catalog, progress, &mut *self.rng) {
            Selection::Unavailable => None,
            Selection::Complete => Some(vec![messages::digest_complete()]),
            Selection::Words(words) => {
                let sentence = catalog.sentences().choose(&mut *self.rng);
                Some(messages::digest(&words, sentence))
            }
        }
    }

    /// Returns false if any part could not be delivered.
    async fn reply(&self, chat_id: ChatId, replies: &[MarkdownString]) -> bool {
        for reply in replies {
            if let Err(e) = self.transport.send(chat_id, reply).await {
                log::warn!("Couldn't send message to {chat_id}: {e}");
                return false;
            }
        }
        true
    }

    /// Sends `kind` to every chat that hasn't received it today. A chat is
    /// only marked after a successful send, so failures are retried by the
    /// next cycle.
    async fn broadcast(&mut self, kind: Notification, registry: &ChatRegistry) -> usize {
        let store = ProgressStore::new(self.storage);
        let today = self.today();
        let mut sent = 0;

        for chat_id in registry.ids() {
            let mut progress = match store.load(*chat_id).await {
                Ok(progress) => progress,
                Err(e) => {
                    log::warn!("Couldn't load progress of {chat_id}: {e}");
                    continue;
                }
            };

            if !gate::should_send(kind, &progress, today) {
                log::debug!("{chat_id}: {kind:?} already sent today");
                continue;
            }

            let replies = match kind {
                Notification::WeeklyGuide => vec![messages::weekly_guide()],
                Notification::Digest => match self.digest(&progress) {
                    Some(replies) => replies,
                    None => {
                        log::warn!("No vocabulary loaded, not sending digests");
                        return sent;
                    }
                },
            };

            if !self.reply(*chat_id, &replies).await {
                continue;
            }

            gate::mark_sent(kind, &mut progress, today);
            if let Err(e) = store.save(&progress).await {
                log::error!("Couldn't save progress of {chat_id}: {e}");
            }
            sent += 1;

            tokio::time::sleep(self.settings.send_delay).await;
        }

        log::info!("{kind:?} sent to {sent} chats");
        sent
    }

    /// Scans all pending updates for `/start` from unknown chats, welcomes
    /// them and persists the registry once. Per-chat cursors are untouched.
    async fn register_new_users(&mut self, mut registry: ChatRegistry) -> usize {
        let updates = match self.transport.fetch_updates(None).await {
            Ok(updates) => updates,
            Err(e) => {
                log::warn!("Couldn't check for new users: {e}");
                return 0;
            }
        };

        let mut fresh = ChatRegistry::default();
        for update in updates {
            let is_start =
                commands::parse(&update.text, &self.settings.bot_name) == Some(Command::Start);
            if is_start && !registry.contains(update.chat_id) {
                fresh.register(update.chat_id);
            }
        }

        if fresh.ids().is_empty() {
            return 0;
        }

        let store = ProgressStore::new(self.storage);
        let today = self.today();
        for chat_id in fresh.ids() {
            if !self.reply(*chat_id, &[messages::welcome()]).await {
                continue;
            }
            // The welcome already explains everything, no guide on top of it today.
            let marked = match store.load(*chat_id).await {
                Ok(mut progress) => {
                    gate::mark_sent(Notification::WeeklyGuide, &mut progress, today);
                    store.save(&progress).await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = marked {
                log::warn!("Couldn't record welcome for {chat_id}: {e}");
            }
        }

        let added = registry.merge(fresh.ids().iter().copied());
        if let Err(e) = registry.save(self.storage).await {
            log::error!("Couldn't save chat registry: {e}");
            return 0;
        }

        log::info!("Added {added} new users");
        added
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Weekday;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::storage::MemoryStorage;
    use crate::transport::fake::FakeTransport;
    use crate::vocabulary::{VocabEntry, WiseSentence};

    struct Harness {
        transport: FakeTransport,
        storage: MemoryStorage,
        catalog: Catalog,
        settings: Settings,
        rng: ChaCha8Rng,
    }

    impl Harness {
        fn new(chats: &[i64]) -> Self {
            let entries = |level, words: &[&str]| {
                (
                    level,
                    words
                        .iter()
                        .map(|w| VocabEntry::new(w, &format!("{w} (en)"), level))
                        .collect::<Vec<_>>(),
                )
            };
            let catalog = Catalog::from_entries(
                [
                    entries(Level::A1, &["Hallo", "Tschüss", "Danke"]),
                    entries(Level::B1, &["Ursache", "Wirkung"]),
                ],
                vec![WiseSentence {
                    german: "Übung macht den Meister.".to_string(),
                    english: "Practice makes perfect.".to_string(),
                }],
            );

            let storage = MemoryStorage::default();
            let ids: Vec<String> = chats.iter().map(|c| c.to_string()).collect();
            storage.insert("chat_ids", &serde_json::to_string(&ids).unwrap());

            Self {
                transport: FakeTransport::default(),
                storage,
                catalog,
                settings: Settings {
                    bot_name: "wortschatz_bot".to_string(),
                    guide: GuideSchedule {
                        weekday: Weekday::Mon,
                        hour: 8,
                    },
                    send_delay: Duration::ZERO,
                },
                rng: ChaCha8Rng::seed_from_u64(11),
            }
        }

        async fn cycle_at(&mut self, now: DateTime<Tz>) -> CycleSummary {
            Dispatcher::new(
                &self.transport,
                &self.storage,
                &self.catalog,
                &self.settings,
                &mut self.rng,
                now,
            )
            .run_cycle()
            .await
        }

        async fn cycle(&mut self) -> CycleSummary {
            self.cycle_at(tuesday()).await
        }

        async fn digest_at(&mut self, now: DateTime<Tz>) -> usize {
            Dispatcher::new(
                &self.transport,
                &self.storage,
                &self.catalog,
                &self.settings,
                &mut self.rng,
                now,
            )
            .run_digest()
            .await
        }

        async fn progress(&self, chat: i64) -> UserProgress {
            ProgressStore::new(&self.storage).load(ChatId(chat)).await.unwrap()
        }

        async fn save(&self, progress: &UserProgress) {
            ProgressStore::new(&self.storage).save(progress).await.unwrap()
        }

        async fn registry(&self) -> ChatRegistry {
            ChatRegistry::load(&self.storage).await.unwrap()
        }
    }

    fn tuesday() -> DateTime<Tz> {
        chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2024, 6, 4, 10, 0, 0)
            .unwrap()
    }

    fn monday_morning() -> DateTime<Tz> {
        chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2024, 6, 3, 8, 15, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn lessons_skip_learned_words_end_to_end() {
        let mut h = Harness::new(&[100]);
        let mut progress = UserProgress::new(ChatId(100));
        progress.add_learned(Level::A1, "Hallo");
        h.save(&progress).await;

        h.transport.push(1, 100, "/learn a1");
        h.cycle().await;

        let sent = h.transport.sent_to(100);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Tschüss"));
        assert!(sent[0].contains("Danke"));
        assert!(!sent[0].contains("Hallo"));
        assert!(sent[0].contains("Übung macht den Meister"));

        h.transport.clear_sent();
        h.transport.push(2, 100, "/learned Tschüss");
        h.transport.push(3, 100, "/learn a1");
        h.cycle().await;

        let sent = h.transport.sent_to(100);
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("*1 new word*"));
        assert!(sent[1].contains("Danke"));
        assert!(!sent[1].contains("Tschüss"));
        assert!(!sent[1].contains("Hallo"));
        assert_eq!(h.progress(100).await.learned(Level::A1), ["Hallo", "Tschüss"]);
    }

    #[tokio::test]
    async fn completed_level_gets_completion_message() {
        let mut h = Harness::new(&[100]);
        h.transport.push(1, 100, "/learned Ursache Wirkung");
        h.transport.push(2, 100, "/learn B1");
        h.transport.push(3, 100, "/learn a2");
        h.cycle().await;

        let sent = h.transport.sent_to(100);
        assert_eq!(sent.len(), 3);
        assert!(sent[1].contains("B1 complete"));
        assert!(sent[2].contains("No words are available for A2"));
    }

    #[tokio::test]
    async fn redelivered_batch_does_not_double_count() {
        let mut h = Harness::new(&[100]);
        h.transport.push(1, 100, "/learned Hallo Danke");
        h.cycle().await;
        let after_first = h.progress(100).await;

        // Crash before the cursor was committed: the same update comes back.
        let mut rewound = after_first.clone();
        rewound.last_update_id = 0;
        h.save(&rewound).await;
        h.transport.clear_sent();
        h.cycle().await;

        let after_second = h.progress(100).await;
        assert_eq!(after_second, after_first);
        assert_eq!(after_second.learned(Level::A1), ["Hallo", "Danke"]);
        assert!(h.transport.sent_to(100)[0].contains("*0 new words*"));
    }

    #[tokio::test]
    async fn cursor_tracks_highest_update_of_each_chat() {
        let mut h = Harness::new(&[100, 200]);
        h.transport.push(5, 100, "Guten Tag!");
        h.transport.push(6, 200, "/stats");
        h.transport.push(7, 100, "/learned Hallo");

        let summary = h.cycle().await;
        assert_eq!(summary.chats_processed, 2);
        assert_eq!(summary.updates_handled, 3);
        assert_eq!(h.progress(100).await.last_update_id, 7);
        assert_eq!(h.progress(200).await.last_update_id, 6);
        // free text gets no answer
        assert_eq!(h.transport.sent_to(100).len(), 1);

        h.transport.clear_sent();
        let summary = h.cycle().await;
        assert_eq!(summary.updates_handled, 0);
        assert!(h.transport.sent().is_empty());
        assert_eq!(h.progress(100).await.last_update_id, 7);
    }

    #[tokio::test]
    async fn failing_fetch_skips_only_that_chat() {
        let mut h = Harness::new(&[100, 200]);
        let mut ahead = UserProgress::new(ChatId(200));
        ahead.last_update_id = 10;
        h.save(&ahead).await;
        h.transport.push(2, 100, "/stats");
        h.transport.push(11, 200, "/stats");
        h.transport.fail_fetch_at(1);

        let summary = h.cycle().await;

        assert_eq!(summary.chats_failed, 1);
        assert_eq!(summary.chats_processed, 1);
        assert_eq!(h.transport.sent_to(200).len(), 1);
        assert!(h.transport.sent_to(100).is_empty());
        assert_eq!(h.progress(100).await.last_update_id, 0);
        assert_eq!(h.progress(200).await.last_update_id, 11);

        h.transport.heal();
        h.cycle().await;
        assert_eq!(h.transport.sent_to(100).len(), 1);
        assert_eq!(h.progress(100).await.last_update_id, 2);
    }

    #[tokio::test]
    async fn hash_token_is_reported_unknown() {
        let mut h = Harness::new(&[100]);
        h.transport.push(1, 100, "/learned Danke #x");
        h.cycle().await;

        let sent = h.transport.sent_to(100);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("*1 new word*"));
        assert!(sent[0].contains("Unknown words:* \\#x"));
        assert_eq!(h.progress(100).await.learned(Level::A1), ["Danke"]);
    }

    #[tokio::test]
    async fn bad_input_gets_usage_replies() {
        let mut h = Harness::new(&[100]);
        h.transport.push(1, 100, "/learn");
        h.transport.push(2, 100, "/learn c1");
        h.transport.push(3, 100, "/learned");
        h.transport.push(4, 100, "/learned Flugzeug");
        h.transport.push(5, 100, "/help");
        h.cycle().await;

        let sent = h.transport.sent_to(100);
        assert_eq!(sent.len(), 5);
        assert!(sent[0].contains("/learn a2"));
        assert!(sent[1].contains("Unknown level „c1”"));
        assert!(sent[2].contains("/learned Hallo Tschüss Danke"));
        assert!(sent[3].contains("Flugzeug"));
        assert!(sent[4].contains("/stats"));
        assert_eq!(h.progress(100).await.total_learned(), 0);
    }

    #[tokio::test]
    async fn stats_reflect_recorded_words() {
        let mut h = Harness::new(&[100]);
        h.transport.push(1, 100, "/learned Hallo");
        h.transport.push(2, 100, "/stats");
        h.cycle().await;

        let sent = h.transport.sent_to(100);
        assert!(sent[1].contains("A1: 1/3 \\(33%\\)"));
        assert!(sent[1].contains("B1: 0/2 \\(0%\\)"));
        assert!(sent[1].contains("A2: 0/0 \\(0%\\)"));
        assert!(sent[1].contains("2024\\-06\\-04"));
    }

    #[tokio::test]
    async fn start_registers_and_welcomes_once() {
        let mut h = Harness::new(&[100]);
        h.transport.push(1, 300, "/start");
        h.transport.push(2, 300, "/start");
        h.transport.push(3, 400, "Hallo?");
        h.transport.push(4, 100, "/start");

        let summary = h.cycle().await;

        assert_eq!(summary.new_users, 1);
        assert_eq!(h.registry().await.ids(), &[ChatId(100), ChatId(300)]);
        assert_eq!(h.transport.sent_to(300).len(), 1);
        assert!(h.transport.sent_to(300)[0].contains("Welcome"));
        assert!(h.transport.sent_to(100).is_empty());
        assert!(h.transport.sent_to(400).is_empty());

        h.transport.clear_sent();
        let summary = h.cycle().await;
        assert_eq!(summary.new_users, 0);
        // 300 is processed as a regular chat now, its /start is ignored
        assert!(h.transport.sent().is_empty());
        assert_eq!(h.progress(300).await.last_update_id, 2);
    }

    #[tokio::test]
    async fn weekly_guide_goes_out_once_per_day() {
        let mut h = Harness::new(&[100, 200]);
        h.transport.fail_sends_to(200);

        let summary = h.cycle_at(monday_morning()).await;
        assert_eq!(summary.broadcasts_sent, 1);
        assert_eq!(h.transport.sent_to(100).len(), 1);
        assert!(h.transport.sent_to(100)[0].contains("Weekly German Study Guide"));

        h.transport.heal();
        let summary = h.cycle_at(monday_morning()).await;
        assert_eq!(summary.broadcasts_sent, 1);
        assert_eq!(h.transport.sent_to(100).len(), 1);
        assert_eq!(h.transport.sent_to(200).len(), 1);

        let summary = h.cycle_at(monday_morning()).await;
        assert_eq!(summary.broadcasts_sent, 0);
        assert_eq!(
            h.progress(200).await.last_welcome_date,
            Some(monday_morning().date_naive())
        );
    }

    #[tokio::test]
    async fn guide_is_not_sent_outside_its_hour() {
        let mut h = Harness::new(&[100]);
        let summary = h.cycle().await;
        assert_eq!(summary.broadcasts_sent, 0);
        assert!(h.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn digest_is_sent_once_per_day() {
        let mut h = Harness::new(&[100, 200]);
        let mut done = UserProgress::new(ChatId(200));
        for w in ["Hallo", "Tschüss", "Danke"] {
            done.add_learned(Level::A1, w);
        }
        for w in ["Ursache", "Wirkung"] {
            done.add_learned(Level::B1, w);
        }
        h.save(&done).await;

        assert_eq!(h.digest_at(tuesday()).await, 2);
        assert_eq!(h.digest_at(tuesday()).await, 0);

        let to_100 = h.transport.sent_to(100);
        assert_eq!(to_100.len(), 1);
        for word in ["Hallo", "Tschüss", "Danke", "Ursache", "Wirkung"] {
            assert!(to_100[0].contains(word), "{word} missing from digest");
        }
        assert!(h.transport.sent_to(200)[0].contains("every word"));
        assert_eq!(
            h.progress(100).await.last_digest_date,
            Some(tuesday().date_naive())
        );
    }
}
