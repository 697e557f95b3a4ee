mod markdown_string;

pub use markdown_string::MarkdownString;

use crate::commands;
use crate::selector::LearnedReport;
use crate::stats::Stats;
use crate::vocabulary::{Level, VocabEntry, WiseSentence};

// Telegram rejects messages above 4096 characters, stay a bit below.
const MESSAGE_LIMIT: usize = 4000;

fn level_marker(level: Level) -> &'static str {
    match level {
        Level::A1 => "🟢",
        Level::A2 => "🟡",
        Level::B1 => "🔵",
    }
}

/// Concatenates `parts`, starting a new message whenever the next part would
/// overflow the current one.
fn pack(parts: impl IntoIterator<Item = MarkdownString>) -> Vec<MarkdownString> {
    let mut messages = Vec::new();
    let mut current = MarkdownString::new();

    for part in parts {
        if !current.is_empty() && current.len_parsed() + part.len_parsed() > MESSAGE_LIMIT {
            messages.push(std::mem::take(&mut current));
        }
        current += part;
    }

    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

fn command_overview() -> MarkdownString {
    MarkdownString::from("📚 Available commands:").bold()
        + "\n\n"
        + MarkdownString::from("/learn <level>").bold()
        + "\n   Study 10 new words of a level: /learn a1, /learn a2, /learn b1\n\n"
        + MarkdownString::from("/learned <words>").bold()
        + "\n   Record the words you know: /learned Hallo Tschüss Danke\n\n"
        + MarkdownString::from("/stats").bold()
        + "\n   Show your progress"
}

pub fn welcome() -> MarkdownString {
    MarkdownString::from("🇩🇪 Welcome to Wortschatzbot! 🇩🇪").bold()
        + "\n\nI'll help you build your German vocabulary. 😊\n\n"
        + command_overview()
        + "\n\n"
        + MarkdownString::from("💡 Getting started:").bold()
        + "\nSend /learn a1 to get your first words!\n\nEvery Monday morning you'll receive a short study guide."
}

pub fn weekly_guide() -> MarkdownString {
    MarkdownString::from("🇩🇪 Weekly German Study Guide 🇩🇪").bold()
        + "\n\nA new week, new words! Ready? 😊\n\n"
        + command_overview()
        + "\n\n"
        + MarkdownString::from("💡 How to study:").bold()
        + "\n• Get new words every day with /learn\n• Record what you know with /learned\n• Check /stats from time to time\n\nViel Erfolg! 💪"
}

pub fn help() -> MarkdownString {
    MarkdownString::from(commands::help_text().as_str())
}

pub fn learn_usage() -> MarkdownString {
    MarkdownString::from("📝 Usage").bold()
        + "\n\n/learn a1\n/learn a2\n/learn b1\n\nPick a level!"
}

pub fn unsupported_level(token: &str) -> MarkdownString {
    MarkdownString::from(format!("❌ Unknown level „{token}”").as_str()).bold()
        + "\n\nSupported levels: a1, a2, b1"
}

pub fn level_unavailable(level: Level) -> MarkdownString {
    MarkdownString::from(format!("⚠️ No words are available for {level} right now.").as_str())
}

pub fn level_complete(level: Level) -> MarkdownString {
    MarkdownString::from(format!("🎉 {level} complete!").as_str()).bold()
        + "\n\nYou have learned every word of this level!\n\nWhy not try another one? 💪"
}

fn word_block(index: usize, word: &VocabEntry) -> MarkdownString {
    let mut block = MarkdownString::from(format!("{}. {}", index + 1, word.headword).as_str()).bold();
    block += format!("\n📖 {}\n\n", word.translation).as_str();

    for example in &word.examples {
        block += format!("💬 {example}\n\n").as_str();
    }
    if !word.synonyms.is_empty() {
        block += format!("🔄 Synonyms: {}\n\n", word.synonyms.join(", ")).as_str();
    }
    if !word.antonyms.is_empty() {
        block += format!("🔀 Antonyms: {}\n\n", word.antonyms.join(", ")).as_str();
    }
    block += "---\n\n";
    block
}

fn closing(sentence: Option<&WiseSentence>) -> MarkdownString {
    let mut result = MarkdownString::new();
    if let Some(sentence) = sentence {
        result += MarkdownString::from("💡 Wise sentence").bold();
        result += format!("\n\n🇩🇪 {}\n🇬🇧 {}\n\n", sentence.german, sentence.english).as_str();
    }
    result + MarkdownString::from("Record the words you know with /learned <words>").italic()
}

pub fn lesson(
    level: Level,
    words: &[&VocabEntry],
    sentence: Option<&WiseSentence>,
) -> Vec<MarkdownString> {
    let header = MarkdownString::from(format!("🇩🇪 {level} Level Study 🇩🇪").as_str()).bold() + "\n\n";

    let blocks = words.iter().enumerate().map(|(i, w)| word_block(i, w));
    pack(std::iter::once(header).chain(blocks).chain([closing(sentence)]))
}

pub fn digest(words: &[&VocabEntry], sentence: Option<&WiseSentence>) -> Vec<MarkdownString> {
    let header = MarkdownString::from("☀️ Your daily words").bold() + "\n\n";

    let blocks = words.iter().enumerate().map(|(i, w)| {
        MarkdownString::from(format!("{} {}\n", level_marker(w.level), w.level).as_str())
            + word_block(i, w)
    });
    pack(std::iter::once(header).chain(blocks).chain([closing(sentence)]))
}

pub fn digest_complete() -> MarkdownString {
    MarkdownString::from("🏆 You have learned every word we have!").bold()
        + "\n\nNo daily words left for you. Herzlichen Glückwunsch!"
}

pub fn learned_usage() -> MarkdownString {
    MarkdownString::from("📝 Usage").bold()
        + "\n\n/learned Hallo Tschüss Danke\n\nSeparate the words you have learned with spaces. Put words with spaces in quotes: /learned \"Guten Morgen\""
}

fn new_words(count: usize) -> String {
    match count {
        1 => "1 new word".to_string(),
        n => format!("{n} new words"),
    }
}

pub fn learned_report(report: &LearnedReport) -> MarkdownString {
    let mut result = MarkdownString::from("✅ Recorded ")
        + MarkdownString::from(new_words(report.added_count()).as_str()).bold()
        + "!\n\n";

    for (level, words) in &report.added {
        result += MarkdownString::from(format!("{} {level}:", level_marker(*level)).as_str()).bold();
        result += format!(" {}\n", words.join(", ")).as_str();
    }

    if !report.unknown.is_empty() {
        result += "\n";
        result += MarkdownString::from("⚠️ Unknown words:").bold();
        result += format!(" {}\n", report.unknown.join(", ")).as_str();
    }

    result += "\n";
    result += MarkdownString::from("📚 Learned in total:").bold();
    result += format!(" {}\n\nKeep going! 💪", report.total_learned).as_str();
    result
}

pub fn stats(stats: &Stats) -> MarkdownString {
    let mut result = MarkdownString::from("📊 Your progress").bold() + "\n\n";

    result += MarkdownString::from("✅ Learned:").bold();
    result += format!(" {}\n", stats.learned()).as_str();
    result += MarkdownString::from("📝 Remaining:").bold();
    result += format!(" {}\n", stats.remaining()).as_str();
    result += MarkdownString::from("📈 Progress:").bold();
    result += format!(" {}%\n\n---\n\n", stats.percentage()).as_str();

    result += MarkdownString::from("📚 Per level").bold();
    result += "\n\n";
    for level in &stats.levels {
        result += format!(
            "{} {}: {}/{} ({}%)\n",
            level_marker(level.level),
            level.level,
            level.learned,
            level.total,
            level.percentage()
        )
        .as_str();
    }

    let last_study = match stats.last_study_date {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => "never".to_string(),
    };
    result += "\n---\n\n";
    result += MarkdownString::from("📅 Last study session:").bold();
    result += format!(" {last_study}\n\nKeep going! 💪").as_str();
    result
}

pub fn internal_error() -> MarkdownString {
    MarkdownString::from("Sorry, an internal error occurred :((")
}
