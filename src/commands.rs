use teloxide::utils::command::{BotCommands, ParseError};

use crate::vocabulary::Level;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelArg {
    Missing,
    Known(Level),
    Unsupported(String),
}

fn parse_level(s: String) -> Result<(LevelArg,), ParseError> {
    let arg = match s.split_whitespace().next() {
        None => LevelArg::Missing,
        Some(token) => match token.parse() {
            Ok(level) => LevelArg::Known(level),
            Err(_) => LevelArg::Unsupported(token.to_string()),
        },
    };
    Ok((arg,))
}

// Quoted multi-word headwords stay one token. Unbalanced quotes (e.g. "geht's")
// and words shlex would swallow as a `#` comment fall back to plain whitespace
// splitting.
fn split_words(s: String) -> Result<(Vec<String>,), ParseError> {
    let has_comment = s.split_whitespace().any(|w| w.starts_with('#'));
    let words = (!has_comment)
        .then(|| shlex::split(&s))
        .flatten()
        .unwrap_or_else(|| s.split_whitespace().map(str::to_string).collect())
        .into_iter()
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .collect();
    Ok((words,))
}

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(description = "register and receive the welcome message.")]
    Start,
    #[command(description = "show this text.")]
    Help,
    #[command(description = "study up to 10 new words of a level (a1, a2, b1).", parse_with = parse_level)]
    Learn { level: LevelArg },
    #[command(description = "record words you have learned.", parse_with = split_words)]
    Learned { words: Vec<String> },
    #[command(description = "show your progress.")]
    Stats,
}

/// Anything that isn't one of our commands (free text, other bots'
/// commands, arguments on commands that take none) yields `None` and gets
/// no reply.
pub fn parse(text: &str, bot_name: &str) -> Option<Command> {
    let text = text.trim();
    let command = Command::parse(text, bot_name).ok()?;

    let has_args = text.split_whitespace().nth(1).is_some();
    match command {
        Command::Start | Command::Help | Command::Stats if has_args => None,
        command => Some(command),
    }
}

pub fn help_text() -> String {
    Command::descriptions().to_string()
}
