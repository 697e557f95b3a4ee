use std::path::PathBuf;
use std::time::Duration;

use chrono::Weekday;
use chrono_tz::Tz;
use thiserror::Error;

use crate::gate::GuideSchedule;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TELEGRAM_BOT_TOKEN is not set")]
    MissingToken,
    #[error("unknown time zone {0:?}")]
    Timezone(String),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageChoice {
    Sqlite(String),
    Files(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub storage: StorageChoice,
    pub vocabulary_dir: PathBuf,
    pub timezone: Tz,
    pub guide: GuideSchedule,
    pub send_delay: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let token = var("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::MissingToken)?;

        let storage = match var("DATABASE_URL") {
            Some(url) if url.starts_with("sqlite:") => StorageChoice::Sqlite(url),
            Some(url) => {
                return Err(ConfigError::Invalid {
                    name: "DATABASE_URL",
                    value: url,
                })
            }
            None => StorageChoice::Files(var("DATA_DIR").unwrap_or_else(|| ".".into()).into()),
        };

        let timezone = match var("BOT_TIMEZONE") {
            Some(name) => name.trim().parse().map_err(|_| ConfigError::Timezone(name))?,
            None => chrono_tz::Europe::Berlin,
        };

        let weekday = match var("GUIDE_WEEKDAY") {
            Some(value) => value
                .trim()
                .parse::<Weekday>()
                .map_err(|_| ConfigError::Invalid {
                    name: "GUIDE_WEEKDAY",
                    value,
                })?,
            None => Weekday::Mon,
        };

        let hour = parse_number(&var, "GUIDE_HOUR", 8)?;
        if hour > 23 {
            return Err(ConfigError::Invalid {
                name: "GUIDE_HOUR",
                value: hour.to_string(),
            });
        }

        Ok(Self {
            token,
            storage,
            vocabulary_dir: var("VOCABULARY_DIR")
                .unwrap_or_else(|| "vocabulary".into())
                .into(),
            timezone,
            guide: GuideSchedule {
                weekday,
                hour: hour as u32,
            },
            send_delay: Duration::from_millis(parse_number(&var, "SEND_DELAY_MS", 100)?),
            request_timeout: Duration::from_secs(parse_number(&var, "REQUEST_TIMEOUT_SECS", 10)?),
        })
    }
}

fn parse_number(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
