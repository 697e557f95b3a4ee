mod chat_registry;
mod commands;
mod config;
mod dispatcher;
mod gate;
mod messages;
mod progress;
mod selector;
mod stats;
mod storage;
mod transport;
mod vocabulary;

use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use teloxide::Bot;
use thiserror::Error;

use config::{Config, ConfigError, StorageChoice};
use dispatcher::{Dispatcher, Settings};
use storage::{FileStorage, SqliteStorage, Storage, StorageError};
use transport::{TelegramTransport, TransportError};
use vocabulary::Catalog;

/// Telegram bot teaching German vocabulary. Every invocation handles the
/// pending updates once and exits; run it from a scheduler.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Mode {
    /// Answer pending commands, send the weekly guide when due, welcome new users.
    #[default]
    Cycle,
    /// Send today's words to every registered chat.
    Digest,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("couldn't build http client: {0}")]
    Client(String),
    #[error("couldn't reach telegram: {0}")]
    Transport(#[from] TransportError),
    #[error("couldn't open storage: {0}")]
    Storage(#[from] StorageError),
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args.mode.unwrap_or_default()).await {
        log::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(mode: Mode) -> Result<(), StartupError> {
    let config = Config::from_env()?;
    log::info!("Starting {mode:?} run...");

    let client = teloxide::net::default_reqwest_settings()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| StartupError::Client(e.to_string()))?;
    let transport = TelegramTransport::new(Bot::with_client(&config.token, client));
    let bot_name = transport.bot_name().await?;

    let storage: Box<dyn Storage> = match &config.storage {
        StorageChoice::Sqlite(url) => Box::new(SqliteStorage::new(url).await?),
        StorageChoice::Files(root) => Box::new(FileStorage::new(root.clone())),
    };

    let catalog = Catalog::load(&config.vocabulary_dir);
    let settings = Settings {
        bot_name,
        guide: config.guide,
        send_delay: config.send_delay,
    };

    let mut rng = StdRng::from_entropy();
    let now = Utc::now().with_timezone(&config.timezone);
    let mut dispatcher = Dispatcher::new(
        &transport,
        storage.as_ref(),
        &catalog,
        &settings,
        &mut rng,
        now,
    );

    match mode {
        Mode::Cycle => {
            dispatcher.run_cycle().await;
        }
        Mode::Digest => {
            dispatcher.run_digest().await;
        }
    }

    Ok(())
}
