use futures_core::future::BoxFuture;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, ParseMode, UpdateKind};
use thiserror::Error;

use crate::messages::MarkdownString;

/// A message as seen by the dispatcher. Non-text messages carry empty text so
/// their update ids still advance the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub update_id: i64,
    pub chat_id: ChatId,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),
    #[error("update offset {0} out of range")]
    Offset(i64),
    #[cfg(test)]
    #[error("simulated transport failure")]
    Simulated,
}

pub trait Transport: Send + Sync {
    /// Pending messages of all chats, ordered by update id. `None` asks for
    /// everything the server still holds.
    fn fetch_updates(
        &self,
        offset: Option<i64>,
    ) -> BoxFuture<'_, Result<Vec<InboundMessage>, TransportError>>;

    fn send<'a>(
        &'a self,
        chat_id: ChatId,
        text: &'a MarkdownString,
    ) -> BoxFuture<'a, Result<(), TransportError>>;
}

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub async fn bot_name(&self) -> Result<String, TransportError> {
        let me = self.bot.get_me().await?;
        Ok(me.username().to_string())
    }
}

impl Transport for TelegramTransport {
    fn fetch_updates(
        &self,
        offset: Option<i64>,
    ) -> BoxFuture<'_, Result<Vec<InboundMessage>, TransportError>> {
        Box::pin(async move {
            let mut request = self
                .bot
                .get_updates()
                .allowed_updates([AllowedUpdate::Message]);
            if let Some(offset) = offset {
                let offset = i32::try_from(offset).map_err(|_| TransportError::Offset(offset))?;
                request = request.offset(offset);
            }

            let updates = request.await?;
            log::debug!("Fetched {} updates (offset {offset:?})", updates.len());

            Ok(updates
                .into_iter()
                .filter_map(|update| {
                    let UpdateKind::Message(message) = update.kind else {
                        return None;
                    };
                    Some(InboundMessage {
                        update_id: i64::from(update.id.0),
                        chat_id: message.chat.id,
                        text: message.text().unwrap_or_default().to_string(),
                    })
                })
                .collect())
        })
    }

    fn send<'a>(
        &'a self,
        chat_id: ChatId,
        text: &'a MarkdownString,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.bot
                .send_message(chat_id, text.to_string())
                .parse_mode(ParseMode::MarkdownV2)
                .await?;
            Ok(())
        })
    }
}
