//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Transient network failures are retried with exponential backoff and
//! jitter. Everything user-facing goes through [`send_view`].

use crate::bot::views::View;
use crate::config::{
    TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
};
use anyhow::Result;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId, ParseMode};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, warn};

/// Run `operation` until it succeeds or the retry budget is spent.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}

/// Send a rendered view as an HTML message.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_view(bot: &Bot, chat_id: ChatId, view: &View) -> Result<Message> {
    retry_telegram_operation(|| async {
        let mut req = bot
            .send_message(chat_id, view.text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = &view.markup {
            req = req.reply_markup(markup.clone());
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Drop the inline keyboard of an answered message so it cannot be pressed twice.
///
/// Failures are logged and swallowed; the press itself was already handled.
pub async fn clear_inline_keyboard(bot: &Bot, chat_id: ChatId, msg_id: MessageId) {
    let result = retry_telegram_operation(|| async {
        match bot.edit_message_reply_markup(chat_id, msg_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("message is not modified") => Ok(()),
            Err(e) => Err(anyhow::anyhow!("Telegram edit error: {e}")),
        }
    })
    .await;

    if let Err(e) = result {
        if e.to_string().contains("message to edit not found") {
            debug!("Keyboard removal skipped: {e}");
        } else {
            warn!("Failed to remove inline keyboard: {e}");
        }
    }
}
