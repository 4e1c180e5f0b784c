//! View layer for bot UI components
//!
//! Contains keyboards, messages, and formatting for Telegram UI. Every
//! text is HTML; user-supplied values are escaped here and nowhere else.

pub mod admin;
pub mod grades;
pub mod registration;

use campus_link_core::action::Action;
use teloxide::types::{InlineKeyboardButton, ReplyMarkup};
use tracing::warn;

/// A message ready to send: HTML text plus an optional keyboard.
#[derive(Debug, Clone)]
pub struct View {
    /// HTML body.
    pub text: String,
    /// Keyboard to attach.
    pub markup: Option<ReplyMarkup>,
}

impl View {
    /// Plain text view without keyboard changes.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
        }
    }

    /// View with a keyboard.
    #[must_use]
    pub fn with_markup(text: impl Into<String>, markup: impl Into<ReplyMarkup>) -> Self {
        Self {
            text: text.into(),
            markup: Some(markup.into()),
        }
    }
}

/// Escape a user-supplied value for HTML messages.
#[must_use]
pub fn escape(value: &str) -> String {
    html_escape::encode_text(value).into_owned()
}

/// Inline button for `action`, or `None` if the action does not fit into callback data.
#[must_use]
pub fn action_button(label: impl Into<String>, action: &Action) -> Option<InlineKeyboardButton> {
    match action.encode() {
        Ok(data) => Some(InlineKeyboardButton::callback(label, data)),
        Err(e) => {
            warn!("Dropping button for {action:?}: {e}");
            None
        }
    }
}

/// Generic failure message.
#[must_use]
pub fn error_message() -> View {
    View::text("⚠️ Something went wrong. Please try again later.")
}

/// Reply to a pressed button whose data could not be decoded.
#[must_use]
pub const fn expired_button() -> &'static str {
    "This button is no longer valid."
}
