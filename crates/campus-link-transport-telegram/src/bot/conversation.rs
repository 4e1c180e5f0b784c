//! Per-identity conversation handle.
//!
//! Teloxide dialogues are keyed by chat, but registration state belongs to
//! a Telegram identity. [`Conversation`] keys the dialogue by the sender's
//! user id and keeps the chat id only for replies, so two people in one
//! group chat never share staged input.

use anyhow::{anyhow, Result};
use campus_link_core::Session;
use std::sync::Arc;
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::types::{CallbackQuery, ChatId, Message, UserId};
use tracing::{debug, error};

/// Session storage shared by every conversation.
pub type SessionStorage = InMemStorage<Session>;

/// The session of one sender, plus where to answer them.
#[derive(Clone)]
pub struct Conversation {
    dialogue: Dialogue<Session, SessionStorage>,
    chat_id: ChatId,
    telegram_id: i64,
}

impl Conversation {
    /// Conversation of `user_id`, answering in `chat_id`.
    #[must_use]
    pub fn new(storage: Arc<SessionStorage>, chat_id: ChatId, user_id: UserId) -> Self {
        Self {
            dialogue: Dialogue::new(storage, ChatId::from(user_id)),
            chat_id,
            telegram_id: user_id.0.cast_signed(),
        }
    }

    /// Chat the current update came from.
    #[must_use]
    pub const fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Sender's Telegram id, the conversation key.
    #[must_use]
    pub const fn telegram_id(&self) -> i64 {
        self.telegram_id
    }

    /// Current session, `Idle` if none was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage fails.
    pub async fn session(&self) -> Result<Session> {
        self.dialogue
            .get_or_default()
            .await
            .map_err(|e| anyhow!(e.to_string()))
    }

    /// Store the next session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage fails.
    pub async fn update(&self, session: Session) -> Result<()> {
        self.dialogue
            .update(session)
            .await
            .map_err(|e| anyhow!(e.to_string()))
    }
}

/// Conversation of a message sender. Messages without a sender (channel
/// posts, anonymous admins) have no identity and are not handled.
pub fn from_message(msg: Message, storage: Arc<SessionStorage>) -> Option<Conversation> {
    let Some(user) = msg.from.as_ref() else {
        debug!("Ignoring message without sender in chat {}", msg.chat.id);
        return None;
    };
    Some(Conversation::new(storage, msg.chat.id, user.id))
}

/// Conversation of whoever pressed an inline button.
pub fn from_callback(q: CallbackQuery, storage: Arc<SessionStorage>) -> Conversation {
    let chat_id = q
        .regular_message()
        .map_or_else(|| ChatId::from(q.from.id), |m| m.chat.id);
    Conversation::new(storage, chat_id, q.from.id)
}

/// Session for `dptree::case!` routing.
pub async fn load_session(conversation: Conversation) -> Option<Session> {
    match conversation.session().await {
        Ok(session) => Some(session),
        Err(e) => {
            error!(
                "Failed to load session of identity {}: {e}",
                conversation.telegram_id()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_users_in_one_chat_keep_separate_sessions() -> Result<()> {
        let storage = SessionStorage::new();
        let group = ChatId(-100_123);
        let first = Conversation::new(storage.clone(), group, UserId(1));
        let second = Conversation::new(storage.clone(), group, UserId(2));

        first
            .update(Session::AwaitingConfirmation {
                student_id: "40211272003".into(),
            })
            .await?;

        assert_eq!(second.session().await?, Session::Idle);
        assert_eq!(
            first.session().await?.staged_student_id(),
            Some("40211272003")
        );
        assert_eq!(second.chat_id(), group);
        assert_eq!(second.telegram_id(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_identity_keeps_its_session_across_chats() -> Result<()> {
        let storage = SessionStorage::new();
        let in_group = Conversation::new(storage.clone(), ChatId(-100_123), UserId(7));
        in_group.update(Session::AwaitingStudentId).await?;

        let in_private = Conversation::new(storage, ChatId(7), UserId(7));
        assert_eq!(in_private.session().await?, Session::AwaitingStudentId);
        assert_eq!(in_private.chat_id(), ChatId(7));
        Ok(())
    }
}
