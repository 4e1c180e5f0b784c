use crate::bot::resilient::{clear_inline_keyboard, send_view};
use crate::bot::views::{self, grades as grade_views, registration as reg_views};
use crate::bot::{admin_handlers, Conversation, LockoutNotice};
use anyhow::Result;
use campus_link_core::action::Action;
use campus_link_core::admin::AdminConsole;
use campus_link_core::registration::{RegistrationFlow, RegistrationReply};
use campus_link_core::sources::GradeBook;
use campus_link_core::{LinkError, Session, Step};
use std::sync::Arc;
use teloxide::{prelude::*, types::CallbackQuery, utils::command::BotCommands};
use tracing::{debug, info, warn};

// Helper function to get user name from Message
fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Commands available to everyone
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Start or restart registration
    #[command(description = "Register with your student ID.")]
    Start,
    /// Show the caller's grades
    #[command(description = "Show your grades.")]
    Grades,
    /// Leave the current conversation
    #[command(description = "Cancel the current step.")]
    Cancel,
}

/// Store the next session and tell the user what happened.
///
/// Lock notices are throttled per identity; every other reply is sent.
async fn deliver(
    bot: &Bot,
    conversation: &Conversation,
    step: Step<RegistrationReply>,
    notice: &LockoutNotice,
) -> Result<()> {
    conversation.update(step.session).await?;

    let telegram_id = conversation.telegram_id();
    let reply = step.reply;
    let is_lock_notice = matches!(
        reply,
        RegistrationReply::Refused(LinkError::Locked(_)) | RegistrationReply::LockedOut { .. }
    );
    let repeat_notice = matches!(reply, RegistrationReply::Refused(LinkError::Locked(_)));
    if repeat_notice && !notice.should_send(telegram_id).await {
        debug!("Lock notice for identity {telegram_id} suppressed");
        return Ok(());
    }

    send_view(bot, conversation.chat_id(), &reg_views::render(&reply)).await?;
    if is_lock_notice {
        notice.mark_sent(telegram_id).await;
    }
    Ok(())
}

/// Start handler
///
/// # Errors
///
/// Returns an error if storage or the reply fails.
pub async fn start(
    bot: Bot,
    msg: Message,
    flow: Arc<RegistrationFlow>,
    conversation: Conversation,
    notice: Arc<LockoutNotice>,
) -> Result<()> {
    let user_id = conversation.telegram_id();
    let user_name = get_user_name(&msg);
    info!("User {user_id} ({user_name}) initiated /start command.");

    let step = flow.enter(user_id).await?;
    deliver(&bot, &conversation, step, &notice).await
}

/// Cancel handler: back to idle from any state.
///
/// # Errors
///
/// Returns an error if the session update or the reply fails.
pub async fn cancel(
    bot: Bot,
    flow: Arc<RegistrationFlow>,
    conversation: Conversation,
    notice: Arc<LockoutNotice>,
) -> Result<()> {
    let step = flow.cancel(conversation.telegram_id());
    deliver(&bot, &conversation, step, &notice).await
}

/// Grades handler: course menu for linked identities.
///
/// # Errors
///
/// Returns an error if storage, the grade book or the reply fails.
pub async fn grades(
    bot: Bot,
    flow: Arc<RegistrationFlow>,
    grade_book: Arc<dyn GradeBook>,
    conversation: Conversation,
) -> Result<()> {
    let view = if flow.link_of(conversation.telegram_id()).await?.is_some() {
        grade_views::course_menu(&grade_book.list_courses().await?)
    } else {
        grade_views::not_registered()
    };
    send_view(&bot, conversation.chat_id(), &view).await?;
    Ok(())
}

/// Text received while a student ID is expected.
///
/// # Errors
///
/// Returns an error if storage or the reply fails.
pub async fn handle_student_id(
    bot: Bot,
    msg: Message,
    flow: Arc<RegistrationFlow>,
    conversation: Conversation,
    notice: Arc<LockoutNotice>,
) -> Result<()> {
    let Some(text) = msg.text() else {
        send_view(
            &bot,
            conversation.chat_id(),
            &views::View::text("Please send your student ID as text."),
        )
        .await?;
        return Ok(());
    };

    let step = flow
        .submit_student_id(conversation.telegram_id(), text)
        .await?;
    deliver(&bot, &conversation, step, &notice).await
}

/// Text received with nothing in progress.
///
/// # Errors
///
/// Returns an error if storage or the reply fails.
pub async fn handle_idle_text(
    bot: Bot,
    msg: Message,
    admin: Arc<AdminConsole>,
    conversation: Conversation,
) -> Result<()> {
    let text = msg.text().unwrap_or_default();
    if admin_handlers::handle_menu_text(&bot, text, &admin, &conversation).await? {
        return Ok(());
    }
    send_view(&bot, conversation.chat_id(), &reg_views::idle_hint()).await?;
    Ok(())
}

/// Retire the pressed confirmation keyboard and read the presser's session.
async fn answered_session(
    bot: &Bot,
    q: &CallbackQuery,
    conversation: &Conversation,
) -> Result<Session> {
    if let Some(message) = q.regular_message() {
        clear_inline_keyboard(bot, message.chat.id, message.id).await;
    }
    conversation.session().await
}

/// Inline button press. Only the presser's own session is consulted, so a
/// button under someone else's prompt cannot confirm their staged id.
///
/// # Errors
///
/// Returns an error if storage, the grade book or a reply fails.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    flow: Arc<RegistrationFlow>,
    admin: Arc<AdminConsole>,
    grade_book: Arc<dyn GradeBook>,
    conversation: Conversation,
    notice: Arc<LockoutNotice>,
) -> Result<()> {
    let user_id = conversation.telegram_id();
    let action = match q.data.as_deref().map(Action::decode) {
        Some(Ok(action)) => action,
        Some(Err(e)) => {
            warn!("Undecodable callback from user {user_id}: {e}");
            bot.answer_callback_query(q.id.clone())
                .text(views::expired_button())
                .await?;
            return Ok(());
        }
        None => {
            bot.answer_callback_query(q.id.clone()).await?;
            return Ok(());
        }
    };
    bot.answer_callback_query(q.id.clone()).await?;
    debug!("User {user_id} pressed {action}");

    match action {
        Action::ConfirmYes => {
            let session = answered_session(&bot, &q, &conversation).await?;
            let step = flow.confirm(user_id, &session).await?;
            deliver(&bot, &conversation, step, &notice).await
        }
        Action::ConfirmNo => {
            let session = answered_session(&bot, &q, &conversation).await?;
            let step = flow.decline(user_id, &session).await?;
            deliver(&bot, &conversation, step, &notice).await
        }
        Action::Grade { course } => {
            let view = match flow.link_of(user_id).await? {
                Some(link) => {
                    let grade = grade_book.get_grade(&course, &link.student_id).await?;
                    grade_views::grade(&course, grade.as_deref())
                }
                None => grade_views::not_registered(),
            };
            send_view(&bot, conversation.chat_id(), &view).await?;
            Ok(())
        }
        Action::Admin { op, student_id } => {
            admin_handlers::handle_admin_action(&bot, &conversation, &admin, op, &student_id).await
        }
    }
}
