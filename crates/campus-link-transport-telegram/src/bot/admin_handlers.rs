//! Owner-only handlers.
//!
//! Message routes reach these functions only through [`authorize_owner`],
//! which yields the [`OwnerGrant`] every admin operation requires. Button
//! presses are authorized in [`handle_admin_action`].

use crate::bot::resilient::send_view;
use crate::bot::views::admin as admin_views;
use crate::bot::{Conversation, LockoutNotice};
use anyhow::Result;
use campus_link_core::action::AdminOp;
use campus_link_core::admin::{AdminConsole, AdminReply, OwnerGrant};
use campus_link_core::{FlowError, LinkError, Session, Step};
use std::sync::Arc;
use teloxide::{prelude::*, utils::command::BotCommands};
use tracing::{error, info, warn};

/// Owner commands
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Admin commands:")]
pub enum AdminCommand {
    /// Open the admin menu
    #[command(description = "Open the admin menu.")]
    Admin,
    /// Reset a locked identity
    #[command(description = "Unlock a Telegram ID.")]
    Unlock(String),
}

/// Grant for the sender, or `None` for everyone but the owner.
pub async fn authorize_owner(
    conversation: Conversation,
    admin: Arc<AdminConsole>,
) -> Option<OwnerGrant> {
    let user_id = conversation.telegram_id();
    match admin.authorize(user_id).await {
        Ok(grant) => Some(grant),
        Err(FlowError::Link(LinkError::Unauthorized)) => None,
        Err(e) => {
            error!("Owner check failed for user {user_id}: {e}");
            None
        }
    }
}

async fn apply(bot: &Bot, conversation: &Conversation, step: Step<AdminReply>) -> Result<()> {
    conversation.update(step.session).await?;
    send_view(bot, conversation.chat_id(), &admin_views::render(&step.reply)).await?;
    Ok(())
}

async fn reply(bot: &Bot, conversation: &Conversation, reply: &AdminReply) -> Result<()> {
    send_view(bot, conversation.chat_id(), &admin_views::render(reply)).await?;
    Ok(())
}

/// `/admin` and `/unlock` from the owner.
///
/// # Errors
///
/// Returns an error if storage or the reply fails.
pub async fn handle_admin_command(
    bot: Bot,
    cmd: AdminCommand,
    grant: OwnerGrant,
    admin: Arc<AdminConsole>,
    conversation: Conversation,
    notice: Arc<LockoutNotice>,
) -> Result<()> {
    match cmd {
        AdminCommand::Admin => apply(&bot, &conversation, admin.open_menu(&grant)).await,
        AdminCommand::Unlock(arg) => {
            let Ok(telegram_id) = arg.trim().parse::<i64>() else {
                send_view(&bot, conversation.chat_id(), &admin_views::unlock_usage()).await?;
                return Ok(());
            };
            let unlocked = admin.unlock(&grant, telegram_id).await?;
            notice.forget(telegram_id).await;
            reply(&bot, &conversation, &unlocked).await
        }
    }
}

/// Admin menu buttons typed while idle. Returns `false` if the text was
/// not an admin button or the sender is not the owner.
///
/// # Errors
///
/// Returns an error if storage or the reply fails.
pub async fn handle_menu_text(
    bot: &Bot,
    text: &str,
    admin: &AdminConsole,
    conversation: &Conversation,
) -> Result<bool> {
    if text != admin_views::BTN_STUDENTS && text != admin_views::BTN_BACK {
        return Ok(false);
    }
    let grant = match admin.authorize(conversation.telegram_id()).await {
        Ok(grant) => grant,
        Err(FlowError::Link(_)) => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if text == admin_views::BTN_STUDENTS {
        apply(bot, conversation, admin.browse(&grant, 0).await?).await?;
    } else {
        send_view(bot, conversation.chat_id(), &admin_views::menu_closed()).await?;
    }
    Ok(true)
}

/// Text while paging through the student list.
///
/// # Errors
///
/// Returns an error if storage or the reply fails.
pub async fn handle_browsing_text(
    bot: Bot,
    msg: Message,
    page: usize,
    grant: OwnerGrant,
    admin: Arc<AdminConsole>,
    conversation: Conversation,
) -> Result<()> {
    let text = msg.text().unwrap_or_default();
    let step = match text {
        admin_views::BTN_PREV => admin.browse(&grant, page.saturating_sub(1)).await?,
        admin_views::BTN_NEXT => admin.browse(&grant, page.saturating_add(1)).await?,
        admin_views::BTN_BACK => admin.open_menu(&grant),
        other => admin.select(&grant, page, other).await?,
    };
    apply(&bot, &conversation, step).await
}

/// First name typed during a rename.
///
/// # Errors
///
/// Returns an error if the reply fails.
pub async fn handle_rename_first(
    bot: Bot,
    msg: Message,
    student_id: String,
    grant: OwnerGrant,
    admin: Arc<AdminConsole>,
    conversation: Conversation,
) -> Result<()> {
    let text = msg.text().unwrap_or_default();
    apply(
        &bot,
        &conversation,
        admin.submit_first_name(&grant, &student_id, text),
    )
    .await
}

/// Last name typed during a rename; stores the new name and reopens the list.
///
/// # Errors
///
/// Returns an error if storage or the reply fails.
pub async fn handle_rename_last(
    bot: Bot,
    msg: Message,
    (student_id, first_name): (String, String),
    grant: OwnerGrant,
    admin: Arc<AdminConsole>,
    conversation: Conversation,
) -> Result<()> {
    let text = msg.text().unwrap_or_default();
    let step = admin
        .submit_last_name(&grant, &student_id, &first_name, text)
        .await?;
    let renamed = matches!(step.reply, AdminReply::Renamed(_));
    apply(&bot, &conversation, step).await?;

    if renamed {
        info!("Rename of {student_id} finished, back to the list");
        apply(&bot, &conversation, admin.browse(&grant, 0).await?).await?;
    }
    Ok(())
}

/// Inline action on a selected student.
///
/// # Errors
///
/// Returns an error if storage, the grade book or the reply fails.
pub async fn handle_admin_action(
    bot: &Bot,
    conversation: &Conversation,
    admin: &AdminConsole,
    op: AdminOp,
    student_id: &str,
) -> Result<()> {
    let telegram_id = conversation.telegram_id();
    let grant = match admin.authorize(telegram_id).await {
        Ok(grant) => grant,
        Err(FlowError::Link(e)) => {
            warn!("Admin action {op:?} on {student_id} refused for {telegram_id}: {e}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let session = conversation.session().await?;

    match op {
        AdminOp::Grades => reply(bot, conversation, &admin.grades_for(&grant, student_id).await?).await,
        AdminOp::Unlink => reply(bot, conversation, &admin.unlink(&grant, student_id).await?).await,
        AdminOp::EditName => {
            let step = admin.begin_rename(&grant, &session, student_id).await?;
            apply(bot, conversation, step).await
        }
        AdminOp::Back => {
            let page = match session {
                Session::AdminBrowsing { page } => page,
                _ => 0,
            };
            apply(bot, conversation, admin.browse(&grant, page).await?).await
        }
    }
}
