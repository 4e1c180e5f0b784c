use crate::bot;
use crate::bot::admin_handlers::{authorize_owner, AdminCommand};
use crate::bot::conversation::{self, Conversation, SessionStorage};
use crate::bot::handlers::Command;
use crate::bot::resilient::send_view;
use crate::bot::views;
use crate::bot::LockoutNotice;
use crate::config::{BotSettings, LOCKOUT_NOTICE_CACHE_MAX_SIZE};
use campus_link_core::admin::{AdminConsole, OwnerGrant};
use campus_link_core::attempts::AttemptTracker;
use campus_link_core::registration::RegistrationFlow;
use campus_link_core::sources::{CsvGradeBook, CsvRegistry, GradeBook, RegistrySource};
use campus_link_core::storage::SqliteStore;
use campus_link_core::Session;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, error, info, warn};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let store = init_storage(&settings).await;
    let tracker = AttemptTracker::new(store.clone(), settings.core.max_failures);

    let registry: Arc<dyn RegistrySource> =
        Arc::new(CsvRegistry::new(&settings.core.registry_path));
    let grade_book: Arc<dyn GradeBook> = Arc::new(CsvGradeBook::new(&settings.core.grades_dir));
    let flow = Arc::new(RegistrationFlow::new(
        store.clone(),
        tracker.clone(),
        registry,
    ));
    let admin = Arc::new(AdminConsole::new(
        store,
        tracker,
        grade_book.clone(),
        settings.core.owner_student_id.clone(),
        settings.core.page_size,
    ));
    info!(
        "Registration ready (max failures: {}, owner: {})",
        settings.core.max_failures, settings.core.owner_student_id
    );

    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let sessions = SessionStorage::new();
    let notice = init_lockout_notice(&settings);
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![flow, admin, grade_book, sessions, notice])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn init_storage(settings: &BotSettings) -> Arc<SqliteStore> {
    match SqliteStore::connect(&settings.core.database_url).await {
        Ok(store) => {
            if let Err(e) = store.check_connection().await {
                error!("SQLite connection check returned error: {}", e);
            }
            Arc::new(store)
        }
        Err(e) => {
            error!("Failed to initialize SQLite storage: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_lockout_notice(settings: &BotSettings) -> Arc<LockoutNotice> {
    let cooldown = settings.telegram.lockout_notice_cooldown_secs;
    info!(
        "Initializing LockoutNotice (cooldown: {}s, max_size: {})",
        cooldown, LOCKOUT_NOTICE_CACHE_MAX_SIZE
    );
    Arc::new(LockoutNotice::new(cooldown, LOCKOUT_NOTICE_CACHE_MAX_SIZE))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    // Sessions are keyed by sender, see `bot::conversation`
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .map(conversation::from_callback)
                .endpoint(handle_callback),
        )
        .branch(
            Update::filter_message()
                .filter_map(conversation::from_message)
                .filter_map_async(conversation::load_session)
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::entry()
                        .filter_command::<AdminCommand>()
                        .branch(
                            dptree::filter_map_async(authorize_owner)
                                .endpoint(handle_admin_command),
                        )
                        // Everyone else: swallow, never treat as conversation input
                        .endpoint(ignore_admin_command),
                )
                .branch(dptree::case![Session::AwaitingStudentId].endpoint(handle_student_id))
                .branch(
                    dptree::case![Session::AdminBrowsing { page }]
                        .filter_map_async(authorize_owner)
                        .endpoint(handle_browsing_text),
                )
                .branch(
                    dptree::case![Session::AwaitingAdminRenameFirst { student_id }]
                        .filter_map_async(authorize_owner)
                        .endpoint(handle_rename_first),
                )
                .branch(
                    dptree::case![Session::AwaitingAdminRenameLast {
                        student_id,
                        first_name
                    }]
                    .filter_map_async(authorize_owner)
                    .endpoint(handle_rename_last),
                )
                .branch(dptree::endpoint(handle_idle_text)),
        )
}

/// Log a failed handler and tell the user something went wrong.
async fn report_failure(bot: &Bot, conversation: &Conversation, context: &str, e: &anyhow::Error) {
    error!(
        "{context} error for identity {}: {e}",
        conversation.telegram_id()
    );
    if let Err(send_err) = send_view(bot, conversation.chat_id(), &views::error_message()).await {
        warn!(
            "Failed to report error to chat {}: {send_err}",
            conversation.chat_id()
        );
    }
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    flow: Arc<RegistrationFlow>,
    grade_book: Arc<dyn GradeBook>,
    conversation: Conversation,
    notice: Arc<LockoutNotice>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => {
            bot::handlers::start(bot.clone(), msg, flow, conversation.clone(), notice).await
        }
        Command::Grades => {
            bot::handlers::grades(bot.clone(), flow, grade_book, conversation.clone()).await
        }
        Command::Cancel => {
            bot::handlers::cancel(bot.clone(), flow, conversation.clone(), notice).await
        }
    };
    if let Err(e) = res {
        report_failure(&bot, &conversation, "Command", &e).await;
    }
    respond(())
}

async fn handle_admin_command(
    bot: Bot,
    cmd: AdminCommand,
    grant: OwnerGrant,
    admin: Arc<AdminConsole>,
    conversation: Conversation,
    notice: Arc<LockoutNotice>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::admin_handlers::handle_admin_command(
        bot.clone(),
        cmd,
        grant,
        admin,
        conversation.clone(),
        notice,
    )
    .await
    {
        report_failure(&bot, &conversation, "Admin command", &e).await;
    }
    respond(())
}

async fn ignore_admin_command(conversation: Conversation) -> Result<(), teloxide::RequestError> {
    debug!(
        "Ignored admin command from non-owner {}",
        conversation.telegram_id()
    );
    respond(())
}

async fn handle_student_id(
    bot: Bot,
    msg: Message,
    flow: Arc<RegistrationFlow>,
    conversation: Conversation,
    notice: Arc<LockoutNotice>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) =
        bot::handlers::handle_student_id(bot.clone(), msg, flow, conversation.clone(), notice)
            .await
    {
        report_failure(&bot, &conversation, "Student ID handler", &e).await;
    }
    respond(())
}

async fn handle_browsing_text(
    bot: Bot,
    msg: Message,
    page: usize,
    grant: OwnerGrant,
    admin: Arc<AdminConsole>,
    conversation: Conversation,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::admin_handlers::handle_browsing_text(
        bot.clone(),
        msg,
        page,
        grant,
        admin,
        conversation.clone(),
    )
    .await
    {
        report_failure(&bot, &conversation, "Student list handler", &e).await;
    }
    respond(())
}

async fn handle_rename_first(
    bot: Bot,
    msg: Message,
    student_id: String,
    grant: OwnerGrant,
    admin: Arc<AdminConsole>,
    conversation: Conversation,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::admin_handlers::handle_rename_first(
        bot.clone(),
        msg,
        student_id,
        grant,
        admin,
        conversation.clone(),
    )
    .await
    {
        report_failure(&bot, &conversation, "Rename handler", &e).await;
    }
    respond(())
}

async fn handle_rename_last(
    bot: Bot,
    msg: Message,
    staged: (String, String),
    grant: OwnerGrant,
    admin: Arc<AdminConsole>,
    conversation: Conversation,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::admin_handlers::handle_rename_last(
        bot.clone(),
        msg,
        staged,
        grant,
        admin,
        conversation.clone(),
    )
    .await
    {
        report_failure(&bot, &conversation, "Rename handler", &e).await;
    }
    respond(())
}

async fn handle_idle_text(
    bot: Bot,
    msg: Message,
    admin: Arc<AdminConsole>,
    conversation: Conversation,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) =
        bot::handlers::handle_idle_text(bot.clone(), msg, admin, conversation.clone()).await
    {
        report_failure(&bot, &conversation, "Text handler", &e).await;
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    flow: Arc<RegistrationFlow>,
    admin: Arc<AdminConsole>,
    grade_book: Arc<dyn GradeBook>,
    conversation: Conversation,
    notice: Arc<LockoutNotice>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_callback(
        bot.clone(),
        q,
        flow,
        admin,
        grade_book,
        conversation.clone(),
        notice,
    )
    .await
    {
        report_failure(&bot, &conversation, "Callback handler", &e).await;
    }
    respond(())
}
