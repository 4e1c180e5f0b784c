/// Owner-only command, text and callback handlers
pub mod admin_handlers;
/// Per-identity session handle
pub mod conversation;
/// Registration, grades and general command handlers
pub mod handlers;
/// Throttling of repeated lockout notices
pub mod lockout_notice;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// View layer for UI components (keyboards, messages)
pub mod views;

pub use conversation::{Conversation, SessionStorage};
pub use lockout_notice::LockoutNotice;
