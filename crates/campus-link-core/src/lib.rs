#![deny(missing_docs)]
//! Campus Link core library.
//!
//! Binds a messaging identity to exactly one student registry record,
//! limits failed registration attempts, and drives the registration and
//! owner administration conversations.

/// Compact encoding for inline-button actions.
pub mod action;
/// Owner-only administration of links and registry records.
pub mod admin;
/// Failed-attempt policy and lockout.
pub mod attempts;
/// Configuration management.
pub mod config;
/// Domain error kinds surfaced to callers.
pub mod error;
/// Validation rules for staged conversation input.
pub mod input;
/// Registration conversation.
pub mod registration;
/// Per-conversation session state.
pub mod session;
/// External registry and grade sources.
pub mod sources;
/// Relational storage for students, links and attempts.
pub mod storage;

pub use error::{FlowError, LinkError};
pub use session::{Session, Step};
