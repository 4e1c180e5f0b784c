//! Conversation session state.
//!
//! One [`Session`] value per conversation, held in memory by the transport
//! and keyed by the sender's identity. Sessions are never persisted and
//! never expire: an abandoned conversation resumes exactly where it stopped.

use serde::{Deserialize, Serialize};

/// Where a conversation currently is, plus whatever it has staged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Session {
    /// Nothing in progress.
    #[default]
    Idle,
    /// Registration started; waiting for a student id.
    AwaitingStudentId,
    /// A valid, free student id is staged for confirmation.
    AwaitingConfirmation {
        /// Staged student id.
        student_id: String,
    },
    /// Owner is paging through the student list.
    AdminBrowsing {
        /// Zero-based page cursor.
        page: usize,
    },
    /// Owner rename: waiting for the first name.
    AwaitingAdminRenameFirst {
        /// Record being renamed.
        student_id: String,
    },
    /// Owner rename: first name staged, waiting for the last name.
    AwaitingAdminRenameLast {
        /// Record being renamed.
        student_id: String,
        /// Staged first name.
        first_name: String,
    },
}

impl Session {
    /// Student id staged for confirmation, if any.
    #[must_use]
    pub fn staged_student_id(&self) -> Option<&str> {
        match self {
            Self::AwaitingConfirmation { student_id } => Some(student_id),
            _ => None,
        }
    }
}

/// Outcome of handling one inbound event: the next session and what to tell the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step<R> {
    /// Session to store for the conversation.
    pub session: Session,
    /// Reply to render.
    pub reply: R,
}

impl<R> Step<R> {
    /// Pair a session with a reply.
    #[must_use]
    pub const fn new(session: Session, reply: R) -> Self {
        Self { session, reply }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_student_id() {
        assert_eq!(Session::Idle.staged_student_id(), None);
        assert_eq!(Session::AwaitingStudentId.staged_student_id(), None);
        let staged = Session::AwaitingConfirmation {
            student_id: "12345".into(),
        };
        assert_eq!(staged.staged_student_id(), Some("12345"));
    }
}
