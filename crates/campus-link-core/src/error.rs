//! Domain error kinds.
//!
//! [`LinkError`] values are carried inside conversation replies so the
//! transport can explain a rejection. Storage failures stay separate in
//! [`StoreError`] and are propagated with `?`.

use crate::input::InputError;
use crate::storage::StoreError;
use thiserror::Error;

/// Reasons a registration or admin request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Malformed input.
    #[error("invalid input: {0}")]
    Validation(#[from] InputError),
    /// Student id is not in the registry.
    #[error("student id {0} is not in the registry")]
    NotFound(String),
    /// Identity or student id already has a link.
    #[error("student id {0} is already linked")]
    Conflict(String),
    /// Attempt threshold reached.
    #[error("identity {0} is locked after too many failed attempts")]
    Locked(i64),
    /// Caller is not the owner.
    #[error("not authorized")]
    Unauthorized,
    /// Confirmation arrived with nothing staged.
    #[error("no student id is awaiting confirmation")]
    StaleSession,
}

impl LinkError {
    /// Whether this failure counts against the caller's attempt budget.
    #[must_use]
    pub const fn counts_as_attempt(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::Conflict(_)
        )
    }
}

/// Either a domain refusal or an infrastructure failure.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Domain refusal.
    #[error(transparent)]
    Link(#[from] LinkError),
    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputRule;

    #[test]
    fn test_attempt_accounting() {
        assert!(LinkError::Validation(InputError::NotNumeric(InputRule::StudentId))
            .counts_as_attempt());
        assert!(LinkError::NotFound("12345".into()).counts_as_attempt());
        assert!(LinkError::Conflict("12345".into()).counts_as_attempt());
        assert!(!LinkError::Locked(1).counts_as_attempt());
        assert!(!LinkError::Unauthorized.counts_as_attempt());
        assert!(!LinkError::StaleSession.counts_as_attempt());
    }
}
