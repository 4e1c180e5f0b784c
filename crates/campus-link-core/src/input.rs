//! Validation for text collected step by step in a conversation.
//!
//! Registration (student id) and the admin rename (first name, last name)
//! both stage one validated value per message. They share [`InputRule`] so
//! trimming and length rules are applied the same way everywhere.

use lazy_regex::regex_is_match;
use std::fmt;
use thiserror::Error;

/// Minimum number of digits in a student id.
pub const STUDENT_ID_MIN_LEN: usize = 5;
/// Minimum number of characters in a first or last name.
pub const NAME_MIN_LEN: usize = 2;
/// Maximum number of characters in a first or last name.
pub const NAME_MAX_LEN: usize = 128;

/// A staged input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRule {
    /// Institutional student id: ASCII digits only.
    StudentId,
    /// Given name.
    FirstName,
    /// Family name.
    LastName,
}

impl fmt::Display for InputRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::StudentId => "student id",
            Self::FirstName => "first name",
            Self::LastName => "last name",
        };
        f.write_str(label)
    }
}

/// Why a staged value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Contains something other than digits.
    #[error("{0} must contain digits only")]
    NotNumeric(InputRule),
    /// Shorter than the rule's minimum.
    #[error("{rule} must be at least {min} characters long")]
    TooShort {
        /// Field being staged.
        rule: InputRule,
        /// Required minimum length.
        min: usize,
    },
    /// Longer than the rule's maximum.
    #[error("{rule} must be at most {max} characters long")]
    TooLong {
        /// Field being staged.
        rule: InputRule,
        /// Allowed maximum length.
        max: usize,
    },
}

impl InputRule {
    /// Minimum accepted length in characters.
    #[must_use]
    pub const fn min_len(self) -> usize {
        match self {
            Self::StudentId => STUDENT_ID_MIN_LEN,
            Self::FirstName | Self::LastName => NAME_MIN_LEN,
        }
    }

    /// Maximum accepted length in characters, if any.
    #[must_use]
    pub const fn max_len(self) -> Option<usize> {
        match self {
            Self::StudentId => None,
            Self::FirstName | Self::LastName => Some(NAME_MAX_LEN),
        }
    }

    /// Trim `raw` and check it against the rule.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] describing the first violated constraint.
    pub fn accept(self, raw: &str) -> Result<String, InputError> {
        let value = raw.trim();

        if self == Self::StudentId && !regex_is_match!(r"^[0-9]*$", value) {
            return Err(InputError::NotNumeric(self));
        }

        let len = value.chars().count();
        if len < self.min_len() {
            return Err(InputError::TooShort {
                rule: self,
                min: self.min_len(),
            });
        }
        if let Some(max) = self.max_len() {
            if len > max {
                return Err(InputError::TooLong { rule: self, max });
            }
        }

        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_id_rules() {
        assert_eq!(
            InputRule::StudentId.accept(" 40211272003 "),
            Ok("40211272003".to_string())
        );
        assert_eq!(InputRule::StudentId.accept("12345"), Ok("12345".to_string()));
        assert_eq!(
            InputRule::StudentId.accept("abc"),
            Err(InputError::NotNumeric(InputRule::StudentId))
        );
        assert_eq!(
            InputRule::StudentId.accept("12 345"),
            Err(InputError::NotNumeric(InputRule::StudentId))
        );
        assert_eq!(
            InputRule::StudentId.accept("1234"),
            Err(InputError::TooShort {
                rule: InputRule::StudentId,
                min: 5
            })
        );
        assert!(InputRule::StudentId.accept("").is_err());
        // Non-ASCII digits are rejected
        assert!(InputRule::StudentId.accept("۴۰۲۱۱۲۷۲").is_err());
    }

    #[test]
    fn test_name_rules() {
        assert_eq!(InputRule::FirstName.accept("  Ali "), Ok("Ali".to_string()));
        assert_eq!(InputRule::LastName.accept("Li"), Ok("Li".to_string()));
        assert_eq!(
            InputRule::FirstName.accept(" A "),
            Err(InputError::TooShort {
                rule: InputRule::FirstName,
                min: 2
            })
        );
        let long = "x".repeat(NAME_MAX_LEN + 1);
        assert_eq!(
            InputRule::LastName.accept(&long),
            Err(InputError::TooLong {
                rule: InputRule::LastName,
                max: NAME_MAX_LEN
            })
        );
        // Length counts characters, not bytes
        assert!(InputRule::FirstName.accept("رضا").is_ok());
    }
}
