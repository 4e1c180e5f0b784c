//! Inline-button actions and their compact wire encoding.
//!
//! Encoding, version 1: `|`-separated fields, first field is the version.
//!
//! | Action                    | Encoded                 |
//! |---------------------------|-------------------------|
//! | confirm registration      | `1|ry`                  |
//! | decline registration      | `1|rn`                  |
//! | show grade for a course   | `1|g|<course>`          |
//! | admin op on a student     | `1|a|<op>|<student_id>` |
//!
//! Admin ops: `g` grades, `u` unlink, `e` edit name, `b` back.
//! Encoded payloads never exceed [`MAX_ENCODED_LEN`] bytes, the Telegram
//! limit for callback data.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Current encoding version.
pub const ACTION_VERSION: &str = "1";
/// Telegram callback data limit in bytes.
pub const MAX_ENCODED_LEN: usize = 64;
const SEPARATOR: char = '|';

/// Something a user can trigger from an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Confirm the staged student id.
    ConfirmYes,
    /// Reject the staged student id.
    ConfirmNo,
    /// Show the caller's grade for one course.
    Grade {
        /// Course identifier.
        course: String,
    },
    /// Owner action on a student record.
    Admin {
        /// Operation.
        op: AdminOp,
        /// Target record.
        student_id: String,
    },
}

/// Owner operations available on a selected student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminOp {
    /// View grades.
    Grades,
    /// Remove the link.
    Unlink,
    /// Start the rename flow.
    EditName,
    /// Return to the list.
    Back,
}

impl AdminOp {
    const fn code(self) -> &'static str {
        match self {
            Self::Grades => "g",
            Self::Unlink => "u",
            Self::EditName => "e",
            Self::Back => "b",
        }
    }

    fn from_code(code: &str) -> Result<Self, ActionError> {
        match code {
            "g" => Ok(Self::Grades),
            "u" => Ok(Self::Unlink),
            "e" => Ok(Self::EditName),
            "b" => Ok(Self::Back),
            other => Err(ActionError::UnknownAdminOp(other.to_string())),
        }
    }
}

/// Errors while encoding or decoding an [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Payload written by an incompatible encoder.
    #[error("unsupported action version: {0}")]
    UnsupportedVersion(String),
    /// Unrecognised action tag.
    #[error("unknown action tag: {0}")]
    UnknownTag(String),
    /// Unrecognised admin operation.
    #[error("unknown admin operation: {0}")]
    UnknownAdminOp(String),
    /// Wrong number of fields for the tag.
    #[error("action {tag} expects {expected} fields, got {found}")]
    FieldCount {
        /// Action tag.
        tag: String,
        /// Fields required after the tag.
        expected: usize,
        /// Fields present after the tag.
        found: usize,
    },
    /// A field is empty or contains the separator.
    #[error("invalid action field: {0:?}")]
    InvalidField(String),
    /// Encoded form is over the callback data limit.
    #[error("encoded action is {0} bytes, limit is {MAX_ENCODED_LEN}")]
    TooLong(usize),
}

fn check_field(field: &str) -> Result<&str, ActionError> {
    if field.is_empty() || field.contains(SEPARATOR) {
        return Err(ActionError::InvalidField(field.to_string()));
    }
    Ok(field)
}

impl Action {
    /// Encode for use as callback data.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is empty, contains `|`, or the result
    /// would exceed [`MAX_ENCODED_LEN`] bytes.
    pub fn encode(&self) -> Result<String, ActionError> {
        let encoded = match self {
            Self::ConfirmYes => format!("{ACTION_VERSION}|ry"),
            Self::ConfirmNo => format!("{ACTION_VERSION}|rn"),
            Self::Grade { course } => format!("{ACTION_VERSION}|g|{}", check_field(course)?),
            Self::Admin { op, student_id } => format!(
                "{ACTION_VERSION}|a|{}|{}",
                op.code(),
                check_field(student_id)?
            ),
        };
        if encoded.len() > MAX_ENCODED_LEN {
            return Err(ActionError::TooLong(encoded.len()));
        }
        Ok(encoded)
    }

    /// Decode callback data produced by [`Action::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error for foreign versions, unknown tags and malformed fields.
    pub fn decode(data: &str) -> Result<Self, ActionError> {
        if data.len() > MAX_ENCODED_LEN {
            return Err(ActionError::TooLong(data.len()));
        }

        let mut parts = data.split(SEPARATOR);
        let version = parts.next().unwrap_or_default();
        if version != ACTION_VERSION {
            return Err(ActionError::UnsupportedVersion(version.to_string()));
        }
        let tag = parts
            .next()
            .ok_or_else(|| ActionError::UnknownTag(String::new()))?;
        let fields: Vec<&str> = parts.collect();

        let expect = |expected: usize| -> Result<(), ActionError> {
            if fields.len() == expected {
                Ok(())
            } else {
                Err(ActionError::FieldCount {
                    tag: tag.to_string(),
                    expected,
                    found: fields.len(),
                })
            }
        };

        match tag {
            "ry" => {
                expect(0)?;
                Ok(Self::ConfirmYes)
            }
            "rn" => {
                expect(0)?;
                Ok(Self::ConfirmNo)
            }
            "g" => {
                expect(1)?;
                Ok(Self::Grade {
                    course: check_field(fields[0])?.to_string(),
                })
            }
            "a" => {
                expect(2)?;
                Ok(Self::Admin {
                    op: AdminOp::from_code(fields[0])?,
                    student_id: check_field(fields[1])?.to_string(),
                })
            }
            other => Err(ActionError::UnknownTag(other.to_string())),
        }
    }
}

impl FromStr for Action {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfirmYes => f.write_str("confirm-yes"),
            Self::ConfirmNo => f.write_str("confirm-no"),
            Self::Grade { course } => write!(f, "grade({course})"),
            Self::Admin { op, student_id } => write!(f, "admin-{op:?}({student_id})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_forms() -> Result<(), ActionError> {
        assert_eq!(Action::ConfirmYes.encode()?, "1|ry");
        assert_eq!(Action::ConfirmNo.encode()?, "1|rn");
        assert_eq!(
            Action::Grade {
                course: "Math101".into()
            }
            .encode()?,
            "1|g|Math101"
        );
        assert_eq!(
            Action::Admin {
                op: AdminOp::Unlink,
                student_id: "40211272003".into()
            }
            .encode()?,
            "1|a|u|40211272003"
        );
        Ok(())
    }

    #[test]
    fn test_decode_admin_ops() -> Result<(), ActionError> {
        for (code, op) in [
            ("g", AdminOp::Grades),
            ("u", AdminOp::Unlink),
            ("e", AdminOp::EditName),
            ("b", AdminOp::Back),
        ] {
            let decoded: Action = format!("1|a|{code}|12345").parse()?;
            assert_eq!(
                decoded,
                Action::Admin {
                    op,
                    student_id: "12345".into()
                }
            );
        }
        Ok(())
    }

    #[test]
    fn test_decode_rejects_unknown_input() {
        assert_eq!(
            Action::decode("2|ry"),
            Err(ActionError::UnsupportedVersion("2".into()))
        );
        assert_eq!(
            Action::decode("retry_no_loop"),
            Err(ActionError::UnsupportedVersion("retry_no_loop".into()))
        );
        assert_eq!(Action::decode("1|zz"), Err(ActionError::UnknownTag("zz".into())));
        assert_eq!(Action::decode("1"), Err(ActionError::UnknownTag(String::new())));
        assert_eq!(
            Action::decode("1|a|x|12345"),
            Err(ActionError::UnknownAdminOp("x".into()))
        );
        assert_eq!(
            Action::decode("1|ry|extra"),
            Err(ActionError::FieldCount {
                tag: "ry".into(),
                expected: 0,
                found: 1
            })
        );
        assert_eq!(
            Action::decode("1|g|"),
            Err(ActionError::InvalidField(String::new()))
        );
        assert!(matches!(
            Action::decode(&format!("1|g|{}", "x".repeat(70))),
            Err(ActionError::TooLong(_))
        ));
    }

    #[test]
    fn test_encode_rejects_bad_fields() {
        let piped = Action::Grade {
            course: "a|b".into(),
        };
        assert_eq!(piped.encode(), Err(ActionError::InvalidField("a|b".into())));

        let long = Action::Grade {
            course: "c".repeat(MAX_ENCODED_LEN),
        };
        assert!(matches!(long.encode(), Err(ActionError::TooLong(_))));
    }
}
