//! Registration UI components

use super::{action_button, escape, View};
use campus_link_core::action::Action;
use campus_link_core::input::InputError;
use campus_link_core::registration::RegistrationReply;
use campus_link_core::storage::StudentRecord;
use campus_link_core::LinkError;
use teloxide::types::{InlineKeyboardMarkup, KeyboardRemove};

/// Label of the confirm button.
pub const BTN_CONFIRM: &str = "✅ Yes, that's me";
/// Label of the decline button.
pub const BTN_DECLINE: &str = "❌ No";

const LOCKED: &str =
    "⛔️ Too many failed attempts. Registration is locked, please contact the administrator.";

/// Yes/no keyboard under the confirmation prompt.
#[must_use]
pub fn confirmation_keyboard() -> InlineKeyboardMarkup {
    let row = [
        action_button(BTN_CONFIRM, &Action::ConfirmYes),
        action_button(BTN_DECLINE, &Action::ConfirmNo),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![row])
}

/// Human explanation of a rejected student id.
#[must_use]
pub fn rejection_reason(error: &LinkError) -> String {
    match error {
        LinkError::Validation(InputError::NotNumeric(_)) => {
            "The student ID must contain digits only.".to_string()
        }
        LinkError::Validation(InputError::TooShort { min, .. }) => {
            format!("The student ID must be at least {min} digits long.")
        }
        LinkError::Validation(InputError::TooLong { max, .. }) => {
            format!("The student ID must be at most {max} characters long.")
        }
        LinkError::NotFound(id) => {
            format!("Student ID <code>{}</code> was not found.", escape(id))
        }
        LinkError::Conflict(id) => format!(
            "Student ID <code>{}</code> is already linked to another account.",
            escape(id)
        ),
        other => escape(&other.to_string()),
    }
}

fn attempts_left(remaining: u32) -> String {
    format!("Attempts left: <b>{remaining}</b>")
}

fn display_name(student: &StudentRecord) -> String {
    escape(&student.full_name())
}

/// Render a registration reply.
#[must_use]
pub fn render(reply: &RegistrationReply) -> View {
    match reply {
        RegistrationReply::AlreadyRegistered(link) => View::text(format!(
            "✅ You are already registered as student <code>{}</code>.\nUse /grades to see your grades.",
            escape(&link.student_id)
        )),
        RegistrationReply::Refused(LinkError::Locked(_)) => View::text(LOCKED),
        RegistrationReply::Refused(LinkError::StaleSession) => {
            View::text("⌛️ This confirmation has expired. Send /start to register again.")
        }
        RegistrationReply::Refused(error) => View::text(format!("❌ {}", rejection_reason(error))),
        RegistrationReply::AskStudentId { remaining } => View::with_markup(
            format!(
                "👋 Welcome!\nPlease send your student ID.\n{}",
                attempts_left(*remaining)
            ),
            KeyboardRemove::new(),
        ),
        RegistrationReply::Rejected { error, remaining } => View::text(format!(
            "❌ {}\n{}",
            rejection_reason(error),
            attempts_left(*remaining)
        )),
        RegistrationReply::LockedOut { error } => {
            View::text(format!("❌ {}\n{LOCKED}", rejection_reason(error)))
        }
        RegistrationReply::ConfirmStudent(student) => View::with_markup(
            format!(
                "Is this you?\n\n<b>{}</b>\nStudent ID: <code>{}</code>",
                display_name(student),
                escape(&student.student_id)
            ),
            confirmation_keyboard(),
        ),
        RegistrationReply::Registered { link, student } => {
            let name = student
                .as_ref()
                .map_or_else(|| escape(&link.student_id), display_name);
            View::text(format!(
                "🎉 Registration complete! Welcome, <b>{name}</b>.\nUse /grades to see your grades."
            ))
        }
        RegistrationReply::LinkTaken {
            student_id,
            remaining,
        } => View::text(format!(
            "⚠️ Student ID <code>{}</code> was just linked to another account.\nPlease send a different student ID.\n{}",
            escape(student_id),
            attempts_left(*remaining)
        )),
        RegistrationReply::Declined { remaining } => View::text(format!(
            "OK, please send your student ID again.\n{}",
            attempts_left(*remaining)
        )),
        RegistrationReply::Cancelled => {
            View::with_markup("Cancelled.", KeyboardRemove::new())
        }
    }
}

/// Hint for text sent outside of any conversation.
#[must_use]
pub fn idle_hint() -> View {
    View::text("Send /start to register or /grades to see your grades.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_link_core::input::InputRule;
    use chrono::Utc;
    use insta::assert_snapshot;

    fn student(first_name: &str, last_name: &str) -> StudentRecord {
        StudentRecord {
            student_id: "40211272003".into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_confirmation_prompt_escapes_names() {
        let view = render(&RegistrationReply::ConfirmStudent(student("Ali", "<Rezai>")));
        assert_snapshot!(view.text, @r"
        Is this you?

        <b>Ali &lt;Rezai&gt;</b>
        Student ID: <code>40211272003</code>
        ");
        assert!(view.markup.is_some());
    }

    #[test]
    fn test_rejections() {
        let view = render(&RegistrationReply::Rejected {
            error: LinkError::Validation(InputError::NotNumeric(InputRule::StudentId)),
            remaining: 2,
        });
        assert_snapshot!(view.text, @r"
        ❌ The student ID must contain digits only.
        Attempts left: <b>2</b>
        ");

        let view = render(&RegistrationReply::LockedOut {
            error: LinkError::Conflict("12345".into()),
        });
        assert_snapshot!(view.text, @r"
        ❌ Student ID <code>12345</code> is already linked to another account.
        ⛔️ Too many failed attempts. Registration is locked, please contact the administrator.
        ");
    }

    #[test]
    fn test_confirmation_keyboard_data() {
        let keyboard = confirmation_keyboard();
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0].len(), 2);
    }
}
