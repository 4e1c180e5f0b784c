//! Admin UI components

use super::{action_button, escape, grades, View};
use campus_link_core::action::{Action, AdminOp};
use campus_link_core::admin::{AdminReply, StudentPage};
use campus_link_core::input::InputError;
use campus_link_core::storage::{Link, StudentRecord};
use teloxide::types::{InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, KeyboardRemove};

/// Opens the student list from the admin menu.
pub const BTN_STUDENTS: &str = "Students";
/// Leaves the current admin screen.
pub const BTN_BACK: &str = "Back";
/// Previous list page.
pub const BTN_PREV: &str = "◀️ Prev";
/// Next list page.
pub const BTN_NEXT: &str = "Next ▶️";

/// Label of one list entry; `select` accepts it back verbatim.
#[must_use]
pub fn student_label(student: &StudentRecord) -> String {
    format!("{} - {}", student.student_id, student.full_name())
}

/// Top-level admin keyboard.
#[must_use]
pub fn admin_menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(BTN_STUDENTS)],
        vec![KeyboardButton::new(BTN_BACK)],
    ])
    .resize_keyboard()
}

/// One entry per row, then navigation, then Back.
#[must_use]
pub fn student_list_keyboard(page: &StudentPage) -> KeyboardMarkup {
    let mut keyboard: Vec<Vec<KeyboardButton>> = page
        .students
        .iter()
        .map(|s| vec![KeyboardButton::new(student_label(s))])
        .collect();

    let mut nav = Vec::new();
    if page.has_prev {
        nav.push(KeyboardButton::new(BTN_PREV));
    }
    if page.has_next {
        nav.push(KeyboardButton::new(BTN_NEXT));
    }
    if !nav.is_empty() {
        keyboard.push(nav);
    }
    keyboard.push(vec![KeyboardButton::new(BTN_BACK)]);
    KeyboardMarkup::new(keyboard).resize_keyboard()
}

/// Inline actions on a selected student.
#[must_use]
pub fn student_actions_keyboard(student_id: &str) -> InlineKeyboardMarkup {
    let button = |label: &str, op: AdminOp| {
        action_button(
            label,
            &Action::Admin {
                op,
                student_id: student_id.to_string(),
            },
        )
    };
    let rows = vec![
        [button("📘 View Grades", AdminOp::Grades), button("🔓 Unlink", AdminOp::Unlink)],
        [button("✏️ Edit Name", AdminOp::EditName), button("⬅️ Back", AdminOp::Back)],
    ];
    InlineKeyboardMarkup::new(
        rows.into_iter()
            .map(|row| row.into_iter().flatten().collect::<Vec<_>>()),
    )
}

fn page_text(page: &StudentPage) -> String {
    if page.total == 0 {
        return "The registry is empty.".to_string();
    }
    format!(
        "👥 Students: {} (page {}/{})\nPick a student below.",
        page.total,
        page.page + 1,
        page.page_count
    )
}

fn student_card(student: &StudentRecord, link: Option<&Link>) -> String {
    let status = link.map_or_else(
        || "not linked".to_string(),
        |l| format!("linked to Telegram <code>{}</code>", l.telegram_id),
    );
    format!(
        "🎓 <b>{}</b>\nStudent ID: <code>{}</code>\nStatus: {status}",
        escape(&student.full_name()),
        escape(&student.student_id)
    )
}

fn invalid_name(error: &InputError) -> String {
    match error {
        InputError::TooShort { rule, min } => {
            format!("❌ The {rule} must be at least {min} characters long. Try again.")
        }
        InputError::TooLong { rule, max } => {
            format!("❌ The {rule} must be at most {max} characters long. Try again.")
        }
        InputError::NotNumeric(rule) => format!("❌ Invalid {rule}. Try again."),
    }
}

/// Render an admin reply.
#[must_use]
pub fn render(reply: &AdminReply) -> View {
    match reply {
        AdminReply::Menu => View::with_markup("🛠 Admin menu", admin_menu_keyboard()),
        AdminReply::Page(page) => View::with_markup(page_text(page), student_list_keyboard(page)),
        AdminReply::Selected { student, link } => View::with_markup(
            student_card(student, link.as_ref()),
            student_actions_keyboard(&student.student_id),
        ),
        AdminReply::NotFound { query, page } => View::with_markup(
            format!("No student with ID <code>{}</code>.", escape(query)),
            student_list_keyboard(page),
        ),
        AdminReply::UnknownSelection(page) => View::with_markup(
            "Pick a student from the list.",
            student_list_keyboard(page),
        ),
        AdminReply::Unlinked {
            student_id,
            was_linked: true,
        } => View::text(format!(
            "🔓 Student <code>{}</code> was unlinked and can register again.",
            escape(student_id)
        )),
        AdminReply::Unlinked {
            student_id,
            was_linked: false,
        } => View::text(format!(
            "Student <code>{}</code> was not linked.",
            escape(student_id)
        )),
        AdminReply::AskFirstName(student) => View::with_markup(
            format!(
                "✏️ Renaming <b>{}</b>.\nSend the new first name, or /cancel.",
                escape(&student.full_name())
            ),
            KeyboardRemove::new(),
        ),
        AdminReply::AskLastName { first_name, .. } => View::text(format!(
            "First name: <b>{}</b>\nNow send the new last name.",
            escape(first_name)
        )),
        AdminReply::InvalidName(error) => View::text(invalid_name(error)),
        AdminReply::Renamed(student) => View::text(format!(
            "✅ Saved: <b>{}</b> (<code>{}</code>)",
            escape(&student.full_name()),
            escape(&student.student_id)
        )),
        AdminReply::RenameFailed { student_id } => View::with_markup(
            format!(
                "Student <code>{}</code> no longer exists. Nothing was changed.",
                escape(student_id)
            ),
            admin_menu_keyboard(),
        ),
        AdminReply::Grades {
            student_id,
            grades: list,
            no_courses,
        } => grades::grade_sheet(student_id, list, *no_courses),
        AdminReply::Unlocked(record) => View::text(format!(
            "🔑 Telegram <code>{}</code> can register again.",
            record.telegram_id
        )),
    }
}

/// Leaving the admin menu.
#[must_use]
pub fn menu_closed() -> View {
    View::with_markup("Admin menu closed.", KeyboardRemove::new())
}

/// Bad `/unlock` argument.
#[must_use]
pub fn unlock_usage() -> View {
    View::text("Usage: <code>/unlock &lt;telegram_id&gt;</code>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_link_core::input::InputRule;
    use chrono::Utc;
    use insta::assert_snapshot;

    fn student(id: &str, first_name: &str, last_name: &str) -> StudentRecord {
        StudentRecord {
            student_id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn page(has_prev: bool, has_next: bool) -> StudentPage {
        StudentPage {
            students: vec![student("500001", "Sara", "Ahmadi"), student("500002", "Ali", "Rezai")],
            page: 1,
            has_prev,
            has_next,
            total: 6,
            page_count: 3,
        }
    }

    #[test]
    fn test_list_keyboard_navigation() {
        let keyboard = student_list_keyboard(&page(true, true));
        let labels: Vec<Vec<&str>> = keyboard
            .keyboard
            .iter()
            .map(|row| row.iter().map(|b| b.text.as_str()).collect())
            .collect();
        assert_eq!(
            labels,
            vec![
                vec!["500001 - Sara Ahmadi"],
                vec!["500002 - Ali Rezai"],
                vec![BTN_PREV, BTN_NEXT],
                vec![BTN_BACK],
            ]
        );

        let keyboard = student_list_keyboard(&page(false, false));
        assert_eq!(keyboard.keyboard.len(), 3);
    }

    #[test]
    fn test_page_text() {
        assert_snapshot!(render(&AdminReply::Page(page(true, true))).text, @r"
        👥 Students: 6 (page 2/3)
        Pick a student below.
        ");
    }

    #[test]
    fn test_student_card() {
        let view = render(&AdminReply::Selected {
            student: student("500001", "Sara", "Ahmadi"),
            link: None,
        });
        assert_snapshot!(view.text, @r"
        🎓 <b>Sara Ahmadi</b>
        Student ID: <code>500001</code>
        Status: not linked
        ");
    }

    #[test]
    fn test_invalid_name() {
        let view = render(&AdminReply::InvalidName(InputError::TooShort {
            rule: InputRule::FirstName,
            min: 2,
        }));
        assert_snapshot!(view.text, @"❌ The first name must be at least 2 characters long. Try again.");
    }
}
