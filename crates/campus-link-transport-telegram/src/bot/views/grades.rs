//! Grades UI components

use super::{action_button, escape, View};
use campus_link_core::action::Action;
use campus_link_core::sources::CourseGrade;
use teloxide::types::InlineKeyboardMarkup;

const COURSES_PER_ROW: usize = 2;

/// One button per course, two per row.
#[must_use]
pub fn course_keyboard(courses: &[String]) -> InlineKeyboardMarkup {
    let buttons: Vec<_> = courses
        .iter()
        .filter_map(|course| {
            action_button(
                course.clone(),
                &Action::Grade {
                    course: course.clone(),
                },
            )
        })
        .collect();
    InlineKeyboardMarkup::new(buttons.chunks(COURSES_PER_ROW).map(<[_]>::to_vec))
}

/// `/grades` menu.
#[must_use]
pub fn course_menu(courses: &[String]) -> View {
    if courses.is_empty() {
        return View::text("📚 No courses are available yet.");
    }
    View::with_markup("📚 Choose a course:", course_keyboard(courses))
}

/// One course grade of the caller.
#[must_use]
pub fn grade(course: &str, grade: Option<&str>) -> View {
    match grade {
        Some(grade) => View::text(format!(
            "📘 <b>{}</b>: {}",
            escape(course),
            escape(grade)
        )),
        None => View::text(format!("No grade recorded for <b>{}</b>.", escape(course))),
    }
}

/// All grades of one student, as shown to the owner.
#[must_use]
pub fn grade_sheet(student_id: &str, grades: &[CourseGrade], no_courses: bool) -> View {
    if no_courses {
        return View::text("📚 No courses are available yet.");
    }
    if grades.is_empty() {
        return View::text(format!(
            "No grades recorded for <code>{}</code>.",
            escape(student_id)
        ));
    }
    let lines: Vec<String> = grades
        .iter()
        .map(|g| format!("• {}: <b>{}</b>", escape(&g.course), escape(&g.grade)))
        .collect();
    View::text(format!(
        "📘 Grades of <code>{}</code>\n\n{}",
        escape(student_id),
        lines.join("\n")
    ))
}

/// `/grades` from an identity without a link.
#[must_use]
pub fn not_registered() -> View {
    View::text("You are not registered yet. Send /start to register.")
}
