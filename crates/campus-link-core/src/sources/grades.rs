use super::SourceError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read-only grade lookup.
#[async_trait]
pub trait GradeBook: Send + Sync {
    /// Known course identifiers, sorted.
    async fn list_courses(&self) -> Result<Vec<String>, SourceError>;
    /// Grade of `student_id` in `course`, if recorded.
    async fn get_grade(&self, course: &str, student_id: &str)
        -> Result<Option<String>, SourceError>;
}

/// One course and the grade recorded for a student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseGrade {
    /// Course identifier.
    pub course: String,
    /// Recorded grade.
    pub grade: String,
}

/// Every recorded grade of `student_id`, in course order.
///
/// # Errors
///
/// Returns a `SourceError` if the grade book cannot be read.
pub async fn collect_grades(
    book: &dyn GradeBook,
    student_id: &str,
) -> Result<Vec<CourseGrade>, SourceError> {
    let mut grades = Vec::new();
    for course in book.list_courses().await? {
        if let Some(grade) = book.get_grade(&course, student_id).await? {
            grades.push(CourseGrade { course, grade });
        }
    }
    Ok(grades)
}

/// Grade book backed by a directory with one `<course>.csv` per course.
///
/// Each sheet has a `student_id` column and a `grade` column (`score` is
/// accepted as a fallback).
#[derive(Debug, Clone)]
pub struct CsvGradeBook {
    dir: PathBuf,
}

impl CsvGradeBook {
    /// Grade book reading sheets from `dir`. A missing directory has no courses.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Course ids come from callback data; only plain file stems are accepted.
    fn sheet_path(&self, course: &str) -> Option<PathBuf> {
        let plain = !course.is_empty()
            && !course.starts_with('.')
            && Path::new(course).file_name().and_then(|n| n.to_str()) == Some(course);
        plain.then(|| self.dir.join(format!("{course}.csv")))
    }

    fn find_grade(bytes: &[u8], student_id: &str) -> Result<Option<String>, SourceError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(bytes);

        for record in reader.deserialize::<HashMap<String, String>>() {
            let row = record?;
            if row.get("student_id").map(String::as_str) != Some(student_id) {
                continue;
            }
            let grade = row
                .get("grade")
                .filter(|g| !g.is_empty())
                .or_else(|| row.get("score"))
                .filter(|g| !g.is_empty())
                .cloned();
            return Ok(grade);
        }
        Ok(None)
    }
}

#[async_trait]
impl GradeBook for CsvGradeBook {
    async fn list_courses(&self) -> Result<Vec<String>, SourceError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Grades directory {} not found", self.dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut courses = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                courses.push(stem.to_string());
            }
        }
        courses.sort();
        Ok(courses)
    }

    async fn get_grade(
        &self,
        course: &str,
        student_id: &str,
    ) -> Result<Option<String>, SourceError> {
        let Some(path) = self.sheet_path(course) else {
            warn!("Rejected grade lookup for suspicious course id {course:?}");
            return Ok(None);
        };
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::find_grade(&bytes, student_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sheet(dir: &Path, name: &str, body: &str) -> std::io::Result<()> {
        std::fs::write(dir.join(name), body)
    }

    #[tokio::test]
    async fn test_lists_sorted_csv_stems() -> Result<(), SourceError> {
        let dir = tempfile::tempdir()?;
        write_sheet(dir.path(), "Physics.csv", "student_id,grade\n")?;
        write_sheet(dir.path(), "Algebra.csv", "student_id,grade\n")?;
        write_sheet(dir.path(), "notes.txt", "ignored")?;

        let book = CsvGradeBook::new(dir.path());
        assert_eq!(book.list_courses().await?, vec!["Algebra", "Physics"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_grade_lookup_with_score_fallback() -> Result<(), SourceError> {
        let dir = tempfile::tempdir()?;
        write_sheet(
            dir.path(),
            "Algebra.csv",
            "student_id,grade\n12345,18.5\n12346,\n",
        )?;
        write_sheet(dir.path(), "Physics.csv", "student_id,score\n12345, 17 \n")?;

        let book = CsvGradeBook::new(dir.path());
        assert_eq!(book.get_grade("Algebra", "12345").await?, Some("18.5".into()));
        assert_eq!(book.get_grade("Algebra", "12346").await?, None);
        assert_eq!(book.get_grade("Algebra", "99999").await?, None);
        assert_eq!(book.get_grade("Physics", "12345").await?, Some("17".into()));
        assert_eq!(book.get_grade("Chemistry", "12345").await?, None);

        let all = collect_grades(&book, "12345").await?;
        assert_eq!(
            all,
            vec![
                CourseGrade {
                    course: "Algebra".into(),
                    grade: "18.5".into()
                },
                CourseGrade {
                    course: "Physics".into(),
                    grade: "17".into()
                },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() -> Result<(), SourceError> {
        let dir = tempfile::tempdir()?;
        let book = CsvGradeBook::new(dir.path().join("grades"));
        assert_eq!(book.get_grade("../secret", "12345").await?, None);
        assert_eq!(book.get_grade(".hidden", "12345").await?, None);
        assert!(book.list_courses().await?.is_empty());
        Ok(())
    }
}
