//! External data sources
//!
//! The student registry and the grade sheets live outside the database as
//! CSV files maintained by staff. The flows only see the [`RegistrySource`]
//! and [`GradeBook`] traits.

mod grades;
mod registry;

pub use grades::{collect_grades, CourseGrade, CsvGradeBook, GradeBook};
pub use registry::{sync_registry, CsvRegistry, RegistryRow, RegistrySource, SyncReport};

use thiserror::Error;

/// Errors reading an external source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
