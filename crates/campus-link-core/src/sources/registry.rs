use super::SourceError;
use crate::storage::{IdentityStore, StoreError};
use async_trait::async_trait;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// One `(student_id, first_name, last_name)` triple from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRow {
    /// Institutional student id.
    pub student_id: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

/// Source of registry rows, read at registration entry.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Current rows. Incomplete rows are already filtered out.
    async fn rows(&self) -> Result<Vec<RegistryRow>, SourceError>;
}

/// Registry backed by a CSV file with a `student_id,first_name,last_name` header.
#[derive(Debug, Clone)]
pub struct CsvRegistry {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    student_id: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

impl CsvRegistry {
    /// Registry reading `path`. A missing file reads as empty.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse(bytes: &[u8]) -> Result<Vec<RegistryRow>, SourceError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(bytes);

        let mut rows = Vec::new();
        for record in reader.deserialize::<CsvRow>() {
            let row = record?;
            if row.student_id.is_empty() || row.first_name.is_empty() || row.last_name.is_empty()
            {
                debug!("Skipping incomplete registry row: {row:?}");
                continue;
            }
            rows.push(RegistryRow {
                student_id: row.student_id,
                first_name: row.first_name,
                last_name: row.last_name,
            });
        }
        Ok(rows)
    }
}

#[async_trait]
impl RegistrySource for CsvRegistry {
    async fn rows(&self) -> Result<Vec<RegistryRow>, SourceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Registry file {} not found", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&bytes)
    }
}

/// Result of one registry sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Rows read from the source.
    pub seen: usize,
    /// Rows that created or changed a record.
    pub changed: usize,
}

/// Upsert every row into the store. Unchanged rows are no-ops.
///
/// # Errors
///
/// Returns a `StoreError` on the first failed upsert.
pub async fn sync_registry(
    store: &dyn IdentityStore,
    rows: &[RegistryRow],
) -> Result<SyncReport, StoreError> {
    let mut report = SyncReport {
        seen: rows.len(),
        changed: 0,
    };
    for row in rows {
        if store
            .upsert_student(&row.student_id, &row.first_name, &row.last_name)
            .await?
        {
            report.changed += 1;
        }
    }
    if report.changed > 0 {
        info!(
            "Registry sync: {} rows, {} created or updated",
            report.seen, report.changed
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_skips_incomplete_rows() -> Result<(), SourceError> {
        let csv = "\u{feff}student_id, first_name ,last_name\n\
                   40211272003, Ali ,Rezai\n\
                   40211272004,,Ahmadi\n\
                   ,Sara,Ahmadi\n\
                   40211272005,Reza,Karimi\n";
        let rows = CsvRegistry::parse(csv.as_bytes())?;
        assert_eq!(
            rows,
            vec![
                RegistryRow {
                    student_id: "40211272003".into(),
                    first_name: "Ali".into(),
                    last_name: "Rezai".into(),
                },
                RegistryRow {
                    student_id: "40211272005".into(),
                    first_name: "Reza".into(),
                    last_name: "Karimi".into(),
                },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() -> Result<(), SourceError> {
        let dir = tempfile::tempdir()?;
        let registry = CsvRegistry::new(dir.path().join("absent.csv"));
        assert!(registry.rows().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_reads_file() -> Result<(), SourceError> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "student_id,first_name,last_name")?;
        writeln!(file, "12345,Ali,Rezai")?;

        let rows = CsvRegistry::new(file.path()).rows().await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].student_id, "12345");
        Ok(())
    }
}
