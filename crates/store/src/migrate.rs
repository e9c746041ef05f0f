//! One-shot copy of every reading from one backend into another.
//!
//! Used to move an existing SQLite file into the networked database.
//! Rows keep their original timestamps; ids are reassigned by the
//! destination. A row that cannot be read or inserted is logged and
//! counted, and the copy carries on with the next one.

use async_trait::async_trait;
use tracing::{info, warn};

use vitalbot_core::error::StoreError;
use vitalbot_core::reading::{Reading, RecordId};

/// One exported row; `Err` when the stored values could not be decoded.
pub type ExportedRow = Result<Reading, StoreError>;

/// A backend whose full contents can be read out.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Every stored row, oldest first.
    ///
    /// The outer error means the table could not be read at all.
    async fn export_all(&self) -> Result<Vec<ExportedRow>, StoreError>;
}

/// A backend that accepts readings with an existing timestamp.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn import(&self, reading: &Reading) -> Result<RecordId, StoreError>;
}

/// Outcome of [`copy_records`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub total: usize,
    pub copied: usize,
    pub failed: usize,
}

/// Copy all readings from `source` into `destination`.
///
/// Fails only if the source cannot be read at all.
pub async fn copy_records(
    source: &dyn RecordSource,
    destination: &dyn RecordSink,
) -> Result<CopyReport, StoreError> {
    let rows = source.export_all().await?;
    let mut report = CopyReport {
        total: rows.len(),
        ..CopyReport::default()
    };

    info!(total = report.total, "Copying readings");

    for row in &rows {
        let reading = match row {
            Ok(reading) => reading,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable row");
                report.failed += 1;
                continue;
            }
        };
        match destination.import(reading).await {
            Ok(_) => report.copied += 1,
            Err(e) => {
                warn!(source_id = reading.id, error = %e, "Failed to copy reading");
                report.failed += 1;
            }
        }
    }

    info!(copied = report.copied, failed = report.failed, "Copy finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryStore;
    use vitalbot_core::reading::{NewReading, Subject};
    use vitalbot_core::store::RecordStore;

    #[tokio::test]
    async fn copies_every_row_with_timestamps() {
        let source = InMemoryStore::with_clock(|| "2024-01-01 00:00:00".into());
        for s in [120, 130] {
            let new = NewReading {
                systolic: Some(s),
                ..NewReading::for_subject(&Subject::new("u1", "A"))
            };
            source.append(new).await.unwrap();
        }

        let destination = InMemoryStore::new();
        let report = copy_records(&source, &destination).await.unwrap();

        assert_eq!(
            report,
            CopyReport {
                total: 2,
                copied: 2,
                failed: 0
            }
        );
        let page = destination.history("u1", 10).await;
        assert!(page.iter().all(|r| r.created_at == "2024-01-01 00:00:00"));
    }

    struct BrokenSource;

    #[async_trait]
    impl RecordSource for BrokenSource {
        async fn export_all(&self) -> Result<Vec<ExportedRow>, StoreError> {
            Err(StoreError::ReadFailed("no such table: records".into()))
        }
    }

    #[tokio::test]
    async fn unreadable_source_is_an_error() {
        let destination = InMemoryStore::new();
        assert!(copy_records(&BrokenSource, &destination).await.is_err());
    }

    struct FixedSource(Vec<ExportedRow>);

    #[async_trait]
    impl RecordSource for FixedSource {
        async fn export_all(&self) -> Result<Vec<ExportedRow>, StoreError> {
            Ok(self
                .0
                .iter()
                .map(|row| match row {
                    Ok(reading) => Ok(reading.clone()),
                    Err(e) => Err(StoreError::ReadFailed(e.to_string())),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn bad_rows_are_counted_not_fatal() {
        let good = Reading::from_new(
            1,
            NewReading::for_subject(&Subject::new("u1", "A")),
            "2024-01-01 00:00:00",
        );
        let bad = Reading {
            subject_id: String::new(),
            ..good.clone()
        };
        let destination = InMemoryStore::new();
        let report = copy_records(&FixedSource(vec![Ok(good), Ok(bad)]), &destination)
            .await
            .unwrap();
        assert_eq!(report.copied, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn undecodable_rows_are_counted_not_fatal() {
        let good = Reading::from_new(
            1,
            NewReading::for_subject(&Subject::new("u1", "A")),
            "2024-01-01 00:00:00",
        );
        let rows = vec![
            Ok(good),
            Err(StoreError::ReadFailed("user_id column: unexpected null".into())),
        ];
        let destination = InMemoryStore::new();
        let report = copy_records(&FixedSource(rows), &destination).await.unwrap();
        assert_eq!(
            report,
            CopyReport {
                total: 2,
                copied: 1,
                failed: 1
            }
        );
        assert_eq!(destination.len().await, 1);
    }
}
