//! RecordStore trait: persistent, append-only storage of readings.
//!
//! Two interchangeable backends implement this contract (an embedded SQLite
//! file and a networked PostgreSQL database); an in-memory one exists for
//! tests. The backend is selected once at startup.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::reading::{NewReading, Reading, RecordId};

/// Page size used when the caller does not supply one.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// The core RecordStore trait.
///
/// Each call is a self-contained unit of work: a connection is acquired,
/// the statement runs and commits, and the connection is released.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "postgres", "in_memory").
    fn name(&self) -> &str;

    /// Ensure the schema exists. Idempotent; safe on every startup.
    ///
    /// A legacy table missing the label column gets it added in place.
    async fn initialize(&self) -> std::result::Result<(), StoreError>;

    /// Append a reading and return its surrogate id.
    async fn append(&self, reading: NewReading) -> std::result::Result<RecordId, StoreError>;

    /// The most recent readings of a subject, newest first, at most `limit`.
    ///
    /// Never fails: backend errors are logged and yield an empty page.
    async fn history(&self, subject_id: &str, limit: usize) -> Vec<Reading>;
}

/// Reject readings that would violate the store's invariants.
pub fn validate_new_reading(reading: &NewReading) -> std::result::Result<(), StoreError> {
    if reading.subject_id.trim().is_empty() {
        return Err(StoreError::InvalidRecord("subject id is empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Subject;

    #[test]
    fn empty_subject_rejected() {
        let reading = NewReading::for_subject(&Subject::new("  ", "nobody"));
        assert!(matches!(
            validate_new_reading(&reading),
            Err(StoreError::InvalidRecord(_))
        ));
    }

    #[test]
    fn regular_subject_accepted() {
        let reading = NewReading::for_subject(&Subject::new("staff-9", "Li"));
        assert!(validate_new_reading(&reading).is_ok());
    }

    #[test]
    fn default_page_size() {
        assert_eq!(DEFAULT_HISTORY_LIMIT, 10);
    }
}
