//! In-memory record store: useful for testing and dry runs.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use vitalbot_core::error::StoreError;
use vitalbot_core::reading::{NewReading, Reading, RecordId, TIMESTAMP_FORMAT};
use vitalbot_core::store::{RecordStore, validate_new_reading};

use crate::migrate::{ExportedRow, RecordSink, RecordSource};

type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// A [`RecordStore`] that keeps readings in a Vec.
pub struct InMemoryStore {
    records: RwLock<Vec<Reading>>,
    clock: Clock,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(|| chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string())
    }

    /// Stamp new readings with `clock()` instead of the current UTC time.
    pub fn with_clock(clock: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            clock: Arc::new(clock),
        }
    }

    /// Number of stored readings across all subjects.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn append(&self, reading: NewReading) -> Result<RecordId, StoreError> {
        validate_new_reading(&reading)?;
        let mut records = self.records.write().await;
        let id = records.last().map_or(1, |r| r.id + 1);
        records.push(Reading::from_new(id, reading, (self.clock)()));
        Ok(id)
    }

    async fn history(&self, subject_id: &str, limit: usize) -> Vec<Reading> {
        let records = self.records.read().await;
        let mut page: Vec<Reading> = records
            .iter()
            .filter(|r| r.subject_id == subject_id)
            .cloned()
            .collect();
        page.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        page.truncate(limit);
        page
    }
}

#[async_trait]
impl RecordSource for InMemoryStore {
    async fn export_all(&self) -> Result<Vec<ExportedRow>, StoreError> {
        Ok(self.records.read().await.iter().cloned().map(Ok).collect())
    }
}

#[async_trait]
impl RecordSink for InMemoryStore {
    async fn import(&self, reading: &Reading) -> Result<RecordId, StoreError> {
        if reading.subject_id.trim().is_empty() {
            return Err(StoreError::InvalidRecord("subject id is empty".into()));
        }
        let mut records = self.records.write().await;
        let id = records.last().map_or(1, |r| r.id + 1);
        records.push(Reading {
            id,
            ..reading.clone()
        });
        Ok(id)
    }
}
