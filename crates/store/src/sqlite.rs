//! SQLite record store: the embedded single-file backend.
//!
//! One table, `records`, in the file named by `storage.sqlite_path`
//! (`bp_data.db` by default). Timestamps are stored by SQLite's
//! `CURRENT_TIMESTAMP`, which is UTC text in `YYYY-MM-DD HH:MM:SS` form.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use vitalbot_core::error::StoreError;
use vitalbot_core::reading::{NewReading, Reading, RecordId};
use vitalbot_core::store::{RecordStore, validate_new_reading};

use crate::migrate::{ExportedRow, RecordSink, RecordSource};

const SELECT_COLUMNS: &str = "id, user_id, user_name, systolic, diastolic, pulse, image_url, result, \
     COALESCE(strftime('%Y-%m-%d %H:%M:%S', created_at), created_at, '') AS created_at";

/// SQLite-backed [`RecordStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    ///
    /// The schema is not touched; call [`RecordStore::initialize`].
    pub async fn open(path: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite at {path}: {e}")))?;

        debug!(path, "SQLite record store opened");
        Ok(Self { pool })
    }

    /// Create from an existing pool (useful for testing).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn has_result_column(&self) -> Result<bool, StoreError> {
        let columns = sqlx::query("PRAGMA table_info(records)")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(format!("table_info: {e}")))?;

        Ok(columns.iter().any(|row| {
            row.try_get::<String, _>("name")
                .map(|name| name == "result")
                .unwrap_or(false)
        }))
    }

    fn row_to_reading(row: &SqliteRow) -> Result<Reading, StoreError> {
        let read = |column: &str, e: sqlx::Error| StoreError::ReadFailed(format!("{column} column: {e}"));

        Ok(Reading {
            id: row.try_get("id").map_err(|e| read("id", e))?,
            subject_id: row.try_get("user_id").map_err(|e| read("user_id", e))?,
            subject_name: row.try_get("user_name").map_err(|e| read("user_name", e))?,
            systolic: lenient_int(row, "systolic"),
            diastolic: lenient_int(row, "diastolic"),
            pulse: lenient_int(row, "pulse"),
            image_url: row.try_get("image_url").map_err(|e| read("image_url", e))?,
            label: row.try_get("result").map_err(|e| read("result", e))?,
            created_at: row.try_get("created_at").map_err(|e| read("created_at", e))?,
        })
    }

    async fn query_history(&self, subject_id: &str, limit: usize) -> Result<Vec<Reading>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM records WHERE user_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(subject_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::ReadFailed(format!("history query: {e}")))?;

        Ok(rows
            .iter()
            .filter_map(|row| match Self::row_to_reading(row) {
                Ok(reading) => Some(reading),
                Err(e) => {
                    warn!(subject = %subject_id, error = %e, "Skipping unreadable row");
                    None
                }
            })
            .collect())
    }
}

/// Read a measurement column without trusting its storage class.
///
/// Older files hold whatever the model returned, so a column declared
/// INTEGER may contain REAL or TEXT values (`"--"`, `"128"`). Anything that
/// is not a whole number in `i32` range reads as absent.
fn lenient_int(row: &SqliteRow, column: &str) -> Option<i32> {
    if let Ok(value) = row.try_get::<Option<i64>, _>(column) {
        return value.and_then(|n| i32::try_from(n).ok());
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(column) {
        return value.and_then(whole_i32);
    }
    match row.try_get::<Option<String>, _>(column) {
        Ok(Some(text)) => {
            let text = text.trim();
            let parsed = text
                .parse::<i32>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(whole_i32));
            if parsed.is_none() {
                debug!(column, value = text, "Non-numeric measurement read as absent");
            }
            parsed
        }
        _ => None,
    }
}

fn whole_i32(f: f64) -> Option<i32> {
    if !f.is_finite() {
        return None;
    }
    let rounded = f.round();
    if rounded < f64::from(i32::MIN) || rounded > f64::from(i32::MAX) {
        return None;
    }
    Some(rounded as i32)
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL,
                user_name   TEXT,
                systolic    INTEGER,
                diastolic   INTEGER,
                pulse       INTEGER,
                image_url   TEXT,
                result      TEXT,
                created_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(format!("records table: {e}")))?;

        if !self.has_result_column().await? {
            info!("Adding result column to legacy records table");
            sqlx::query("ALTER TABLE records ADD COLUMN result TEXT")
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Migration(format!("result column: {e}")))?;
        }

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_records_user_created ON records(user_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(format!("user index: {e}")))?;

        debug!("SQLite schema ready");
        Ok(())
    }

    async fn append(&self, reading: NewReading) -> Result<RecordId, StoreError> {
        validate_new_reading(&reading)?;

        let result = sqlx::query(
            "INSERT INTO records (user_id, user_name, systolic, diastolic, pulse, image_url, result) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&reading.subject_id)
        .bind(&reading.subject_name)
        .bind(reading.systolic)
        .bind(reading.diastolic)
        .bind(reading.pulse)
        .bind(&reading.image_url)
        .bind(&reading.label)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::WriteFailed(format!("insert: {e}")))?;

        let id = result.last_insert_rowid();
        debug!(record_id = id, subject = %reading.subject_id, "Reading stored");
        Ok(id)
    }

    async fn history(&self, subject_id: &str, limit: usize) -> Vec<Reading> {
        match self.query_history(subject_id, limit).await {
            Ok(readings) => readings,
            Err(e) => {
                warn!(subject = %subject_id, error = %e, "History lookup failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl RecordSource for SqliteStore {
    async fn export_all(&self) -> Result<Vec<ExportedRow>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM records ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::ReadFailed(format!("export query: {e}")))?;

        Ok(rows.iter().map(Self::row_to_reading).collect())
    }
}

#[async_trait]
impl RecordSink for SqliteStore {
    async fn import(&self, reading: &Reading) -> Result<RecordId, StoreError> {
        if reading.subject_id.trim().is_empty() {
            return Err(StoreError::InvalidRecord("subject id is empty".into()));
        }

        let result = sqlx::query(
            "INSERT INTO records (user_id, user_name, systolic, diastolic, pulse, image_url, result, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&reading.subject_id)
        .bind(&reading.subject_name)
        .bind(reading.systolic)
        .bind(reading.diastolic)
        .bind(reading.pulse)
        .bind(&reading.image_url)
        .bind(&reading.label)
        .bind(&reading.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::WriteFailed(format!("import: {e}")))?;

        Ok(result.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitalbot_core::reading::Subject;

    async fn test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bp_test.db");
        let store = SqliteStore::open(path.to_str().unwrap(), 2).await.unwrap();
        store.initialize().await.unwrap();
        (store, dir)
    }

    fn reading(subject: &str, systolic: i32) -> NewReading {
        NewReading {
            systolic: Some(systolic),
            diastolic: Some(80),
            pulse: Some(70),
            image_url: Some("https://img.example/1.jpg".into()),
            label: Some("normal".into()),
            ..NewReading::for_subject(&Subject::new(subject, "Test User"))
        }
    }

    #[tokio::test]
    async fn append_assigns_increasing_ids() {
        let (store, _dir) = test_store().await;
        let a = store.append(reading("u1", 120)).await.unwrap();
        let b = store.append(reading("u1", 121)).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_scoped_to_subject() {
        let (store, _dir) = test_store().await;
        for s in [110, 120, 130] {
            store.append(reading("u1", s)).await.unwrap();
        }
        store.append(reading("u2", 150)).await.unwrap();

        let page = store.history("u1", 10).await;
        let systolic: Vec<_> = page.iter().map(|r| r.systolic).collect();
        assert_eq!(systolic, vec![Some(130), Some(120), Some(110)]);
        assert!(page.iter().all(|r| r.subject_id == "u1"));
    }

    #[tokio::test]
    async fn history_respects_limit() {
        let (store, _dir) = test_store().await;
        for s in 100..112 {
            store.append(reading("u1", s)).await.unwrap();
        }
        let page = store.history("u1", 10).await;
        assert_eq!(page.len(), 10);
        assert_eq!(page[0].systolic, Some(111));
    }

    #[tokio::test]
    async fn unknown_subject_has_empty_history() {
        let (store, _dir) = test_store().await;
        assert!(store.history("nobody", 10).await.is_empty());
    }

    #[tokio::test]
    async fn absent_values_round_trip_as_none() {
        let (store, _dir) = test_store().await;
        let new = NewReading::for_subject(&Subject::new("u1", "A"));
        store.append(new).await.unwrap();

        let page = store.history("u1", 10).await;
        assert_eq!(page[0].systolic, None);
        assert_eq!(page[0].label, None);
        assert_eq!(page[0].created_at.len(), 19);
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let (store, _dir) = test_store().await;
        store.append(reading("u1", 120)).await.unwrap();
        store.initialize().await.unwrap();
        assert_eq!(store.history("u1", 10).await.len(), 1);
    }

    #[tokio::test]
    async fn legacy_table_gains_result_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        let store = SqliteStore::open(path.to_str().unwrap(), 1).await.unwrap();

        sqlx::query(
            "CREATE TABLE records (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id TEXT NOT NULL, \
             user_name TEXT, systolic INTEGER, diastolic INTEGER, pulse INTEGER, image_url TEXT, \
             created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
        )
        .execute(&store.pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO records (user_id, systolic, diastolic, pulse) VALUES ('old', 118, 76, 64)")
            .execute(&store.pool)
            .await
            .unwrap();

        store.initialize().await.unwrap();
        assert!(store.has_result_column().await.unwrap());

        let page = store.history("old", 10).await;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].systolic, Some(118));
        assert!(page[0].label.is_none());
    }

    #[tokio::test]
    async fn empty_subject_is_rejected() {
        let (store, _dir) = test_store().await;
        let err = store.append(reading(" ", 120)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn history_without_schema_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.db");
        let store = SqliteStore::open(path.to_str().unwrap(), 1).await.unwrap();
        assert!(store.history("u1", 10).await.is_empty());
    }

    #[tokio::test]
    async fn import_preserves_timestamp() {
        let (store, _dir) = test_store().await;
        let original = Reading::from_new(99, reading("u1", 125), "2024-05-01 08:30:00");
        store.import(&original).await.unwrap();

        let exported = store.export_all().await.unwrap();
        assert_eq!(exported.len(), 1);
        let row = exported[0].as_ref().unwrap();
        assert_eq!(row.created_at, "2024-05-01 08:30:00");
        assert_eq!(row.systolic, Some(125));
    }

    /// Insert a row the way older versions did, with untyped measurements.
    async fn insert_legacy(store: &SqliteStore, user_id: Option<&str>, systolic: &str) {
        sqlx::query(&format!(
            "INSERT INTO records (user_id, user_name, systolic, diastolic, pulse, created_at) \
             VALUES (?, 'Legacy', {systolic}, 80, 70, '2024-01-01 00:00:00')"
        ))
        .bind(user_id)
        .execute(&store.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn legacy_text_measurements_read_as_absent() {
        let (store, _dir) = test_store().await;
        store.append(reading("u1", 120)).await.unwrap();
        insert_legacy(&store, Some("u1"), "'--'").await;
        insert_legacy(&store, Some("u1"), "'131'").await;
        insert_legacy(&store, Some("u1"), "128.6").await;

        let page = store.history("u1", 10).await;
        assert_eq!(page.len(), 4);

        let mut systolic: Vec<_> = page.iter().map(|r| r.systolic).collect();
        systolic.sort();
        assert_eq!(systolic, vec![None, Some(120), Some(129), Some(131)]);
        assert!(page.iter().all(|r| r.diastolic == Some(80)));
    }

    #[tokio::test]
    async fn legacy_file_copies_readable_rows_and_counts_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        let source = SqliteStore::open(path.to_str().unwrap(), 1).await.unwrap();

        // Schema of the first deployments: no NOT NULL, no result column
        sqlx::query(
            "CREATE TABLE records (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id TEXT, \
             user_name TEXT, systolic INTEGER, diastolic INTEGER, pulse INTEGER, \
             image_url TEXT, created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
        )
        .execute(&source.pool)
        .await
        .unwrap();
        insert_legacy(&source, Some("u1"), "120").await;
        insert_legacy(&source, Some("u1"), "'--'").await;
        insert_legacy(&source, None, "118").await;
        source.initialize().await.unwrap();

        let exported = source.export_all().await.unwrap();
        assert_eq!(exported.len(), 3);
        assert_eq!(exported[1].as_ref().unwrap().systolic, None);
        assert!(exported[2].is_err());

        let destination = crate::in_memory::InMemoryStore::new();
        let report = crate::migrate::copy_records(&source, &destination)
            .await
            .unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.copied, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(source.history("u1", 10).await.len(), 2);
    }
}
