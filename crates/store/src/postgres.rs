//! PostgreSQL record store: the networked backend.
//!
//! Keeps the staff-facing table layout of the deployment it replaces:
//! table `员工血压记录` with Chinese column names, so existing reports and
//! ad-hoc queries keep working. Identifiers are always double-quoted.
//!
//! `记录时间` is a plain `TIMESTAMP` holding UTC; it is formatted to
//! `YYYY-MM-DD HH:MM:SS` when rows leave this module.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use tracing::{debug, info, warn};

use vitalbot_core::error::StoreError;
use vitalbot_core::reading::{NewReading, Reading, RecordId, TIMESTAMP_FORMAT};
use vitalbot_core::store::{RecordStore, validate_new_reading};

use crate::migrate::{ExportedRow, RecordSink, RecordSource};

const SELECT_COLUMNS: &str = r#""编号", "员工ID", "员工姓名", "收缩压", "舒张压", "脉搏", "图片链接", "分析结果", "记录时间""#;

/// PostgreSQL-backed [`RecordStore`].
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to the database at `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("PostgreSQL connection failed: {e}")))?;

        info!("Connected to PostgreSQL record store");
        Ok(Self { pool })
    }

    /// Create from an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_reading(row: &PgRow) -> Result<Reading, StoreError> {
        let read = |column: &str, e: sqlx::Error| StoreError::ReadFailed(format!("{column}: {e}"));
        let created: NaiveDateTime = row.try_get("记录时间").map_err(|e| read("记录时间", e))?;

        Ok(Reading {
            id: row.try_get("编号").map_err(|e| read("编号", e))?,
            subject_id: row.try_get("员工ID").map_err(|e| read("员工ID", e))?,
            subject_name: row.try_get("员工姓名").map_err(|e| read("员工姓名", e))?,
            systolic: row.try_get("收缩压").map_err(|e| read("收缩压", e))?,
            diastolic: row.try_get("舒张压").map_err(|e| read("舒张压", e))?,
            pulse: row.try_get("脉搏").map_err(|e| read("脉搏", e))?,
            image_url: row.try_get("图片链接").map_err(|e| read("图片链接", e))?,
            label: row.try_get("分析结果").map_err(|e| read("分析结果", e))?,
            created_at: created.format(TIMESTAMP_FORMAT).to_string(),
        })
    }

    async fn query_history(&self, subject_id: &str, limit: usize) -> Result<Vec<Reading>, StoreError> {
        let sql = format!(
            r#"SELECT {SELECT_COLUMNS} FROM "员工血压记录" WHERE "员工ID" = $1
               ORDER BY "记录时间" DESC, "编号" DESC
               FETCH FIRST $2 ROWS ONLY"#
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

#[async_trait]
impl RecordStore for PostgresStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS "员工血压记录" (
                "编号"     BIGSERIAL PRIMARY KEY,
                "员工ID"   TEXT NOT NULL,
                "员工姓名" TEXT,
                "收缩压"   INTEGER,
                "舒张压"   INTEGER,
                "脉搏"     INTEGER,
                "图片链接" TEXT,
                "分析结果" TEXT,
                "记录时间" TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'utc')
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(format!("records table: {e}")))?;

        sqlx::query(r#"ALTER TABLE "员工血压记录" ADD COLUMN IF NOT EXISTS "分析结果" TEXT"#)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(format!("label column: {e}")))?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS "idx_员工血压记录_员工" ON "员工血压记录" ("员工ID", "记录时间" DESC)"#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(format!("subject index: {e}")))?;

        debug!("PostgreSQL schema ready");
        Ok(())
    }

    async fn append(&self, reading: NewReading) -> Result<RecordId, StoreError> {
        validate_new_reading(&reading)?;

        let row = sqlx::query(
            r#"INSERT INTO "员工血压记录"
               ("员工ID", "员工姓名", "收缩压", "舒张压", "脉搏", "图片链接", "分析结果")
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING "编号""#,
        )
        .bind(&reading.subject_id)
        .bind(&reading.subject_name)
        .bind(reading.systolic)
        .bind(reading.diastolic)
        .bind(reading.pulse)
        .bind(&reading.image_url)
        .bind(&reading.label)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::WriteFailed(format!("insert: {e}")))?;

        let id: RecordId = row
            .try_get(0)
            .map_err(|e| StoreError::WriteFailed(format!("returned id: {e}")))?;
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
impl RecordSource for PostgresStore {
    async fn export_all(&self) -> Result<Vec<ExportedRow>, StoreError> {
        let sql = format!(r#"SELECT {SELECT_COLUMNS} FROM "员工血压记录" ORDER BY "编号" ASC"#);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::ReadFailed(format!("export query: {e}")))?;

        Ok(rows.iter().map(Self::row_to_reading).collect())
    }
}

#[async_trait]
impl RecordSink for PostgresStore {
    async fn import(&self, reading: &Reading) -> Result<RecordId, StoreError> {
        if reading.subject_id.trim().is_empty() {
            return Err(StoreError::InvalidRecord("subject id is empty".into()));
        }
        let created = NaiveDateTime::parse_from_str(&reading.created_at, TIMESTAMP_FORMAT)
            .map_err(|e| {
                StoreError::InvalidRecord(format!("timestamp '{}': {e}", reading.created_at))
            })?;

        let row = sqlx::query(
            r#"INSERT INTO "员工血压记录"
               ("员工ID", "员工姓名", "收缩压", "舒张压", "脉搏", "图片链接", "分析结果", "记录时间")
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING "编号""#,
        )
        .bind(&reading.subject_id)
        .bind(&reading.subject_name)
        .bind(reading.systolic)
        .bind(reading.diastolic)
        .bind(reading.pulse)
        .bind(&reading.image_url)
        .bind(&reading.label)
        .bind(created)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::WriteFailed(format!("import: {e}")))?;

        row.try_get(0)
            .map_err(|e| StoreError::WriteFailed(format!("returned id: {e}")))
    }
}
