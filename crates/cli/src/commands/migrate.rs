//! `vitalbot migrate`: Copy records from a SQLite file into the configured store.
//!
//! Original timestamps are preserved. Rows that fail to insert are counted
//! and skipped; the copy never stops half way because of one bad row.

use std::path::Path;

use vitalbot_config::{Requirement, StorageBackend};
use vitalbot_core::store::RecordStore;
use vitalbot_store::{CopyReport, RecordSource, SqliteStore, copy_records};

pub async fn run(
    config_path: Option<&Path>,
    from: &Path,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    config.require(&[Requirement::Storage])?;

    if !from.exists() {
        return Err(format!("Source database not found: {}", from.display()).into());
    }

    println!("🔄 Copying records...");
    println!("   Source:      {} (sqlite)", from.display());
    println!("   Destination: {} backend", config.storage.backend);

    let source = SqliteStore::open(&from.to_string_lossy(), 1).await?;
    // Older files lack the classification column; add it so every row reads
    source.initialize().await?;

    if dry_run {
        let rows = source.export_all().await?;
        let unreadable = rows.iter().filter(|row| row.is_err()).count();
        println!();
        println!(
            "   🏷️  DRY RUN: {} record(s) would be copied, {unreadable} unreadable.",
            rows.len() - unreadable
        );
        println!("   Remove --dry-run to apply.");
        return Ok(());
    }

    let report = match config.storage.backend {
        StorageBackend::Postgres => copy_into_postgres(&source, &config.storage).await?,
        StorageBackend::Sqlite => {
            if Path::new(&config.storage.sqlite_path) == from {
                return Err("Source and destination are the same SQLite file".into());
            }
            let destination =
                SqliteStore::open(&config.storage.sqlite_path, config.storage.max_connections)
                    .await?;
            destination.initialize().await?;
            copy_records(&source, &destination).await?
        }
    };

    println!();
    println!("   Records found:  {}", report.total);
    println!("   Copied:         {}", report.copied);
    if report.failed > 0 {
        println!("   ⚠️  Failed:      {}", report.failed);
    }
    println!("   ✅ Migration complete!");

    Ok(())
}

#[cfg(feature = "postgres")]
async fn copy_into_postgres(
    source: &SqliteStore,
    storage: &vitalbot_config::StorageConfig,
) -> Result<CopyReport, Box<dyn std::error::Error>> {
    let url = storage
        .database_url
        .as_deref()
        .ok_or("DATABASE_URL is not set")?;
    let destination = vitalbot_store::PostgresStore::connect(url, storage.max_connections).await?;
    destination.initialize().await?;
    Ok(copy_records(source, &destination).await?)
}

#[cfg(not(feature = "postgres"))]
async fn copy_into_postgres(
    _source: &SqliteStore,
    _storage: &vitalbot_config::StorageConfig,
) -> Result<CopyReport, Box<dyn std::error::Error>> {
    Err("PostgreSQL support is not enabled. Enable the 'postgres' feature.".into())
}
