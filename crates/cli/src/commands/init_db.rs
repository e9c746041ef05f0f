//! `vitalbot init-db`: Create or upgrade the record table.

use std::path::Path;

use vitalbot_config::Requirement;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    config.require(&[Requirement::Storage])?;

    let store = vitalbot_store::open_store(&config.storage).await?;
    store.initialize().await?;

    println!("✅ Record table ready ({} backend)", store.name());
    Ok(())
}
