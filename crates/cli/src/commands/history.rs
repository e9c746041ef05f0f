//! `vitalbot history`: Print a subject's recent readings.

use std::path::Path;

use vitalbot_config::Requirement;
use vitalbot_pipeline::ReplyFormatter;

pub async fn run(
    config_path: Option<&Path>,
    subject: &str,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    config.require(&[Requirement::Storage])?;

    let limit = limit.unwrap_or(config.bot.history_limit).max(1);
    let store = vitalbot_store::open_store(&config.storage).await?;
    let readings = store.history(subject, limit).await;

    let formatter = ReplyFormatter::new(config.bot.display_utc_offset_hours);
    println!("{}", formatter.format_history(&readings).body);
    Ok(())
}
