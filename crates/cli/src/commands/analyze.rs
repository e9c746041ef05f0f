//! `vitalbot analyze`: Run extraction and classification on one image.
//!
//! Nothing is stored and nothing is sent; the analysis is printed as the
//! bot would reply with it.

use std::path::Path;

use vitalbot_config::Requirement;
use vitalbot_core::reading::{NewReading, Subject};
use vitalbot_pipeline::{Extractor, ReplyFormatter, classify};

pub async fn run(
    config_path: Option<&Path>,
    image_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    config.require(&[Requirement::Vision])?;

    let provider = vitalbot_providers::build_from_config(&config.vision)?;
    let extractor = Extractor::new(provider, config.vision.model.clone());

    println!("🔍 Analyzing {image_url}");
    let extraction = extractor.extract(image_url).await?;
    let classification = classify(extraction.systolic, extraction.diastolic);

    let reading = NewReading {
        systolic: extraction.systolic,
        diastolic: extraction.diastolic,
        pulse: extraction.pulse,
        image_url: Some(image_url.to_string()),
        label: Some(classification.label().to_string()),
        ..NewReading::for_subject(&Subject::new("local", "local"))
    };

    let formatter = ReplyFormatter::new(config.bot.display_utc_offset_hours);
    println!("{}", formatter.format_analysis(&reading).body);
    Ok(())
}
