//! `vitalbot serve`: Start the robot callback server.

use std::path::Path;
use std::sync::Arc;

use vitalbot_channels::DingTalkClient;
use vitalbot_gateway::GatewayState;
use vitalbot_pipeline::{Dispatcher, Extractor};

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    config.validate_for_serve()?;

    let store = vitalbot_store::open_store(&config.storage).await?;
    store.initialize().await?;

    let provider = vitalbot_providers::build_from_config(&config.vision)?;
    let platform = Arc::new(DingTalkClient::new(&config.dingtalk)?);
    let extractor = Extractor::new(provider.clone(), config.vision.model.clone());
    let dispatcher = Dispatcher::new(store.clone(), extractor, platform, &config.bot);

    let signing_secret = if config.dingtalk.verify_signature {
        config.dingtalk.app_secret.clone()
    } else {
        None
    };

    println!("🩺 vitalbot");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Callback:  POST /dingtalk/callback");
    println!("   Store:     {}", store.name());
    println!("   Vision:    {} ({})", provider.name(), config.vision.model);
    println!("   Signature check: {}", signing_secret.is_some());

    let state = Arc::new(GatewayState {
        dispatcher: Arc::new(dispatcher),
        signing_secret,
    });
    vitalbot_gateway::start(&config.gateway, state).await?;

    Ok(())
}
