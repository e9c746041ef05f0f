//! Provider selection: builds the one vision provider named in config.
//!
//! Called once at startup; the API key is handed to the provider's
//! constructor and never read again from the environment.

use std::sync::Arc;
use std::time::Duration;

use vitalbot_config::VisionConfig;
use vitalbot_core::error::ProviderError;
use vitalbot_core::provider::VisionProvider;

use crate::dashscope::DashScopeProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the configured vision provider.
pub fn build_from_config(config: &VisionConfig) -> Result<Arc<dyn VisionProvider>, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| ProviderError::NotConfigured("vision API key is not set".into()))?;
    let timeout = Duration::from_secs(config.timeout_secs);

    let provider: Arc<dyn VisionProvider> = match config.provider.as_str() {
        "dashscope" => Arc::new(DashScopeProvider::new(
            config.base_url.as_deref(),
            api_key,
            timeout,
        )?),
        "openai_compat" => match config.base_url.as_deref() {
            Some(base_url) => Arc::new(OpenAiCompatProvider::new(
                "openai_compat",
                base_url,
                api_key,
                timeout,
            )?),
            None => Arc::new(OpenAiCompatProvider::dashscope_compatible(api_key, timeout)?),
        },
        other => {
            return Err(ProviderError::NotConfigured(format!(
                "unknown vision provider '{other}' (expected dashscope or openai_compat)"
            )));
        }
    };

    tracing::debug!(provider = provider.name(), model = %config.model, "Vision provider ready");
    Ok(provider)
}
