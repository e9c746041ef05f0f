//! Provider trait: the abstraction over vision model backends.
//!
//! A VisionProvider sends one image plus an instruction prompt to a
//! multimodal model and returns the model's raw text answer. Interpreting
//! that text is the caller's job.
//!
//! Implementations: DashScope (native API), OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A single image-understanding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionRequest {
    /// The model to use (e.g., "qwen-vl-max")
    pub model: String,

    /// Publicly resolvable URL of the image
    pub image_url: String,

    /// Instruction sent alongside the image
    pub prompt: String,
}

/// The core VisionProvider trait.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "dashscope").
    fn name(&self) -> &str;

    /// Send the image and prompt, returning the model's text answer.
    async fn describe_image(
        &self,
        request: VisionRequest,
    ) -> std::result::Result<String, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
