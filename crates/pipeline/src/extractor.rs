//! Vision extraction: turns a photo of a blood-pressure monitor into numbers.
//!
//! The model is told to answer with a bare JSON object. Answers are still
//! cleaned of code fences before parsing, and every failure (transport,
//! API, unparseable text, model-reported unreadable image) comes back as
//! [`ExtractionError::Failed`] with a reason suitable for the user.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use vitalbot_core::error::ProviderError;
use vitalbot_core::provider::{VisionProvider, VisionRequest};

/// Instruction sent with every image.
pub const EXTRACTION_PROMPT: &str = "Please analyze this image of a blood pressure monitor. \
Extract the Systolic (High), Diastolic (Low), and Pulse (Heart Rate) numbers. \
Return the result ONLY as a JSON object with keys: 'systolic', 'diastolic', 'pulse'. \
If you cannot read the screen or it's not a BP monitor, return {'error': 'Cannot read image'}. \
Do not include markdown or explanations, just the JSON string.";

const PARSE_FAILURE: &str = "Failed to parse data";
const INTERNAL_FAILURE: &str = "Internal error during analysis";

/// Numbers read from the display. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extraction {
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub pulse: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("{reason}")]
    Failed { reason: String },
}

impl ExtractionError {
    fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Wraps the vision provider with the blood-pressure prompt and parsing.
pub struct Extractor {
    provider: Arc<dyn VisionProvider>,
    model: String,
}

impl Extractor {
    pub fn new(provider: Arc<dyn VisionProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub async fn extract(&self, image_url: &str) -> Result<Extraction, ExtractionError> {
        let request = VisionRequest {
            model: self.model.clone(),
            image_url: image_url.to_string(),
            prompt: EXTRACTION_PROMPT.to_string(),
        };

        let raw = self.provider.describe_image(request).await.map_err(|e| {
            warn!(provider = self.provider.name(), error = %e, "Vision call failed");
            ExtractionError::failed(provider_failure_reason(&e))
        })?;

        debug!(reply = %raw, "Vision model replied");
        parse_model_reply(&raw)
    }
}

fn provider_failure_reason(error: &ProviderError) -> String {
    match error {
        ProviderError::ApiError { message, .. } => format!("API Error: {message}"),
        ProviderError::AuthenticationFailed(message) => format!("API Error: {message}"),
        ProviderError::RateLimited => "API Error: rate limited".into(),
        ProviderError::MalformedResponse(_) => PARSE_FAILURE.into(),
        ProviderError::NotConfigured(_) | ProviderError::Network(_) => INTERNAL_FAILURE.into(),
    }
}

/// Remove markdown code-fence markers around the model's answer.
pub fn strip_code_fences(raw: &str) -> &str {
    let text = raw.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Parse the model's text answer.
pub fn parse_model_reply(raw: &str) -> Result<Extraction, ExtractionError> {
    let cleaned = strip_code_fences(raw);

    let value: Value = serde_json::from_str(cleaned).map_err(|e| {
        warn!(error = %e, reply = %cleaned, "Vision reply is not JSON");
        ExtractionError::failed(PARSE_FAILURE)
    })?;

    let Value::Object(fields) = value else {
        return Err(ExtractionError::failed(PARSE_FAILURE));
    };

    if let Some(error) = fields.get("error") {
        let reason = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(ExtractionError::failed(reason));
    }

    Ok(Extraction {
        systolic: fields.get("systolic").and_then(number),
        diastolic: fields.get("diastolic").and_then(number),
        pulse: fields.get("pulse").and_then(number),
    })
}

/// Accept integers, floats, and numeric strings. Floats are rounded; a
/// value that is not finite or does not fit `i32` is absent.
fn number(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).ok(),
            None => n.as_f64().and_then(rounded),
        },
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i32>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(rounded))
        }
        _ => None,
    }
}

fn rounded(f: f64) -> Option<i32> {
    if !f.is_finite() {
        return None;
    }
    let f = f.round();
    (f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX)).then_some(f as i32)
}
