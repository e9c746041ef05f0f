//! DashScope native multimodal provider.
//!
//! Talks to the `multimodal-generation` endpoint used by the Qwen-VL
//! family. The request carries one user turn with an image part and a text
//! part; the answer comes back as a list of content parts under
//! `output.choices[0].message.content`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use vitalbot_core::error::ProviderError;
use vitalbot_core::provider::{VisionProvider, VisionRequest};

/// Default DashScope API root.
pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

pub struct DashScopeProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl DashScopeProvider {
    pub fn new(
        base_url: Option<&str>,
        api_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/services/aigc/multimodal-generation/generation",
            self.base_url
        )
    }

    fn request_body(request: &VisionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "input": {
                "messages": [{
                    "role": "user",
                    "content": [
                        { "image": request.image_url },
                        { "text": request.prompt },
                    ],
                }],
            },
        })
    }

    /// Pull the first text part out of a successful response.
    fn answer_text(response: GenerationResponse) -> Result<String, ProviderError> {
        response
            .output
            .choices
            .into_iter()
            .next()
            .and_then(|choice| {
                choice
                    .message
                    .content
                    .into_iter()
                    .find_map(|part| part.text)
            })
            .ok_or_else(|| ProviderError::MalformedResponse("no text in response".into()))
    }
}

#[async_trait]
impl VisionProvider for DashScopeProvider {
    fn name(&self) -> &str {
        "dashscope"
    }

    async fn describe_image(&self, request: VisionRequest) -> Result<String, ProviderError> {
        debug!(model = %request.model, "Sending DashScope multimodal request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(&request))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited);
        }

        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|e| e.message.or(e.code))
                .unwrap_or(body);
            warn!(status, message = %message, "DashScope returned error");

            if status == 401 || status == 403 {
                return Err(ProviderError::AuthenticationFailed(message));
            }
            return Err(ProviderError::ApiError {
                status_code: status,
                message,
            });
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        Self::answer_text(parsed)
    }
}

// --- DashScope API types ---

#[derive(Deserialize)]
struct GenerationResponse {
    output: GenerationOutput,
}

#[derive(Deserialize)]
struct GenerationOutput {
    #[serde(default)]
    choices: Vec<GenerationChoice>,
}

#[derive(Deserialize)]
struct GenerationChoice {
    message: GenerationMessage,
}

#[derive(Deserialize)]
struct GenerationMessage {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATION_PATH: &str = "/services/aigc/multimodal-generation/generation";

    fn request() -> VisionRequest {
        VisionRequest {
            model: "qwen-vl-max".into(),
            image_url: "https://img.example/bp.jpg".into(),
            prompt: "read the monitor".into(),
        }
    }

    fn provider(server: &MockServer) -> DashScopeProvider {
        DashScopeProvider::new(Some(server.uri().as_str()), "sk-test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn body_puts_image_before_text() {
        let body = DashScopeProvider::request_body(&request());
        let content = &body["input"]["messages"][0]["content"];
        assert_eq!(content[0]["image"], "https://img.example/bp.jpg");
        assert_eq!(content[1]["text"], "read the monitor");
        assert_eq!(body["model"], "qwen-vl-max");
    }

    #[test]
    fn trailing_slash_trimmed_from_base_url() {
        let p = DashScopeProvider::new(Some("https://x.example/api/v1/"), "k", Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            p.endpoint(),
            "https://x.example/api/v1/services/aigc/multimodal-generation/generation"
        );
    }

    #[tokio::test]
    async fn returns_first_text_part() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATION_PATH))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "qwen-vl-max"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "output": {"choices": [{"message": {"role": "assistant", "content": [
                    {"text": "{\"systolic\": 120, \"diastolic\": 80, \"pulse\": 70}"}
                ]}}]},
                "request_id": "r-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = provider(&server).describe_image(request()).await.unwrap();
        assert!(text.contains("\"systolic\": 120"));
    }

    #[tokio::test]
    async fn api_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATION_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": "InvalidParameter",
                "message": "url error"
            })))
            .mount(&server)
            .await;

        let err = provider(&server).describe_image(request()).await.unwrap_err();
        match err {
            ProviderError::ApiError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 400);
                assert_eq!(message, "url error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_is_authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "code": "InvalidApiKey",
                "message": "Invalid API-key provided."
            })))
            .mount(&server)
            .await;

        let err = provider(&server).describe_image(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn missing_text_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"output": {"choices": []}})),
            )
            .mount(&server)
            .await;

        let err = provider(&server).describe_image(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }
}
