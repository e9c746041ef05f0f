//! DingTalk robot client.
//!
//! Implements [`Platform`] on top of the DingTalk open APIs:
//! - replies go to the per-conversation session webhook when the inbound
//!   event carried one, falling back to the robot batch-send API;
//! - image download codes are exchanged for URLs via `messageFiles/download`;
//! - the app access token is cached until shortly before it expires.
//!
//! Also verifies the `timestamp`/`sign` headers DingTalk attaches to HTTP
//! callbacks.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vitalbot_config::DingTalkConfig;
use vitalbot_core::channel::{MessageFormat, OutboundMessage, Platform};
use vitalbot_core::error::ChannelError;

/// Title used for markdown messages that do not carry one.
const DEFAULT_TITLE: &str = "Message";

/// Tokens are refreshed this long before DingTalk says they expire.
const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

/// Callbacks older (or newer) than this are rejected.
const SIGNATURE_WINDOW_MS: u64 = 60 * 60 * 1000;

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// DingTalk platform client.
pub struct DingTalkClient {
    app_key: String,
    app_secret: String,
    robot_code: String,
    oapi_base_url: String,
    api_base_url: String,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for DingTalkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DingTalkClient")
            .field("app_key", &self.app_key)
            .field("app_secret", &"[REDACTED]")
            .field("robot_code", &self.robot_code)
            .finish()
    }
}

impl DingTalkClient {
    /// Build a client from configuration. App key and secret are required.
    pub fn new(config: &DingTalkConfig) -> Result<Self, ChannelError> {
        let app_key = config
            .app_key
            .clone()
            .ok_or_else(|| ChannelError::NotConfigured("DINGTALK_APP_KEY is not set".into()))?;
        let app_secret = config
            .app_secret
            .clone()
            .ok_or_else(|| ChannelError::NotConfigured("DINGTALK_APP_SECRET is not set".into()))?;
        let robot_code = config.robot_code().unwrap_or(&app_key).to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ChannelError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            app_key,
            app_secret,
            robot_code,
            oapi_base_url: config.oapi_base_url.trim_end_matches('/').to_string(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client,
            token: Mutex::new(None),
        })
    }

    /// Current app access token, fetching a new one when the cache is stale.
    pub async fn access_token(&self) -> Result<String, ChannelError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let url = format!("{}/gettoken", self.oapi_base_url);
        let response: TokenResponse = self
            .client
            .get(&url)
            .query(&[("appkey", &self.app_key), ("appsecret", &self.app_secret)])
            .send()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))?
            .json()
            .await
            .map_err(|e| ChannelError::TokenUnavailable(format!("unreadable response: {e}")))?;

        let value = match (response.errcode, response.access_token) {
            (0, Some(token)) => token,
            (code, _) => {
                return Err(ChannelError::TokenUnavailable(format!(
                    "errcode {code}: {}",
                    response.errmsg.unwrap_or_default()
                )));
            }
        };

        let lifetime = response
            .expires_in
            .unwrap_or(7200)
            .saturating_sub(TOKEN_REFRESH_MARGIN_SECS);
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });

        info!("DingTalk access token refreshed");
        Ok(value)
    }

    async fn send_via_webhook(
        &self,
        webhook_url: &str,
        message: &OutboundMessage,
    ) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(webhook_url)
            .json(&webhook_payload(message))
            .send()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ChannelError::DeliveryFailed {
            target: "session webhook".into(),
            reason: format!("HTTP {status}: {body}"),
        })
    }

    async fn send_via_batch_api(
        &self,
        target_id: &str,
        message: &OutboundMessage,
    ) -> Result<(), ChannelError> {
        let token = self.access_token().await?;
        let url = format!("{}/v1.0/robot/oToMessages/batchSend", self.api_base_url);

        let response = self
            .client
            .post(&url)
            .header("x-acs-dingtalk-access-token", token)
            .json(&batch_send_payload(&self.robot_code, target_id, message))
            .send()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ChannelError::DeliveryFailed {
            target: target_id.to_string(),
            reason: format!("HTTP {status}: {body}"),
        })
    }
}

#[async_trait]
impl Platform for DingTalkClient {
    fn name(&self) -> &str {
        "dingtalk"
    }

    async fn send(
        &self,
        target_id: &str,
        message: &OutboundMessage,
        reply_target: Option<&str>,
    ) -> Result<(), ChannelError> {
        if let Some(webhook_url) = reply_target {
            match self.send_via_webhook(webhook_url, message).await {
                Ok(()) => {
                    debug!(target = %target_id, "Reply sent via session webhook");
                    return Ok(());
                }
                Err(e) => warn!(error = %e, "Session webhook failed, using batch send"),
            }
        }

        self.send_via_batch_api(target_id, message).await?;
        debug!(target = %target_id, "Reply sent via batch send");
        Ok(())
    }

    async fn resolve_attachment(&self, download_code: &str) -> Result<String, ChannelError> {
        let token = self.access_token().await?;
        let url = format!("{}/v1.0/robot/messageFiles/download", self.api_base_url);

        let response = self
            .client
            .post(&url)
            .header("x-acs-dingtalk-access-token", token)
            .json(&serde_json::json!({
                "downloadCode": download_code,
                "robotCode": self.robot_code,
            }))
            .send()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();

        match body.get("downloadUrl").and_then(|v| v.as_str()) {
            Some(download_url) if status.is_success() => Ok(download_url.to_string()),
            _ => {
                warn!(%status, response = %body, "Failed to resolve download code");
                Err(ChannelError::AttachmentUnresolved(format!("HTTP {status}")))
            }
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    errcode: i64,
    errmsg: Option<String>,
    access_token: Option<String>,
    expires_in: Option<u64>,
}

/// Body posted to a session webhook.
pub fn webhook_payload(message: &OutboundMessage) -> serde_json::Value {
    match message.format {
        MessageFormat::Markdown => serde_json::json!({
            "msgtype": "markdown",
            "markdown": {
                "title": message.title.as_deref().unwrap_or(DEFAULT_TITLE),
                "text": message.body,
            },
        }),
        MessageFormat::Text => serde_json::json!({
            "msgtype": "text",
            "text": { "content": message.body },
        }),
    }
}

/// Body for the robot batch-send API. `target_id` may hold several
/// comma-separated user ids.
pub fn batch_send_payload(
    robot_code: &str,
    target_id: &str,
    message: &OutboundMessage,
) -> serde_json::Value {
    let user_ids: Vec<&str> = target_id.split(',').collect();
    let (msg_key, msg_param) = match message.format {
        MessageFormat::Markdown => (
            "sampleMarkdown",
            serde_json::json!({
                "title": message.title.as_deref().unwrap_or(DEFAULT_TITLE),
                "text": message.body,
            }),
        ),
        MessageFormat::Text => ("sampleText", serde_json::json!({ "content": message.body })),
    };

    serde_json::json!({
        "robotCode": robot_code,
        "userIds": user_ids,
        "msgKey": msg_key,
        "msgParam": msg_param.to_string(),
    })
}

/// The `sign` DingTalk computes for a callback sent at `timestamp` (ms).
pub fn callback_signature(app_secret: &str, timestamp: &str) -> Option<String> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes()).ok()?;
    mac.update(format!("{timestamp}\n{app_secret}").as_bytes());
    Some(BASE64.encode(mac.finalize().into_bytes()))
}

/// Check a callback's `timestamp` and `sign` headers.
///
/// The timestamp must be within an hour of `now_ms`; the signature is
/// compared in constant time.
pub fn verify_callback_signature(app_secret: &str, timestamp: &str, sign: &str, now_ms: i64) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let Ok(sent_ms) = timestamp.trim().parse::<i64>() else {
        return false;
    };
    if sent_ms.abs_diff(now_ms) > SIGNATURE_WINDOW_MS {
        return false;
    }

    let Ok(provided) = BASE64.decode(sign.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{}\n{app_secret}", timestamp.trim()).as_bytes());
    mac.verify_slice(&provided).is_ok()
}
