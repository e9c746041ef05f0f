//! Platform trait: the outbound side of the chat platform.
//!
//! The dispatcher depends on the platform only through this narrow
//! interface: deliver a reply and turn an attachment download code into a
//! URL. Receiving events is the transport's concern, not this trait's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// How a reply body should be rendered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// Plain text
    #[default]
    Text,
    /// Rich text (markdown)
    Markdown,
}

/// A message ready to send to a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub body: String,

    #[serde(default)]
    pub format: MessageFormat,

    /// Title shown in notifications (markdown messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl OutboundMessage {
    /// A plain-text message.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            format: MessageFormat::Text,
            title: None,
        }
    }

    /// A markdown message with a title.
    pub fn markdown(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            format: MessageFormat::Markdown,
            title: Some(title.into()),
        }
    }
}

/// The core Platform trait.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Human-readable platform name (e.g., "dingtalk").
    fn name(&self) -> &str;

    /// Deliver a reply to `target_id`.
    ///
    /// `reply_target` is the per-conversation reply address (a session
    /// webhook on DingTalk) when the inbound event carried one.
    async fn send(
        &self,
        target_id: &str,
        message: &OutboundMessage,
        reply_target: Option<&str>,
    ) -> std::result::Result<(), ChannelError>;

    /// Resolve an attachment download code into a fetchable URL.
    async fn resolve_attachment(
        &self,
        download_code: &str,
    ) -> std::result::Result<String, ChannelError>;
}
