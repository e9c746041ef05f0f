//! Inbound robot events.
//!
//! The platform delivers a loosely shaped JSON object. It is decoded here,
//! once, into [`Inbound`]; nothing downstream probes raw fields.
//!
//! Field names follow the DingTalk robot callback: `msgtype` (some
//! deliveries spell it `msgType`), `senderStaffId`, `senderNick`,
//! `sessionWebhook`, `text.content`, `content.downloadCode`. Older
//! deliveries carry `content.pictureDownloadUrl` instead of a code.

use serde::Deserialize;
use serde_json::Value;
use vitalbot_core::reading::Subject;

/// Display name used when the sender has none.
const DEFAULT_NICK: &str = "User";

/// Where the picture of an image event can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentRef {
    /// Opaque code the platform exchanges for a URL
    DownloadCode(String),
    /// Legacy direct URL
    DirectUrl(String),
    /// Neither was present
    Missing,
}

/// The message-type specific part of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    Text(String),
    Image(AttachmentRef),
    /// Any other message type (rich text, audio, files...)
    Unrecognized(Option<String>),
}

/// A decoded event with an addressable sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: Subject,
    /// Per-conversation reply address, when the platform supplied one
    pub reply_target: Option<String>,
    pub body: EventBody,
}

/// Result of decoding one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The payload object carried no fields
    Empty,
    /// No sender id, so nobody to answer
    NoSender,
    Event(InboundEvent),
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "msgType")]
    msg_type_camel: Option<String>,
    #[serde(rename = "msgtype")]
    msg_type_lower: Option<String>,
    #[serde(rename = "senderStaffId")]
    sender_staff_id: Option<String>,
    #[serde(rename = "senderNick")]
    sender_nick: Option<String>,
    #[serde(rename = "sessionWebhook")]
    session_webhook: Option<String>,
    text: Option<Value>,
    content: Option<Value>,
}

/// Decode a callback payload.
///
/// Fails only when the payload is not a JSON object.
pub fn decode(payload: &Value) -> Result<Inbound, serde_json::Error> {
    if payload.as_object().is_some_and(|o| o.is_empty()) {
        return Ok(Inbound::Empty);
    }

    let raw = RawEvent::deserialize(payload)?;

    let Some(sender_id) = raw.sender_staff_id.filter(|id| !id.trim().is_empty()) else {
        return Ok(Inbound::NoSender);
    };
    let nick = raw
        .sender_nick
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_NICK.to_string());

    let message_type = raw.msg_type_camel.or(raw.msg_type_lower);
    let body = match message_type.as_deref() {
        Some("text") => EventBody::Text(text_content(raw.text.as_ref())),
        Some("picture") => EventBody::Image(attachment(raw.content.as_ref())),
        _ => EventBody::Unrecognized(message_type),
    };

    Ok(Inbound::Event(InboundEvent {
        sender: Subject::new(sender_id, nick),
        reply_target: raw.session_webhook.filter(|w| !w.is_empty()),
        body,
    }))
}

fn str_field<'a>(value: Option<&'a Value>, key: &str) -> Option<&'a str> {
    value?.get(key)?.as_str()
}

fn text_content(text: Option<&Value>) -> String {
    str_field(text, "content").unwrap_or_default().trim().to_string()
}

fn attachment(content: Option<&Value>) -> AttachmentRef {
    if let Some(code) = str_field(content, "downloadCode").filter(|c| !c.is_empty()) {
        return AttachmentRef::DownloadCode(code.to_string());
    }
    match str_field(content, "pictureDownloadUrl").filter(|u| !u.is_empty()) {
        Some(url) => AttachmentRef::DirectUrl(url.to_string()),
        None => AttachmentRef::Missing,
    }
}
