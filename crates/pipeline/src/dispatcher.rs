//! The event dispatcher.
//!
//! Turns one inbound payload into at most one stored reading and the
//! replies that go with it, then reports an [`Ack`] to the transport.
//! Every failure stays inside the event that caused it: delivery and store
//! errors are logged, extraction errors become a reply, and anything else
//! (including a panic) becomes a `FAIL` acknowledgement.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use vitalbot_config::BotConfig;
use vitalbot_core::ack::Ack;
use vitalbot_core::channel::{OutboundMessage, Platform};
use vitalbot_core::reading::NewReading;
use vitalbot_core::store::RecordStore;

use crate::classify::classify;
use crate::event::{AttachmentRef, EventBody, Inbound, InboundEvent, decode};
use crate::extractor::Extractor;
use crate::format::{self, ReplyFormatter};

/// Failures that abort processing of a single event.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub struct Dispatcher {
    store: Arc<dyn RecordStore>,
    extractor: Extractor,
    platform: Arc<dyn Platform>,
    formatter: ReplyFormatter,
    history_keyword: String,
    history_limit: usize,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn RecordStore>,
        extractor: Extractor,
        platform: Arc<dyn Platform>,
        bot: &BotConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            platform,
            formatter: ReplyFormatter::new(bot.display_utc_offset_hours),
            history_keyword: bot.history_keyword.clone(),
            history_limit: bot.history_limit,
        }
    }

    /// Process one event. Never panics and never returns an error.
    pub async fn dispatch(&self, payload: Option<&Value>) -> Ack {
        match AssertUnwindSafe(self.process(payload)).catch_unwind().await {
            Ok(Ok(ack)) => ack,
            Ok(Err(e)) => {
                error!(error = %e, "Event processing failed");
                Ack::fail(format!("Error: {e}"))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "Event processing panicked");
                Ack::fail(format!("Error: {message}"))
            }
        }
    }

    async fn process(&self, payload: Option<&Value>) -> Result<Ack, DispatchError> {
        let Some(payload) = payload.filter(|p| !p.is_null()) else {
            debug!("Event without payload");
            return Ok(Ack::ok("ignored"));
        };

        let event = match decode(payload)? {
            Inbound::Empty => return Ok(Ack::ok("empty data")),
            Inbound::NoSender => return Ok(Ack::ok("no sender")),
            Inbound::Event(event) => event,
        };

        info!(subject = %event.sender.id, "Event received");

        match &event.body {
            EventBody::Text(content) if *content == self.history_keyword => {
                self.handle_history(&event).await;
                Ok(Ack::ok("history processed"))
            }
            EventBody::Text(_) => {
                let greeting = format::greeting(&event.sender.display_name, &self.history_keyword);
                self.reply(&event, &greeting).await;
                Ok(Ack::ok("replied"))
            }
            EventBody::Image(attachment) => Ok(self.handle_image(&event, attachment).await),
            EventBody::Unrecognized(kind) => {
                debug!(message_type = ?kind, "Unsupported message type");
                Ok(Ack::ok("processed"))
            }
        }
    }

    async fn handle_history(&self, event: &InboundEvent) {
        let readings = self
            .store
            .history(&event.sender.id, self.history_limit)
            .await;
        debug!(subject = %event.sender.id, count = readings.len(), "History loaded");
        let message = self.formatter.format_history(&readings);
        self.reply(event, &message).await;
    }

    async fn handle_image(&self, event: &InboundEvent, attachment: &AttachmentRef) -> Ack {
        let Some(image_url) = self.resolve(attachment).await else {
            self.reply(event, &format::download_failed()).await;
            return Ack::ok("failed download");
        };

        self.reply(event, &format::analyzing()).await;

        let extraction = match self.extractor.extract(&image_url).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(subject = %event.sender.id, reason = %e, "Extraction failed");
                self.reply(event, &format::extraction_failed(&e.to_string()))
                    .await;
                return Ack::ok("processed");
            }
        };

        let classification = classify(extraction.systolic, extraction.diastolic);
        let reading = NewReading {
            systolic: extraction.systolic,
            diastolic: extraction.diastolic,
            pulse: extraction.pulse,
            image_url: Some(image_url),
            label: Some(classification.label().to_string()),
            ..NewReading::for_subject(&event.sender)
        };

        match self.store.append(reading.clone()).await {
            Ok(record_id) => info!(
                subject = %event.sender.id,
                record_id,
                label = classification.label(),
                "Reading stored"
            ),
            Err(e) => error!(subject = %event.sender.id, error = %e, "Failed to store reading"),
        }

        let message = self.formatter.format_analysis(&reading);
        self.reply(event, &message).await;
        Ack::ok("processed")
    }

    async fn resolve(&self, attachment: &AttachmentRef) -> Option<String> {
        match attachment {
            AttachmentRef::DownloadCode(code) => match self.platform.resolve_attachment(code).await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(error = %e, "Attachment could not be resolved");
                    None
                }
            },
            AttachmentRef::DirectUrl(url) => Some(url.clone()),
            AttachmentRef::Missing => None,
        }
    }

    /// Send a reply; a delivery failure is logged, never propagated.
    async fn reply(&self, event: &InboundEvent, message: &OutboundMessage) {
        if let Err(e) = self
            .platform
            .send(&event.sender.id, message, event.reply_target.as_deref())
            .await
        {
            error!(subject = %event.sender.id, error = %e, "Failed to deliver reply");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
