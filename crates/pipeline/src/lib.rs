//! Event processing pipeline for vitalbot.
//!
//! Flow: inbound event → [`Dispatcher`] → {[`Extractor`] → [`classify`]}
//! → record store → [`ReplyFormatter`] → platform reply → [`Ack`].
//!
//! [`Ack`]: vitalbot_core::Ack

pub mod classify;
pub mod dispatcher;
pub mod event;
pub mod extractor;
pub mod format;

pub use classify::{Classification, classify};
pub use dispatcher::{DispatchError, Dispatcher};
pub use event::{AttachmentRef, EventBody, Inbound, InboundEvent, decode};
pub use extractor::{Extraction, ExtractionError, Extractor};
pub use format::ReplyFormatter;
