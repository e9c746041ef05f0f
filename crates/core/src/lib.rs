//! # vitalbot core
//!
//! Domain types, traits, and error definitions for the vitalbot chat bot.
//! This crate has **no I/O dependencies**. It defines the domain model
//! (readings, outbound messages, acknowledgements) and the seams that the
//! other crates implement against.
//!
//! ## Seams
//!
//! - [`RecordStore`]: persistence of readings (SQLite, PostgreSQL, in-memory)
//! - [`VisionProvider`]: the external vision model
//! - [`Platform`]: the chat platform's outbound API (replies, attachments)
//!
//! Implementations are chosen once at process startup and injected, so the
//! dispatcher never branches on a backend name.

pub mod ack;
pub mod channel;
pub mod error;
pub mod provider;
pub mod reading;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use ack::{Ack, AckStatus};
pub use channel::{MessageFormat, OutboundMessage, Platform};
pub use error::{Error, Result};
pub use provider::{VisionProvider, VisionRequest};
pub use reading::{NewReading, Reading, RecordId, Subject, TIMESTAMP_FORMAT};
pub use store::{DEFAULT_HISTORY_LIMIT, RecordStore};
