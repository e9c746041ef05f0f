//! Error types for the vitalbot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use thiserror::Error;

/// The top-level error type for vitalbot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Vision provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Chat platform errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Record store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to the external vision model.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures talking to the chat platform (`delivery_failed`).
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Access token unavailable: {0}")]
    TokenUnavailable(String),

    #[error("Message delivery failed to {target}: {reason}")]
    DeliveryFailed { target: String, reason: String },

    #[error("Attachment could not be resolved: {0}")]
    AttachmentUnresolved(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of the record store.
///
/// `Unavailable` is fatal at startup; `WriteFailed` and `ReadFailed` are
/// recovered locally by the dispatcher.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
