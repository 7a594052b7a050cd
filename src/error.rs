//! Error types shared across the extension.

use thiserror::Error;

use crate::prompts::MISSING_API_KEY_NOTICE;

/// Failures of a storage area read or write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The browser rejected the write, usually because of its quota.
    #[error("storage quota exceeded for {key}: {bytes} bytes over a {quota} byte limit")]
    QuotaExceeded { key: String, bytes: usize, quota: usize },

    /// A stored value could not be encoded or decoded.
    #[error("failed to encode {key}: {reason}")]
    Encoding { key: String, reason: String },

    /// The storage backend itself failed.
    #[error("{0}")]
    Backend(String),
}

/// Failures of a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// No API key configured. Not an exception, the widget shows the text.
    #[error("{}", MISSING_API_KEY_NOTICE)]
    MissingApiKey,

    /// Non-success HTTP status.
    #[error("{0}")]
    Api(String),

    /// The request did not complete.
    #[error("{0}")]
    Network(String),

    /// Success status, but the body did not carry a reply.
    #[error("Unexpected response: {0}")]
    MalformedResponse(String),
}

/// The toggle message could not reach a tab.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("no receiver in tab {0}")]
    NoReceiver(i32),

    #[error("script injection into tab {tab_id} failed: {reason}")]
    InjectionFailed { tab_id: i32, reason: String },
}

/// The bundled model catalog could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("failed to fetch model catalog: {0}")]
    Fetch(String),

    #[error("failed to parse model catalog: {0}")]
    Parse(String),
}

/// A settings field failed validation on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter an API key")]
    MissingApiKey,

    #[error("API key should start with \"sk-\"")]
    MalformedApiKey,

    #[error("Please select or enter a model name")]
    MissingModel,
}
