//! Error types for image editing.

use std::time::Duration;

/// Message shown to the user for every failed edit request.
///
/// The underlying cause is logged, never surfaced.
pub const GENERATION_FAILED_MESSAGE: &str =
    "Failed to generate image. Please check your prompt and API key configuration.";

/// Longest error text kept from a remote response body.
const MAX_ERROR_MESSAGE_LEN: usize = 300;

/// Errors that can occur while acquiring, editing or exporting an image.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// Missing or invalid configuration (fatal at startup).
    #[error("configuration error: {0}")]
    Config(String),

    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Billing is not enabled for the API key.
    #[error("billing error: {0}")]
    Billing(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-provided delay, if any.
        retry_after: Option<Duration>,
    },

    /// Request exceeded the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Response did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (reading an input, writing an export).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input is not a PNG, JPEG or WebP image.
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    /// An edit request failed; the detail has already been logged.
    #[error("{}", GENERATION_FAILED_MESSAGE)]
    Generation,
}

/// Result type alias for image editing operations.
pub type Result<T> = std::result::Result<T, EditError>;

/// Normalizes a remote error body for logging.
///
/// Collapses whitespace and truncates overly long bodies on a char boundary.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return collapsed;
    }
    let mut truncated: String = collapsed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
    truncated.push_str("...");
    truncated
}

/// Reads a `Retry-After` header expressed in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
