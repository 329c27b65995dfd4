//! Shared provider error taxonomy.

use thiserror::Error;

/// Errors that can occur while talking to a provider API.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Provider rejected the call for a missing permission.
    #[error("Authorization error on {action}: {message}")]
    Auth { action: String, message: String },

    /// Provider rate-limited the call. The HTTP client retries these with
    /// backoff; this surfaces only after retries are exhausted.
    #[error("Throttled by provider: {0}")]
    Throttled(String),

    /// A configured response path could not be resolved. Raised instead of
    /// returning partial data, since a silently empty result would mask a
    /// provider API change.
    #[error("Unexpected response shape: no {kind} at path {path}")]
    UnexpectedResponseShape { kind: &'static str, path: String },

    /// The collection deadline elapsed with pages remaining.
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Shape error for a path, rendered dot-separated for reporting.
    #[must_use]
    pub fn bad_shape(kind: &'static str, path: &[&str]) -> Self {
        Self::UnexpectedResponseShape {
            kind,
            path: path.join("."),
        }
    }
}
