//! Error types for the fallible seams around the pipeline.
//!
//! The orchestration core itself never propagates errors: degraded stages
//! become omitted results or fallback data. These types cover the edges
//! where real failures exist - the HTTP client, configuration loading, and
//! the storage collaborator.

use thiserror::Error;

/// Errors from the model-serving client implementation.
///
/// Never crosses the `ModelClient` trait boundary; implementations log the
/// error and report absence of a reply instead.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("API key not configured (set OPENROUTER_API_KEY)")]
    MissingApiKey,

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("API error ({status}): {body}")]
    BadStatus { status: u16, body: String },

    #[error("response missing message content")]
    MissingContent,
}

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("default persona subset resolves to nothing in the registry")]
    EmptyDefaults,
}

/// Errors from the conversation storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("conversation not found: {0}")]
    NotFound(String),

    #[error("conversation already exists: {0}")]
    AlreadyExists(String),

    #[error("storage backend failed: {0}")]
    Backend(String),
}
