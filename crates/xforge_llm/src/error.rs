//! Error types for completion providers.

use thiserror::Error;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A completion call failed.
///
/// Transport-specific errors are folded into these variants so callers never
/// see `reqwest` types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Completion provider not configured. Set XFORGE_LLM_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    NotConfigured,

    #[error("Unresolved placeholder in prompt template: {0}")]
    UnresolvedPlaceholder(String),

    #[error("Invalid sampling configuration: {0}")]
    InvalidSampling(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Authentication rejected (HTTP {0})")]
    Authentication(u16),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Provider API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),
}

impl From<xforge_templates::TemplateError> for ProviderError {
    fn from(err: xforge_templates::TemplateError) -> Self {
        match err {
            xforge_templates::TemplateError::UnresolvedPlaceholder(name) => {
                Self::UnresolvedPlaceholder(name)
            }
            other => Self::InvalidConfig(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl ProviderError {
    /// Map a non-success HTTP status to the matching variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Authentication(status),
            429 => Self::RateLimited(body),
            408 | 504 => Self::Timeout(format!("HTTP {}", status)),
            _ => Self::Api { status, body },
        }
    }
}
