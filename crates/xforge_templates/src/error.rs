//! Error types for prompt templates.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while loading or rendering templates.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template file {path} exists but could not be read: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template file {path} is malformed: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Unresolved placeholder: {0}")]
    UnresolvedPlaceholder(String),
}
