//! Error types for markup generation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for markup operations.
pub type MarkupResult<T> = Result<T, MarkupError>;

/// Errors raised while setting up or running markup generation.
///
/// [`MarkupGenerator::generate`](crate::MarkupGenerator::generate) folds these
/// into a failed [`GenerationResult`](crate::GenerationResult); they only
/// escape from constructors.
#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("Description cannot be empty")]
    EmptyDescription,

    #[error("Template error: {0}")]
    Template(#[from] xforge_templates::TemplateError),

    #[error("Provider error: {0}")]
    Provider(#[from] xforge_llm::ProviderError),

    #[error("Invalid validator policy in {path}: {message}")]
    InvalidPolicy { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
