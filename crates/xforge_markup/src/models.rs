//! Request and result types for markup generation.

use serde::{Deserialize, Serialize};

use crate::error::{MarkupError, MarkupResult};
use crate::validator::ValidationReport;

/// Theme used when the request does not name one.
pub const DEFAULT_THEME: &str = "Mechanicus";

/// Value bound to `{{constraints}}` when the request has none.
pub const DEFAULT_CONSTRAINTS: &str = "No additional constraints";

/// A request to generate markup. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    description: String,
    theme_name: String,
    constraints: Option<String>,
}

impl GenerationRequest {
    /// Create a request; the description must contain non-whitespace text.
    pub fn new(description: impl Into<String>) -> MarkupResult<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(MarkupError::EmptyDescription);
        }
        Ok(Self {
            description,
            theme_name: DEFAULT_THEME.to_string(),
            constraints: None,
        })
    }

    pub fn with_theme(mut self, theme_name: impl Into<String>) -> Self {
        self.theme_name = theme_name.into();
        self
    }

    pub fn with_constraints(mut self, constraints: impl Into<String>) -> Self {
        self.constraints = Some(constraints.into());
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn theme_name(&self) -> &str {
        &self.theme_name
    }

    pub fn constraints(&self) -> Option<&str> {
        self.constraints.as_deref()
    }
}

/// Outcome of a generation attempt.
///
/// `validation_error` is `None` exactly when `is_valid` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Sanitized markup; empty when generation failed outright
    pub markup: String,
    pub is_valid: bool,
    pub validation_error: Option<String>,
    /// Non-fatal validator findings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl GenerationResult {
    /// Package sanitized markup with its validation report.
    pub fn from_report(markup: String, report: ValidationReport) -> Self {
        Self {
            markup,
            is_valid: report.valid,
            validation_error: if report.valid { None } else { report.error },
            warnings: report.warnings,
        }
    }

    /// A result for a generation that produced nothing.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            markup: String::new(),
            is_valid: false,
            validation_error: Some(message.into()),
            warnings: Vec::new(),
        }
    }
}
