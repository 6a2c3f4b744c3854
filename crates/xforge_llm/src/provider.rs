//! Completion provider trait and request types.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use xforge_templates::TemplateRenderer;

use crate::error::{ProviderError, ProviderResult};

/// Sampling parameters passed through to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Upper bound on generated tokens
    pub max_tokens: Option<u32>,
    /// Randomness, 0.0 to 1.0
    pub temperature: Option<f32>,
    /// Nucleus sampling cutoff, 0.0 to 1.0
    pub top_p: Option<f32>,
}

impl SamplingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Check that the parameters are within their documented ranges.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.max_tokens == Some(0) {
            return Err(ProviderError::InvalidSampling(
                "max_tokens must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [("temperature", self.temperature), ("top_p", self.top_p)] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(ProviderError::InvalidSampling(format!(
                        "{} must be between 0 and 1, got {}",
                        name, v
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A single completion call: template, bindings and sampling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model override; the provider's configured model when `None`
    pub model: Option<String>,
    /// Prompt template with `{{name}}` placeholders
    pub template: String,
    /// Placeholder bindings
    pub variables: HashMap<String, String>,
    pub sampling: SamplingConfig,
}

impl CompletionRequest {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    /// Validate sampling and render the prompt.
    ///
    /// Any placeholder without a binding fails the request.
    pub fn render(&self) -> ProviderResult<String> {
        self.sampling.validate()?;
        Ok(TemplateRenderer::new().render_strict(&self.template, &self.variables)?)
    }
}

/// Narrow completion capability used by the markup generator.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Model used when a request carries no override.
    fn model(&self) -> &str;

    /// Render the request and return the provider's text.
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String>;
}
