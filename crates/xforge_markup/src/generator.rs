//! Markup generation loop: prompt, complete, sanitize, validate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use xforge_llm::{CompletionProvider, CompletionRequest, SamplingConfig};
use xforge_templates::PromptTemplateStore;

use crate::error::MarkupResult;
use crate::models::{GenerationRequest, GenerationResult, DEFAULT_CONSTRAINTS};
use crate::sanitizer::sanitize;
use crate::validator::MarkupValidator;

/// Sampling used for every generation call.
pub const GENERATION_SAMPLING: SamplingConfig = SamplingConfig {
    max_tokens: Some(2000),
    temperature: Some(0.7),
    top_p: Some(0.9),
};

/// Generates validated markup from natural-language requests.
///
/// Holds no per-call state; one generator can serve concurrent requests.
pub struct MarkupGenerator {
    provider: Arc<dyn CompletionProvider>,
    template: String,
    validator: MarkupValidator,
    model: Option<String>,
}

impl MarkupGenerator {
    /// Create a generator, loading the prompt template from `store`.
    ///
    /// A template file that exists but cannot be used is fatal here.
    pub fn new(provider: Arc<dyn CompletionProvider>, store: &PromptTemplateStore) -> MarkupResult<Self> {
        let template = store.load()?;
        Ok(Self::with_template(provider, template))
    }

    /// Create a generator around an already loaded template.
    pub fn with_template(provider: Arc<dyn CompletionProvider>, template: impl Into<String>) -> Self {
        Self {
            provider,
            template: template.into(),
            validator: MarkupValidator::default(),
            model: None,
        }
    }

    /// Override the provider's default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_validator(mut self, validator: MarkupValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn validator(&self) -> &MarkupValidator {
        &self.validator
    }

    /// Generate markup for `request`.
    ///
    /// Never fails: provider and template errors come back as a result with
    /// empty markup and the error message. Dropping the returned future
    /// abandons the call without side effects.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        info!(
            "Generating markup (theme {}) for: {}",
            request.theme_name(),
            request.description()
        );

        let raw = match self.provider.complete(&self.completion_request(request)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Completion failed: {}", e);
                return GenerationResult::failed(format!("generation failed: {}", e));
            }
        };

        let markup = sanitize(&raw);
        debug!("Sanitized {} raw chars to {} markup chars", raw.len(), markup.len());

        let report = self.validator.validate(&markup);
        if report.valid {
            info!("Generated valid markup ({} chars)", markup.len());
        } else {
            warn!(
                "Generated markup failed validation: {}",
                report.error.as_deref().unwrap_or_default()
            );
        }
        GenerationResult::from_report(markup, report)
    }

    /// Convenience wrapper taking a bare description.
    pub async fn generate_from_description(&self, description: &str) -> GenerationResult {
        match GenerationRequest::new(description) {
            Ok(request) => self.generate(&request).await,
            Err(e) => GenerationResult::failed(format!("generation failed: {}", e)),
        }
    }

    /// Generate with a deadline. `None` means the deadline passed and nothing
    /// was produced.
    pub async fn generate_with_timeout(
        &self,
        request: &GenerationRequest,
        timeout: Duration,
    ) -> Option<GenerationResult> {
        match tokio::time::timeout(timeout, self.generate(request)).await {
            Ok(result) => Some(result),
            Err(_) => {
                warn!("Markup generation timed out after {:?}", timeout);
                None
            }
        }
    }

    fn completion_request(&self, request: &GenerationRequest) -> CompletionRequest {
        let completion = CompletionRequest::new(self.template.clone())
            .with_variables(Self::variables(request))
            .with_sampling(GENERATION_SAMPLING);
        match &self.model {
            Some(model) => completion.with_model(model.clone()),
            None => completion,
        }
    }

    fn variables(request: &GenerationRequest) -> HashMap<String, String> {
        HashMap::from([
            ("userDescription".to_string(), request.description().to_string()),
            (
                "constraints".to_string(),
                request.constraints().unwrap_or(DEFAULT_CONSTRAINTS).to_string(),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use xforge_llm::{ProviderError, ProviderResult};

    mock! {
        pub Provider {}

        #[async_trait]
        impl CompletionProvider for Provider {
            fn model(&self) -> &str;
            async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String>;
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("a login panel").unwrap()
    }

    #[tokio::test]
    async fn test_variables_and_sampling_reach_provider() {
        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .withf(|req: &CompletionRequest| {
                req.variables.get("userDescription").map(String::as_str) == Some("a login panel")
                    && req.variables.get("constraints").map(String::as_str) == Some(DEFAULT_CONSTRAINTS)
                    && req.sampling == GENERATION_SAMPLING
                    && req.model.is_none()
            })
            .times(1)
            .returning(|_| Ok("<Grid/>".to_string()));

        let generator = MarkupGenerator::with_template(Arc::new(provider), "{{userDescription}} {{constraints}}");
        let result = generator.generate(&request()).await;
        assert!(result.is_valid);
        assert_eq!(result.markup, "<Grid/>");
    }

    #[tokio::test]
    async fn test_constraints_and_model_override() {
        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .withf(|req: &CompletionRequest| {
                req.variables.get("constraints").map(String::as_str) == Some("use a DockPanel")
                    && req.model.as_deref() == Some("gpt-4o")
            })
            .returning(|_| Ok("<DockPanel/>".to_string()));

        let generator = MarkupGenerator::with_template(Arc::new(provider), "{{userDescription}}{{constraints}}")
            .with_model("gpt-4o");
        let result = generator
            .generate(&request().with_constraints("use a DockPanel"))
            .await;
        assert!(result.is_valid);
    }

    #[tokio::test]
    async fn test_provider_error_becomes_failed_result() {
        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .returning(|_| Err(ProviderError::Authentication(401)));

        let generator = MarkupGenerator::with_template(Arc::new(provider), "{{userDescription}}{{constraints}}");
        let result = generator.generate(&request()).await;
        assert!(!result.is_valid);
        assert!(result.markup.is_empty());
        assert!(result.validation_error.unwrap().contains("401"));
    }

    #[tokio::test]
    async fn test_empty_description_shortcut() {
        let mut provider = MockProvider::new();
        provider.expect_complete().never();

        let generator = MarkupGenerator::with_template(Arc::new(provider), "{{userDescription}}{{constraints}}");
        let result = generator.generate_from_description("  ").await;
        assert!(!result.is_valid);
        assert!(result.validation_error.unwrap().contains("empty"));
    }
}
