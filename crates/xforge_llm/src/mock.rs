//! Mock completion provider for testing.
//!
//! Returns queued responses and records every call, so generator tests can
//! run without network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{CompletionProvider, CompletionRequest, SamplingConfig};

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCompletion {
    pub model: String,
    /// Prompt after placeholder substitution
    pub prompt: String,
    pub sampling: SamplingConfig,
}

/// Mock completion provider.
///
/// Responses are returned in order and cycle once exhausted. The prompt is
/// rendered exactly as the HTTP adapter would, so unresolved placeholders fail
/// here too.
#[derive(Clone)]
pub struct MockProvider {
    model: String,
    responses: Arc<RwLock<Vec<String>>>,
    response_index: Arc<AtomicUsize>,
    captured_calls: Arc<RwLock<Vec<CapturedCompletion>>>,
    simulate_failure: Arc<RwLock<Option<ProviderError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a mock provider with no queued responses.
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: Arc::new(RwLock::new(Vec::new())),
            response_index: Arc::new(AtomicUsize::new(0)),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            simulate_failure: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Mock provider that always answers with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new().add_response(text)
    }

    /// Queue a response.
    pub fn add_response(self, text: impl Into<String>) -> Self {
        self.responses.write().push(text.into());
        self
    }

    /// Fail every call with `error`.
    pub fn simulate_failure(self, error: ProviderError) -> Self {
        *self.simulate_failure.write() = Some(error);
        self
    }

    /// Sleep before answering, to exercise timeouts and cancellation.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write() = Some(delay);
        self
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCompletion> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    fn next_response(&self) -> String {
        let responses = self.responses.read();
        if responses.is_empty() {
            return String::new();
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses[index % responses.len()].clone()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String> {
        let prompt = request.render()?;
        self.captured_calls.write().push(CapturedCompletion {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            prompt,
            sampling: request.sampling,
        });

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.simulate_failure.read().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(self.next_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responses_cycle() {
        let mock = MockProvider::new().add_response("one").add_response("two");
        let request = CompletionRequest::new("hello");

        assert_eq!(mock.complete(&request).await.unwrap(), "one");
        assert_eq!(mock.complete(&request).await.unwrap(), "two");
        assert_eq!(mock.complete(&request).await.unwrap(), "one");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_simulated_failure() {
        let mock = MockProvider::replying("unused").simulate_failure(ProviderError::RateLimited("quota".into()));
        let err = mock.complete(&CompletionRequest::new("x")).await.unwrap_err();
        assert_eq!(err, ProviderError::RateLimited("quota".into()));
    }

    #[tokio::test]
    async fn test_unrendered_request_is_not_captured() {
        let mock = MockProvider::replying("ok");
        assert!(mock.complete(&CompletionRequest::new("{{gap}}")).await.is_err());
        assert_eq!(mock.call_count(), 0);
    }
}
