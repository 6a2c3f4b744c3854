//! Integration tests for the completion provider contract.

use std::sync::Arc;
use std::time::Duration;

use xforge_llm::{
    CompletionProvider, CompletionRequest, MockProvider, ProviderError, SamplingConfig,
};

/// The rendered prompt and the sampling bundle reach the provider unchanged.
#[tokio::test]
async fn test_request_is_rendered_and_captured() {
    let mock = MockProvider::replying("<Grid/>");
    let provider: Arc<dyn CompletionProvider> = Arc::new(mock.clone());

    let request = CompletionRequest::new("Make {{userDescription}}. {{constraints}}")
        .with_variable("userDescription", "a toolbar")
        .with_variable("constraints", "No additional constraints")
        .with_sampling(SamplingConfig::new().max_tokens(2000).temperature(0.7).top_p(0.9));

    let text = provider.complete(&request).await.unwrap();
    assert_eq!(text, "<Grid/>");

    let calls = mock.get_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].prompt, "Make a toolbar. No additional constraints");
    assert_eq!(calls[0].model, "mock-model");
    assert_eq!(calls[0].sampling.max_tokens, Some(2000));
}

/// A per-request model override wins over the provider default.
#[tokio::test]
async fn test_model_override() {
    let mock = MockProvider::replying("x");
    mock.complete(&CompletionRequest::new("p").with_model("gpt-4o"))
        .await
        .unwrap();
    assert_eq!(mock.get_calls()[0].model, "gpt-4o");
}

/// Out of range sampling is rejected before the call.
#[tokio::test]
async fn test_invalid_sampling_rejected() {
    let mock = MockProvider::replying("x");
    let request = CompletionRequest::new("p").with_sampling(SamplingConfig::new().temperature(2.0));
    let err = mock.complete(&request).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidSampling(_)));
}

/// Dropping a slow call through a timeout leaves nothing behind.
#[tokio::test]
async fn test_timeout_cancels_call() {
    let mock = MockProvider::replying("late").with_delay(Duration::from_millis(500));
    let request = CompletionRequest::new("p");

    let result = tokio::time::timeout(Duration::from_millis(20), mock.complete(&request)).await;
    assert!(result.is_err());
}
