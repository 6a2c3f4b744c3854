//! End-to-end tests for the markup pipeline with a mocked provider.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use xforge_llm::{MockProvider, ProviderError};
use xforge_markup::{
    sanitize, GenerationRequest, MarkupError, MarkupGenerator, MarkupValidator, ValidatorPolicy,
    EMPTY_MARKUP,
};
use xforge_templates::{PromptTemplateStore, TEMPLATE_PATH};

fn generator_for(mock: &MockProvider) -> MarkupGenerator {
    let temp = tempdir().unwrap();
    MarkupGenerator::new(Arc::new(mock.clone()), &PromptTemplateStore::new(temp.path())).unwrap()
}

fn login_request() -> GenerationRequest {
    GenerationRequest::new("a login panel").unwrap().with_theme("default")
}

/// Fenced markup is unwrapped and accepted.
#[tokio::test]
async fn test_fenced_markup_is_accepted() {
    let mock = MockProvider::replying("```xaml\n<Grid><TextBox/></Grid>\n```");
    let result = generator_for(&mock).generate(&login_request()).await;

    assert_eq!(result.markup, "<Grid><TextBox/></Grid>");
    assert!(result.is_valid);
    assert!(result.validation_error.is_none());

    let calls = mock.get_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].prompt.contains("a login panel"));
    assert!(calls[0].prompt.contains("No additional constraints"));
    assert_eq!(calls[0].sampling.max_tokens, Some(2000));
}

/// A window root is rejected with a message naming it.
#[tokio::test]
async fn test_window_root_is_rejected() {
    let mock = MockProvider::replying("<Window><Button/></Window>");
    let result = generator_for(&mock).generate(&login_request()).await;

    assert!(!result.is_valid);
    assert_eq!(result.markup, "<Window><Button/></Window>");
    assert!(result.validation_error.unwrap().contains("Window"));
}

/// Prose without markup becomes the empty-markup failure, not a provider error.
#[tokio::test]
async fn test_prose_reply_is_empty_markup() {
    let mock = MockProvider::replying("I cannot help with that");
    let result = generator_for(&mock).generate(&login_request()).await;

    assert_eq!(result.markup, "");
    assert!(!result.is_valid);
    assert_eq!(result.validation_error.as_deref(), Some(EMPTY_MARKUP));
}

/// Provider failures surface as a failed result.
#[tokio::test]
async fn test_provider_failure_is_reported() {
    let mock = MockProvider::new().simulate_failure(ProviderError::Timeout("30s".into()));
    let result = generator_for(&mock).generate(&login_request()).await;

    assert!(!result.is_valid);
    assert!(result.markup.is_empty());
    let error = result.validation_error.unwrap();
    assert!(error.starts_with("generation failed"));
    assert!(error.contains("timed out"));
}

/// A template file missing its placeholders is fatal at construction.
#[test]
fn test_bad_template_file_fails_construction() {
    let temp = tempdir().unwrap();
    let path = temp.path().join(TEMPLATE_PATH);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "no placeholders at all").unwrap();

    let result = MarkupGenerator::new(
        Arc::new(MockProvider::new()),
        &PromptTemplateStore::new(temp.path()),
    );
    assert!(matches!(result, Err(MarkupError::Template(_))));
}

/// A file template with a placeholder the generator never binds fails the call.
#[tokio::test]
async fn test_unbound_placeholder_fails_generation() {
    let mock = MockProvider::replying("<Grid/>");
    let generator = MarkupGenerator::with_template(
        Arc::new(mock.clone()),
        "{{userDescription}} {{constraints}} {{palette}}",
    );
    let result = generator.generate(&login_request()).await;

    assert!(!result.is_valid);
    assert!(result.validation_error.unwrap().contains("palette"));
    assert_eq!(mock.call_count(), 0);
}

/// A deadline shorter than the provider latency yields no result.
#[tokio::test]
async fn test_timeout_produces_nothing() {
    let mock = MockProvider::replying("<Grid/>").with_delay(Duration::from_millis(500));
    let generator = generator_for(&mock);

    let result = generator
        .generate_with_timeout(&login_request(), Duration::from_millis(20))
        .await;
    assert!(result.is_none());

    let mock = MockProvider::replying("<Grid/>");
    let result = generator_for(&mock)
        .generate_with_timeout(&login_request(), Duration::from_secs(5))
        .await;
    assert!(result.unwrap().is_valid);
}

/// One generator serves concurrent requests independently.
#[tokio::test]
async fn test_concurrent_generation() {
    let mock = MockProvider::new()
        .add_response("<Grid/>")
        .add_response("<Window/>");
    let generator = Arc::new(generator_for(&mock));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let generator = Arc::clone(&generator);
            tokio::spawn(async move { generator.generate(&login_request()).await })
        })
        .collect();

    let mut valid = 0;
    for handle in handles {
        if handle.await.unwrap().is_valid {
            valid += 1;
        }
    }
    assert_eq!(valid, 2);
    assert_eq!(mock.call_count(), 4);
}

/// Policies load from YAML and partial files keep defaults.
#[test]
fn test_policy_from_yaml() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("policy.yaml");
    fs::write(&path, "forbidden_roots:\n  - Window\n  - Page\n").unwrap();

    let policy = ValidatorPolicy::from_yaml_file(&path).unwrap();
    assert_eq!(policy.forbidden_roots, vec!["Window", "Page"]);
    assert!(policy.container_roots.contains(&"Grid".to_string()));

    let validator = MarkupValidator::new(policy);
    assert!(!validator.validate("<Page/>").valid);
}

/// Sanitizing is idempotent and clean markup survives it.
#[test]
fn test_sanitize_properties() {
    let clean = r#"<StackPanel xmlns:hc="https://handyorg.github.io/handycontrol">
    <hc:TextBox Text="{Binding UserName}"/>
</StackPanel>"#;
    assert_eq!(sanitize(clean), clean);

    for raw in [
        clean,
        "Sure!\n```xml\n<Grid/>\n```",
        "&lt;Grid&gt;&lt;/Grid&gt;",
        "nothing here",
        "```",
    ] {
        let once = sanitize(raw);
        assert_eq!(sanitize(&once), once);
    }
}
