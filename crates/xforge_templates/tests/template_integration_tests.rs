//! Integration tests for template loading and rendering.

use std::collections::HashMap;
use std::fs;

use tempfile::tempdir;

use xforge_templates::{
    PromptTemplateStore, TemplateError, TemplateRenderer, TemplateSource, DEFAULT_TEMPLATE,
    TEMPLATE_PATH,
};

fn write_template(root: &std::path::Path, content: &[u8]) {
    let path = root.join(TEMPLATE_PATH);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A template file on disk wins over the built-in one.
#[test]
fn test_file_template_is_preferred() {
    let temp = tempdir().unwrap();
    write_template(temp.path(), b"Build: {{userDescription}}\nLimits: {{constraints}}");

    let store = PromptTemplateStore::new(temp.path());
    let (text, source) = store.load_with_source().unwrap();

    assert_eq!(text, "Build: {{userDescription}}\nLimits: {{constraints}}");
    assert_eq!(source, TemplateSource::File(temp.path().join(TEMPLATE_PATH)));
}

/// The `{{$name}}` spelling counts as the placeholder being present.
#[test]
fn test_dollar_placeholders_accepted() {
    let temp = tempdir().unwrap();
    write_template(temp.path(), b"{{$userDescription}} {{$constraints}}");
    assert!(PromptTemplateStore::new(temp.path()).load().is_ok());
}

/// A template missing a placeholder is a configuration error, not a fallback.
#[test]
fn test_template_missing_placeholder_is_malformed() {
    let temp = tempdir().unwrap();
    write_template(temp.path(), b"Only {{userDescription}} here");

    let err = PromptTemplateStore::new(temp.path()).load().unwrap_err();
    match err {
        TemplateError::Malformed { message, .. } => assert!(message.contains("constraints")),
        other => panic!("unexpected error: {other}"),
    }
}

/// Non UTF-8 content is reported as unreadable.
#[test]
fn test_binary_template_is_unreadable() {
    let temp = tempdir().unwrap();
    write_template(temp.path(), &[0xff, 0xfe, 0x00, 0x9f]);

    let err = PromptTemplateStore::new(temp.path()).load().unwrap_err();
    assert!(matches!(err, TemplateError::Unreadable { .. }));
}

/// The built-in template renders with the two standard variables.
#[test]
fn test_default_template_renders() {
    let mut vars = HashMap::new();
    vars.insert("userDescription".to_string(), "a login panel".to_string());
    vars.insert("constraints".to_string(), "No additional constraints".to_string());

    let prompt = TemplateRenderer::new()
        .render_strict(DEFAULT_TEMPLATE, &vars)
        .unwrap();

    assert!(prompt.contains("a login panel"));
    assert!(prompt.contains("No additional constraints"));
    assert!(!prompt.contains("{{"));
}
