//! Placeholder rendering.

use std::collections::{BTreeSet, HashMap};

use regex::{Captures, Regex};

use crate::error::{TemplateError, TemplateResult};

/// Renders `{{name}}` / `{{$name}}` placeholders.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    variable_pattern: Regex,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    /// Create a new template renderer.
    pub fn new() -> Self {
        Self {
            // {{name}}, {{$name}}, {{ name }}
            variable_pattern: Regex::new(r"\{\{\s*\$?([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
                .expect("placeholder pattern is a valid regex"),
        }
    }

    /// Names of all placeholders in `content`, deduplicated and sorted.
    pub fn placeholders(&self, content: &str) -> BTreeSet<String> {
        self.variable_pattern
            .captures_iter(content)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// Render content, failing on the first placeholder without a binding.
    ///
    /// Variables the template does not mention are ignored.
    pub fn render_strict(
        &self,
        content: &str,
        variables: &HashMap<String, String>,
    ) -> TemplateResult<String> {
        if let Some(missing) = self
            .placeholders(content)
            .into_iter()
            .find(|name| !variables.contains_key(name))
        {
            return Err(TemplateError::UnresolvedPlaceholder(missing));
        }

        Ok(self
            .variable_pattern
            .replace_all(content, |caps: &Captures| {
                variables.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_both_spellings() {
        let renderer = TemplateRenderer::new();
        let rendered = renderer
            .render_strict(
                "Request: {{userDescription}} / {{$constraints}} / {{ userDescription }}",
                &vars(&[("userDescription", "a form"), ("constraints", "none")]),
            )
            .unwrap();
        assert_eq!(rendered, "Request: a form / none / a form");
    }

    #[test]
    fn test_unresolved_placeholder_fails() {
        let renderer = TemplateRenderer::new();
        let err = renderer
            .render_strict("{{userDescription}} {{constraints}}", &vars(&[("userDescription", "x")]))
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnresolvedPlaceholder(name) if name == "constraints"));
    }

    #[test]
    fn test_extra_variables_are_ignored() {
        let renderer = TemplateRenderer::new();
        let rendered = renderer
            .render_strict("plain", &vars(&[("unused", "value")]))
            .unwrap();
        assert_eq!(rendered, "plain");
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let renderer = TemplateRenderer::new();
        let rendered = renderer
            .render_strict("{{a}}", &vars(&[("a", "{{b}}")]))
            .unwrap();
        assert_eq!(rendered, "{{b}}");
    }

    #[test]
    fn test_placeholders() {
        let renderer = TemplateRenderer::new();
        let names = renderer.placeholders("{{b}} {{$a}} {{b}} {not} {{1x}}");
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
