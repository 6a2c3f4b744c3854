//! Structural validation of generated markup.
//!
//! The markup is parsed with `quick-xml` and the policy is applied to the
//! parsed root element, never to raw text. DOCTYPE declarations are rejected
//! outright, so no entity definitions are ever expanded.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MarkupError, MarkupResult};

/// Error reported for empty or whitespace-only markup.
pub const EMPTY_MARKUP: &str = "markup is empty";

const DEFAULT_FORBIDDEN_ROOTS: &[&str] = &["Window"];

const DEFAULT_CONTAINER_ROOTS: &[&str] = &[
    "Grid",
    "StackPanel",
    "DockPanel",
    "WrapPanel",
    "Canvas",
    "Border",
    "ScrollViewer",
    "UniformGrid",
    "Viewbox",
    "UserControl",
    "GroupBox",
    "Expander",
    "TabControl",
    "ItemsControl",
    "ContentControl",
];

/// Root-element policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorPolicy {
    /// Local names that may never be the root (top-level windows)
    pub forbidden_roots: Vec<String>,
    /// Known container local names; other roots produce a warning
    pub container_roots: Vec<String>,
}

impl Default for ValidatorPolicy {
    fn default() -> Self {
        Self {
            forbidden_roots: DEFAULT_FORBIDDEN_ROOTS.iter().map(|s| s.to_string()).collect(),
            container_roots: DEFAULT_CONTAINER_ROOTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ValidatorPolicy {
    /// Load a policy from a YAML file. Missing keys take their defaults.
    pub fn from_yaml_file(path: &Path) -> MarkupResult<Self> {
        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| MarkupError::InvalidPolicy {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Validation outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(message.into()),
            warnings: Vec::new(),
        }
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Root element of a well-formed document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RootElement {
    qualified_name: String,
    local_name: String,
}

/// Stateless markup validator; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct MarkupValidator {
    policy: ValidatorPolicy,
}

impl MarkupValidator {
    pub fn new(policy: ValidatorPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ValidatorPolicy {
        &self.policy
    }

    /// `(is_valid, error)` form of [`validate`](Self::validate).
    pub fn is_valid(&self, markup: &str) -> (bool, Option<String>) {
        let report = self.validate(markup);
        (report.valid, report.error)
    }

    /// Validate markup against well-formedness and the root policy.
    pub fn validate(&self, markup: &str) -> ValidationReport {
        if markup.trim().is_empty() {
            return ValidationReport::invalid(EMPTY_MARKUP);
        }

        let root = match parse_root(markup) {
            Ok(root) => root,
            Err(message) => {
                debug!("Markup failed to parse: {}", message);
                return ValidationReport::invalid(message);
            }
        };

        if self.policy.forbidden_roots.iter().any(|f| *f == root.local_name) {
            return ValidationReport::invalid(format!(
                "root element <{}> is not allowed: markup must be an embeddable fragment, \
                 use a container element such as Grid, StackPanel or DockPanel instead",
                root.qualified_name
            ));
        }

        let mut report = ValidationReport::valid();
        let known = self
            .policy
            .container_roots
            .iter()
            .any(|c| *c == root.local_name);
        if !known && !root.qualified_name.contains(':') {
            report.add_warning(format!(
                "root element <{}> is not a known container element",
                root.qualified_name
            ));
        }
        report
    }
}

fn parse_root(markup: &str) -> Result<RootElement, String> {
    // end-name checking is on by default
    let mut reader = NsReader::from_str(markup);

    let mut open: Vec<String> = Vec::new();
    let mut root: Option<RootElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| located(markup, reader.buffer_position() as usize, &e.to_string()))?;
        let position = reader.buffer_position() as usize;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                check_element(&reader, e).map_err(|m| located(markup, position, &m))?;
                let qualified_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

                if open.is_empty() {
                    if root.is_some() {
                        return Err(located(
                            markup,
                            position,
                            &format!("unexpected second root element <{}>", qualified_name),
                        ));
                    }
                    root = Some(RootElement {
                        local_name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                        qualified_name: qualified_name.clone(),
                    });
                }
                if matches!(event, Event::Start(_)) {
                    open.push(qualified_name);
                }
            }
            Event::End(ref e) => {
                if open.pop().is_none() {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    return Err(located(markup, position, &format!("unexpected closing tag </{}>", name)));
                }
            }
            Event::Text(ref t) => {
                let text = t
                    .unescape()
                    .map_err(|e| located(markup, position, &e.to_string()))?;
                if open.is_empty() && !text.trim().is_empty() {
                    return Err(located(markup, position, "text is not allowed outside the root element"));
                }
            }
            Event::CData(_) => {
                if open.is_empty() {
                    return Err(located(markup, position, "CDATA is not allowed outside the root element"));
                }
            }
            Event::DocType(_) => {
                return Err(located(markup, position, "DOCTYPE declarations are not allowed"));
            }
            Event::Decl(_) | Event::PI(_) | Event::Comment(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(located(
            markup,
            markup.len(),
            &format!("element <{}> is not closed", unclosed),
        ));
    }

    root.ok_or_else(|| "document has no root element".to_string())
}

/// Namespace prefixes must be declared; attribute values must be legal XML.
fn check_element(reader: &NsReader<&[u8]>, element: &BytesStart<'_>) -> Result<(), String> {
    if let (ResolveResult::Unknown(prefix), _) = reader.resolve_element(element.name()) {
        return Err(format!(
            "namespace prefix '{}' of <{}> is not declared",
            String::from_utf8_lossy(&prefix),
            String::from_utf8_lossy(element.name().as_ref())
        ));
    }

    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();

        if attr.key.as_namespace_binding().is_none() {
            if let (ResolveResult::Unknown(prefix), _) = reader.resolve_attribute(attr.key) {
                return Err(format!(
                    "namespace prefix '{}' of attribute '{}' is not declared",
                    String::from_utf8_lossy(&prefix),
                    key
                ));
            }
        }
        if attr.value.contains(&b'<') {
            return Err(format!("'<' is not allowed in the value of attribute '{}'", key));
        }
        let _value: Cow<'_, str> = attr.unescape_value().map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Prefix a parser message with the 1-based line and column of `offset`.
fn located(markup: &str, offset: usize, message: &str) -> String {
    let (line, column) = line_column(markup, offset);
    format!("markup parse error at line {}, column {}: {}", line, column, message)
}

fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}
