//! Prompt template store.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{TemplateError, TemplateResult};
use crate::renderer::TemplateRenderer;

/// Conventional template location, relative to the store's base directory.
pub const TEMPLATE_PATH: &str = "prompts/markup_generation.txt";

/// Placeholders every markup-generation template must contain.
pub const REQUIRED_PLACEHOLDERS: [&str; 2] = ["userDescription", "constraints"];

/// Built-in template used when no template file is present.
pub const DEFAULT_TEMPLATE: &str = r##"You are an expert author of WPF XAML user interfaces with a dark, industrial "Mechanicus" aesthetic.

## Task
Produce one XAML fragment that satisfies the request below. The fragment must:
1. Parse with XamlReader.Parse() without any changes
2. Prefer HandyControl controls where they help (xmlns:hc="https://handyorg.github.io/handycontrol")
3. Use the palette below for every brush
4. Follow normal WPF layout and data-binding practice

## Palette
- Background: #1a0f0a
- Panel background: #2a1f1a
- Accent: #8b2e0b
- Highlight: #d4af37
- Text: #e8d4b0
- Secondary text: #9a8a7a
- Border: #5a4a3a

## Style
- Translucent overlays such as #cc1a0f0a for panels
- Soft DropShadowEffect glows in the highlight colour
- Metallic gradients on borders and headers
- Hover feedback on interactive controls

## Rules
- The root element must be a container (Grid, StackPanel, DockPanel, Border); never a Window
- Declare every namespace prefix you use (xmlns:hc for HandyControl, xmlns:x for x:Name)
- Bind dynamic content with {Binding PropertyName}
- No x:Class and no code-behind event handlers; x:Name is fine

## Request
{{userDescription}}

## Constraints
{{constraints}}

## Output
Reply with the XAML only. No markdown fences, no commentary."##;

/// Where a loaded template came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    BuiltIn,
}

/// Loads the markup-generation prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplateStore {
    base_dir: PathBuf,
}

impl Default for PromptTemplateStore {
    /// Store rooted at the current working directory.
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

impl PromptTemplateStore {
    /// Create a store rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Full path of the template file.
    pub fn template_path(&self) -> PathBuf {
        self.base_dir.join(TEMPLATE_PATH)
    }

    /// Load the template text.
    pub fn load(&self) -> TemplateResult<String> {
        self.load_with_source().map(|(text, _)| text)
    }

    /// Load the template text and report where it came from.
    ///
    /// A missing file falls back to [`DEFAULT_TEMPLATE`]. A file that exists but
    /// cannot be read, or lacks a required placeholder, is an error.
    pub fn load_with_source(&self) -> TemplateResult<(String, TemplateSource)> {
        let path = self.template_path();

        let exists = path.try_exists().map_err(|source| TemplateError::Unreadable {
            path: path.clone(),
            source,
        })?;

        if !exists {
            info!("No template at {:?}, using built-in template", path);
            return Ok((DEFAULT_TEMPLATE.to_string(), TemplateSource::BuiltIn));
        }

        debug!("Loading template from {:?}", path);
        let content = fs::read_to_string(&path).map_err(|source| TemplateError::Unreadable {
            path: path.clone(),
            source,
        })?;

        Self::check_placeholders(&path, &content)?;
        info!("Loaded template from {:?}", path);
        Ok((content, TemplateSource::File(path)))
    }

    fn check_placeholders(path: &Path, content: &str) -> TemplateResult<()> {
        let found = TemplateRenderer::new().placeholders(content);
        let missing: Vec<_> = REQUIRED_PLACEHOLDERS
            .iter()
            .filter(|name| !found.contains(**name))
            .copied()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(TemplateError::Malformed {
                path: path.to_path_buf(),
                message: format!("missing placeholder(s): {}", missing.join(", ")),
            })
        }
    }
}
