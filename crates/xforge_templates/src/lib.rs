//! # xforge_templates
//!
//! Prompt templates for xforge.
//!
//! A prompt template is plain UTF-8 text containing named placeholders such as
//! `{{userDescription}}` (the `{{$name}}` spelling is accepted too). This crate
//! provides:
//!
//! - [`PromptTemplateStore`]: loads the markup-generation template from a
//!   conventional location, falling back to a built-in template when the file
//!   is absent.
//! - [`TemplateRenderer`]: strict rendering where every placeholder must be
//!   bound, so a prompt never reaches a provider with literal `{{...}}` left in
//!   it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use xforge_templates::{PromptTemplateStore, TemplateRenderer};
//!
//! let template = PromptTemplateStore::new(".").load().unwrap();
//!
//! let mut vars = HashMap::new();
//! vars.insert("userDescription".to_string(), "a login panel".to_string());
//! vars.insert("constraints".to_string(), "No additional constraints".to_string());
//!
//! let prompt = TemplateRenderer::new().render_strict(&template, &vars).unwrap();
//! ```

pub mod error;
pub mod renderer;
pub mod store;

pub use error::{TemplateError, TemplateResult};
pub use renderer::TemplateRenderer;
pub use store::{
    PromptTemplateStore, TemplateSource, DEFAULT_TEMPLATE, REQUIRED_PLACEHOLDERS, TEMPLATE_PATH,
};
