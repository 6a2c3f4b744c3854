//! # xforge_markup
//!
//! Turns a natural-language description into a validated XAML fragment.
//!
//! ```text
//! GenerationRequest ──▶ template + variables ──▶ CompletionProvider
//!                                                      │ raw text
//!                                                      ▼
//!        GenerationResult ◀── MarkupValidator ◀── sanitize()
//! ```
//!
//! - [`MarkupGenerator`]: the closed loop. Never fails; every problem ends up
//!   in [`GenerationResult::validation_error`].
//! - [`sanitize`]: strips code fences, escaped markup and surrounding prose.
//! - [`MarkupValidator`]: well-formedness plus root-element policy
//!   ([`ValidatorPolicy`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xforge_llm::MockProvider;
//! use xforge_markup::{GenerationRequest, MarkupGenerator};
//! use xforge_templates::PromptTemplateStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(MockProvider::replying("```xaml\n<Grid><TextBox/></Grid>\n```"));
//!     let generator = MarkupGenerator::new(provider, &PromptTemplateStore::default())?;
//!
//!     let result = generator.generate(&GenerationRequest::new("a login panel")?).await;
//!     assert!(result.is_valid);
//!     println!("{}", result.markup);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod generator;
pub mod models;
pub mod sanitizer;
pub mod validator;

pub use error::{MarkupError, MarkupResult};
pub use generator::{MarkupGenerator, GENERATION_SAMPLING};
pub use models::{GenerationRequest, GenerationResult, DEFAULT_CONSTRAINTS, DEFAULT_THEME};
pub use sanitizer::sanitize;
pub use validator::{MarkupValidator, ValidationReport, ValidatorPolicy, EMPTY_MARKUP};
