//! # xforge_llm
//!
//! Completion provider adapters for xforge.
//!
//! A completion provider takes a prompt template, a set of named variables and
//! sampling parameters, and returns generated text. The [`CompletionProvider`]
//! trait is the only capability the rest of xforge depends on; transport and
//! authentication stay inside the adapters.
//!
//! - [`HttpCompletionProvider`]: OpenAI, Azure OpenAI, Anthropic and any
//!   OpenAI-compatible endpoint, configured through [`ProviderConfig`]
//! - [`MockProvider`]: queued responses and captured calls for tests
//!
//! Adapters never retry. Every failure surfaces as a [`ProviderError`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use xforge_llm::{CompletionProvider, CompletionRequest, HttpCompletionProvider, ProviderConfig, SamplingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = HttpCompletionProvider::new(ProviderConfig::from_env()?)?;
//!
//!     let request = CompletionRequest::new("Describe {{topic}} in one line.")
//!         .with_variable("topic", "XAML")
//!         .with_sampling(SamplingConfig::new().max_tokens(64).temperature(0.2));
//!
//!     println!("{}", provider.complete(&request).await?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod provider;

pub use config::{ProviderConfig, ProviderKind, DEFAULT_ANTHROPIC_MODEL, DEFAULT_MODEL};
pub use error::{ProviderError, ProviderResult};
pub use http::HttpCompletionProvider;
pub use mock::{CapturedCompletion, MockProvider};
pub use provider::{CompletionProvider, CompletionRequest, SamplingConfig};
