//! Generate command - Turn a description into XAML markup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::{debug, info};

use xforge_llm::{HttpCompletionProvider, ProviderConfig};
use xforge_markup::{
    GenerationRequest, MarkupGenerator, MarkupValidator, ValidatorPolicy, DEFAULT_THEME,
};
use xforge_templates::PromptTemplateStore;

use super::CommandFailure;

#[derive(Args)]
pub struct GenerateArgs {
    /// Plain-language description of the interface
    pub description: String,

    /// Extra layout or content constraints passed to the prompt
    #[arg(short, long)]
    pub constraints: Option<String>,

    /// Visual theme name (defaults to Mechanicus)
    #[arg(short, long)]
    pub theme: Option<String>,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,

    /// Override the provider's configured model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Directory holding prompts/markup_generation.txt (defaults to the current directory)
    #[arg(long)]
    pub prompts_dir: Option<PathBuf>,

    /// YAML validator policy replacing the built-in element allow-list
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Write the markup to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the full generation result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: GenerateArgs) -> Result<()> {
    let current_dir = std::env::current_dir()?;

    let config = if current_dir.join(".xforge").join("settings.json").exists() {
        ProviderConfig::from_settings(&current_dir)?
    } else {
        ProviderConfig::from_env()?
    };
    info!("Using {:?} provider with model {}", config.provider, config.model);

    let provider = HttpCompletionProvider::new(config)?;
    let store = PromptTemplateStore::new(args.prompts_dir.unwrap_or_else(|| current_dir.clone()));
    debug!("Prompt template path: {}", store.template_path().display());

    let mut generator = MarkupGenerator::new(Arc::new(provider), &store)?;
    if let Some(model) = args.model {
        generator = generator.with_model(model);
    }
    if let Some(policy_path) = &args.policy {
        let policy = ValidatorPolicy::from_yaml_file(policy_path)?;
        generator = generator.with_validator(MarkupValidator::new(policy));
    }

    let mut request = GenerationRequest::new(args.description)?
        .with_theme(args.theme.unwrap_or_else(|| DEFAULT_THEME.to_string()));
    if let Some(constraints) = args.constraints {
        request = request.with_constraints(constraints);
    }

    eprintln!("🛠️  Generating markup ({} theme)...", request.theme_name());
    let result = generator
        .generate_with_timeout(&request, Duration::from_secs(args.timeout_secs))
        .await
        .ok_or(CommandFailure::TimedOut(args.timeout_secs))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if let Some(output) = &args.output {
        std::fs::write(output, &result.markup)?;
        eprintln!("   Markup written to {}", output.display());
    } else if !result.markup.is_empty() {
        println!("{}", result.markup);
    }

    for warning in &result.warnings {
        eprintln!("   ⚠️  {}", warning);
    }

    if result.is_valid {
        eprintln!("✅ Markup is valid ({} chars)", result.markup.len());
        Ok(())
    } else {
        let reason = result
            .validation_error
            .unwrap_or_else(|| "unknown validation failure".to_string());
        eprintln!("❌ {}", reason);
        Err(CommandFailure::InvalidMarkup(reason).into())
    }
}
