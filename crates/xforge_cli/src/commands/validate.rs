//! Validate command - Check a markup file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use xforge_markup::{sanitize, MarkupValidator, ValidatorPolicy};

use super::CommandFailure;

#[derive(Args)]
pub struct ValidateArgs {
    /// Markup file to validate
    pub file: PathBuf,

    /// Strip code fences and chatter before validating
    #[arg(short, long)]
    pub sanitize: bool,

    /// YAML validator policy replacing the built-in element allow-list
    #[arg(long)]
    pub policy: Option<PathBuf>,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    info!("Validating markup file: {}", args.file.display());

    if !args.file.exists() {
        anyhow::bail!("File not found: {}", args.file.display());
    }
    let bytes = std::fs::read(&args.file)?;
    let mut markup = String::from_utf8_lossy(&bytes).into_owned();
    if args.sanitize {
        markup = sanitize(&markup);
    }

    let validator = match &args.policy {
        Some(path) => MarkupValidator::new(ValidatorPolicy::from_yaml_file(path)?),
        None => MarkupValidator::default(),
    };

    println!("📋 Validating {}...", args.file.display());
    let report = validator.validate(&markup);

    for warning in &report.warnings {
        println!("   ⚠️  {}", warning);
    }

    if report.valid {
        println!("   ✅ Markup is valid");
        Ok(())
    } else {
        let reason = report.error.unwrap_or_default();
        println!("   ❌ {}", reason);
        Err(CommandFailure::InvalidMarkup(reason).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_validate_sanitized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.xaml");
        std::fs::write(
            &path,
            "Here you go:\n```xml\n<Grid><TextBlock Text=\"Hi\"/></Grid>\n```",
        )
        .unwrap();

        let args = ValidateArgs {
            file: path.clone(),
            sanitize: true,
            policy: None,
        };
        assert!(execute(args).await.is_ok());

        let args = ValidateArgs {
            file: path,
            sanitize: false,
            policy: None,
        };
        let err = execute(args).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CommandFailure>(),
            Some(CommandFailure::InvalidMarkup(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let args = ValidateArgs {
            file: PathBuf::from("/definitely/not/here.xaml"),
            sanitize: false,
            policy: None,
        };
        let err = execute(args).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
