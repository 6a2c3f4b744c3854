//! xforge CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Template error
//! - 5: Provider error
//! - 6: Compilation failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use xforge_llm::ProviderError;
use xforge_markup::MarkupError;
use xforge_templates::TemplateError;

mod commands;

use commands::{Cli, CommandFailure, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
    pub const PROVIDER_ERROR: u8 = 5;
    pub const COMPILE_FAILURE: u8 = 6;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "xforge=debug"
    } else if cli.quiet {
        "xforge=warn"
    } else {
        "xforge=info"
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(level.parse().expect("static directive"))
        .add_directive("warn".parse().expect("static directive"));

    // Logs go to stderr so generated markup on stdout stays clean
    let log_result = tracing_subscriber::registry()
        .with(
            cli.json_logs
                .then(|| fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with(
            (!cli.json_logs)
                .then(|| fmt::layer().with_target(false).with_writer(std::io::stderr)),
        )
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match cli.command {
        Commands::Generate(args) => commands::generate::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Compile(args) => commands::compile::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(failure) = e.downcast_ref::<CommandFailure>() {
        return match failure {
            CommandFailure::InvalidMarkup(_) => ExitCodes::VALIDATION_FAILURE,
            CommandFailure::TimedOut(_) => ExitCodes::PROVIDER_ERROR,
            CommandFailure::CompilationFailed(_)
            | CommandFailure::Instantiation(_)
            | CommandFailure::Invocation(_) => ExitCodes::COMPILE_FAILURE,
        };
    }
    if let Some(markup) = e.downcast_ref::<MarkupError>() {
        return match markup {
            MarkupError::Template(_) => ExitCodes::TEMPLATE_ERROR,
            MarkupError::Provider(_) => ExitCodes::PROVIDER_ERROR,
            MarkupError::InvalidPolicy { .. } => ExitCodes::VALIDATION_FAILURE,
            MarkupError::EmptyDescription => ExitCodes::INVALID_ARGS,
            MarkupError::Io(_) => ExitCodes::GENERAL_ERROR,
        };
    }
    if e.downcast_ref::<ProviderError>().is_some() {
        return ExitCodes::PROVIDER_ERROR;
    }
    if e.downcast_ref::<TemplateError>().is_some() {
        return ExitCodes::TEMPLATE_ERROR;
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("validation") || msg.contains("policy") {
        ExitCodes::VALIDATION_FAILURE
    } else if msg.contains("template") {
        ExitCodes::TEMPLATE_ERROR
    } else if msg.contains("argument") || msg.contains("option") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
