//! CLI command definitions.
//!
//! Each subcommand maps to one xforge workflow: markup generation,
//! markup validation, or dynamic compilation.

use clap::{Parser, Subcommand};
use thiserror::Error;

use xforge_compiler::{InstantiationError, RuntimeError};

pub mod compile;
pub mod generate;
pub mod validate;

/// xforge - natural-language UI markup generation and dynamic compilation
#[derive(Parser)]
#[command(name = "xforge")]
#[command(version, about = "xforge - UI markup generation and dynamic compilation")]
#[command(long_about = r#"
xforge turns plain-language interface descriptions into validated XAML markup
and compiles XScript sources into isolated, loadable modules.

WORKFLOWS:
  generate  → Generate XAML markup from a description via a completion provider
  validate  → Check a markup file for well-formedness and allowed elements
  compile   → Compile an XScript file, list its types or run one of them

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Template error
  5 - Provider error
  6 - Compilation failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate XAML markup from a natural-language description
    Generate(generate::GenerateArgs),

    /// Validate a XAML markup file
    Validate(validate::ValidateArgs),

    /// Compile an XScript source file
    Compile(compile::CompileArgs),
}

/// Failures raised by the commands themselves, mapped onto exit codes.
#[derive(Error, Debug)]
pub enum CommandFailure {
    #[error("Markup validation failed: {0}")]
    InvalidMarkup(String),

    #[error("Generation produced nothing within {0}s")]
    TimedOut(u64),

    #[error("Compilation failed with {0} error(s)")]
    CompilationFailed(usize),

    #[error("Instantiation failed: {0}")]
    Instantiation(#[from] InstantiationError),

    #[error("Invocation failed: {0}")]
    Invocation(#[from] RuntimeError),
}
