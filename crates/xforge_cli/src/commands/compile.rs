//! Compile command - Compile XScript source and optionally run a type.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;
use tracing::info;

use xforge_compiler::{DynamicCompiler, InstanceFactory, Value};

use super::CommandFailure;

#[derive(Args)]
pub struct CompileArgs {
    /// XScript source file
    pub file: PathBuf,

    /// Instantiate this type after a successful compile
    #[arg(short = 't', long = "type")]
    pub type_name: Option<String>,

    /// Constructor argument; repeat for more (ints, floats, true/false, null or text)
    #[arg(short, long = "arg", requires = "type_name")]
    pub args: Vec<String>,

    /// Method to invoke on the new instance
    #[arg(short, long, requires = "type_name")]
    pub invoke: Option<String>,

    /// Argument for the invoked method; repeat for more
    #[arg(long = "invoke-arg", requires = "invoke")]
    pub invoke_args: Vec<String>,

    /// List the module's public types
    #[arg(short, long)]
    pub list_types: bool,

    /// Print diagnostics and results as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: CompileArgs) -> Result<()> {
    info!("Compiling source file: {}", args.file.display());

    if !args.file.exists() {
        anyhow::bail!("File not found: {}", args.file.display());
    }
    let bytes = std::fs::read(&args.file)?;
    let source = String::from_utf8_lossy(&bytes).into_owned();

    let compiler = DynamicCompiler::new();
    let outcome = {
        let compiler = compiler.clone();
        tokio::task::spawn_blocking(move || compiler.compile(&source, &[])).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("🔧 Compiled {} as {}", args.file.display(), outcome.unit_name);
        for error in &outcome.errors {
            println!("   ❌ {}", error);
        }
        for warning in &outcome.warnings {
            println!("   ⚠️  {}", warning);
        }
    }

    let module = match outcome.module {
        Some(module) if outcome.success => module,
        _ => return Err(CommandFailure::CompilationFailed(outcome.errors.len()).into()),
    };
    if !args.json {
        println!("   ✅ Compilation succeeded ({} types)", module.type_count());
    }

    if args.list_types {
        let types = compiler.list_exported_types(&module);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&types)?);
        } else if types.is_empty() {
            println!("📦 No public types");
        } else {
            println!("📦 Public types:");
            for ty in &types {
                let methods: Vec<String> = ty
                    .methods
                    .iter()
                    .map(|m| format!("{}/{}", m.name, m.arity))
                    .collect();
                println!(
                    "   - {} (constructors: {:?}; methods: {})",
                    ty.full_name,
                    ty.constructors,
                    methods.join(", ")
                );
            }
        }
    }

    let Some(type_name) = &args.type_name else {
        return Ok(());
    };

    let ctor_args = parse_values(&args.args);
    let instance = InstanceFactory::try_create_instance(&module, type_name, &ctor_args)
        .map_err(CommandFailure::from)?;
    info!("Created instance of {}", instance.type_name());

    match &args.invoke {
        Some(method) => {
            let result = instance
                .invoke(method, &parse_values(&args.invoke_args))
                .map_err(CommandFailure::from)?;
            if args.json {
                println!("{}", json!({ "method": method, "result": result.to_string() }));
            } else {
                println!("▶️  {}.{} returned {}", instance.type_name(), method, result);
            }
        }
        None => {
            let fields = instance.public_fields();
            if args.json {
                let map: serde_json::Map<String, serde_json::Value> = fields
                    .into_iter()
                    .map(|(name, value)| (name, json!(value.to_string())))
                    .collect();
                println!("{}", json!({ "type": instance.type_name(), "fields": map }));
            } else {
                println!("🧩 Created {}", instance.type_name());
                for (name, value) in fields {
                    println!("   {} = {}", name, value);
                }
            }
        }
    }

    Ok(())
}

fn parse_values(raw: &[String]) -> Vec<Value> {
    raw.iter().map(|text| Value::parse_literal(text)).collect()
}
