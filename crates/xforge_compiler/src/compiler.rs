//! Compilation of source text into loaded modules.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::binder;
use crate::diagnostic::{codes, Diagnostic, DiagnosticBag};
use crate::factory::{InstanceFactory, TypeDescriptor};
use crate::image::{self, ModuleImage};
use crate::loader::{CompiledModule, LoadContext};
use crate::references::{self, ModuleReference};
use crate::runtime::Instance;
use crate::syntax;
use crate::value::Value;

/// Source text plus caller-supplied references.
#[derive(Debug, Clone, Default)]
pub struct CompilationUnit {
    source: String,
    references: Vec<ModuleReference>,
}

impl CompilationUnit {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            references: Vec::new(),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<ModuleReference>) -> Self {
        self.references.push(reference.into());
        self
    }

    pub fn with_references(mut self, references: impl IntoIterator<Item = ModuleReference>) -> Self {
        self.references.extend(references);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn references(&self) -> &[ModuleReference] {
        &self.references
    }
}

/// Result of one compile attempt.
///
/// `success` implies `errors` is empty and `module` is present.
#[derive(Debug, Clone, Serialize)]
pub struct CompilationOutcome {
    pub success: bool,
    #[serde(skip)]
    pub module: Option<CompiledModule>,
    pub unit_name: String,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl CompilationOutcome {
    fn succeeded(unit_name: String, module: CompiledModule, diagnostics: DiagnosticBag) -> Self {
        let (errors, warnings) = diagnostics.partition();
        debug_assert!(errors.is_empty());
        Self {
            success: true,
            module: Some(module),
            unit_name,
            errors,
            warnings,
        }
    }

    fn failed(unit_name: String, diagnostics: DiagnosticBag) -> Self {
        let (errors, warnings) = diagnostics.partition();
        Self {
            success: false,
            module: None,
            unit_name,
            errors,
            warnings,
        }
    }

    /// All diagnostics, errors first.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

/// Compiles XScript source into isolated, unloadable modules.
///
/// The compiler holds no mutable state; one instance can be shared across
/// threads and every call produces an independent module.
#[derive(Debug, Clone)]
pub struct DynamicCompiler {
    baseline: &'static [ModuleReference],
}

impl Default for DynamicCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicCompiler {
    pub fn new() -> Self {
        Self {
            baseline: references::baseline(),
        }
    }

    /// Baseline references every compile depends on.
    pub fn baseline(&self) -> &[ModuleReference] {
        self.baseline
    }

    /// Compile `source` with `extra_references` merged after the baseline.
    pub fn compile(&self, source: &str, extra_references: &[ModuleReference]) -> CompilationOutcome {
        let unit = CompilationUnit::new(source).with_references(extra_references.iter().cloned());
        self.compile_unit(&unit)
    }

    /// Compile a unit. Never panics; internal failures become an XF9999 error.
    pub fn compile_unit(&self, unit: &CompilationUnit) -> CompilationOutcome {
        let unit_name = format!("DynamicModule_{}", Uuid::new_v4().simple());
        info!("Compiling {} ({} bytes of source)", unit_name, unit.source.len());

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.build(&unit_name, unit))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("Compilation of {} aborted: {}", unit_name, message);
                let mut diagnostics = DiagnosticBag::new();
                diagnostics.push(Diagnostic::error(
                    codes::INTERNAL_ERROR,
                    format!("Internal compiler error: {}", message),
                    None,
                ));
                CompilationOutcome::failed(unit_name.clone(), diagnostics)
            }
        };

        if outcome.success {
            info!(
                "Compiled {} with {} warnings",
                outcome.unit_name,
                outcome.warnings.len()
            );
        } else {
            info!(
                "Compilation of {} failed with {} errors",
                outcome.unit_name,
                outcome.errors.len()
            );
        }
        outcome
    }

    /// Shorthand for [`InstanceFactory::create_instance`].
    pub fn create_instance(&self, module: &CompiledModule, type_name: &str, args: &[Value]) -> Option<Instance> {
        InstanceFactory::create_instance(module, type_name, args)
    }

    /// Shorthand for [`InstanceFactory::list_exported_types`].
    pub fn list_exported_types(&self, module: &CompiledModule) -> Vec<TypeDescriptor> {
        InstanceFactory::list_exported_types(module)
    }

    fn build(&self, unit_name: &str, unit: &CompilationUnit) -> CompilationOutcome {
        let mut diagnostics = DiagnosticBag::new();
        let references = self.merge_references(&unit.references, &mut diagnostics);

        let tokens = syntax::tokenize(&unit.source, &mut diagnostics);
        let tree = syntax::parse(tokens, &mut diagnostics);
        if diagnostics.has_errors() {
            return CompilationOutcome::failed(unit_name.to_string(), diagnostics);
        }

        let types = binder::bind(&tree, &references, &mut diagnostics);
        if types.is_empty() {
            diagnostics.push(Diagnostic::warning(
                codes::NO_TYPES_DECLARED,
                "The compilation unit declares no types",
                None,
            ));
        }
        if diagnostics.has_errors() {
            return CompilationOutcome::failed(unit_name.to_string(), diagnostics);
        }

        let image = ModuleImage {
            name: unit_name.to_string(),
            types,
        };
        let bytes = match image::emit(&image) {
            Ok(bytes) => bytes,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    codes::INTERNAL_ERROR,
                    format!("Internal compiler error: {}", e),
                    None,
                ));
                return CompilationOutcome::failed(unit_name.to_string(), diagnostics);
            }
        };
        debug!("Emitted {} ({} bytes)", unit_name, bytes.len());

        match LoadContext::load(&bytes, references) {
            Ok(module) => CompilationOutcome::succeeded(unit_name.to_string(), module, diagnostics),
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    codes::MODULE_LOAD_FAILED,
                    format!("Module could not be loaded: {}", e),
                    None,
                ));
                CompilationOutcome::failed(unit_name.to_string(), diagnostics)
            }
        }
    }

    /// Baseline first, then extras; the first reference with a name wins.
    fn merge_references(
        &self,
        extras: &[ModuleReference],
        diagnostics: &mut DiagnosticBag,
    ) -> Vec<ModuleReference> {
        let mut names: HashSet<String> = HashSet::new();
        let mut merged = Vec::with_capacity(self.baseline.len() + extras.len());

        for reference in self.baseline.iter().chain(extras) {
            if let ModuleReference::Module(module) = reference {
                if !module.is_loaded() {
                    diagnostics.push(Diagnostic::warning(
                        codes::UNLOADED_REFERENCE,
                        format!("Referenced module '{}' has been unloaded and is ignored", module.name()),
                        None,
                    ));
                    continue;
                }
            }
            if !names.insert(reference.name().to_string()) {
                diagnostics.push(Diagnostic::warning(
                    codes::DUPLICATE_REFERENCE,
                    format!("Duplicate reference '{}' is ignored", reference.name()),
                    None,
                ));
                continue;
            }
            merged.push(reference.clone());
        }
        merged
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown failure".to_string()
    }
}
