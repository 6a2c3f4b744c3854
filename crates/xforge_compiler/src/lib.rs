//! # xforge_compiler
//!
//! Compiles XScript source into in-memory modules and instantiates their
//! types by name.
//!
//! ```text
//! source ─▶ lex ─▶ parse ─▶ bind ─▶ emit (bytes) ─▶ LoadContext ─▶ CompiledModule
//!                      │        │                                   │
//!                      └────────┴──▶ Diagnostic (errors, warnings)  ▼
//!                                                           InstanceFactory ─▶ Instance
//! ```
//!
//! - [`DynamicCompiler::compile`] never panics: every failure is reported as a
//!   [`Diagnostic`] in the returned [`CompilationOutcome`].
//! - Each compile loads into its own [`LoadContext`]; [`CompiledModule::unload`]
//!   releases it without touching other modules.
//! - [`InstanceFactory`] resolves types by full or simple name and runs field
//!   initialisers and constructors.
//!
//! ## Example
//!
//! ```rust
//! use xforge_compiler::{DynamicCompiler, InstanceFactory, Value};
//!
//! let compiler = DynamicCompiler::new();
//! let outcome = compiler.compile(
//!     r#"
//!     namespace Demo;
//!     public class Greeter {
//!         public var greeting = "Hello";
//!         public fn greet(name) { return greeting + ", " + name; }
//!     }
//!     "#,
//!     &[],
//! );
//! assert!(outcome.success);
//!
//! let module = outcome.module.expect("module");
//! let greeter = InstanceFactory::create_instance(&module, "Greeter", &[]).expect("instance");
//! let greeting = greeter.invoke("greet", &[Value::from("forge")]).unwrap();
//! assert_eq!(greeting, Value::from("Hello, forge"));
//! ```

mod binder;
pub mod compiler;
pub mod diagnostic;
pub mod error;
pub mod factory;
pub mod image;
pub mod loader;
pub mod references;
pub mod runtime;
pub mod syntax;
pub mod value;

pub use compiler::{CompilationOutcome, CompilationUnit, DynamicCompiler};
pub use diagnostic::{codes, Diagnostic, Location, Severity};
pub use error::{InstantiationError, LoadError, RuntimeError, RuntimeResult};
pub use factory::{InstanceFactory, MethodDescriptor, TypeDescriptor};
pub use loader::{CompiledModule, LoadContext};
pub use references::{baseline, ModuleReference, NativeFn, NativeFunction, NativeLibrary};
pub use runtime::{Instance, MAX_CALL_DEPTH, MAX_STEPS};
pub use value::Value;
