//! Error types for loading and running compiled modules.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised while executing compiled code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Exception thrown: {0}")]
    Thrown(String),

    #[error("Module {0} has been unloaded")]
    ModuleUnloaded(String),

    #[error("Type {type_name} has no member '{member}'")]
    UnknownMember { type_name: String, member: String },

    #[error("No overload of '{name}' takes {arity} arguments")]
    ArityMismatch { name: String, arity: usize },

    #[error("Type {type_name} has no constructor taking {arity} arguments")]
    NoMatchingConstructor { type_name: String, arity: usize },

    #[error("Type {0} is not available in this module")]
    TypeUnavailable(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Null reference: {0}")]
    NullReference(String),

    #[error("Division by zero")]
    DivideByZero,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Execution exceeded {0} steps")]
    StepLimitExceeded(u64),

    #[error("Call depth exceeded {0}")]
    RecursionLimitExceeded(usize),
}

/// Errors raised while loading an emitted module image.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Invalid module image: {0}")]
    InvalidImage(#[from] serde_json::Error),

    #[error("Module image nests {depth} levels deep (max {max})")]
    TooDeep { depth: usize, max: usize },
}

/// Why no instance was produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InstantiationError {
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    #[error("Module {0} has been unloaded")]
    Unloaded(String),

    #[error("Type {type_name} has no constructor taking {arity} arguments")]
    NoMatchingConstructor { type_name: String, arity: usize },

    #[error("Constructor of {type_name} failed: {source}")]
    ConstructorFailed {
        type_name: String,
        #[source]
        source: RuntimeError,
    },
}
