//! Reference sets available to compiled code.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{RuntimeError, RuntimeResult};
use crate::loader::CompiledModule;
use crate::value::Value;

/// Host function callable from compiled code.
pub type NativeFn = fn(&[Value]) -> RuntimeResult<Value>;

#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub arity: usize,
    pub call: NativeFn,
}

/// A named set of host functions, called as `Library.function(args)`.
#[derive(Clone)]
pub struct NativeLibrary {
    name: String,
    functions: HashMap<String, NativeFunction>,
}

impl NativeLibrary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: HashMap::new(),
        }
    }

    pub fn with_function(mut self, name: impl Into<String>, arity: usize, call: NativeFn) -> Self {
        self.functions.insert(name.into(), NativeFunction { arity, call });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self, name: &str) -> Option<NativeFunction> {
        self.functions.get(name).copied()
    }

    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("name", &self.name)
            .field("functions", &self.function_names())
            .finish()
    }
}

/// Something a compilation can reference.
#[derive(Debug, Clone)]
pub enum ModuleReference {
    Native(Arc<NativeLibrary>),
    /// A previously compiled module whose exported types may be constructed.
    Module(CompiledModule),
}

impl ModuleReference {
    pub fn name(&self) -> &str {
        match self {
            ModuleReference::Native(library) => library.name(),
            ModuleReference::Module(module) => module.name(),
        }
    }
}

impl From<NativeLibrary> for ModuleReference {
    fn from(library: NativeLibrary) -> Self {
        ModuleReference::Native(Arc::new(library))
    }
}

impl From<CompiledModule> for ModuleReference {
    fn from(module: CompiledModule) -> Self {
        ModuleReference::Module(module)
    }
}

static BASELINE: OnceLock<Vec<ModuleReference>> = OnceLock::new();

/// Process-wide baseline references: `Math`, `Text` and `Convert`.
pub fn baseline() -> &'static [ModuleReference] {
    BASELINE.get_or_init(|| {
        vec![
            math_library().into(),
            text_library().into(),
            convert_library().into(),
        ]
    })
}

fn math_library() -> NativeLibrary {
    NativeLibrary::new("Math")
        .with_function("abs", 1, |args| match arg(args, 0, "abs")? {
            Value::Int(i) => i.checked_abs().map(Value::Int).ok_or(RuntimeError::Overflow),
            _ => Ok(Value::Float(number(args, 0, "abs")?.abs())),
        })
        .with_function("min", 2, |args| pick(args, "min", |a, b| a <= b))
        .with_function("max", 2, |args| pick(args, "max", |a, b| a >= b))
        .with_function("pow", 2, |args| {
            Ok(Value::Float(number(args, 0, "pow")?.powf(number(args, 1, "pow")?)))
        })
        .with_function("sqrt", 1, |args| Ok(Value::Float(number(args, 0, "sqrt")?.sqrt())))
        .with_function("floor", 1, |args| Ok(Value::Float(number(args, 0, "floor")?.floor())))
}

fn text_library() -> NativeLibrary {
    NativeLibrary::new("Text")
        .with_function("length", 1, |args| {
            Ok(Value::Int(text(args, 0, "length")?.chars().count() as i64))
        })
        .with_function("upper", 1, |args| Ok(Value::Str(text(args, 0, "upper")?.to_uppercase())))
        .with_function("lower", 1, |args| Ok(Value::Str(text(args, 0, "lower")?.to_lowercase())))
        .with_function("trim", 1, |args| Ok(Value::Str(text(args, 0, "trim")?.trim().to_string())))
        .with_function("contains", 2, |args| {
            Ok(Value::Bool(text(args, 0, "contains")?.contains(text(args, 1, "contains")?)))
        })
        .with_function("concat", 2, |args| {
            Ok(Value::Str(format!("{}{}", arg(args, 0, "concat")?, arg(args, 1, "concat")?)))
        })
}

fn convert_library() -> NativeLibrary {
    NativeLibrary::new("Convert")
        .with_function("toString", 1, |args| Ok(Value::Str(arg(args, 0, "toString")?.to_string())))
        .with_function("toInt", 1, |args| match arg(args, 0, "toInt")? {
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
            Value::Float(f) => {
                let truncated = f.trunc();
                if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
                    Ok(Value::Int(truncated as i64))
                } else {
                    Err(RuntimeError::Overflow)
                }
            }
            Value::Str(s) => s.trim().parse().map(Value::Int).map_err(|_| {
                RuntimeError::TypeMismatch(format!("'{}' is not a valid integer", s))
            }),
            other => Err(mismatch("toInt", other)),
        })
        .with_function("toFloat", 1, |args| match arg(args, 0, "toFloat")? {
            Value::Str(s) => s.trim().parse().map(Value::Float).map_err(|_| {
                RuntimeError::TypeMismatch(format!("'{}' is not a valid number", s))
            }),
            _ => Ok(Value::Float(number(args, 0, "toFloat")?)),
        })
}

fn arg<'a>(args: &'a [Value], index: usize, function: &str) -> RuntimeResult<&'a Value> {
    args.get(index).ok_or_else(|| RuntimeError::ArityMismatch {
        name: function.to_string(),
        arity: args.len(),
    })
}

fn number(args: &[Value], index: usize, function: &str) -> RuntimeResult<f64> {
    let value = arg(args, index, function)?;
    value.as_float().ok_or_else(|| mismatch(function, value))
}

fn text<'a>(args: &'a [Value], index: usize, function: &str) -> RuntimeResult<&'a str> {
    let value = arg(args, index, function)?;
    value.as_str().ok_or_else(|| mismatch(function, value))
}

fn mismatch(function: &str, value: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch(format!(
        "{} does not accept a {} argument",
        function,
        value.type_name()
    ))
}

/// min/max: ints stay ints, any float widens the result.
fn pick(args: &[Value], function: &str, keep_first: fn(f64, f64) -> bool) -> RuntimeResult<Value> {
    match (arg(args, 0, function)?, arg(args, 1, function)?) {
        (Value::Int(a), Value::Int(b)) => {
            let first = keep_first(*a as f64, *b as f64);
            Ok(Value::Int(if first { *a } else { *b }))
        }
        _ => {
            let (a, b) = (number(args, 0, function)?, number(args, 1, function)?);
            Ok(Value::Float(if keep_first(a, b) { a } else { b }))
        }
    }
}
