//! Bound module representation and its serialized form.
//!
//! The binder lowers syntax into a [`ModuleImage`]; the emitter serializes it
//! into an in-memory byte buffer which the loader deserializes into a fresh
//! load context. Names in the image are fully resolved: every call target,
//! field access and constructed type has been checked during binding.

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::syntax::ast::{BinaryOp, UnaryOp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleImage {
    pub name: String,
    pub types: Vec<TypeImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeImage {
    pub name: String,
    pub namespace: Option<String>,
    pub full_name: String,
    pub public: bool,
    pub fields: Vec<FieldImage>,
    pub constructors: Vec<FunctionImage>,
    pub methods: Vec<FunctionImage>,
}

impl TypeImage {
    pub fn method(&self, name: &str, arity: usize) -> Option<&FunctionImage> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.params.len() == arity)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldImage> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Constructor arities; a type without constructors accepts zero arguments.
    pub fn constructor_arities(&self) -> Vec<usize> {
        if self.constructors.is_empty() {
            vec![0]
        } else {
            self.constructors.iter().map(|c| c.params.len()).collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldImage {
    pub name: String,
    pub public: bool,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionImage {
    pub name: String,
    pub public: bool,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Local { name: String, init: Option<Expr> },
    Assign { target: Target, value: Expr },
    Expr(Expr),
    Return(Option<Expr>),
    Throw(Expr),
    /// `if`/`else if` arms in source order; the first true condition wins.
    If {
        branches: Vec<Branch>,
        else_branch: Vec<Stmt>,
    },
    While { condition: Expr, body: Vec<Stmt> },
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    Local(String),
    Field(String),
    Member { object: Expr, name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Where a constructed type lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeOrigin {
    Local,
    /// A referenced compiled module, by unit name.
    Reference(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Const(Constant),
    Local(String),
    Field(String),
    This,
    CallSelf {
        method: String,
        args: Vec<Expr>,
    },
    /// Field reads and method calls applied left to right to `object`.
    Chain {
        object: Box<Expr>,
        links: Vec<Link>,
    },
    CallNative {
        library: String,
        function: String,
        args: Vec<Expr>,
    },
    New {
        origin: TypeOrigin,
        type_name: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// A left-associative run of operators: `first op0 e0 op1 e1 ...`.
    Binary {
        first: Box<Expr>,
        rest: Vec<(BinaryOp, Expr)>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Link {
    Field(String),
    Call { method: String, args: Vec<Expr> },
}

/// Deepest bracket nesting accepted by [`read`].
pub const MAX_IMAGE_DEPTH: usize = 512;

/// Serialize an image into its in-memory binary form.
pub fn emit(image: &ModuleImage) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(image)
}

/// Read an image back from bytes produced by [`emit`].
///
/// Parser-bounded images can nest deeper than serde_json's default limit, so
/// the nesting is measured up front and capped at [`MAX_IMAGE_DEPTH`].
pub fn read(bytes: &[u8]) -> Result<ModuleImage, LoadError> {
    let depth = nesting_depth(bytes);
    if depth > MAX_IMAGE_DEPTH {
        return Err(LoadError::TooDeep {
            depth,
            max: MAX_IMAGE_DEPTH,
        });
    }

    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    deserializer.disable_recursion_limit();
    let image = ModuleImage::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(image)
}

/// Maximum `[`/`{` nesting in a JSON document, ignoring string contents.
fn nesting_depth(bytes: &[u8]) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0;
    let mut in_string = false;
    let mut escaped = false;
    for &byte in bytes {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}
