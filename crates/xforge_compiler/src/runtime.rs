//! Instances of compiled types and the interpreter that runs their code.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};
use crate::image::{Constant, Expr, FunctionImage, Link, Stmt, Target, TypeImage, TypeOrigin};
use crate::loader::CompiledModule;
use crate::syntax::ast::{BinaryOp, UnaryOp};
use crate::value::Value;

/// Statements and expressions evaluated per top-level call.
pub const MAX_STEPS: u64 = 1_000_000;

/// Maximum nested method or constructor calls per top-level call.
///
/// Each script call costs several interpreter frames on the host stack, so
/// the limit stays low enough for 2 MiB worker threads in debug builds.
/// Deeper recursion fails with [`RuntimeError::RecursionLimitExceeded`].
pub const MAX_CALL_DEPTH: usize = 64;

/// A live object created from a compiled type.
///
/// Cloning yields another handle to the same object.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<InstanceData>,
}

struct InstanceData {
    ty: Arc<TypeImage>,
    module: CompiledModule,
    fields: RwLock<HashMap<String, Value>>,
}

impl Instance {
    fn new(ty: Arc<TypeImage>, module: CompiledModule) -> Self {
        let fields = ty
            .fields
            .iter()
            .map(|f| (f.name.clone(), Value::Null))
            .collect();
        Self {
            inner: Arc::new(InstanceData {
                ty,
                module,
                fields: RwLock::new(fields),
            }),
        }
    }

    /// Full name of the instance's type.
    pub fn type_name(&self) -> &str {
        &self.inner.ty.full_name
    }

    pub fn module(&self) -> &CompiledModule {
        &self.inner.module
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Invoke a public method.
    ///
    /// The call runs with a budget of [`MAX_STEPS`] statements and
    /// expressions and may nest at most [`MAX_CALL_DEPTH`] script calls;
    /// exceeding either returns [`RuntimeError::StepLimitExceeded`] or
    /// [`RuntimeError::RecursionLimitExceeded`].
    pub fn invoke(&self, method: &str, args: &[Value]) -> RuntimeResult<Value> {
        self.ensure_loaded()?;
        let ty = Arc::clone(&self.inner.ty);
        let function = match ty.method(method, args.len()) {
            Some(function) if function.public => function,
            _ if ty.methods.iter().any(|m| m.public && m.name == method) => {
                return Err(RuntimeError::ArityMismatch {
                    name: method.to_string(),
                    arity: args.len(),
                })
            }
            _ => return Err(self.unknown(method)),
        };

        debug!("Invoking {}.{}({} args)", ty.full_name, method, args.len());
        Interpreter::new().call(self, function, args)
    }

    /// Read a public field.
    pub fn get(&self, field: &str) -> RuntimeResult<Value> {
        self.ensure_loaded()?;
        match self.inner.ty.field(field) {
            Some(f) if f.public => Ok(self.read_field(field)),
            _ => Err(self.unknown(field)),
        }
    }

    /// Write a public field.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> RuntimeResult<()> {
        self.ensure_loaded()?;
        match self.inner.ty.field(field) {
            Some(f) if f.public => {
                self.write_field(field, value.into());
                Ok(())
            }
            _ => Err(self.unknown(field)),
        }
    }

    /// Current values of the public fields, in declaration order.
    pub fn public_fields(&self) -> Vec<(String, Value)> {
        self.inner
            .ty
            .fields
            .iter()
            .filter(|f| f.public)
            .map(|f| (f.name.clone(), self.read_field(&f.name)))
            .collect()
    }

    fn ensure_loaded(&self) -> RuntimeResult<()> {
        if self.inner.module.is_loaded() {
            Ok(())
        } else {
            Err(RuntimeError::ModuleUnloaded(self.inner.module.name().to_string()))
        }
    }

    fn unknown(&self, member: &str) -> RuntimeError {
        RuntimeError::UnknownMember {
            type_name: self.type_name().to_string(),
            member: member.to_string(),
        }
    }

    fn read_field(&self, name: &str) -> Value {
        self.inner.fields.read().get(name).cloned().unwrap_or(Value::Null)
    }

    fn write_field(&self, name: &str, value: Value) {
        self.inner.fields.write().insert(name.to_string(), value);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name())
            .field("module", &self.inner.module.name())
            .finish()
    }
}

enum Flow {
    Normal,
    Return(Value),
}

struct Frame<'a> {
    this: &'a Instance,
    scopes: Vec<HashMap<String, Value>>,
}

impl<'a> Frame<'a> {
    fn new(this: &'a Instance) -> Self {
        Self {
            this,
            scopes: vec![HashMap::new()],
        }
    }

    fn declare(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn assign(&mut self, name: &str, value: Value) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return;
            }
        }
        self.declare(name, value);
    }
}

/// Tree-walking interpreter with a step budget and call depth limit.
pub(crate) struct Interpreter {
    steps: u64,
    depth: usize,
}

impl Interpreter {
    pub(crate) fn new() -> Self {
        Self { steps: 0, depth: 0 }
    }

    /// Run field initialisers, then the constructor matching `args`.
    pub(crate) fn construct(
        &mut self,
        module: &CompiledModule,
        ty: Arc<TypeImage>,
        args: &[Value],
    ) -> RuntimeResult<Instance> {
        if !module.is_loaded() {
            return Err(RuntimeError::ModuleUnloaded(module.name().to_string()));
        }

        let constructor = if ty.constructors.is_empty() {
            None
        } else {
            ty.constructors.iter().find(|c| c.params.len() == args.len())
        };
        if constructor.is_none() && !(ty.constructors.is_empty() && args.is_empty()) {
            return Err(RuntimeError::NoMatchingConstructor {
                type_name: ty.full_name.clone(),
                arity: args.len(),
            });
        }

        let instance = Instance::new(Arc::clone(&ty), module.clone());
        for field in &ty.fields {
            if let Some(init) = &field.init {
                let mut frame = Frame::new(&instance);
                let value = self.eval(&mut frame, init)?;
                instance.write_field(&field.name, value);
            }
        }
        if let Some(constructor) = constructor {
            self.call(&instance, constructor, args)?;
        }
        Ok(instance)
    }

    fn call(&mut self, this: &Instance, function: &FunctionImage, args: &[Value]) -> RuntimeResult<Value> {
        this.ensure_loaded()?;
        if function.params.len() != args.len() {
            return Err(RuntimeError::ArityMismatch {
                name: function.name.clone(),
                arity: args.len(),
            });
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::RecursionLimitExceeded(MAX_CALL_DEPTH));
        }

        let mut frame = Frame::new(this);
        for (param, arg) in function.params.iter().zip(args) {
            frame.declare(param, arg.clone());
        }

        self.depth += 1;
        let result = self.exec_block(&mut frame, &function.body);
        self.depth -= 1;

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Null),
        }
    }

    fn tick(&mut self) -> RuntimeResult<()> {
        self.steps += 1;
        if self.steps > MAX_STEPS {
            return Err(RuntimeError::StepLimitExceeded(MAX_STEPS));
        }
        Ok(())
    }

    fn exec_block(&mut self, frame: &mut Frame<'_>, statements: &[Stmt]) -> RuntimeResult<Flow> {
        frame.scopes.push(HashMap::new());
        let result = self.exec_all(frame, statements);
        frame.scopes.pop();
        result
    }

    fn exec_all(&mut self, frame: &mut Frame<'_>, statements: &[Stmt]) -> RuntimeResult<Flow> {
        for statement in statements {
            if let Flow::Return(value) = self.exec(frame, statement)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, frame: &mut Frame<'_>, statement: &Stmt) -> RuntimeResult<Flow> {
        self.tick()?;
        match statement {
            Stmt::Local { name, init } => {
                let value = match init {
                    Some(init) => self.eval(frame, init)?,
                    None => Value::Null,
                };
                frame.declare(name, value);
            }
            Stmt::Assign { target, value } => self.assign(frame, target, value)?,
            Stmt::Expr(expr) => {
                self.eval(frame, expr)?;
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(frame, value)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Throw(value) => {
                let value = self.eval(frame, value)?;
                return Err(RuntimeError::Thrown(value.to_string()));
            }
            Stmt::If {
                branches,
                else_branch,
            } => {
                for branch in branches {
                    if self.condition(frame, &branch.condition)? {
                        return self.exec_block(frame, &branch.body);
                    }
                }
                return self.exec_block(frame, else_branch);
            }
            Stmt::While { condition, body } => {
                while self.condition(frame, condition)? {
                    if let Flow::Return(value) = self.exec_block(frame, body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Block(statements) => return self.exec_block(frame, statements),
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, frame: &mut Frame<'_>, target: &Target, value: &Expr) -> RuntimeResult<()> {
        match target {
            Target::Local(name) => {
                let value = self.eval(frame, value)?;
                frame.assign(name, value);
            }
            Target::Field(name) => {
                let value = self.eval(frame, value)?;
                frame.this.write_field(name, value);
            }
            Target::Member { object, name } => {
                let object = self.eval(frame, object)?;
                let value = self.eval(frame, value)?;
                let instance = object_of(&object, name)?;
                instance.ensure_loaded()?;
                match instance.inner.ty.field(name) {
                    Some(field) if accessible(frame, instance, field.public) => {
                        instance.write_field(name, value);
                    }
                    _ => return Err(instance.unknown(name)),
                }
            }
        }
        Ok(())
    }

    fn condition(&mut self, frame: &mut Frame<'_>, expr: &Expr) -> RuntimeResult<bool> {
        let value = self.eval(frame, expr)?;
        as_condition(&value)
    }

    fn eval_args(&mut self, frame: &mut Frame<'_>, args: &[Expr]) -> RuntimeResult<Vec<Value>> {
        args.iter().map(|arg| self.eval(frame, arg)).collect()
    }

    fn eval(&mut self, frame: &mut Frame<'_>, expr: &Expr) -> RuntimeResult<Value> {
        self.tick()?;
        match expr {
            Expr::Const(constant) => Ok(match constant {
                Constant::Null => Value::Null,
                Constant::Bool(b) => Value::Bool(*b),
                Constant::Int(i) => Value::Int(*i),
                Constant::Float(f) => Value::Float(*f),
                Constant::Str(s) => Value::Str(s.clone()),
            }),
            Expr::Local(name) => Ok(frame.lookup(name).cloned().unwrap_or(Value::Null)),
            Expr::Field(name) => Ok(frame.this.read_field(name)),
            Expr::This => Ok(Value::Object(frame.this.clone())),
            Expr::CallSelf { method, args } => {
                let args = self.eval_args(frame, args)?;
                let this = frame.this;
                let function = this.inner.ty.method(method, args.len()).ok_or_else(|| {
                    RuntimeError::ArityMismatch {
                        name: method.clone(),
                        arity: args.len(),
                    }
                })?;
                self.call(this, function, &args)
            }
            Expr::Chain { object, links } => {
                let mut value = self.eval(frame, object)?;
                for link in links {
                    self.tick()?;
                    value = self.follow(frame, &value, link)?;
                }
                Ok(value)
            }
            Expr::CallNative {
                library,
                function,
                args,
            } => {
                let args = self.eval_args(frame, args)?;
                let native = frame
                    .this
                    .module()
                    .native_library(library)
                    .and_then(|l| l.function(function))
                    .ok_or_else(|| RuntimeError::TypeUnavailable(format!("{}.{}", library, function)))?;
                if native.arity != args.len() {
                    return Err(RuntimeError::ArityMismatch {
                        name: format!("{}.{}", library, function),
                        arity: args.len(),
                    });
                }
                (native.call)(&args)
            }
            Expr::New {
                origin,
                type_name,
                args,
            } => {
                let args = self.eval_args(frame, args)?;
                let module = match origin {
                    TypeOrigin::Local => frame.this.module().clone(),
                    TypeOrigin::Reference(name) => frame
                        .this
                        .module()
                        .referenced_module(name)
                        .cloned()
                        .ok_or_else(|| RuntimeError::TypeUnavailable(type_name.clone()))?,
                };
                let ty = module
                    .type_by_full_name(type_name)
                    .ok_or_else(|| RuntimeError::TypeUnavailable(type_name.clone()))?;
                Ok(Value::Object(self.construct(&module, ty, &args)?))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(frame, operand)?;
                unary(*op, value)
            }
            Expr::Binary { first, rest } => {
                let mut left = self.eval(frame, first)?;
                for (op, operand) in rest {
                    self.tick()?;
                    left = match op {
                        BinaryOp::And | BinaryOp::Or => {
                            let decided = as_condition(&left)?;
                            if decided == (*op == BinaryOp::Or) {
                                Value::Bool(decided)
                            } else {
                                Value::Bool(self.condition(frame, operand)?)
                            }
                        }
                        _ => {
                            let right = self.eval(frame, operand)?;
                            binary(*op, &left, &right)?
                        }
                    };
                }
                Ok(left)
            }
        }
    }

    /// Apply one field read or method call to `value`.
    fn follow(&mut self, frame: &mut Frame<'_>, value: &Value, link: &Link) -> RuntimeResult<Value> {
        match link {
            Link::Field(name) => {
                let instance = object_of(value, name)?;
                instance.ensure_loaded()?;
                match instance.inner.ty.field(name) {
                    Some(field) if accessible(frame, instance, field.public) => Ok(instance.read_field(name)),
                    _ => Err(instance.unknown(name)),
                }
            }
            Link::Call { method, args } => {
                let args = self.eval_args(frame, args)?;
                let instance = object_of(value, method)?;
                let ty = Arc::clone(&instance.inner.ty);
                match ty.method(method, args.len()) {
                    Some(function) if accessible(frame, instance, function.public) => {
                        self.call(instance, function, &args)
                    }
                    None if ty.has_method(method) => Err(RuntimeError::ArityMismatch {
                        name: method.clone(),
                        arity: args.len(),
                    }),
                    _ => Err(instance.unknown(method)),
                }
            }
        }
    }
}

fn as_condition(value: &Value) -> RuntimeResult<bool> {
    value.as_bool().ok_or_else(|| {
        RuntimeError::TypeMismatch(format!("condition must be bool, found {}", value.type_name()))
    })
}

/// Private members are visible to code of the same type in the same module.
fn accessible(frame: &Frame<'_>, target: &Instance, public: bool) -> bool {
    public
        || (target.type_name() == frame.this.type_name()
            && target.module().same_module(frame.this.module()))
}

fn object_of<'v>(value: &'v Value, member: &str) -> RuntimeResult<&'v Instance> {
    match value {
        Value::Object(instance) => Ok(instance),
        Value::Null => Err(RuntimeError::NullReference(format!(
            "cannot access '{}' on null",
            member
        ))),
        other => Err(RuntimeError::TypeMismatch(format!(
            "{} has no member '{}'",
            other.type_name(),
            member
        ))),
    }
}

fn unary(op: UnaryOp, value: Value) -> RuntimeResult<Value> {
    match (op, &value) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or(RuntimeError::Overflow),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        _ => Err(RuntimeError::TypeMismatch(format!(
            "operator '{}' cannot be applied to {}",
            if op == UnaryOp::Not { "!" } else { "-" },
            value.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Add if matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_)) => {
            Ok(Value::Str(format!("{}{}", lhs, rhs)))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, lhs, rhs)
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, lhs, rhs),
        BinaryOp::And | BinaryOp::Or => match (lhs.as_bool(), rhs.as_bool()) {
            (Some(a), Some(b)) => Ok(Value::Bool(if op == BinaryOp::And { a && b } else { a || b })),
            _ => Err(operand_mismatch(op, lhs, rhs)),
        },
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        let (a, b) = (*a, *b);
        if b == 0 && matches!(op, BinaryOp::Div | BinaryOp::Rem) {
            return Err(RuntimeError::DivideByZero);
        }
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        return result.map(Value::Int).ok_or(RuntimeError::Overflow);
    }

    let (Some(a), Some(b)) = (lhs.as_float(), rhs.as_float()) else {
        return Err(operand_mismatch(op, lhs, rhs));
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    Ok(Value::Float(result))
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => return Err(operand_mismatch(op, lhs, rhs)),
        },
    };
    let result = ordering.is_some_and(|o| match op {
        BinaryOp::Lt => o.is_lt(),
        BinaryOp::Le => o.is_le(),
        BinaryOp::Gt => o.is_gt(),
        _ => o.is_ge(),
    });
    Ok(Value::Bool(result))
}

fn operand_mismatch(op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch(format!(
        "operator '{}' cannot be applied to {} and {}",
        op.symbol(),
        lhs.type_name(),
        rhs.type_name()
    ))
}
