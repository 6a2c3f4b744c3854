//! Name resolution, arity checking and lowering of syntax into a module image.

use std::collections::HashMap;

use crate::diagnostic::{codes, DiagnosticBag, Location};
use crate::image::{
    Branch, Constant, Expr, FieldImage, FunctionImage, Link, Stmt, Target, TypeImage, TypeOrigin,
};
use crate::references::{ModuleReference, NativeLibrary};
use crate::syntax::ast::*;

/// Bind a parsed unit against `references`.
///
/// Always returns the lowered types; callers must check `diagnostics` for
/// errors before emitting them.
pub fn bind(
    unit: &UnitSyntax,
    references: &[ModuleReference],
    diagnostics: &mut DiagnosticBag,
) -> Vec<TypeImage> {
    let mut binder = Binder::new(references, diagnostics);
    binder.declare_types(unit);
    (0..binder.classes.len()).map(|index| binder.bind_class(index)).collect()
}

struct ClassInfo<'a> {
    syntax: &'a ClassSyntax,
    full_name: String,
    fields: HashMap<&'a str, bool>,
    methods: HashMap<&'a str, Vec<usize>>,
    constructors: Vec<usize>,
}

impl ClassInfo<'_> {
    fn constructor_arities(&self) -> Vec<usize> {
        if self.constructors.is_empty() {
            vec![0]
        } else {
            self.constructors.clone()
        }
    }
}

/// Exported type of a referenced compiled module.
struct ExternalType {
    module: String,
    name: String,
    full_name: String,
    arities: Vec<usize>,
}

struct ResolvedType {
    origin: TypeOrigin,
    full_name: String,
    arities: Vec<usize>,
}

struct LocalSlot {
    name: String,
    location: Location,
    used: bool,
    parameter: bool,
}

struct FunctionScope {
    scopes: Vec<Vec<LocalSlot>>,
    constructor: bool,
}

impl FunctionScope {
    fn new(constructor: bool) -> Self {
        Self {
            scopes: vec![Vec::new()],
            constructor,
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.scopes.iter().flatten().any(|slot| slot.name == name)
    }

    fn declare(&mut self, name: &str, location: Location, parameter: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(LocalSlot {
                name: name.to_string(),
                location,
                used: false,
                parameter,
            });
        }
    }

    fn mark_used(&mut self, name: &str) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.iter_mut().find(|slot| slot.name == name) {
                slot.used = true;
                return true;
            }
        }
        false
    }
}

struct Binder<'a, 'd> {
    diagnostics: &'d mut DiagnosticBag,
    classes: Vec<ClassInfo<'a>>,
    by_full_name: HashMap<String, usize>,
    natives: HashMap<&'a str, &'a NativeLibrary>,
    externals: Vec<ExternalType>,
}

impl<'a, 'd> Binder<'a, 'd> {
    fn new(references: &'a [ModuleReference], diagnostics: &'d mut DiagnosticBag) -> Self {
        let mut natives = HashMap::new();
        let mut externals = Vec::new();
        for reference in references {
            match reference {
                ModuleReference::Native(library) => {
                    natives.entry(library.name()).or_insert(library.as_ref());
                }
                ModuleReference::Module(module) => {
                    externals.extend(module.exported_types().map(|ty| ExternalType {
                        module: module.name().to_string(),
                        name: ty.name.clone(),
                        full_name: ty.full_name.clone(),
                        arities: ty.constructor_arities(),
                    }));
                }
            }
        }

        Self {
            diagnostics,
            classes: Vec::new(),
            by_full_name: HashMap::new(),
            natives,
            externals,
        }
    }

    // ---- declarations ----

    fn declare_types(&mut self, unit: &'a UnitSyntax) {
        for class in &unit.classes {
            let full_name = class.full_name();
            if self.by_full_name.contains_key(&full_name) {
                self.diagnostics.error(
                    codes::DUPLICATE_TYPE,
                    format!("The namespace already contains a definition for '{}'", full_name),
                    class.location,
                );
                continue;
            }
            let info = self.declare_members(class, full_name.clone());
            self.by_full_name.insert(full_name, self.classes.len());
            self.classes.push(info);
        }
    }

    fn declare_members(&mut self, class: &'a ClassSyntax, full_name: String) -> ClassInfo<'a> {
        let mut fields: HashMap<&'a str, bool> = HashMap::new();
        let mut methods: HashMap<&'a str, Vec<usize>> = HashMap::new();
        let mut constructors = Vec::new();

        for member in &class.members {
            match member {
                MemberSyntax::Field(field) => {
                    let name = field.name.as_str();
                    if fields.contains_key(name) || methods.contains_key(name) {
                        self.duplicate_member(&full_name, name, field.location);
                    } else {
                        fields.insert(name, field.public);
                    }
                }
                MemberSyntax::Method(method) => {
                    let name = method.name.as_str();
                    let arity = method.params.len();
                    let clash = fields.contains_key(name)
                        || methods.get(name).is_some_and(|arities| arities.contains(&arity));
                    if clash {
                        self.duplicate_member(&full_name, name, method.location);
                    } else {
                        methods.entry(name).or_default().push(arity);
                    }
                }
                MemberSyntax::Constructor(ctor) => {
                    if ctor.name != class.name {
                        self.diagnostics.error(
                            codes::CONSTRUCTOR_NAME_MISMATCH,
                            format!(
                                "'{}' is not a constructor of '{}'; methods are declared with 'fn'",
                                ctor.name, class.name
                            ),
                            ctor.location,
                        );
                    } else if constructors.contains(&ctor.params.len()) {
                        self.duplicate_member(&full_name, &ctor.name, ctor.location);
                    } else {
                        constructors.push(ctor.params.len());
                    }
                }
            }
        }

        ClassInfo {
            syntax: class,
            full_name,
            fields,
            methods,
            constructors,
        }
    }

    fn duplicate_member(&mut self, type_name: &str, member: &str, location: Location) {
        self.diagnostics.error(
            codes::DUPLICATE_MEMBER,
            format!("The type '{}' already contains a definition for '{}'", type_name, member),
            location,
        );
    }

    // ---- lowering ----

    fn bind_class(&mut self, index: usize) -> TypeImage {
        let class = self.classes[index].syntax;
        let mut fields = Vec::new();
        let mut constructors = Vec::new();
        let mut methods = Vec::new();

        for member in &class.members {
            match member {
                MemberSyntax::Field(field) => {
                    let mut scope = FunctionScope::new(false);
                    let init = field
                        .init
                        .as_ref()
                        .map(|init| self.bind_expr(&mut scope, index, init));
                    fields.push(FieldImage {
                        name: field.name.clone(),
                        public: field.public,
                        init,
                    });
                }
                MemberSyntax::Constructor(ctor) => {
                    constructors.push(self.bind_function(index, ctor, true));
                }
                MemberSyntax::Method(method) => {
                    methods.push(self.bind_function(index, method, false));
                }
            }
        }

        TypeImage {
            name: class.name.clone(),
            namespace: class.namespace.clone(),
            full_name: self.classes[index].full_name.clone(),
            public: class.public,
            fields,
            constructors,
            methods,
        }
    }

    fn bind_function(&mut self, class: usize, function: &FunctionSyntax, constructor: bool) -> FunctionImage {
        let mut scope = FunctionScope::new(constructor);
        for param in &function.params {
            if scope.is_declared(&param.name) {
                self.diagnostics.error(
                    codes::DUPLICATE_LOCAL,
                    format!("A parameter named '{}' is already defined", param.name),
                    param.location,
                );
            } else {
                scope.declare(&param.name, param.location, true);
            }
        }
        let body = self.bind_block(&mut scope, class, &function.body.statements);

        FunctionImage {
            name: function.name.clone(),
            public: function.public,
            params: function.params.iter().map(|p| p.name.clone()).collect(),
            body,
        }
    }

    fn bind_block(&mut self, scope: &mut FunctionScope, class: usize, statements: &[StmtSyntax]) -> Vec<Stmt> {
        scope.scopes.push(Vec::new());

        let mut bound = Vec::with_capacity(statements.len());
        let mut terminated = false;
        let mut reported = false;
        for statement in statements {
            if terminated && !reported {
                self.diagnostics.warning(
                    codes::UNREACHABLE_CODE,
                    "Unreachable code detected",
                    statement.location,
                );
                reported = true;
            }
            bound.push(self.bind_stmt(scope, class, statement));
            if matches!(statement.kind, StmtKind::Return(_) | StmtKind::Throw(_)) {
                terminated = true;
            }
        }

        for slot in scope.scopes.pop().unwrap_or_default() {
            if !slot.used && !slot.parameter {
                self.diagnostics.warning(
                    codes::UNUSED_LOCAL,
                    format!("The variable '{}' is declared but its value is never used", slot.name),
                    slot.location,
                );
            }
        }
        bound
    }

    fn bind_stmt(&mut self, scope: &mut FunctionScope, class: usize, statement: &StmtSyntax) -> Stmt {
        match &statement.kind {
            StmtKind::Var { name, init } => {
                let init = init.as_ref().map(|init| self.bind_expr(scope, class, init));
                if scope.is_declared(name) {
                    self.diagnostics.error(
                        codes::DUPLICATE_LOCAL,
                        format!("A local variable named '{}' is already defined in this scope", name),
                        statement.location,
                    );
                } else {
                    scope.declare(name, statement.location, false);
                }
                Stmt::Local {
                    name: name.clone(),
                    init,
                }
            }
            StmtKind::Return(value) => {
                if scope.constructor && value.is_some() {
                    self.diagnostics.error(
                        codes::CONSTRUCTOR_RETURNS_VALUE,
                        "A constructor cannot return a value",
                        statement.location,
                    );
                }
                Stmt::Return(value.as_ref().map(|v| self.bind_expr(scope, class, v)))
            }
            StmtKind::Throw(value) => Stmt::Throw(self.bind_expr(scope, class, value)),
            StmtKind::If {
                branches,
                else_branch,
            } => {
                let mut bound = Vec::with_capacity(branches.len());
                for (condition, body) in branches {
                    bound.push(Branch {
                        condition: self.bind_expr(scope, class, condition),
                        body: self.bind_block(scope, class, &body.statements),
                    });
                }
                let else_branch = match else_branch {
                    Some(block) => self.bind_block(scope, class, &block.statements),
                    None => Vec::new(),
                };
                Stmt::If {
                    branches: bound,
                    else_branch,
                }
            }
            StmtKind::While { condition, body } => Stmt::While {
                condition: self.bind_expr(scope, class, condition),
                body: self.bind_block(scope, class, &body.statements),
            },
            StmtKind::Block(block) => Stmt::Block(self.bind_block(scope, class, &block.statements)),
            StmtKind::Assign { target, value } => {
                let value = self.bind_expr(scope, class, value);
                let target = self.bind_target(scope, class, target);
                Stmt::Assign { target, value }
            }
            StmtKind::Expr(expr) => Stmt::Expr(self.bind_expr(scope, class, expr)),
        }
    }

    fn bind_target(&mut self, scope: &mut FunctionScope, class: usize, target: &ExprSyntax) -> Target {
        match &target.kind {
            ExprKind::Name(name) => {
                if scope.is_declared(name) {
                    Target::Local(name.clone())
                } else if self.has_field(class, name) {
                    Target::Field(name.clone())
                } else {
                    self.undeclared(name, target.location);
                    Target::Local(name.clone())
                }
            }
            ExprKind::Postfix { base, ops } => match ops.split_last() {
                Some((PostfixOp::Member(name), [])) if matches!(base.kind, ExprKind::This) => {
                    if !self.has_field(class, name) {
                        self.no_such_member(class, name, target.location);
                    }
                    Target::Field(name.clone())
                }
                Some((PostfixOp::Member(name), object)) => Target::Member {
                    object: self.bind_chain(scope, class, base, object, target.location),
                    name: name.clone(),
                },
                _ => self.invalid_target(target.location),
            },
            _ => self.invalid_target(target.location),
        }
    }

    fn invalid_target(&mut self, location: Location) -> Target {
        self.diagnostics.error(
            codes::INVALID_ASSIGNMENT_TARGET,
            "The left-hand side of an assignment must be a variable or field",
            location,
        );
        Target::Local(String::new())
    }

    fn bind_expr(&mut self, scope: &mut FunctionScope, class: usize, expr: &ExprSyntax) -> Expr {
        match &expr.kind {
            ExprKind::Int(value) => Expr::Const(Constant::Int(*value)),
            ExprKind::Float(value) => Expr::Const(Constant::Float(*value)),
            ExprKind::Str(value) => Expr::Const(Constant::Str(value.clone())),
            ExprKind::Bool(value) => Expr::Const(Constant::Bool(*value)),
            ExprKind::Null => Expr::Const(Constant::Null),
            ExprKind::This => Expr::This,
            ExprKind::Name(name) => {
                if scope.mark_used(name) {
                    Expr::Local(name.clone())
                } else if self.has_field(class, name) {
                    Expr::Field(name.clone())
                } else {
                    self.undeclared(name, expr.location);
                    Expr::Const(Constant::Null)
                }
            }
            ExprKind::Postfix { base, ops } => self.bind_chain(scope, class, base, ops, expr.location),
            ExprKind::New { type_name, args } => {
                let args = self.bind_args(scope, class, args);
                self.bind_new(class, type_name, args, expr.location)
            }
            ExprKind::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: Box::new(self.bind_expr(scope, class, operand)),
            },
            ExprKind::Binary { first, rest } => {
                let first = Box::new(self.bind_expr(scope, class, first));
                let mut links = Vec::with_capacity(rest.len());
                for (op, operand) in rest {
                    links.push((*op, self.bind_expr(scope, class, operand)));
                }
                Expr::Binary { first, rest: links }
            }
        }
    }

    fn bind_args(&mut self, scope: &mut FunctionScope, class: usize, args: &[ExprSyntax]) -> Vec<Expr> {
        args.iter().map(|arg| self.bind_expr(scope, class, arg)).collect()
    }

    /// Lower a member/call chain. The head may be a self call, a field of
    /// `this` or a native library call; every later `.name` is a field read
    /// and every later `.name(args)` a method call on the value so far.
    fn bind_chain(
        &mut self,
        scope: &mut FunctionScope,
        class: usize,
        base: &ExprSyntax,
        ops: &[PostfixOp],
        location: Location,
    ) -> Expr {
        let (object, mut rest) = self.bind_chain_head(scope, class, base, ops, location);

        let mut links = Vec::new();
        while let Some((op, tail)) = rest.split_first() {
            match (op, tail) {
                (PostfixOp::Member(method), [PostfixOp::Call(args), tail @ ..]) => {
                    links.push(Link::Call {
                        method: method.clone(),
                        args: self.bind_args(scope, class, args),
                    });
                    rest = tail;
                }
                (PostfixOp::Member(name), _) => {
                    links.push(Link::Field(name.clone()));
                    rest = tail;
                }
                (PostfixOp::Call(_), _) => {
                    self.diagnostics.error(codes::SYNTAX_ERROR, "Method name expected", location);
                    return Expr::Const(Constant::Null);
                }
            }
        }

        if links.is_empty() {
            object
        } else {
            Expr::Chain {
                object: Box::new(object),
                links,
            }
        }
    }

    fn bind_chain_head<'o>(
        &mut self,
        scope: &mut FunctionScope,
        class: usize,
        base: &ExprSyntax,
        ops: &'o [PostfixOp],
        location: Location,
    ) -> (Expr, &'o [PostfixOp]) {
        match (&base.kind, ops) {
            (ExprKind::Name(method), [PostfixOp::Call(args), rest @ ..]) => {
                let args = self.bind_args(scope, class, args);
                (self.bind_self_call(class, method, args, location), rest)
            }
            (ExprKind::This, [PostfixOp::Member(method), PostfixOp::Call(args), rest @ ..]) => {
                let args = self.bind_args(scope, class, args);
                (self.bind_self_call(class, method, args, location), rest)
            }
            (ExprKind::This, [PostfixOp::Member(name), rest @ ..]) => {
                if !self.has_field(class, name) {
                    self.no_such_member(class, name, location);
                }
                (Expr::Field(name.clone()), rest)
            }
            (ExprKind::Name(library), [PostfixOp::Member(function), PostfixOp::Call(args), rest @ ..])
                if self.is_library(scope, class, library) =>
            {
                let args = self.bind_args(scope, class, args);
                (self.bind_native_call(library, function, args, location), rest)
            }
            (ExprKind::Name(library), [PostfixOp::Member(name), rest @ ..])
                if self.is_library(scope, class, library) =>
            {
                self.diagnostics.error(
                    codes::NO_SUCH_MEMBER,
                    format!("'{}' does not contain a definition for '{}'", library, name),
                    location,
                );
                (Expr::Const(Constant::Null), rest)
            }
            _ => (self.bind_expr(scope, class, base), ops),
        }
    }

    fn bind_self_call(&mut self, class: usize, method: &str, args: Vec<Expr>, location: Location) -> Expr {
        let arities = self.classes[class].methods.get(method).cloned();
        match arities {
            Some(arities) if arities.contains(&args.len()) => {}
            Some(_) => self.no_overload(method, args.len(), location),
            None => self.undeclared(method, location),
        }
        Expr::CallSelf {
            method: method.to_string(),
            args,
        }
    }

    fn bind_native_call(&mut self, library: &str, function: &str, args: Vec<Expr>, location: Location) -> Expr {
        let native = self.natives.get(library).and_then(|l| l.function(function));
        match native {
            None => self.diagnostics.error(
                codes::NO_SUCH_MEMBER,
                format!("'{}' does not contain a definition for '{}'", library, function),
                location,
            ),
            Some(native) if native.arity != args.len() => {
                self.no_overload(&format!("{}.{}", library, function), args.len(), location)
            }
            Some(_) => {}
        }
        Expr::CallNative {
            library: library.to_string(),
            function: function.to_string(),
            args,
        }
    }

    fn bind_new(&mut self, class: usize, type_name: &str, args: Vec<Expr>, location: Location) -> Expr {
        let Some(resolved) = self.resolve_type(class, type_name) else {
            self.diagnostics.error(
                codes::TYPE_NOT_FOUND,
                format!(
                    "The type or namespace name '{}' could not be found (are you missing a reference?)",
                    type_name
                ),
                location,
            );
            return Expr::Const(Constant::Null);
        };

        if !resolved.arities.contains(&args.len()) {
            self.diagnostics.error(
                codes::NO_MATCHING_CONSTRUCTOR,
                format!(
                    "'{}' does not contain a constructor that takes {} arguments",
                    resolved.full_name,
                    args.len()
                ),
                location,
            );
        }
        Expr::New {
            origin: resolved.origin,
            type_name: resolved.full_name,
            args,
        }
    }

    /// Full name, then the enclosing namespace, then simple names; local
    /// types win over referenced ones.
    fn resolve_type(&self, class: usize, name: &str) -> Option<ResolvedType> {
        let local = |index: usize| {
            let info = &self.classes[index];
            ResolvedType {
                origin: TypeOrigin::Local,
                full_name: info.full_name.clone(),
                arities: info.constructor_arities(),
            }
        };

        if let Some(&index) = self.by_full_name.get(name) {
            return Some(local(index));
        }
        if let Some(namespace) = &self.classes[class].syntax.namespace {
            if let Some(&index) = self.by_full_name.get(&format!("{}.{}", namespace, name)) {
                return Some(local(index));
            }
        }
        if let Some(index) = self.classes.iter().position(|c| c.syntax.name == name) {
            return Some(local(index));
        }

        self.externals
            .iter()
            .find(|t| t.full_name == name)
            .or_else(|| self.externals.iter().find(|t| t.name == name))
            .map(|t| ResolvedType {
                origin: TypeOrigin::Reference(t.module.clone()),
                full_name: t.full_name.clone(),
                arities: t.arities.clone(),
            })
    }

    // ---- helpers ----

    fn has_field(&self, class: usize, name: &str) -> bool {
        self.classes[class].fields.contains_key(name)
    }

    /// A bare name refers to a library only when no local or field shadows it.
    fn is_library(&self, scope: &FunctionScope, class: usize, name: &str) -> bool {
        !scope.is_declared(name) && !self.has_field(class, name) && self.natives.contains_key(name)
    }

    fn undeclared(&mut self, name: &str, location: Location) {
        self.diagnostics.error(
            codes::UNDECLARED_NAME,
            format!("The name '{}' does not exist in the current context", name),
            location,
        );
    }

    fn no_such_member(&mut self, class: usize, name: &str, location: Location) {
        let message = format!(
            "'{}' does not contain a definition for '{}'",
            self.classes[class].full_name, name
        );
        self.diagnostics.error(codes::NO_SUCH_MEMBER, message, location);
    }

    fn no_overload(&mut self, method: &str, arity: usize, location: Location) {
        self.diagnostics.error(
            codes::NO_MATCHING_OVERLOAD,
            format!("No overload for method '{}' takes {} arguments", method, arity),
            location,
        );
    }
}
