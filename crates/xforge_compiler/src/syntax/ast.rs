//! Syntax tree produced by the parser.

use serde::{Deserialize, Serialize};

use crate::diagnostic::Location;

#[derive(Debug, Default)]
pub struct UnitSyntax {
    pub classes: Vec<ClassSyntax>,
}

#[derive(Debug)]
pub struct ClassSyntax {
    pub name: String,
    pub namespace: Option<String>,
    pub public: bool,
    pub members: Vec<MemberSyntax>,
    pub location: Location,
}

impl ClassSyntax {
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug)]
pub enum MemberSyntax {
    Field(FieldSyntax),
    Constructor(FunctionSyntax),
    Method(FunctionSyntax),
}

#[derive(Debug)]
pub struct FieldSyntax {
    pub name: String,
    pub public: bool,
    pub init: Option<ExprSyntax>,
    pub location: Location,
}

#[derive(Debug)]
pub struct ParamSyntax {
    pub name: String,
    pub location: Location,
}

#[derive(Debug)]
pub struct FunctionSyntax {
    pub name: String,
    pub public: bool,
    pub params: Vec<ParamSyntax>,
    pub body: BlockSyntax,
    pub location: Location,
}

#[derive(Debug)]
pub struct BlockSyntax {
    pub statements: Vec<StmtSyntax>,
    pub location: Location,
}

#[derive(Debug)]
pub struct StmtSyntax {
    pub kind: StmtKind,
    pub location: Location,
}

#[derive(Debug)]
pub enum StmtKind {
    Var {
        name: String,
        init: Option<ExprSyntax>,
    },
    Return(Option<ExprSyntax>),
    Throw(ExprSyntax),
    /// `if`, any `else if` arms, then an optional `else`
    If {
        branches: Vec<(ExprSyntax, BlockSyntax)>,
        else_branch: Option<BlockSyntax>,
    },
    While {
        condition: ExprSyntax,
        body: BlockSyntax,
    },
    Block(BlockSyntax),
    Assign {
        target: ExprSyntax,
        value: ExprSyntax,
    },
    Expr(ExprSyntax),
}

#[derive(Debug)]
pub struct ExprSyntax {
    pub kind: ExprKind,
    pub location: Location,
}

#[derive(Debug)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    This,
    Name(String),
    /// Member accesses and calls applied left to right to `base`.
    Postfix {
        base: Box<ExprSyntax>,
        ops: Vec<PostfixOp>,
    },
    New {
        type_name: String,
        args: Vec<ExprSyntax>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<ExprSyntax>,
    },
    /// Left-associative chain: `first op0 r0 op1 r1` is `(first op0 r0) op1 r1`.
    Binary {
        first: Box<ExprSyntax>,
        rest: Vec<(BinaryOp, ExprSyntax)>,
    },
}

#[derive(Debug)]
pub enum PostfixOp {
    Member(String),
    Call(Vec<ExprSyntax>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::Ne => 3,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}
