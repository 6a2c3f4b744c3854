//! Recursive-descent parser with statement and member level recovery.

use super::ast::*;
use super::lexer::{Token, TokenKind};
use crate::diagnostic::{codes, DiagnosticBag, Location};

/// Maximum nesting of namespaces, blocks and sub-expressions.
///
/// Operator chains (`a + b + c`), member chains (`a.b().c()`) and `else if`
/// arms are sequences, not nesting, and never count against it.
pub const MAX_NESTING: usize = 64;

/// Parse a token stream into a syntax tree.
///
/// Errors are reported into `diagnostics` and the parser resynchronises at the
/// next statement, member or type declaration, so a single call reports as
/// many independent problems as it can.
pub fn parse(mut tokens: Vec<Token>, diagnostics: &mut DiagnosticBag) -> UnitSyntax {
    if tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
        let location = tokens.last().map(|t| t.location).unwrap_or(Location::new(1, 1));
        tokens.push(Token {
            kind: TokenKind::Eof,
            location,
        });
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        last_error: None,
        diagnostics,
    };
    let mut unit = UnitSyntax::default();
    parser.items(None, &mut unit, false);
    unit
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    last_error: Option<usize>,
    diagnostics: &'a mut DiagnosticBag,
}

impl Parser<'_> {
    // ---- token helpers ----

    fn current(&self) -> &Token {
        // the stream ends with Eof and `advance` never moves past it
        &self.tokens[self.pos]
    }

    fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Location> {
        if self.at(&kind) {
            Some(self.advance().location)
        } else {
            self.expected(what);
            None
        }
    }

    fn ident(&mut self, what: &str) -> Option<(String, Location)> {
        if let TokenKind::Ident(name) = self.kind() {
            let name = name.clone();
            let location = self.advance().location;
            Some((name, location))
        } else {
            self.expected(what);
            None
        }
    }

    fn qualified_name(&mut self, what: &str) -> Option<String> {
        let (mut name, _) = self.ident(what)?;
        while self.eat(&TokenKind::Dot) {
            let (part, _) = self.ident("identifier")?;
            name.push('.');
            name.push_str(&part);
        }
        Some(name)
    }

    fn expected(&mut self, what: &str) {
        let token = self.current();
        let message = format!("{} expected, found {}", what, token.kind.describe());
        let location = token.location;
        self.report(codes::SYNTAX_ERROR, message, location);
    }

    /// At most one syntax error per token position.
    fn report(&mut self, code: &str, message: String, location: Location) {
        if self.last_error == Some(self.pos) {
            return;
        }
        self.last_error = Some(self.pos);
        self.diagnostics.error(code, message, location);
    }

    /// Run `parse` one nesting level deeper. The level is released on every
    /// exit path, including errors.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        if self.depth >= MAX_NESTING {
            let location = self.current().location;
            self.report(
                codes::NESTING_TOO_DEEP,
                format!("Nesting exceeds the maximum depth of {}", MAX_NESTING),
                location,
            );
            return None;
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ---- recovery ----

    fn recover_item(&mut self, start: usize) {
        if self.pos == start {
            self.advance();
        }
        while !matches!(
            self.kind(),
            TokenKind::Class | TokenKind::Namespace | TokenKind::Eof
        ) {
            self.advance();
        }
    }

    fn recover_member(&mut self, start: usize) {
        if self.pos == start {
            self.advance();
        }
        let mut braces = 0usize;
        loop {
            match self.kind() {
                TokenKind::Eof => return,
                TokenKind::LBrace => braces += 1,
                TokenKind::RBrace => {
                    if braces == 0 {
                        return;
                    }
                    braces -= 1;
                    if braces == 0 {
                        self.advance();
                        return;
                    }
                }
                TokenKind::Semicolon if braces == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::Public | TokenKind::Internal | TokenKind::Var | TokenKind::Fn
                    if braces == 0 =>
                {
                    return
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn recover_statement(&mut self, start: usize) {
        if self.pos == start {
            self.advance();
        }
        let mut braces = 0usize;
        loop {
            match self.kind() {
                TokenKind::Eof => return,
                TokenKind::LBrace => braces += 1,
                TokenKind::RBrace => {
                    if braces == 0 {
                        return;
                    }
                    braces -= 1;
                }
                TokenKind::Semicolon if braces == 0 => {
                    self.advance();
                    return;
                }
                _ => {}
            }
            self.advance();
        }
    }

    // ---- declarations ----

    fn items(&mut self, namespace: Option<String>, unit: &mut UnitSyntax, nested: bool) {
        let mut namespace = namespace;
        loop {
            let start = self.pos;
            match self.kind() {
                TokenKind::Eof => return,
                TokenKind::RBrace if nested => return,
                TokenKind::Namespace => {
                    if self.namespace(&mut namespace, unit).is_none() {
                        self.recover_item(start);
                    }
                }
                TokenKind::Public | TokenKind::Internal | TokenKind::Class => {
                    match self.class(namespace.clone()) {
                        Some(class) => unit.classes.push(class),
                        None => self.recover_item(start),
                    }
                }
                _ => {
                    self.expected("'class' or 'namespace'");
                    self.recover_item(start);
                }
            }
        }
    }

    fn namespace(&mut self, current: &mut Option<String>, unit: &mut UnitSyntax) -> Option<()> {
        self.advance();
        let name = self.qualified_name("namespace name")?;
        let full = match current.as_deref() {
            Some(outer) => format!("{}.{}", outer, name),
            None => name,
        };

        if self.eat(&TokenKind::Semicolon) {
            *current = Some(full);
            return Some(());
        }

        self.expect(TokenKind::LBrace, "'{' or ';'")?;
        self.nested(|parser| {
            parser.items(Some(full), unit, true);
            parser.expect(TokenKind::RBrace, "'}'")
        })?;
        Some(())
    }

    fn modifier(&mut self) -> bool {
        match self.kind() {
            TokenKind::Public => {
                self.advance();
                true
            }
            TokenKind::Internal => {
                self.advance();
                false
            }
            _ => false,
        }
    }

    fn class(&mut self, namespace: Option<String>) -> Option<ClassSyntax> {
        let location = self.current().location;
        let public = self.modifier();
        self.expect(TokenKind::Class, "'class'")?;
        let (name, _) = self.ident("class name")?;
        self.expect(TokenKind::LBrace, "'{'")?;

        let mut members = Vec::new();
        while !matches!(self.kind(), TokenKind::RBrace | TokenKind::Eof) {
            let start = self.pos;
            match self.member() {
                Some(member) => members.push(member),
                None => self.recover_member(start),
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;

        Some(ClassSyntax {
            name,
            namespace,
            public,
            members,
            location,
        })
    }

    fn member(&mut self) -> Option<MemberSyntax> {
        let location = self.current().location;
        let public = self.modifier();
        match self.kind().clone() {
            TokenKind::Var => {
                self.advance();
                let (name, _) = self.ident("field name")?;
                let init = if self.eat(&TokenKind::Assign) {
                    Some(self.expr()?)
                } else {
                    None
                };
                self.expect(TokenKind::Semicolon, "';'")?;
                Some(MemberSyntax::Field(FieldSyntax {
                    name,
                    public,
                    init,
                    location,
                }))
            }
            TokenKind::Fn => {
                self.advance();
                let (name, _) = self.ident("method name")?;
                let function = self.function(name, public, location)?;
                Some(MemberSyntax::Method(function))
            }
            TokenKind::Ident(name) => {
                self.advance();
                let function = self.function(name, public, location)?;
                Some(MemberSyntax::Constructor(function))
            }
            _ => {
                self.expected("member declaration");
                None
            }
        }
    }

    fn function(&mut self, name: String, public: bool, location: Location) -> Option<FunctionSyntax> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let (name, location) = self.ident("parameter name")?;
                params.push(ParamSyntax { name, location });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.block()?;

        Some(FunctionSyntax {
            name,
            public,
            params,
            body,
            location,
        })
    }

    // ---- statements ----

    fn block(&mut self) -> Option<BlockSyntax> {
        let location = self.expect(TokenKind::LBrace, "'{'")?;
        self.nested(|parser| {
            let mut statements = Vec::new();
            while !matches!(parser.kind(), TokenKind::RBrace | TokenKind::Eof) {
                let start = parser.pos;
                match parser.statement() {
                    Some(statement) => statements.push(statement),
                    None => parser.recover_statement(start),
                }
            }
            parser.expect(TokenKind::RBrace, "'}'")?;

            Some(BlockSyntax {
                statements,
                location,
            })
        })
    }

    fn statement(&mut self) -> Option<StmtSyntax> {
        let location = self.current().location;
        let kind = match self.kind() {
            TokenKind::Var => {
                self.advance();
                let (name, _) = self.ident("variable name")?;
                let init = if self.eat(&TokenKind::Assign) {
                    Some(self.expr()?)
                } else {
                    None
                };
                self.expect(TokenKind::Semicolon, "';'")?;
                StmtKind::Var { name, init }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.at(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.expect(TokenKind::Semicolon, "';'")?;
                StmtKind::Return(value)
            }
            TokenKind::Throw => {
                self.advance();
                let value = self.expr()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                StmtKind::Throw(value)
            }
            TokenKind::If => return self.if_statement(),
            TokenKind::While => {
                self.advance();
                self.expect(TokenKind::LParen, "'('")?;
                let condition = self.expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                let body = self.block()?;
                StmtKind::While { condition, body }
            }
            TokenKind::LBrace => StmtKind::Block(self.block()?),
            _ => {
                let target = self.expr()?;
                if self.eat(&TokenKind::Assign) {
                    let value = self.expr()?;
                    self.expect(TokenKind::Semicolon, "';'")?;
                    StmtKind::Assign { target, value }
                } else {
                    self.expect(TokenKind::Semicolon, "';'")?;
                    StmtKind::Expr(target)
                }
            }
        };
        Some(StmtSyntax { kind, location })
    }

    fn if_statement(&mut self) -> Option<StmtSyntax> {
        let location = self.current().location;
        let mut branches = Vec::new();
        let mut else_branch = None;

        loop {
            self.advance();
            self.expect(TokenKind::LParen, "'('")?;
            let condition = self.expr()?;
            self.expect(TokenKind::RParen, "')'")?;
            branches.push((condition, self.block()?));

            if !self.eat(&TokenKind::Else) {
                break;
            }
            if !self.at(&TokenKind::If) {
                else_branch = Some(self.block()?);
                break;
            }
        }

        Some(StmtSyntax {
            kind: StmtKind::If {
                branches,
                else_branch,
            },
            location,
        })
    }

    // ---- expressions ----

    fn expr(&mut self) -> Option<ExprSyntax> {
        self.binary(1)
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self.kind() {
            TokenKind::OrOr => BinaryOp::Or,
            TokenKind::AndAnd => BinaryOp::And,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::Ge,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            _ => return None,
        };
        Some(op)
    }

    /// Precedence climbing. Operators at one level are collected into a
    /// single left-associative chain.
    fn binary(&mut self, min_precedence: u8) -> Option<ExprSyntax> {
        let first = self.unary()?;
        let mut rest = Vec::new();
        while let Some(op) = self.binary_op() {
            if op.precedence() < min_precedence {
                break;
            }
            self.advance();
            let rhs = self.binary(op.precedence() + 1)?;
            rest.push((op, rhs));
        }

        if rest.is_empty() {
            return Some(first);
        }
        Some(ExprSyntax {
            location: first.location,
            kind: ExprKind::Binary {
                first: Box::new(first),
                rest,
            },
        })
    }

    fn unary(&mut self) -> Option<ExprSyntax> {
        self.nested(|parser| {
            let location = parser.current().location;
            let op = match parser.kind() {
                TokenKind::Bang => UnaryOp::Not,
                TokenKind::Minus => UnaryOp::Neg,
                _ => return parser.postfix(),
            };
            parser.advance();
            let operand = parser.unary()?;
            Some(ExprSyntax {
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                location,
            })
        })
    }

    fn postfix(&mut self) -> Option<ExprSyntax> {
        let primary = self.primary()?;
        let location = primary.location;
        // `(a.b)()` continues the parenthesised chain
        let (base, mut ops) = match primary.kind {
            ExprKind::Postfix { base, ops } => (*base, ops),
            kind => (ExprSyntax { kind, location }, Vec::new()),
        };

        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let (name, _) = self.ident("member name")?;
                    ops.push(PostfixOp::Member(name));
                }
                TokenKind::LParen => {
                    let callable = match ops.last() {
                        Some(op) => matches!(op, PostfixOp::Member(_)),
                        None => matches!(base.kind, ExprKind::Name(_)),
                    };
                    if !callable {
                        self.expected("method name");
                        return None;
                    }
                    ops.push(PostfixOp::Call(self.arguments()?));
                }
                _ => break,
            }
        }

        if ops.is_empty() {
            return Some(base);
        }
        Some(ExprSyntax {
            kind: ExprKind::Postfix {
                base: Box::new(base),
                ops,
            },
            location,
        })
    }

    fn arguments(&mut self) -> Option<Vec<ExprSyntax>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Some(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen, "')' or ','")?;
            return Some(args);
        }
    }

    fn primary(&mut self) -> Option<ExprSyntax> {
        let location = self.current().location;
        let kind = match self.kind().clone() {
            TokenKind::Int(value) => ExprKind::Int(value),
            TokenKind::Float(value) => ExprKind::Float(value),
            TokenKind::Str(value) => ExprKind::Str(value),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Null => ExprKind::Null,
            TokenKind::This => ExprKind::This,
            TokenKind::Ident(name) => ExprKind::Name(name),
            TokenKind::New => {
                self.advance();
                let type_name = self.qualified_name("type name")?;
                let args = self.arguments()?;
                return Some(ExprSyntax {
                    kind: ExprKind::New { type_name, args },
                    location,
                });
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Some(inner);
            }
            _ => {
                self.expected("expression");
                return None;
            }
        };
        self.advance();
        Some(ExprSyntax { kind, location })
    }
}
