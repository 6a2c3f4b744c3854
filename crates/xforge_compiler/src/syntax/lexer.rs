//! Tokenizer for XScript source.

use crate::diagnostic::{codes, DiagnosticBag, Location};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    Namespace,
    Class,
    Public,
    Internal,
    Var,
    Fn,
    Return,
    If,
    Else,
    While,
    New,
    This,
    True,
    False,
    Null,
    Throw,

    LBrace,
    RBrace,
    LParen,
    RParen,
    Semicolon,
    Comma,
    Dot,
    Assign,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,

    Eof,
}

impl TokenKind {
    fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "namespace" => TokenKind::Namespace,
            "class" => TokenKind::Class,
            "public" => TokenKind::Public,
            "internal" => TokenKind::Internal,
            "var" => TokenKind::Var,
            "fn" => TokenKind::Fn,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "new" => TokenKind::New,
            "this" => TokenKind::This,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "throw" => TokenKind::Throw,
            _ => return None,
        };
        Some(kind)
    }

    /// Human-readable form used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Int(v) => format!("integer {}", v),
            TokenKind::Float(v) => format!("number {}", v),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Namespace => "namespace",
            TokenKind::Class => "class",
            TokenKind::Public => "public",
            TokenKind::Internal => "internal",
            TokenKind::Var => "var",
            TokenKind::Fn => "fn",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::New => "new",
            TokenKind::This => "this",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Throw => "throw",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Assign => "=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Ident(_)
            | TokenKind::Int(_)
            | TokenKind::Float(_)
            | TokenKind::Str(_)
            | TokenKind::Eof => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

/// Tokenize `source`, reporting lexical errors into `diagnostics`.
///
/// The returned stream always ends with [`TokenKind::Eof`]. Invalid
/// characters are reported and skipped.
pub fn tokenize(source: &str, diagnostics: &mut DiagnosticBag) -> Vec<Token> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        diagnostics,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    tokens
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    diagnostics: &'a mut DiagnosticBag,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.column)
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_next()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.location();
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        if c == '*' && self.peek() == Some('/') {
                            self.bump();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        self.diagnostics.error(
                            codes::UNTERMINATED_COMMENT,
                            "End-of-file found, '*/' expected",
                            start,
                        );
                    }
                }
                _ => return,
            }
        }
    }

    fn next_token(&mut self) -> Token {
        loop {
            self.skip_trivia();
            let location = self.location();
            let Some(c) = self.bump() else {
                return Token { kind: TokenKind::Eof, location };
            };

            let kind = match c {
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                ';' => TokenKind::Semicolon,
                ',' => TokenKind::Comma,
                '.' => TokenKind::Dot,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '%' => TokenKind::Percent,
                '=' => self.pair('=', TokenKind::EqEq, TokenKind::Assign),
                '!' => self.pair('=', TokenKind::NotEq, TokenKind::Bang),
                '<' => self.pair('=', TokenKind::LtEq, TokenKind::Lt),
                '>' => self.pair('=', TokenKind::GtEq, TokenKind::Gt),
                '&' if self.peek() == Some('&') => {
                    self.bump();
                    TokenKind::AndAnd
                }
                '|' if self.peek() == Some('|') => {
                    self.bump();
                    TokenKind::OrOr
                }
                '"' => self.string(location),
                c if c.is_ascii_digit() => self.number(c, location),
                c if c == '_' || c.is_alphabetic() => self.word(c),
                other => {
                    self.diagnostics.error(
                        codes::UNEXPECTED_CHARACTER,
                        format!("Unexpected character '{}'", other.escape_default()),
                        location,
                    );
                    continue;
                }
            };
            return Token { kind, location };
        }
    }

    fn pair(&mut self, second: char, matched: TokenKind, single: TokenKind) -> TokenKind {
        if self.peek() == Some(second) {
            self.bump();
            matched
        } else {
            single
        }
    }

    fn word(&mut self, first: char) -> TokenKind {
        let mut word = String::from(first);
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::keyword(&word).unwrap_or(TokenKind::Ident(word))
    }

    fn number(&mut self, first: char, location: Location) -> TokenKind {
        let mut text = String::from(first);
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            text.push(c);
            self.bump();
        }

        let fractional = self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit());
        if fractional {
            text.push('.');
            self.bump();
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                text.push(c);
                self.bump();
            }
            // digits with a single dot always parse
            return TokenKind::Float(text.parse().unwrap_or_default());
        }

        match text.parse::<i64>() {
            Ok(value) => TokenKind::Int(value),
            Err(_) => {
                self.diagnostics.error(
                    codes::INTEGER_TOO_LARGE,
                    format!("Integral constant {} is too large", text),
                    location,
                );
                TokenKind::Int(0)
            }
        }
    }

    fn string(&mut self, location: Location) -> TokenKind {
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.diagnostics.error(
                        codes::UNTERMINATED_STRING,
                        "Newline in constant",
                        location,
                    );
                    break;
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('0') => value.push('\0'),
                        Some(other) => value.push(other),
                        None => {}
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
        TokenKind::Str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> (Vec<TokenKind>, DiagnosticBag) {
        let mut diagnostics = DiagnosticBag::new();
        let tokens = tokenize(source, &mut diagnostics);
        (tokens.into_iter().map(|t| t.kind).collect(), diagnostics)
    }

    #[test]
    fn test_keywords_and_operators() {
        let (tokens, diagnostics) = kinds("public class A { fn f() { return 1 <= 2 && !x; } }");
        assert!(diagnostics.is_empty());
        assert_eq!(tokens[0], TokenKind::Public);
        assert_eq!(tokens[1], TokenKind::Class);
        assert_eq!(tokens[2], TokenKind::Ident("A".to_string()));
        assert!(tokens.contains(&TokenKind::LtEq));
        assert!(tokens.contains(&TokenKind::AndAnd));
        assert!(tokens.contains(&TokenKind::Bang));
        assert_eq!(tokens.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_numbers() {
        let (tokens, _) = kinds("42 3.5 7.x");
        assert_eq!(tokens[0], TokenKind::Int(42));
        assert_eq!(tokens[1], TokenKind::Float(3.5));
        assert_eq!(tokens[2], TokenKind::Int(7));
        assert_eq!(tokens[3], TokenKind::Dot);
    }

    #[test]
    fn test_integer_overflow_reported() {
        let (_, diagnostics) = kinds("99999999999999999999");
        let (errors, _) = diagnostics.partition();
        assert_eq!(errors[0].code, codes::INTEGER_TOO_LARGE);
    }

    #[test]
    fn test_string_escapes() {
        let (tokens, diagnostics) = kinds(r#""a\"b\n""#);
        assert!(diagnostics.is_empty());
        assert_eq!(tokens[0], TokenKind::Str("a\"b\n".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        let (_, diagnostics) = kinds("\"abc");
        let (errors, _) = diagnostics.partition();
        assert_eq!(errors[0].code, codes::UNTERMINATED_STRING);
    }

    #[test]
    fn test_comments_and_locations() {
        let mut diagnostics = DiagnosticBag::new();
        let tokens = tokenize("// line\n/* block\n */ x", &mut diagnostics);
        assert!(diagnostics.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Ident("x".to_string()));
        assert_eq!(tokens[0].location, Location::new(3, 5));
    }

    #[test]
    fn test_unterminated_comment() {
        let (tokens, diagnostics) = kinds("x /* never closed");
        assert_eq!(tokens.len(), 2);
        let (errors, _) = diagnostics.partition();
        assert_eq!(errors[0].code, codes::UNTERMINATED_COMMENT);
    }

    #[test]
    fn test_unexpected_characters_skipped() {
        let (tokens, diagnostics) = kinds("a # b & c");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Ident("b".to_string()),
                TokenKind::Ident("c".to_string()),
                TokenKind::Eof,
            ]
        );
        let (errors, _) = diagnostics.partition();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.code == codes::UNEXPECTED_CHARACTER));
    }
}
