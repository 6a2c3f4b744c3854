//! Compiler diagnostics.

use std::fmt;

use serde::Serialize;

/// Diagnostic codes emitted by the compiler.
pub mod codes {
    pub const UNEXPECTED_CHARACTER: &str = "XF1001";
    pub const SYNTAX_ERROR: &str = "XF1002";
    pub const UNTERMINATED_STRING: &str = "XF1003";
    pub const INTEGER_TOO_LARGE: &str = "XF1004";
    pub const UNTERMINATED_COMMENT: &str = "XF1005";
    pub const NESTING_TOO_DEEP: &str = "XF1006";
    pub const DUPLICATE_TYPE: &str = "XF0101";
    pub const DUPLICATE_MEMBER: &str = "XF0102";
    pub const UNDECLARED_NAME: &str = "XF0103";
    pub const NO_SUCH_MEMBER: &str = "XF0117";
    pub const CONSTRUCTOR_RETURNS_VALUE: &str = "XF0127";
    pub const DUPLICATE_LOCAL: &str = "XF0128";
    pub const INVALID_ASSIGNMENT_TARGET: &str = "XF0131";
    pub const TYPE_NOT_FOUND: &str = "XF0246";
    pub const NO_MATCHING_OVERLOAD: &str = "XF1501";
    pub const CONSTRUCTOR_NAME_MISMATCH: &str = "XF1520";
    pub const NO_MATCHING_CONSTRUCTOR: &str = "XF1729";
    pub const UNREACHABLE_CODE: &str = "XF0162";
    pub const UNUSED_LOCAL: &str = "XF0168";
    pub const NO_TYPES_DECLARED: &str = "XF8001";
    pub const DUPLICATE_REFERENCE: &str = "XF8002";
    pub const UNLOADED_REFERENCE: &str = "XF8003";
    pub const MODULE_LOAD_FAILED: &str = "XF9000";
    pub const INTERNAL_ERROR: &str = "XF9999";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.line, self.column)
    }
}

/// A message reported by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    /// `None` for synthetic diagnostics not tied to source text
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn error(code: &str, message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            message: message.into(),
            location,
        }
    }

    pub fn warning(code: &str, message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.to_string(),
            message: message.into(),
            location,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(location) => write!(f, "{}: {} at {}", self.code, self.message, location),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/// Diagnostics in emission order.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    items: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, code: &str, message: impl Into<String>, location: Location) {
        self.items.push(Diagnostic::error(code, message, Some(location)));
    }

    pub fn warning(&mut self, code: &str, message: impl Into<String>, location: Location) {
        self.items.push(Diagnostic::warning(code, message, Some(location)));
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Split into `(errors, warnings)`, each keeping emission order.
    pub fn partition(self) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
        self.items.into_iter().partition(Diagnostic::is_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_keeps_order() {
        let mut bag = DiagnosticBag::new();
        bag.warning(codes::UNUSED_LOCAL, "w1", Location::new(1, 1));
        bag.error(codes::SYNTAX_ERROR, "e1", Location::new(2, 1));
        bag.warning(codes::UNREACHABLE_CODE, "w2", Location::new(3, 1));
        bag.error(codes::UNDECLARED_NAME, "e2", Location::new(4, 1));
        assert!(bag.has_errors());

        let (errors, warnings) = bag.partition();
        assert_eq!(errors.iter().map(|d| d.message.as_str()).collect::<Vec<_>>(), ["e1", "e2"]);
        assert_eq!(warnings.iter().map(|d| d.message.as_str()).collect::<Vec<_>>(), ["w1", "w2"]);
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::error(codes::UNDECLARED_NAME, "The name 'x' does not exist", Some(Location::new(3, 9)));
        assert_eq!(d.to_string(), "XF0103: The name 'x' does not exist at (3,9)");
        let d = Diagnostic::error(codes::INTERNAL_ERROR, "boom", None);
        assert_eq!(d.to_string(), "XF9999: boom");
    }
}
