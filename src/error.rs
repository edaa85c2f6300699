// error.rs - Idiomatic Rust error type for jsregex.
//
// Folds the compile error codes and the negative run-time results into
// semantic variants while keeping the numeric code available.

use std::fmt;

use crate::jsregexp::*;
use crate::regerror::{js_regexp_error_text, js_regexp_runtime_error_text};

/// Error type for regex compilation and matching operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexError {
    /// The pattern could not be compiled.
    Syntax { code: i32, message: String },
    /// Memory allocation failure.
    NoMemory,
    /// Match limit exceeded.
    HitLimit,
    /// Recursion limit exceeded.
    RecursionLimit,
    /// Internal engine error (should not occur in correct usage).
    Internal,
    /// Other error not covered by specific variants.
    Other(i32),
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegexError::Syntax { message, .. } => write!(f, "syntax error: {}", message),
            RegexError::NoMemory => write!(f, "memory allocation failed"),
            RegexError::HitLimit => write!(f, "match limit exceeded"),
            RegexError::RecursionLimit => write!(f, "recursion limit exceeded"),
            RegexError::Internal => write!(f, "internal error"),
            RegexError::Other(code) => write!(f, "error code {}", code),
        }
    }
}

impl std::error::Error for RegexError {}

impl From<i32> for RegexError {
    fn from(code: i32) -> Self {
        match code {
            JSREGEXP_ERROR_NOMEMORY => RegexError::NoMemory,
            JSREGEXP_ERROR_HITLIMIT => RegexError::HitLimit,
            JSREGEXP_ERROR_RECURSION_LIMIT => RegexError::RecursionLimit,
            JSREGEXP_ERROR_INTERNAL => RegexError::Internal,
            JSREGEXP_ERR_NO_MEMORY => RegexError::NoMemory,
            c if js_regexp_is_compile_error(c) => RegexError::Syntax {
                code: c,
                message: js_regexp_error_text(c).to_string(),
            },
            _ => RegexError::Other(code),
        }
    }
}

impl From<CompileError> for RegexError {
    fn from(err: CompileError) -> Self {
        if err.code == JSREGEXP_ERR_NO_MEMORY {
            return RegexError::NoMemory;
        }
        RegexError::Syntax {
            code: err.code,
            message: err.message.to_string(),
        }
    }
}

impl RegexError {
    /// Returns the numeric code: positive for compile errors, negative for
    /// run-time failures.
    pub fn code(&self) -> i32 {
        match self {
            RegexError::Syntax { code, .. } => *code,
            RegexError::NoMemory => JSREGEXP_ERROR_NOMEMORY,
            RegexError::HitLimit => JSREGEXP_ERROR_HITLIMIT,
            RegexError::RecursionLimit => JSREGEXP_ERROR_RECURSION_LIMIT,
            RegexError::Internal => JSREGEXP_ERROR_INTERNAL,
            RegexError::Other(code) => *code,
        }
    }

    /// True for failures raised while matching rather than compiling.
    pub fn is_runtime(&self) -> bool {
        js_regexp_is_runtime_error(self.code())
    }

    /// The engine's message for this error's code.
    pub fn description_text(&self) -> &'static str {
        if self.is_runtime() {
            js_regexp_runtime_error_text(self.code())
        } else {
            js_regexp_error_text(self.code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_runtime_codes() {
        let err = RegexError::from(JSREGEXP_ERROR_HITLIMIT);
        assert_eq!(err, RegexError::HitLimit);
        assert_eq!(err.code(), JSREGEXP_ERROR_HITLIMIT);
        assert!(err.is_runtime());
        assert_eq!(err.to_string(), "match limit exceeded");

        let err = RegexError::from(JSREGEXP_ERROR_RECURSION_LIMIT);
        assert_eq!(err, RegexError::RecursionLimit);
        assert_eq!(err.description_text(), "recursion limit exceeded");
        assert_eq!(RegexError::from(JSREGEXP_ERROR_INTERNAL), RegexError::Internal);
    }

    #[test]
    fn from_syntax_code() {
        let err = RegexError::from(JSREGEXP_ERR_MISSING_PARENTHESIS);
        assert!(matches!(err, RegexError::Syntax { code: 14, .. }));
        assert_eq!(err.to_string(), "syntax error: missing )");
        assert!(!err.is_runtime());
    }

    #[test]
    fn from_compile_error() {
        let err = RegexError::from(CompileError::new(JSREGEXP_ERR_NOTHING_TO_REPEAT));
        assert_eq!(err.code(), JSREGEXP_ERR_NOTHING_TO_REPEAT);
        assert_eq!(err.description_text(), "nothing to repeat");
        assert_eq!(
            RegexError::from(CompileError::new(JSREGEXP_ERR_NO_MEMORY)),
            RegexError::NoMemory
        );
    }

    #[test]
    fn from_unknown_code() {
        let err = RegexError::from(-9999);
        assert!(matches!(err, RegexError::Other(-9999)));
        assert_eq!(err.to_string(), "error code -9999");
    }

    #[test]
    fn error_trait() {
        let err: Box<dyn std::error::Error> = Box::new(RegexError::NoMemory);
        assert_eq!(err.to_string(), "memory allocation failed");
    }
}
