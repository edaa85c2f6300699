// jsregexp.rs - Public types and constants for jsregex.
//
// Compile-time option flags, the run-time result codes returned by
// js_regexp_execute, and the defaults for the process-wide limits.

use bitflags::bitflags;

// === Run-time result codes ===

pub const JSREGEXP_ERROR_NOMATCH: i32 = -1;
pub const JSREGEXP_ERROR_HITLIMIT: i32 = -2;
pub const JSREGEXP_ERROR_NOMEMORY: i32 = -3;
pub const JSREGEXP_ERROR_INTERNAL: i32 = -4;
pub const JSREGEXP_ERROR_RECURSION_LIMIT: i32 = -5;

#[inline]
pub fn js_regexp_is_runtime_error(code: i32) -> bool {
    code < JSREGEXP_ERROR_NOMATCH
}

// === Compile error codes ===

pub const JSREGEXP_ERR_BACKSLASH_AT_END: i32 = 1;
pub const JSREGEXP_ERR_BACKSLASH_C_AT_END: i32 = 2;
pub const JSREGEXP_ERR_HEX_VALUE_TOO_LARGE: i32 = 3;
pub const JSREGEXP_ERR_REPEAT_OUT_OF_ORDER: i32 = 4;
pub const JSREGEXP_ERR_REPEAT_TOO_BIG: i32 = 5;
pub const JSREGEXP_ERR_MISSING_CLASS_TERMINATOR: i32 = 6;
pub const JSREGEXP_ERR_CODE_OVERFLOW: i32 = 7;
pub const JSREGEXP_ERR_RANGE_OUT_OF_ORDER: i32 = 8;
pub const JSREGEXP_ERR_NOTHING_TO_REPEAT: i32 = 9;
pub const JSREGEXP_ERR_UNMATCHED_PARENTHESES: i32 = 10;
pub const JSREGEXP_ERR_UNEXPECTED_REPEAT: i32 = 11;
pub const JSREGEXP_ERR_UNRECOGNIZED_GROUP: i32 = 12;
pub const JSREGEXP_ERR_NO_MEMORY: i32 = 13;
pub const JSREGEXP_ERR_MISSING_PARENTHESIS: i32 = 14;
pub const JSREGEXP_ERR_NONEXISTENT_SUBPATTERN: i32 = 15;
pub const JSREGEXP_ERR_PATTERN_TOO_LARGE: i32 = 16;
pub const JSREGEXP_ERR_NESTED_TOO_DEEPLY: i32 = 17;

#[inline]
pub fn js_regexp_is_compile_error(code: i32) -> bool {
    (JSREGEXP_ERR_BACKSLASH_AT_END..=JSREGEXP_ERR_NESTED_TOO_DEEPLY).contains(&code)
}

/// A failed compilation: the error code and its message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileError {
    pub code: i32,
    pub message: &'static str,
}

impl CompileError {
    pub fn new(code: i32) -> Self {
        CompileError {
            code,
            message: crate::regerror::js_regexp_error_text(code),
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message)
    }
}

// === Limits ===

/// Default ceiling on live backtracking frames per execution.
pub const DEFAULT_RECURSION_LIMIT: u32 = 100_000;
/// Default ceiling on frame pushes per execution (0 disables the check).
pub const DEFAULT_MATCH_LIMIT: u64 = 10_000_000;

// === Compile options ===

/// Case sensitivity requested by the caller of `js_regexp_compile`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IgnoreCaseOption {
    #[default]
    DoNotIgnoreCase,
    IgnoreCase,
}

/// Whether `^` and `$` also match at line terminators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MultilineOption {
    #[default]
    SingleLine,
    Multiline,
}

impl From<bool> for IgnoreCaseOption {
    fn from(yes: bool) -> Self {
        if yes {
            IgnoreCaseOption::IgnoreCase
        } else {
            IgnoreCaseOption::DoNotIgnoreCase
        }
    }
}

impl From<bool> for MultilineOption {
    fn from(yes: bool) -> Self {
        if yes {
            MultilineOption::Multiline
        } else {
            MultilineOption::SingleLine
        }
    }
}

bitflags! {
    /// Option bits persisted on a compiled program.
    ///
    /// `IGNORE_CASE` and `MULTILINE` come from the caller; the remaining bits
    /// are derived during compilation and tell the execute entry which skip
    /// heuristics apply.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RegExpOptions: u32 {
        const IGNORE_CASE = 0x0000_0001;
        const MULTILINE = 0x0000_0002;
        const ANCHORED = 0x0200_0000;
        const FIRST_BYTE = 0x0400_0000;
        const REQ_BYTE = 0x0800_0000;
        const MULTILINE_FIRST_BYTE = 0x1000_0000;
    }
}

impl RegExpOptions {
    pub fn from_compile_options(ignore_case: IgnoreCaseOption, multiline: MultilineOption) -> Self {
        let mut options = RegExpOptions::empty();
        if ignore_case == IgnoreCaseOption::IgnoreCase {
            options |= RegExpOptions::IGNORE_CASE;
        }
        if multiline == MultilineOption::Multiline {
            options |= RegExpOptions::MULTILINE;
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_options_map_to_flags() {
        let o = RegExpOptions::from_compile_options(
            IgnoreCaseOption::IgnoreCase,
            MultilineOption::SingleLine,
        );
        assert!(o.contains(RegExpOptions::IGNORE_CASE));
        assert!(!o.contains(RegExpOptions::MULTILINE));

        let o = RegExpOptions::from_compile_options(false.into(), true.into());
        assert_eq!(o, RegExpOptions::MULTILINE);
    }

    #[test]
    fn runtime_error_classification() {
        assert!(!js_regexp_is_runtime_error(JSREGEXP_ERROR_NOMATCH));
        assert!(!js_regexp_is_runtime_error(0));
        assert!(js_regexp_is_runtime_error(JSREGEXP_ERROR_RECURSION_LIMIT));
        assert!(js_regexp_is_runtime_error(JSREGEXP_ERROR_HITLIMIT));
    }
}
