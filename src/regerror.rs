// regerror.rs - Error code to message conversion.
//
// Compile errors carry a positive code; run-time results are negative.

use crate::jsregexp::*;

/// Message for a compile error code.
pub fn js_regexp_error_text(code: i32) -> &'static str {
    match code {
        JSREGEXP_ERR_BACKSLASH_AT_END => "\\ at end of pattern",
        JSREGEXP_ERR_BACKSLASH_C_AT_END => "\\c at end of pattern",
        JSREGEXP_ERR_HEX_VALUE_TOO_LARGE => "character value in \\x{...} sequence is too large",
        JSREGEXP_ERR_REPEAT_OUT_OF_ORDER => "numbers out of order in {} quantifier",
        JSREGEXP_ERR_REPEAT_TOO_BIG => "number too big in {} quantifier",
        JSREGEXP_ERR_MISSING_CLASS_TERMINATOR => "missing terminating ] for character class",
        JSREGEXP_ERR_CODE_OVERFLOW => "internal error: code overflow",
        JSREGEXP_ERR_RANGE_OUT_OF_ORDER => "range out of order in character class",
        JSREGEXP_ERR_NOTHING_TO_REPEAT => "nothing to repeat",
        JSREGEXP_ERR_UNMATCHED_PARENTHESES => "unmatched parentheses",
        JSREGEXP_ERR_UNEXPECTED_REPEAT => "internal error: unexpected repeat",
        JSREGEXP_ERR_UNRECOGNIZED_GROUP => "unrecognized character after (?",
        JSREGEXP_ERR_NO_MEMORY => "failed to get memory",
        JSREGEXP_ERR_MISSING_PARENTHESIS => "missing )",
        JSREGEXP_ERR_NONEXISTENT_SUBPATTERN => "reference to non-existent subpattern",
        JSREGEXP_ERR_PATTERN_TOO_LARGE => "regular expression too large",
        JSREGEXP_ERR_NESTED_TOO_DEEPLY => "parentheses nested too deeply",
        _ => "unknown error",
    }
}

/// Message for a run-time result code returned by `js_regexp_execute`.
pub fn js_regexp_runtime_error_text(code: i32) -> &'static str {
    match code {
        JSREGEXP_ERROR_NOMATCH => "no match",
        JSREGEXP_ERROR_HITLIMIT => "match limit exceeded",
        JSREGEXP_ERROR_NOMEMORY => "failed to get memory",
        JSREGEXP_ERROR_INTERNAL => "internal error",
        JSREGEXP_ERROR_RECURSION_LIMIT => "recursion limit exceeded",
        _ => "unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_compile_code_has_a_message() {
        for code in JSREGEXP_ERR_BACKSLASH_AT_END..=JSREGEXP_ERR_NESTED_TOO_DEEPLY {
            assert_ne!(js_regexp_error_text(code), "unknown error", "code {}", code);
        }
        assert_eq!(js_regexp_error_text(0), "unknown error");
        assert_eq!(js_regexp_error_text(18), "unknown error");
    }

    #[test]
    fn runtime_messages() {
        assert_eq!(
            js_regexp_runtime_error_text(JSREGEXP_ERROR_RECURSION_LIMIT),
            "recursion limit exceeded"
        );
        assert_eq!(js_regexp_runtime_error_text(-99), "unknown error");
    }

    #[test]
    fn compile_error_carries_message() {
        let e = CompileError::new(JSREGEXP_ERR_MISSING_CLASS_TERMINATOR);
        assert_eq!(e.to_string(), "missing terminating ] for character class");
    }
}
