//! # jsregex
//!
//! A backtracking regular-expression engine for the JavaScript regex
//! dialect, matching over UTF-16 code units.
//!
//! Patterns compile into a compact byte program which a backtracking
//! executor runs against a subject, reporting the match and every
//! capturing group as start/end pairs. Surrogate pairs are decoded where a
//! character class or `.` needs a whole code point, and case-insensitive
//! matching folds non-ASCII characters through their Unicode other case.
//!
//! ## Quick Start
//!
//! ```rust
//! use jsregex::prelude::*;
//!
//! let re = Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap();
//! let m = re.find("Date: 2026-02-12").unwrap();
//! assert_eq!(m.as_str(), "2026-02-12");
//! assert_eq!(m.start(), 6);
//! ```
//!
//! For fine-grained control, use [`RegexBuilder`](api::RegexBuilder):
//!
//! ```rust
//! use jsregex::prelude::*;
//!
//! let re = Regex::builder(r"^hello")
//!     .case_insensitive(true)
//!     .multiline(true)
//!     .build()
//!     .unwrap();
//! assert!(re.is_match("well\nHello World"));
//! ```
//!
//! ## Low-Level API
//!
//! The engine functions work on UTF-16 slices and offset vectors directly:
//!
//! ```rust
//! use jsregex::jsregexp::*;
//! use jsregex::regcomp::js_regexp_compile;
//! use jsregex::regexec::js_regexp_execute;
//!
//! let pattern: Vec<u16> = r"(\w+)@(\w+)".encode_utf16().collect();
//! let (re, groups) = js_regexp_compile(
//!     &pattern,
//!     IgnoreCaseOption::DoNotIgnoreCase,
//!     MultilineOption::SingleLine,
//! ).unwrap();
//! assert_eq!(groups, 2);
//!
//! let subject: Vec<u16> = "mail: me@host".encode_utf16().collect();
//! let mut offsets = [0i32; 9];
//! let rc = js_regexp_execute(&re, &subject, 0, &mut offsets);
//! assert_eq!(rc, 3);
//! assert_eq!(offsets[..6], [6, 13, 6, 8, 9, 13]);
//! ```
//!
//! ## Module Structure
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`jsregexp`] | Public constants, options and result codes |
//! | [`regint`] | Opcodes, encoding helpers, the compiled program |
//! | [`chartables`] | Character tables |
//! | [`ucp`] | Unicode other-case lookup |
//! | [`regescape`] | Escape and counted-repeat parsing |
//! | [`reglength`] | Compiled-size estimate |
//! | [`regcomp`] | Compiler |
//! | [`regstudy`] | Start-character bitmap |
//! | [`regexec`] | Executor and search |
//! | [`regerror`] | Error messages |
//! | [`error`] | `RegexError` for the idiomatic API |
//! | [`api`] | `Regex`, `RegexBuilder`, `Match`, `Captures` |
//! | [`prelude`] | Common re-exports |

pub mod api;
pub mod chartables;
pub mod error;
pub mod jsregexp;
pub mod prelude;
pub mod regcomp;
pub mod regerror;
pub mod regescape;
pub mod regexec;
pub mod regint;
pub mod reglength;
pub mod regstudy;
pub mod ucp;
