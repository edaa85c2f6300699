// regescape.rs - Escape and quantifier resolution shared by both compiler passes.
//
// check_escape() consumes one backslash sequence and classifies it;
// is_counted_repeat() / read_repeat_counts() recognize and parse `{m,n}`.

use crate::chartables::{hex_value, is_ascii_digit, is_ascii_hex_digit, is_ascii_octal_digit};
use crate::jsregexp::*;
use crate::regint::{OpCode, MAX_REPEAT_COUNT};

/// Result of resolving one backslash sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Escape {
    /// A literal code point.
    Char(u32),
    /// `\b \B \d \D \s \S \w \W`, carried as the opcode that matches them.
    Type(OpCode),
    /// `\N` naming an already opened capture group.
    BackRef(usize),
}

impl Escape {
    /// Types that consume a character (everything but the word boundaries).
    pub fn consumes_char(self) -> bool {
        matches!(self, Escape::Type(op) if OpCode::is_char_type(op as u8))
    }
}

/// Immediate meaning of `\c` for the letters and digits, or `None` when the
/// sequence needs further parsing.
fn simple_escape(c: u32) -> Option<Escape> {
    let Ok(b) = u8::try_from(c) else {
        return Some(Escape::Char(c));
    };
    let e = match b {
        b'0'..=b'9' | b'x' | b'u' | b'c' => return None,
        b'a' => Escape::Char(0x07),
        b'f' => Escape::Char(0x0c),
        b'n' => Escape::Char(0x0a),
        b'r' => Escape::Char(0x0d),
        b't' => Escape::Char(0x09),
        b'v' => Escape::Char(0x0b),
        b'b' => Escape::Type(OpCode::WordBoundary),
        b'B' => Escape::Type(OpCode::NotWordBoundary),
        b'd' => Escape::Type(OpCode::Digit),
        b'D' => Escape::Type(OpCode::NotDigit),
        b's' => Escape::Type(OpCode::Whitespace),
        b'S' => Escape::Type(OpCode::NotWhitespace),
        b'w' => Escape::Type(OpCode::Wordchar),
        b'W' => Escape::Type(OpCode::NotWordchar),
        _ => Escape::Char(c),
    };
    Some(e)
}

/// Read up to `count` hex digits following `pos`. Returns the value when
/// exactly `count` digits are present.
fn read_hex(pattern: &[u16], pos: usize, count: usize) -> Option<u32> {
    let mut value = 0;
    for i in 1..=count {
        let c = *pattern.get(pos + i)? as u32;
        if !is_ascii_hex_digit(c) {
            return None;
        }
        value = value * 16 + hex_value(c);
    }
    Some(value)
}

/// Resolve the escape whose backslash is at `*ptr`.
///
/// On return `*ptr` indexes the last pattern unit belonging to the escape.
/// `bracount` is the number of capture groups opened so far; `\N` with a
/// larger `N` falls back to an octal escape. Inside a class there are no
/// back-references.
pub fn check_escape(pattern: &[u16], ptr: &mut usize, bracount: usize, isclass: bool) -> Result<Escape, i32> {
    let end = pattern.len();
    let mut p = *ptr + 1;
    if p >= end {
        *ptr = p;
        return Err(JSREGEXP_ERR_BACKSLASH_AT_END);
    }

    let c = pattern[p] as u32;
    if let Some(e) = simple_escape(c) {
        *ptr = p;
        return Ok(e);
    }

    let result = match c as u8 {
        b'1'..=b'9' => {
            if !isclass {
                let start = p;
                let mut n = (c - b'0' as u32) as usize;
                while p + 1 < end && is_ascii_digit(pattern[p + 1] as u32) && n <= bracount {
                    p += 1;
                    n = n * 10 + (pattern[p] - b'0' as u16) as usize;
                }
                if n <= bracount {
                    *ptr = p;
                    return Ok(Escape::BackRef(n));
                }
                p = start;
            }
            if c >= b'8' as u32 {
                Escape::Char(c)
            } else {
                Escape::Char(read_octal(pattern, &mut p))
            }
        }
        b'0' => Escape::Char(read_octal(pattern, &mut p)),
        b'x' => match read_hex(pattern, p, 2) {
            Some(v) => {
                p += 2;
                Escape::Char(v)
            }
            None => Escape::Char('x' as u32),
        },
        b'u' => match read_hex(pattern, p, 4) {
            Some(v) => {
                p += 4;
                Escape::Char(v)
            }
            None => Escape::Char('u' as u32),
        },
        b'c' => {
            p += 1;
            if p >= end {
                *ptr = p;
                return Err(JSREGEXP_ERR_BACKSLASH_C_AT_END);
            }
            let mut cc = pattern[p] as u32;
            if (b'a' as u32..=b'z' as u32).contains(&cc) {
                cc -= 32;
            }
            Escape::Char(cc ^ 0x40)
        }
        _ => Escape::Char(c),
    };
    *ptr = p;
    Ok(result)
}

/// Octal escape starting at the digit at `*p`: up to two more octal digits
/// while the value stays within a byte.
fn read_octal(pattern: &[u16], p: &mut usize) -> u32 {
    let mut c = pattern[*p] as u32 - b'0' as u32;
    let mut used = 0;
    for i in 1..=2 {
        let Some(&d) = pattern.get(*p + i) else { break };
        let d = d as u32;
        if !is_ascii_octal_digit(d) {
            break;
        }
        let cc = c * 8 + d - b'0' as u32;
        if cc > 255 {
            break;
        }
        c = cc;
        used = i;
    }
    *p += used;
    c
}

/// Does `pattern[p..]` (just after a `{`) hold a well-formed `m}`, `m,}`
/// or `m,n}`?
pub fn is_counted_repeat(pattern: &[u16], mut p: usize) -> bool {
    let end = pattern.len();
    let digit = |i: usize| i < end && is_ascii_digit(pattern[i] as u32);
    let is = |i: usize, ch: u8| i < end && pattern[i] == ch as u16;

    if !digit(p) {
        return false;
    }
    p += 1;
    while digit(p) {
        p += 1;
    }
    if is(p, b'}') {
        return true;
    }
    if !is(p, b',') {
        return false;
    }
    p += 1;
    if is(p, b'}') {
        return true;
    }
    if !digit(p) {
        return false;
    }
    p += 1;
    while digit(p) {
        p += 1;
    }
    is(p, b'}')
}

/// Parse the counts of a repeat already validated by `is_counted_repeat`.
/// `p` indexes the first digit. Returns (min, max, index of `}`), where a
/// max of -1 means unbounded.
pub fn read_repeat_counts(pattern: &[u16], mut p: usize) -> Result<(i32, i32, usize), i32> {
    let end = pattern.len();
    let read_number = |p: &mut usize| -> i32 {
        let mut n: i32 = 0;
        while *p < end && is_ascii_digit(pattern[*p] as u32) {
            n = n.saturating_mul(10).saturating_add((pattern[*p] - b'0' as u16) as i32);
            *p += 1;
        }
        n
    };

    let min = read_number(&mut p);
    if min > MAX_REPEAT_COUNT {
        return Err(JSREGEXP_ERR_REPEAT_TOO_BIG);
    }

    let mut max = -1;
    if p < end && pattern[p] == b'}' as u16 {
        max = min;
    } else {
        p += 1;
        if p < end && pattern[p] != b'}' as u16 {
            max = read_number(&mut p);
            if max > MAX_REPEAT_COUNT {
                return Err(JSREGEXP_ERR_REPEAT_TOO_BIG);
            }
            if max < min {
                return Err(JSREGEXP_ERR_REPEAT_OUT_OF_ORDER);
            }
        }
    }
    Ok((min, max, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    fn esc(s: &str, bracount: usize, isclass: bool) -> (Result<Escape, i32>, usize) {
        let p = u(s);
        let mut ptr = 0;
        let r = check_escape(&p, &mut ptr, bracount, isclass);
        (r, ptr)
    }

    #[test]
    fn simple_escapes() {
        assert_eq!(esc("\\n", 0, false), (Ok(Escape::Char(10)), 1));
        assert_eq!(esc("\\v", 0, false), (Ok(Escape::Char(11)), 1));
        assert_eq!(esc("\\.", 0, false), (Ok(Escape::Char('.' as u32)), 1));
        assert_eq!(esc("\\q", 0, false), (Ok(Escape::Char('q' as u32)), 1));
        assert_eq!(esc("\\d", 0, false), (Ok(Escape::Type(OpCode::Digit)), 1));
        assert_eq!(esc("\\W", 0, true), (Ok(Escape::Type(OpCode::NotWordchar)), 1));
        assert_eq!(esc("\\\u{e9}", 0, false), (Ok(Escape::Char(0xe9)), 1));
    }

    #[test]
    fn consumes_char() {
        assert!(Escape::Type(OpCode::Digit).consumes_char());
        assert!(!Escape::Type(OpCode::WordBoundary).consumes_char());
        assert!(!Escape::Char(1).consumes_char());
    }

    #[test]
    fn trailing_backslash() {
        assert_eq!(esc("\\", 0, false).0, Err(JSREGEXP_ERR_BACKSLASH_AT_END));
        assert_eq!(esc("\\c", 0, false).0, Err(JSREGEXP_ERR_BACKSLASH_C_AT_END));
    }

    #[test]
    fn hex_and_unicode() {
        assert_eq!(esc("\\x41", 0, false), (Ok(Escape::Char(0x41)), 3));
        assert_eq!(esc("\\x4", 0, false), (Ok(Escape::Char('x' as u32)), 1));
        assert_eq!(esc("\\xg1", 0, false), (Ok(Escape::Char('x' as u32)), 1));
        assert_eq!(esc("\\u20AC", 0, false), (Ok(Escape::Char(0x20ac)), 5));
        assert_eq!(esc("\\u20A", 0, false), (Ok(Escape::Char('u' as u32)), 1));
    }

    #[test]
    fn control_escape() {
        assert_eq!(esc("\\cJ", 0, false), (Ok(Escape::Char(0x0a)), 2));
        assert_eq!(esc("\\cj", 0, false), (Ok(Escape::Char(0x0a)), 2));
    }

    #[test]
    fn backrefs_and_octal() {
        assert_eq!(esc("\\1", 1, false), (Ok(Escape::BackRef(1)), 1));
        assert_eq!(esc("\\12", 12, false), (Ok(Escape::BackRef(12)), 2));
        // Not enough groups: octal.
        assert_eq!(esc("\\12", 1, false), (Ok(Escape::Char(0o12)), 2));
        assert_eq!(esc("\\1", 1, true), (Ok(Escape::Char(1)), 1));
        assert_eq!(esc("\\0", 0, false), (Ok(Escape::Char(0)), 1));
        assert_eq!(esc("\\101", 0, false), (Ok(Escape::Char(0o101)), 3));
        // 0o400 does not fit in a byte: stop after two digits.
        assert_eq!(esc("\\400", 0, false), (Ok(Escape::Char(0o40)), 2));
        assert_eq!(esc("\\8", 0, false), (Ok(Escape::Char('8' as u32)), 1));
        assert_eq!(esc("\\9", 0, true), (Ok(Escape::Char('9' as u32)), 1));
    }

    #[test]
    fn counted_repeat_recognition() {
        let yes = ["3}", "3,}", "3,5}", "12,345}"];
        let no = ["}", ",5}", "3", "3,", "3,5", "a}", "3,a}"];
        for s in yes {
            assert!(is_counted_repeat(&u(s), 0), "{:?}", s);
        }
        for s in no {
            assert!(!is_counted_repeat(&u(s), 0), "{:?}", s);
        }
    }

    #[test]
    fn repeat_counts() {
        assert_eq!(read_repeat_counts(&u("3}"), 0), Ok((3, 3, 1)));
        assert_eq!(read_repeat_counts(&u("3,}"), 0), Ok((3, -1, 2)));
        assert_eq!(read_repeat_counts(&u("2,5}"), 0), Ok((2, 5, 3)));
        assert_eq!(read_repeat_counts(&u("5,2}"), 0), Err(JSREGEXP_ERR_REPEAT_OUT_OF_ORDER));
        assert_eq!(read_repeat_counts(&u("65536}"), 0), Err(JSREGEXP_ERR_REPEAT_TOO_BIG));
        assert_eq!(read_repeat_counts(&u("1,99999999999}"), 0), Err(JSREGEXP_ERR_REPEAT_TOO_BIG));
    }
}
