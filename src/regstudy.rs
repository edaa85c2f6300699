// regstudy.rs - Start-character bitmap.
//
// For an unanchored program with no first-character hint, collect the set
// of code units a match can begin with. The execute entry uses it to skip
// start positions that cannot succeed.

use log::trace;

use crate::chartables::{class_bitmap_for_char, CBIT_DIGIT, CBIT_SPACE, CBIT_WORD};
use crate::jsregexp::RegExpOptions;
use crate::regint::*;
use crate::ucp::othercase;

fn add_char(bits: &mut StartBits, c: u32, ignore_case: bool) {
    if c > 0xffff {
        bits.high = true;
        return;
    }
    bits.set(c);
    if ignore_case {
        if let Some(oc) = othercase(c) {
            bits.set(oc);
        }
    }
}

/// Add the units matched by a character type. Returns false for `.`,
/// which can start anywhere.
fn add_type(bits: &mut StartBits, op: u8) -> bool {
    let (offset, inverted, high) = match OpCode::from_u8(op) {
        OpCode::Digit => (CBIT_DIGIT, false, false),
        OpCode::NotDigit => (CBIT_DIGIT, true, true),
        OpCode::Whitespace => (CBIT_SPACE, false, true),
        OpCode::NotWhitespace => (CBIT_SPACE, true, true),
        OpCode::Wordchar => (CBIT_WORD, false, false),
        OpCode::NotWordchar => (CBIT_WORD, true, true),
        _ => return false,
    };
    for (i, byte) in bits.map.iter_mut().enumerate() {
        let b = class_bitmap_for_char(offset + i);
        *byte |= if inverted { !b } else { b };
    }
    bits.high |= high;
    true
}

/// Add an extended class whose opcode is at `pos`. Negated ones give up.
fn add_xclass(code: &[u8], pos: usize, bits: &mut StartBits) -> bool {
    let flags = code[pos + 1 + LINK_SIZE];
    if flags & XCL_NOT != 0 {
        return false;
    }
    let mut p = pos + 2 + LINK_SIZE;
    if flags & XCL_MAP != 0 {
        for (byte, map) in bits.map.iter_mut().zip(&code[p..p + 32]) {
            *byte |= map;
        }
        p += 32;
    }
    loop {
        let kind = code[p];
        p += 1;
        let (lo, hi) = match kind {
            XCL_SINGLE => {
                let (c, len) = get_utf8_char(code, p);
                p += len;
                (c, c)
            }
            XCL_RANGE => {
                let (c, len) = get_utf8_char(code, p);
                p += len;
                let (d, len) = get_utf8_char(code, p);
                p += len;
                (c, d)
            }
            _ => break,
        };
        for c in lo..=hi.min(255) {
            bits.set(c);
        }
        if hi > 255 {
            bits.high = true;
        }
    }
    true
}

/// Does a zero-minimum repeat follow the class that ends at `after`?
/// Returns the position of the next item when it does.
fn skip_optional_class_repeat(code: &[u8], after: usize) -> Option<usize> {
    match OpCode::from_u8(code[after]) {
        OpCode::CrStar | OpCode::CrMinStar | OpCode::CrQuery | OpCode::CrMinQuery => {
            Some(after + instruction_length(code, after))
        }
        OpCode::CrRange | OpCode::CrMinRange if get2(code, after + 1) == 0 => {
            Some(after + instruction_length(code, after))
        }
        _ => None,
    }
}

/// Skip the bracket at `pos` with all its alternatives and its KET.
fn skip_bracket(code: &[u8], mut pos: usize) -> usize {
    loop {
        pos += get_link(code, pos + 1);
        if code[pos] != OpCode::Alt as u8 {
            return pos + 1 + LINK_SIZE;
        }
    }
}

/// Union the start characters of every alternative of the bracket at `pos`.
fn set_start_bits(code: &[u8], mut pos: usize, bits: &mut StartBits, ignore_case: bool) -> bool {
    loop {
        let mut tcode = pos + 1 + LINK_SIZE;
        let mut try_next = true;

        while try_next {
            let op = code[tcode];
            if op >= OP_BRA || op == OpCode::Assert as u8 {
                if !set_start_bits(code, tcode, bits, ignore_case) {
                    return false;
                }
                break;
            }

            match OpCode::from_u8(op) {
                OpCode::BraNumber | OpCode::WordBoundary | OpCode::NotWordBoundary => {
                    tcode += instruction_length(code, tcode)
                }
                OpCode::AssertNot => tcode = skip_bracket(code, tcode),

                // The optional group contributes, then so does what follows.
                OpCode::BraZero | OpCode::BraMinZero => {
                    if !set_start_bits(code, tcode + 1, bits, ignore_case) {
                        return false;
                    }
                    tcode = skip_bracket(code, tcode + 1);
                }

                OpCode::Star | OpCode::MinStar | OpCode::Query | OpCode::MinQuery => {
                    add_char(bits, get_utf8_char(code, tcode + 1).0, ignore_case);
                    tcode += instruction_length(code, tcode);
                }
                OpCode::Upto | OpCode::MinUpto => {
                    add_char(bits, get_utf8_char(code, tcode + 3).0, ignore_case);
                    tcode += instruction_length(code, tcode);
                }

                OpCode::Exact
                | OpCode::Char
                | OpCode::CharIgnoringCase
                | OpCode::AsciiChar
                | OpCode::AsciiLetterIgnoringCase
                | OpCode::Plus
                | OpCode::MinPlus => {
                    let at = if op == OpCode::Exact as u8 { tcode + 3 } else { tcode + 1 };
                    let (c, _) = get_utf8_char(code, at);
                    let ic = ignore_case || op == OpCode::AsciiLetterIgnoringCase as u8;
                    add_char(bits, c, ic);
                    try_next = false;
                }

                OpCode::NotDigit
                | OpCode::Digit
                | OpCode::NotWhitespace
                | OpCode::Whitespace
                | OpCode::NotWordchar
                | OpCode::Wordchar => {
                    add_type(bits, op);
                    try_next = false;
                }

                // One-or-more and exact repeats of a type reach the type
                // itself next time round.
                OpCode::TypePlus | OpCode::TypeMinPlus => tcode += 1,
                OpCode::TypeExact => tcode += 3,

                OpCode::TypeUpto | OpCode::TypeMinUpto => {
                    if !add_type(bits, code[tcode + 3]) {
                        return false;
                    }
                    tcode += instruction_length(code, tcode);
                }
                OpCode::TypeStar | OpCode::TypeMinStar | OpCode::TypeQuery | OpCode::TypeMinQuery => {
                    if !add_type(bits, code[tcode + 1]) {
                        return false;
                    }
                    tcode += instruction_length(code, tcode);
                }

                OpCode::Class | OpCode::NClass => {
                    for (byte, map) in bits.map.iter_mut().zip(&code[tcode + 1..tcode + 33]) {
                        *byte |= map;
                    }
                    if op == OpCode::NClass as u8 {
                        bits.high = true;
                    }
                    match skip_optional_class_repeat(code, tcode + instruction_length(code, tcode)) {
                        Some(next) => tcode = next,
                        None => try_next = false,
                    }
                }

                OpCode::XClass => {
                    if !add_xclass(code, tcode, bits) {
                        return false;
                    }
                    match skip_optional_class_repeat(code, tcode + instruction_length(code, tcode)) {
                        Some(next) => tcode = next,
                        None => try_next = false,
                    }
                }

                // Anything else (anchors, `.`, back-references, negated
                // characters, an empty remainder) can start anywhere.
                _ => return false,
            }
        }

        pos += get_link(code, pos + 1);
        if code[pos] != OpCode::Alt as u8 {
            return true;
        }
    }
}

/// Build and attach the start-character bitmap. Returns true when one was
/// attached.
pub fn js_regexp_study(re: &mut JsRegExp) -> bool {
    if re.options.intersects(
        RegExpOptions::ANCHORED | RegExpOptions::FIRST_BYTE | RegExpOptions::MULTILINE_FIRST_BYTE,
    ) {
        return false;
    }

    let mut bits = StartBits::new();
    if !set_start_bits(&re.code, 0, &mut bits, re.ignore_case()) {
        trace!("study: no start-character set");
        return false;
    }
    if bits.high && bits.count() == 256 {
        trace!("study: every unit can start a match");
        return false;
    }

    trace!("study: {} start units, high units {}", bits.count(), bits.high);
    re.start_bits = Some(Box::new(bits));
    true
}

#[cfg(test)]
mod tests {
    use crate::regcomp::js_regexp_compile;
    use crate::regint::StartBits;

    fn bits_with(s: &str, ic: bool) -> Option<StartBits> {
        let p: Vec<u16> = s.encode_utf16().collect();
        let (re, _) = js_regexp_compile(&p, ic.into(), false.into()).unwrap();
        re.start_bits.map(|b| *b)
    }

    fn bits(s: &str) -> Option<StartBits> {
        bits_with(s, false)
    }

    fn has(b: &StartBits, c: char) -> bool {
        b.contains(c as u16)
    }

    #[test]
    fn alternatives_union() {
        let b = bits("cat|dog|(?:e|f)x").unwrap();
        for c in ['c', 'd', 'e', 'f'] {
            assert!(has(&b, c), "{}", c);
        }
        assert!(!has(&b, 'x'));
        assert!(!b.high);
    }

    #[test]
    fn optional_prefix_continues() {
        let b = bits("a*b|c?d").unwrap();
        for c in ['a', 'b', 'c', 'd'] {
            assert!(has(&b, c), "{}", c);
        }
        let b = bits("(?:xy)?z|q").unwrap();
        assert!(has(&b, 'x') && has(&b, 'z') && has(&b, 'q'));
        assert!(!has(&b, 'y'));
    }

    #[test]
    fn types_and_classes() {
        let b = bits("\\d+|[a-c]").unwrap();
        assert!(has(&b, '0') && has(&b, '9') && has(&b, 'b'));
        assert!(!has(&b, 'd'));
        assert!(!b.high);

        let b = bits("\\s|x").unwrap();
        assert!(has(&b, ' ') && b.high);

        let b = bits("[^ab]b|c").unwrap();
        assert!(b.high);
        assert!(!has(&b, 'a'));
    }

    #[test]
    fn caseless_letters() {
        let b = bits_with("ab|cd", true).unwrap();
        assert!(has(&b, 'a') && has(&b, 'A') && has(&b, 'C'));
        let b = bits_with("\u{e9}|x", true).unwrap();
        assert!(b.contains(0xe9) && b.contains(0xc9));
    }

    #[test]
    fn wide_class_sets_high() {
        let b = bits("[a\u{3b1}-\u{3c9}]|z").unwrap();
        assert!(has(&b, 'a') && has(&b, 'z'));
        assert!(b.high);
    }

    #[test]
    fn unbounded_starts_give_up() {
        assert!(bits("x|.").is_none());
        assert!(bits("a|").is_none());
        assert!(bits("a*|b").is_none());
        assert!(bits("(a)|\\1").is_none());
        assert!(bits("[^\u{100}]|q").is_none());
        assert!(bits("a|$").is_none());
    }
}
