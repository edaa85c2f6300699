// regint.rs - Internal types shared by the compiler and the executor.
// OpCode set, link/count encoding, UTF-8 helpers for code points stored in
// the instruction buffer, and the compiled program type JsRegExp.

use std::fmt;

use crate::jsregexp::RegExpOptions;

// === Config Constants ===

/// Width in bytes of a link offset inside the instruction buffer.
pub const LINK_SIZE: usize = 2;
/// Largest instruction buffer the compiler will produce.
pub const MAX_PATTERN_SIZE: usize = 1 << 16;
/// Maximum depth of nested parentheses.
pub const BRASTACK_SIZE: usize = 200;
/// Capture numbers above this are carried in a separate BraNumber item.
pub const EXTRACT_BASIC_MAX: usize = 100;
/// The required-character scan only runs when fewer units than this remain.
pub const REQ_BYTE_MAX: usize = 1000;
/// Largest value accepted in a `{m,n}` quantifier.
pub const MAX_REPEAT_COUNT: i32 = 65535;

// === First/required character encoding ===
//
// The compiler tracks candidate first and required characters as an i32:
// the code point in the low bits, flags above it, or a negative sentinel.

pub const REQ_UNSET: i32 = -2;
pub const REQ_NONE: i32 = -1;
pub const REQ_IGNORE_CASE: i32 = 0x0020_0000;
pub const REQ_VARY: i32 = 0x0040_0000;
pub const REQ_CHAR_MASK: i32 = 0x001F_FFFF;

// === Extended class items ===

pub const XCL_NOT: u8 = 0x01;
pub const XCL_MAP: u8 = 0x02;

pub const XCL_END: u8 = 0;
pub const XCL_SINGLE: u8 = 1;
pub const XCL_RANGE: u8 = 2;

// === OpCode Enum ===

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    End = 0,

    // Character types. These must stay in this order: the compiler maps
    // escape tags onto them and the repeat forms carry them as operands.
    NotWordBoundary = 1,
    WordBoundary = 2,
    NotDigit = 3,
    Digit = 4,
    NotWhitespace = 5,
    Whitespace = 6,
    NotWordchar = 7,
    Wordchar = 8,
    AnyChar = 9,

    Circ = 10,
    Doll = 11,
    Char = 12,
    CharIgnoringCase = 13,
    AsciiChar = 14,
    AsciiLetterIgnoringCase = 15,
    Not = 16,

    // Repeated single character. The MIN* forms are lazy.
    Star = 17,
    MinStar = 18,
    Plus = 19,
    MinPlus = 20,
    Query = 21,
    MinQuery = 22,
    Upto = 23,
    MinUpto = 24,
    Exact = 25,

    // Repeated negated single ASCII character.
    NotStar = 26,
    NotMinStar = 27,
    NotPlus = 28,
    NotMinPlus = 29,
    NotQuery = 30,
    NotMinQuery = 31,
    NotUpto = 32,
    NotMinUpto = 33,
    NotExact = 34,

    // Repeated character type.
    TypeStar = 35,
    TypeMinStar = 36,
    TypePlus = 37,
    TypeMinPlus = 38,
    TypeQuery = 39,
    TypeMinQuery = 40,
    TypeUpto = 41,
    TypeMinUpto = 42,
    TypeExact = 43,

    // Repeats that follow a class or back-reference item.
    CrStar = 44,
    CrMinStar = 45,
    CrPlus = 46,
    CrMinPlus = 47,
    CrQuery = 48,
    CrMinQuery = 49,
    CrRange = 50,
    CrMinRange = 51,

    Class = 52,
    NClass = 53,
    XClass = 54,
    Ref = 55,

    Alt = 56,
    Ket = 57,
    KetRmax = 58,
    KetRmin = 59,
    Assert = 60,
    AssertNot = 61,
    BraZero = 62,
    BraMinZero = 63,
    BraNumber = 64,
    /// Non-capturing group. `Bra as u8 + n` opens capture group `n`.
    Bra = 65,
}

pub const OP_BRA: u8 = OpCode::Bra as u8;

/// Offset of each MIN*/UPTO/EXACT form from the STAR form of its family.
pub const REPEAT_NOT_OFFSET: u8 = OpCode::NotStar as u8 - OpCode::Star as u8;
pub const REPEAT_TYPE_OFFSET: u8 = OpCode::TypeStar as u8 - OpCode::Star as u8;

static OPCODE_TABLE: [OpCode; OP_BRA as usize + 1] = [
    OpCode::End,
    OpCode::NotWordBoundary,
    OpCode::WordBoundary,
    OpCode::NotDigit,
    OpCode::Digit,
    OpCode::NotWhitespace,
    OpCode::Whitespace,
    OpCode::NotWordchar,
    OpCode::Wordchar,
    OpCode::AnyChar,
    OpCode::Circ,
    OpCode::Doll,
    OpCode::Char,
    OpCode::CharIgnoringCase,
    OpCode::AsciiChar,
    OpCode::AsciiLetterIgnoringCase,
    OpCode::Not,
    OpCode::Star,
    OpCode::MinStar,
    OpCode::Plus,
    OpCode::MinPlus,
    OpCode::Query,
    OpCode::MinQuery,
    OpCode::Upto,
    OpCode::MinUpto,
    OpCode::Exact,
    OpCode::NotStar,
    OpCode::NotMinStar,
    OpCode::NotPlus,
    OpCode::NotMinPlus,
    OpCode::NotQuery,
    OpCode::NotMinQuery,
    OpCode::NotUpto,
    OpCode::NotMinUpto,
    OpCode::NotExact,
    OpCode::TypeStar,
    OpCode::TypeMinStar,
    OpCode::TypePlus,
    OpCode::TypeMinPlus,
    OpCode::TypeQuery,
    OpCode::TypeMinQuery,
    OpCode::TypeUpto,
    OpCode::TypeMinUpto,
    OpCode::TypeExact,
    OpCode::CrStar,
    OpCode::CrMinStar,
    OpCode::CrPlus,
    OpCode::CrMinPlus,
    OpCode::CrQuery,
    OpCode::CrMinQuery,
    OpCode::CrRange,
    OpCode::CrMinRange,
    OpCode::Class,
    OpCode::NClass,
    OpCode::XClass,
    OpCode::Ref,
    OpCode::Alt,
    OpCode::Ket,
    OpCode::KetRmax,
    OpCode::KetRmin,
    OpCode::Assert,
    OpCode::AssertNot,
    OpCode::BraZero,
    OpCode::BraMinZero,
    OpCode::BraNumber,
    OpCode::Bra,
];

impl OpCode {
    /// Decode an opcode byte. Every byte at or above `Bra` is a bracket.
    #[inline]
    pub fn from_u8(b: u8) -> OpCode {
        if b >= OP_BRA {
            OpCode::Bra
        } else {
            OPCODE_TABLE[b as usize]
        }
    }

    /// True for the character types that consume one character.
    #[inline]
    pub fn is_char_type(b: u8) -> bool {
        b > OpCode::WordBoundary as u8 && b <= OpCode::AnyChar as u8
    }

    /// Fixed length of the instruction, or the minimum length for the
    /// forms that carry a UTF-8 character or a link-sized total length.
    pub fn fixed_length(self) -> usize {
        use OpCode::*;
        match self {
            End | NotWordBoundary | WordBoundary | NotDigit | Digit | NotWhitespace
            | Whitespace | NotWordchar | Wordchar | AnyChar | Circ | Doll => 1,
            Char | CharIgnoringCase | AsciiChar | AsciiLetterIgnoringCase | Not => 2,
            Star | MinStar | Plus | MinPlus | Query | MinQuery => 2,
            Upto | MinUpto | Exact => 4,
            NotStar | NotMinStar | NotPlus | NotMinPlus | NotQuery | NotMinQuery => 2,
            NotUpto | NotMinUpto | NotExact => 4,
            TypeStar | TypeMinStar | TypePlus | TypeMinPlus | TypeQuery | TypeMinQuery => 2,
            TypeUpto | TypeMinUpto | TypeExact => 4,
            CrStar | CrMinStar | CrPlus | CrMinPlus | CrQuery | CrMinQuery => 1,
            CrRange | CrMinRange => 5,
            Class | NClass => 33,
            XClass => 1 + LINK_SIZE,
            Ref => 3,
            Alt | Ket | KetRmax | KetRmin | Assert | AssertNot | Bra => 1 + LINK_SIZE,
            BraZero | BraMinZero => 1,
            BraNumber => 3,
        }
    }
}

/// Full length of the instruction at `pos`, including a trailing UTF-8
/// character or, for an extended class, its whole body.
pub fn instruction_length(code: &[u8], pos: usize) -> usize {
    let op = OpCode::from_u8(code[pos]);
    match op {
        OpCode::Char
        | OpCode::CharIgnoringCase
        | OpCode::Star
        | OpCode::MinStar
        | OpCode::Plus
        | OpCode::MinPlus
        | OpCode::Query
        | OpCode::MinQuery => op.fixed_length() - 1 + get_utf8_char(code, pos + 1).1,
        OpCode::Upto | OpCode::MinUpto | OpCode::Exact => {
            op.fixed_length() - 1 + get_utf8_char(code, pos + 3).1
        }
        OpCode::XClass => get_link(code, pos + 1),
        _ => op.fixed_length(),
    }
}

// === Link and count encoding ===

#[inline]
pub fn get_link(code: &[u8], pos: usize) -> usize {
    ((code[pos] as usize) << 8) | code[pos + 1] as usize
}

#[inline]
pub fn put_link(code: &mut [u8], pos: usize, value: usize) {
    code[pos] = (value >> 8) as u8;
    code[pos + 1] = value as u8;
}

#[inline]
pub fn get2(code: &[u8], pos: usize) -> usize {
    ((code[pos] as usize) << 8) | code[pos + 1] as usize
}

#[inline]
pub fn put2(code: &mut [u8], pos: usize, value: usize) {
    code[pos] = (value >> 8) as u8;
    code[pos + 1] = value as u8;
}

#[inline]
pub fn push_link(code: &mut Vec<u8>, value: usize) {
    code.push((value >> 8) as u8);
    code.push(value as u8);
}

#[inline]
pub fn push2(code: &mut Vec<u8>, value: usize) {
    code.push((value >> 8) as u8);
    code.push(value as u8);
}

// === UTF-8 for code points in the instruction buffer ===

const UTF8_LIMITS: [u32; 6] = [0x7f, 0x7ff, 0xffff, 0x1f_ffff, 0x3ff_ffff, 0x7fff_ffff];
const UTF8_LEAD_BITS: [u8; 6] = [0x00, 0xc0, 0xe0, 0xf0, 0xf8, 0xfc];

/// Number of bytes `ord2utf8` writes for `c`.
#[inline]
pub fn utf8_length(c: u32) -> usize {
    UTF8_LIMITS.iter().position(|&limit| c <= limit).unwrap_or(5) + 1
}

/// Encode `c` into `buf`, returning the number of bytes used.
pub fn ord2utf8(c: u32, buf: &mut [u8; 6]) -> usize {
    let len = utf8_length(c);
    let mut cvalue = c;
    for j in (1..len).rev() {
        buf[j] = 0x80 | (cvalue & 0x3f) as u8;
        cvalue >>= 6;
    }
    buf[0] = UTF8_LEAD_BITS[len - 1] | cvalue as u8;
    len
}

/// Append the encoding of `c` to `code`.
#[inline]
pub fn push_utf8(code: &mut Vec<u8>, c: u32) -> usize {
    let mut buf = [0u8; 6];
    let len = ord2utf8(c, &mut buf);
    code.extend_from_slice(&buf[..len]);
    len
}

/// Decode the character starting at `pos`. Returns (code point, byte length).
#[inline]
pub fn get_utf8_char(code: &[u8], pos: usize) -> (u32, usize) {
    let lead = code[pos];
    if lead < 0xc0 {
        return (lead as u32, 1);
    }
    let extra = (lead.leading_ones() as usize - 1).min(5);
    let mut c = (lead as u32) & (0x3f >> extra);
    for i in 1..=extra {
        c = (c << 6) | (code[pos + i] & 0x3f) as u32;
    }
    (c, extra + 1)
}

// === UTF-16 helpers ===

#[inline]
pub fn is_leading_surrogate(c: u32) -> bool {
    (0xd800..=0xdbff).contains(&c)
}

#[inline]
pub fn is_trailing_surrogate(c: u32) -> bool {
    (0xdc00..=0xdfff).contains(&c)
}

#[inline]
pub fn create_surrogate_pair(lead: u32, trail: u32) -> u32 {
    0x10000 + ((lead - 0xd800) << 10) + (trail - 0xdc00)
}

/// Read one code point from `text` at `pos`, joining a surrogate pair.
/// Returns (code point, units consumed).
#[inline]
pub fn get_char(text: &[u16], pos: usize) -> (u32, usize) {
    let c = text[pos] as u32;
    if is_leading_surrogate(c) && pos + 1 < text.len() {
        let c2 = text[pos + 1] as u32;
        if is_trailing_surrogate(c2) {
            return (create_surrogate_pair(c, c2), 2);
        }
    }
    (c, 1)
}

/// Split a supplementary code point into its two UTF-16 units.
#[inline]
pub fn surrogate_units(c: u32) -> (u16, u16) {
    let v = c - 0x10000;
    ((0xd800 + (v >> 10)) as u16, (0xdc00 + (v & 0x3ff)) as u16)
}

// === Start-character bitmap ===

/// Possible first code units of a match, built by the study pass.
#[derive(Clone, PartialEq, Eq)]
pub struct StartBits {
    pub map: [u8; 32],
    /// Units above 255 may start a match.
    pub high: bool,
}

impl StartBits {
    pub fn new() -> Self {
        StartBits { map: [0; 32], high: false }
    }

    #[inline]
    pub fn set(&mut self, c: u32) {
        if c > 255 {
            self.high = true;
        } else {
            self.map[(c / 8) as usize] |= 1 << (c & 7);
        }
    }

    #[inline]
    pub fn contains(&self, unit: u16) -> bool {
        if unit > 255 {
            self.high
        } else {
            self.map[(unit / 8) as usize] & (1 << (unit & 7)) != 0
        }
    }

    pub fn count(&self) -> u32 {
        self.map.iter().map(|b| b.count_ones()).sum()
    }
}

impl Default for StartBits {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StartBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartBits")
            .field("count", &self.count())
            .field("high", &self.high)
            .finish()
    }
}

// === Compiled program ===

/// A compiled regular expression: header fields plus the instruction buffer.
///
/// Programs are immutable once `js_regexp_compile` returns them and may be
/// shared freely across threads.
#[derive(Clone)]
pub struct JsRegExp {
    pub options: RegExpOptions,
    /// Number of capturing groups.
    pub top_bracket: u16,
    /// Highest back-reference number used.
    pub top_backref: u16,
    /// First character hint (code point plus `REQ_IGNORE_CASE`), valid when
    /// `options` has `FIRST_BYTE`.
    pub first_byte: i32,
    /// Required character hint, valid when `options` has `REQ_BYTE`.
    pub req_byte: i32,
    pub start_bits: Option<Box<StartBits>>,
    pub code: Vec<u8>,
}

impl JsRegExp {
    /// Total size of the compiled program in bytes.
    pub fn size(&self) -> usize {
        std::mem::size_of::<JsRegExp>() + self.code.len()
    }

    pub fn capture_count(&self) -> usize {
        self.top_bracket as usize
    }

    pub fn is_anchored(&self) -> bool {
        self.options.contains(RegExpOptions::ANCHORED)
    }

    pub fn ignore_case(&self) -> bool {
        self.options.contains(RegExpOptions::IGNORE_CASE)
    }

    pub fn multiline(&self) -> bool {
        self.options.contains(RegExpOptions::MULTILINE)
    }

    /// The first-character hint, if one was derived.
    pub fn first_char(&self) -> Option<(u32, bool)> {
        if self.options.contains(RegExpOptions::FIRST_BYTE) {
            Some((
                (self.first_byte & REQ_CHAR_MASK) as u32,
                self.first_byte & REQ_IGNORE_CASE != 0,
            ))
        } else {
            None
        }
    }

    /// The required-character hint, if one was derived.
    pub fn required_char(&self) -> Option<(u32, bool)> {
        if self.options.contains(RegExpOptions::REQ_BYTE) {
            Some((
                (self.req_byte & REQ_CHAR_MASK) as u32,
                self.req_byte & REQ_IGNORE_CASE != 0,
            ))
        } else {
            None
        }
    }
}

impl fmt::Debug for JsRegExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsRegExp")
            .field("options", &self.options)
            .field("top_bracket", &self.top_bracket)
            .field("top_backref", &self.top_backref)
            .field("first_char", &self.first_char())
            .field("required_char", &self.required_char())
            .field("start_bits", &self.start_bits)
            .field("code_len", &self.code.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trip_through_bytes() {
        for b in 0..=OP_BRA {
            assert_eq!(OpCode::from_u8(b) as u8, b);
        }
        assert_eq!(OpCode::from_u8(OP_BRA + 7), OpCode::Bra);
        assert_eq!(OpCode::from_u8(255), OpCode::Bra);
    }

    #[test]
    fn char_types() {
        assert!(OpCode::is_char_type(OpCode::Digit as u8));
        assert!(OpCode::is_char_type(OpCode::AnyChar as u8));
        assert!(!OpCode::is_char_type(OpCode::WordBoundary as u8));
        assert!(!OpCode::is_char_type(OpCode::Circ as u8));
    }

    #[test]
    fn utf8_encoding() {
        let mut buf = [0u8; 6];
        assert_eq!(ord2utf8(0x41, &mut buf), 1);
        assert_eq!(buf[0], 0x41);
        assert_eq!(ord2utf8(0xe9, &mut buf), 2);
        assert_eq!(&buf[..2], &[0xc3, 0xa9]);
        assert_eq!(ord2utf8(0x20ac, &mut buf), 3);
        assert_eq!(&buf[..3], &[0xe2, 0x82, 0xac]);
        assert_eq!(ord2utf8(0x1f600, &mut buf), 4);
        assert_eq!(&buf[..4], "\u{1f600}".as_bytes());
    }

    #[test]
    fn utf8_decoding() {
        for &c in &[0x24u32, 0xe9, 0x3b1, 0x20ac, 0xffff, 0x10000, 0x1f600] {
            let mut code = Vec::new();
            let len = push_utf8(&mut code, c);
            assert_eq!(get_utf8_char(&code, 0), (c, len), "code point {:#x}", c);
        }
    }

    #[test]
    fn fixed_lengths() {
        assert_eq!(OpCode::WordBoundary.fixed_length(), 1);
        assert_eq!(OpCode::AsciiChar.fixed_length(), 2);
        assert_eq!(OpCode::TypeUpto.fixed_length(), 4);
        assert_eq!(OpCode::CrMinRange.fixed_length(), 5);
        assert_eq!(OpCode::Class.fixed_length(), 33);
        assert_eq!(OpCode::Ket.fixed_length(), 1 + LINK_SIZE);
        assert_eq!(OpCode::BraNumber.fixed_length(), 3);
    }

    #[test]
    fn instruction_lengths_walk_a_program() {
        let mut code = vec![OP_BRA, 0, 0];
        code.extend([OpCode::AsciiChar as u8, b'a']);
        code.push(OpCode::Star as u8);
        push_utf8(&mut code, 0xe9);
        code.push(OpCode::Upto as u8);
        push2(&mut code, 3);
        push_utf8(&mut code, 0x1f600);
        code.extend([OpCode::TypeExact as u8, 0, 2, OpCode::Digit as u8]);
        code.push(OpCode::Class as u8);
        code.extend([0u8; 32]);
        code.extend([OpCode::CrRange as u8, 0, 1, 0, 4]);
        let xclass = code.len();
        code.push(OpCode::XClass as u8);
        push_link(&mut code, 0);
        code.push(0);
        push_utf8(&mut code, 0x3b1);
        let len = code.len() - xclass;
        put_link(&mut code, xclass + 1, len);
        code.extend([OpCode::NotQuery as u8, b'x']);
        code.extend([OpCode::WordBoundary as u8, OpCode::Ket as u8, 0, 0, OpCode::End as u8]);

        let mut ops = Vec::new();
        let mut pos = 1 + LINK_SIZE;
        while code[pos] != OpCode::Ket as u8 {
            ops.push(OpCode::from_u8(code[pos]));
            pos += instruction_length(&code, pos);
        }
        assert_eq!(
            ops,
            vec![
                OpCode::AsciiChar,
                OpCode::Star,
                OpCode::Upto,
                OpCode::TypeExact,
                OpCode::Class,
                OpCode::CrRange,
                OpCode::XClass,
                OpCode::NotQuery,
                OpCode::WordBoundary,
            ]
        );
        assert_eq!(pos + 1 + LINK_SIZE, code.len() - 1);
        assert_eq!(instruction_length(&code, 5), 3, "two-byte character");
        assert_eq!(instruction_length(&code, 8), 7, "four-byte character");
    }

    #[test]
    fn link_encoding() {
        let mut code = vec![0u8; 4];
        put_link(&mut code, 1, 0x1234);
        assert_eq!(code, vec![0, 0x12, 0x34, 0]);
        assert_eq!(get_link(&code, 1), 0x1234);
    }

    #[test]
    fn surrogates() {
        let units: Vec<u16> = "a\u{1f600}".encode_utf16().collect();
        assert_eq!(get_char(&units, 0), (0x61, 1));
        assert_eq!(get_char(&units, 1), (0x1f600, 2));
        assert_eq!(surrogate_units(0x1f600), (units[1], units[2]));
        // A lone lead surrogate reads as itself.
        let lone = [0xd800u16];
        assert_eq!(get_char(&lone, 0), (0xd800, 1));
    }

    #[test]
    fn start_bits() {
        let mut bits = StartBits::new();
        bits.set(b'a' as u32);
        assert!(bits.contains(b'a' as u16));
        assert!(!bits.contains(b'b' as u16));
        assert!(!bits.contains(0x3b1));
        bits.set(0x3b1);
        assert!(bits.contains(0x4e00));
        assert_eq!(bits.count(), 1);
    }
}
