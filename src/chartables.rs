// chartables.rs - Static character tables.
//
// Built at compile time for the C locale: a lower-casing table, a
// case-flipping table, the \s \d \w class bitmaps and a ctype table.
// U+00A0 is added to the space set since JavaScript treats it as
// whitespace.

pub const CBIT_SPACE: usize = 0;
pub const CBIT_DIGIT: usize = 32;
pub const CBIT_WORD: usize = 64;
pub const CBIT_LENGTH: usize = 96;

pub const CTYPE_SPACE: u8 = 0x01;
pub const CTYPE_LETTER: u8 = 0x02;
pub const CTYPE_DIGIT: u8 = 0x04;
pub const CTYPE_XDIGIT: u8 = 0x08;
pub const CTYPE_WORD: u8 = 0x10;

const fn is_upper(c: usize) -> bool {
    c >= b'A' as usize && c <= b'Z' as usize
}

const fn is_lower(c: usize) -> bool {
    c >= b'a' as usize && c <= b'z' as usize
}

const fn is_digit(c: usize) -> bool {
    c >= b'0' as usize && c <= b'9' as usize
}

const fn is_space(c: usize) -> bool {
    (c >= 0x09 && c <= 0x0d) || c == 0x20 || c == 0xa0
}

const fn build_lcc() -> [u8; 256] {
    let mut t = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        t[i] = if is_upper(i) { (i + 32) as u8 } else { i as u8 };
        i += 1;
    }
    t
}

const fn build_fcc() -> [u8; 256] {
    let mut t = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        t[i] = if is_upper(i) {
            (i + 32) as u8
        } else if is_lower(i) {
            (i - 32) as u8
        } else {
            i as u8
        };
        i += 1;
    }
    t
}

const fn build_cbits() -> [u8; CBIT_LENGTH] {
    let mut t = [0u8; CBIT_LENGTH];
    let mut i = 0;
    while i < 256 {
        let bit = 1u8 << (i & 7);
        if is_digit(i) {
            t[CBIT_DIGIT + i / 8] |= bit;
        }
        if is_digit(i) || is_upper(i) || is_lower(i) || i == b'_' as usize {
            t[CBIT_WORD + i / 8] |= bit;
        }
        if is_space(i) {
            t[CBIT_SPACE + i / 8] |= bit;
        }
        i += 1;
    }
    t
}

const fn build_ctypes() -> [u8; 256] {
    let mut t = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut x = 0u8;
        if is_space(i) {
            x |= CTYPE_SPACE;
        }
        if is_upper(i) || is_lower(i) {
            x |= CTYPE_LETTER;
        }
        if is_digit(i) {
            x |= CTYPE_DIGIT;
        }
        if is_digit(i)
            || (i >= b'a' as usize && i <= b'f' as usize)
            || (i >= b'A' as usize && i <= b'F' as usize)
        {
            x |= CTYPE_XDIGIT;
        }
        if is_digit(i) || is_upper(i) || is_lower(i) || i == b'_' as usize {
            x |= CTYPE_WORD;
        }
        t[i] = x;
        i += 1;
    }
    t
}

pub static LCC: [u8; 256] = build_lcc();
pub static FCC: [u8; 256] = build_fcc();
pub static CBITS: [u8; CBIT_LENGTH] = build_cbits();
pub static CTYPES: [u8; 256] = build_ctypes();

// === Lookups ===

/// Lower-case an ASCII character; anything else is returned unchanged.
#[inline]
pub fn to_lower_case(c: u32) -> u32 {
    if c < 128 {
        LCC[c as usize] as u32
    } else {
        c
    }
}

/// Swap the case of an ASCII letter; anything else is returned unchanged.
#[inline]
pub fn flip_case(c: u32) -> u32 {
    if c < 128 {
        FCC[c as usize] as u32
    } else {
        c
    }
}

#[inline]
pub fn class_bitmap_for_char(offset: usize) -> u8 {
    CBITS[offset]
}

#[inline]
pub fn has_ctype(c: u32, ctype: u8) -> bool {
    c < 256 && CTYPES[c as usize] & ctype != 0
}

#[inline]
pub fn is_ascii_digit(c: u32) -> bool {
    has_ctype(c, CTYPE_DIGIT)
}

#[inline]
pub fn is_ascii_hex_digit(c: u32) -> bool {
    has_ctype(c, CTYPE_XDIGIT)
}

#[inline]
pub fn is_ascii_octal_digit(c: u32) -> bool {
    (b'0' as u32..=b'7' as u32).contains(&c)
}

#[inline]
pub fn hex_value(c: u32) -> u32 {
    if c <= b'9' as u32 {
        c - b'0' as u32
    } else {
        (c | 0x20) - b'a' as u32 + 10
    }
}

/// `\w`: ASCII letters, digits and underscore.
#[inline]
pub fn is_word_char(c: u32) -> bool {
    has_ctype(c, CTYPE_WORD)
}

/// `\s`: the ECMAScript WhiteSpace and LineTerminator sets.
#[inline]
pub fn is_space_char(c: u32) -> bool {
    match c {
        0x09..=0x0d | 0x20 | 0xa0 | 0x1680 | 0x180e => true,
        0x2000..=0x200a => true,
        0x2028 | 0x2029 | 0x202f | 0x205f | 0x3000 | 0xfeff => true,
        _ => false,
    }
}

/// Line terminators recognized by `.`, `^` and `$`.
#[inline]
pub fn is_newline(c: u32) -> bool {
    c == 0x0a || c == 0x0d || c == 0x2028 || c == 0x2029
}
