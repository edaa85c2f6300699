// reglength.rs - Compiler pass 1: size the instruction buffer.
//
// Walks the pattern once with the same tokenization as the emitter and adds
// a conservative byte estimate per item. Over-estimates are harmless; an
// under-estimate is caught after emission as a code overflow. Along the way
// it records the back-reference bookkeeping the emitter and the anchoring
// analysis need.

use crate::jsregexp::*;
use crate::regescape::{check_escape, is_counted_repeat, read_repeat_counts, Escape};
use crate::regint::*;
use crate::ucp::get_othercase_range;

/// State shared by both compiler passes.
#[derive(Clone, Debug, Default)]
pub struct CompileData {
    /// Highest back-reference number seen.
    pub top_backref: usize,
    /// Bit n set when `\n` appears (n < 32); bit 0 stands for all larger refs.
    pub backref_map: u32,
    /// `REQ_VARY` once a variable-length item has been passed.
    pub req_varyopt: i32,
}

/// Estimates are clamped here so huge repeat counts cannot overflow; anything
/// this large is rejected as too big by the caller anyway.
const LENGTH_CLAMP: i64 = 1 << 40;

#[inline]
fn utf8_extra(c: u32) -> i64 {
    utf8_length(c) as i64 - 1
}

#[inline]
fn is_unit(pattern: &[u16], p: usize, ch: u8) -> bool {
    p < pattern.len() && pattern[p] == ch as u16
}

/// Read the character at `*ptr`, joining a surrogate pair. `*ptr` is left
/// on the last unit consumed.
pub(crate) fn read_class_char(pattern: &[u16], ptr: &mut usize) -> u32 {
    let (c, len) = get_char(pattern, *ptr);
    *ptr += len - 1;
    c
}

/// Cost of an inline `{m,n}` after a class or back-reference: the CR*
/// opcodes need one byte, CRRANGE five.
#[inline]
fn cr_repeat_length(min: i32, max: i32) -> i64 {
    if (min == 0 && (max == 1 || max == -1)) || (min == 1 && max == -1) {
        1
    } else {
        5
    }
}

/// Compute the buffer size needed for `pattern`.
///
/// Fills in `cd.top_backref` and `cd.backref_map`. Syntax errors that the
/// tokenizer can see (bad escapes, unterminated classes, bad repeat counts,
/// unknown group syntax, nesting depth) are reported here.
pub fn calculate_compiled_pattern_length(
    pattern: &[u16],
    ignore_case: bool,
    cd: &mut CompileData,
) -> Result<usize, i32> {
    let end = pattern.len();
    let mut length: i64 = 1 + LINK_SIZE as i64;
    let mut lastitemlength: i64 = 0;
    let mut bracount: usize = 0;
    let mut brastack: Vec<i64> = Vec::with_capacity(16);

    let mut ptr = 0;
    while ptr < end {
        let c = pattern[ptr] as u32;
        match c {
            0x5c /* \ */ => {
                let esc = check_escape(pattern, &mut ptr, bracount, false)?;
                lastitemlength = 1;
                match esc {
                    Escape::Char(ch) => {
                        length += 2;
                        if ch > 127 {
                            length += utf8_extra(ch);
                            lastitemlength += utf8_extra(ch);
                        }
                    }
                    Escape::Type(_) => length += 1,
                    Escape::BackRef(refnum) => {
                        cd.backref_map |= if refnum < 32 { 1 << refnum } else { 1 };
                        cd.top_backref = cd.top_backref.max(refnum);
                        length += 1 + 2;
                        if is_unit(pattern, ptr + 1, b'{') && is_counted_repeat(pattern, ptr + 2) {
                            let (min, max, close) = read_repeat_counts(pattern, ptr + 2)?;
                            ptr = close;
                            length += cr_repeat_length(min, max);
                            if is_unit(pattern, ptr + 1, b'?') {
                                ptr += 1;
                            }
                        }
                    }
                }
            }

            0x5e /* ^ */ | 0x2e /* . */ | 0x24 /* $ */ => {
                length += 1;
                lastitemlength = 1;
            }

            0x2a /* * */ | 0x2b /* + */ | 0x3f /* ? */ => {
                length += 1;
                possessive(pattern, &mut ptr, &mut length);
            }

            0x7b /* { */ if is_counted_repeat(pattern, ptr + 1) => {
                let (min, max, close) = read_repeat_counts(pattern, ptr + 1)?;
                ptr = close;
                if (min == 0 && (max == 1 || max == -1)) || (min == 1 && max == -1) {
                    length += 1;
                } else {
                    if min != 1 {
                        length -= lastitemlength;
                        if min > 0 {
                            length += 3 + lastitemlength;
                        }
                    }
                    length += lastitemlength + if max > 0 { 3 } else { 1 };
                }
                if is_unit(pattern, ptr + 1, b'?') {
                    ptr += 1;
                }
                possessive(pattern, &mut ptr, &mut length);
                length = length.min(LENGTH_CLAMP);
            }

            0x7c /* | */ => length += 1 + LINK_SIZE as i64,

            0x5b /* [ */ => {
                let (class_length, single) = class_length(pattern, &mut ptr, bracount, ignore_case)?;
                length += class_length;
                match single {
                    Some(ch) => lastitemlength = utf8_length(ch) as i64,
                    None => {
                        if is_unit(pattern, ptr + 1, b'{') && is_counted_repeat(pattern, ptr + 2) {
                            let (min, max, close) = read_repeat_counts(pattern, ptr + 2)?;
                            ptr = close;
                            length += cr_repeat_length(min, max);
                            if is_unit(pattern, ptr + 1, b'+') {
                                ptr += 1;
                                length += 2 + 2 * LINK_SIZE as i64;
                            } else if is_unit(pattern, ptr + 1, b'?') {
                                ptr += 1;
                            }
                        }
                    }
                }
            }

            0x28 /* ( */ => {
                let mut bracket_length = 1 + LINK_SIZE as i64;
                if is_unit(pattern, ptr + 1, b'?') {
                    match pattern.get(ptr + 2).map(|&u| u as u32) {
                        Some(0x3a) | Some(0x3d) | Some(0x21) => ptr += 2,
                        _ => return Err(JSREGEXP_ERR_UNRECOGNIZED_GROUP),
                    }
                } else {
                    bracount += 1;
                    if bracount > EXTRACT_BASIC_MAX {
                        bracket_length += 3;
                    }
                }
                if brastack.len() >= BRASTACK_SIZE {
                    return Err(JSREGEXP_ERR_NESTED_TOO_DEEPLY);
                }
                brastack.push(length);
                length += bracket_length;
            }

            0x29 /* ) */ => {
                length += 1 + LINK_SIZE as i64;
                let duplength = match brastack.pop() {
                    Some(start) => length - start,
                    None => 0,
                };

                let (min, max): (i64, i64) = if is_unit(pattern, ptr + 1, b'{')
                    && is_counted_repeat(pattern, ptr + 2)
                {
                    let (min, max, close) = read_repeat_counts(pattern, ptr + 2)?;
                    ptr = close;
                    (min as i64, max as i64)
                } else if is_unit(pattern, ptr + 1, b'*') {
                    ptr += 1;
                    (0, -1)
                } else if is_unit(pattern, ptr + 1, b'+') {
                    ptr += 1;
                    (1, -1)
                } else if is_unit(pattern, ptr + 1, b'?') {
                    ptr += 1;
                    (0, 1)
                } else {
                    (1, 1)
                };

                let link = LINK_SIZE as i64;
                if min == 0 {
                    length += 1;
                    if max > 0 {
                        length += (max - 1) * (duplength + 3 + 2 * link);
                    }
                } else {
                    length += (min - 1) * duplength;
                    if max > min {
                        length += (max - min) * (duplength + 3 + 2 * link) - (2 + 2 * link);
                    }
                }
                possessive(pattern, &mut ptr, &mut length);
                length = length.min(LENGTH_CLAMP);
            }

            _ => {
                // Literal. Surrogates are sized one unit at a time, the way
                // the emitter writes them.
                length += 2;
                lastitemlength = 1;
                if c > 127 {
                    length += utf8_extra(c);
                    lastitemlength += utf8_extra(c);
                }
            }
        }
        ptr += 1;
    }

    length += 2 + LINK_SIZE as i64;
    Ok(length as usize)
}

/// A trailing `+` after a quantifier asks for a possessive repeat. The
/// emitter rejects it, but the estimate still allows for the wrapper.
#[inline]
fn possessive(pattern: &[u16], ptr: &mut usize, length: &mut i64) {
    if is_unit(pattern, *ptr + 1, b'+') {
        *ptr += 1;
        *length += 2 + 2 * LINK_SIZE as i64;
    }
}

/// Size a character class starting at the `[` under `*ptr`; leaves `*ptr`
/// on the closing `]`. Returns the estimate and, when the class holds exactly
/// one plain character, that character (it compiles to a literal).
fn class_length(
    pattern: &[u16],
    ptr: &mut usize,
    bracount: usize,
    ignore_case: bool,
) -> Result<(i64, Option<u32>), i32> {
    let end = pattern.len();
    let mut length: i64 = 0;
    let mut class_optcount: u32 = 0;
    let mut class_utf8 = false;
    let mut lastchar = 0;

    let mut p = *ptr + 1;
    if is_unit(pattern, p, b'^') {
        class_optcount = 10;
        p += 1;
    }

    while p < end && pattern[p] != b']' as u16 {
        let mut c = if pattern[p] == b'\\' as u16 {
            match check_escape(pattern, &mut p, bracount, true)? {
                Escape::Char(ch) => ch,
                Escape::Type(OpCode::WordBoundary) => 0x08,
                Escape::Type(_) | Escape::BackRef(_) => {
                    class_optcount = 10;
                    p += 1;
                    continue;
                }
            }
        } else {
            read_class_char(pattern, &mut p)
        };

        class_optcount += 1;
        lastchar = c;

        let mut d: Option<u32> = None;
        if is_unit(pattern, p + 1, b'-') {
            let hyptr = p;
            p += 1;
            if is_unit(pattern, p + 1, b'\\') {
                p += 1;
                d = match check_escape(pattern, &mut p, bracount, true)? {
                    Escape::Char(ch) => Some(ch),
                    Escape::Type(OpCode::WordBoundary) => Some(0x08),
                    _ => None,
                };
            } else if p + 1 < end && pattern[p + 1] != b']' as u16 {
                p += 1;
                d = Some(read_class_char(pattern, &mut p));
            }
            if d.is_none() {
                p = hyptr;
            }
        }

        if let Some(mut d) = d {
            class_optcount = 10;
            if d < c {
                return Err(JSREGEXP_ERR_RANGE_OUT_OF_ORDER);
            }
            if d > 255 || (ignore_case && d > 127) {
                if !class_utf8 {
                    class_utf8 = true;
                    length += LINK_SIZE as i64 + 2;
                }
                if ignore_case {
                    let mut cc = c;
                    let origd = d;
                    while let Some((occ, ocd)) = get_othercase_range(&mut cc, origd) {
                        if occ >= c && ocd <= d {
                            continue;
                        }
                        if occ < c && ocd + 1 >= c {
                            c = occ;
                            continue;
                        }
                        if ocd > d && occ <= d + 1 {
                            d = ocd;
                            continue;
                        }
                        length += 1 + utf8_length(occ) as i64;
                        if occ != ocd {
                            length += utf8_length(ocd) as i64;
                        }
                    }
                }
                length += 1 + utf8_length(c) as i64 + utf8_length(d) as i64;
            }
        } else if c > 255 || (ignore_case && c > 127) {
            class_optcount = 10;
            if !class_utf8 {
                class_utf8 = true;
                length += LINK_SIZE as i64 + 2;
            }
            let copies = if ignore_case { 2 } else { 1 };
            length += copies * (1 + utf8_length(c) as i64);
        }
        p += 1;
    }

    if p >= end {
        return Err(JSREGEXP_ERR_MISSING_CLASS_TERMINATOR);
    }
    *ptr = p;

    if class_optcount == 1 {
        Ok((length + 3, Some(lastchar)))
    } else {
        Ok((length + 33, None))
    }
}
