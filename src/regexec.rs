// regexec.rs - Backtracking executor and search entry point.
//
// The matcher walks the instruction buffer with an explicit stack of
// frames. Wherever a recursive matcher would call itself, a child frame is
// pushed and the parent records how to resume once the child reports
// success or failure. The number of live frames is capped by the recursion
// limit and the total number of pushes by the match limit.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use log::{debug, trace, warn};
use smallvec::SmallVec;

use crate::chartables::*;
use crate::jsregexp::*;
use crate::regint::*;
use crate::ucp::othercase;

// ============================================================================
// Global Limits
// ============================================================================

static RECURSION_LIMIT: AtomicU32 = AtomicU32::new(DEFAULT_RECURSION_LIMIT);
static MATCH_LIMIT: AtomicU64 = AtomicU64::new(DEFAULT_MATCH_LIMIT);

/// Maximum number of live backtracking frames.
pub fn js_regexp_set_recursion_limit(n: u32) { RECURSION_LIMIT.store(n, Ordering::Relaxed); }
pub fn js_regexp_get_recursion_limit() -> u32 { RECURSION_LIMIT.load(Ordering::Relaxed) }
/// Maximum number of frame pushes per execute call; 0 disables the check.
pub fn js_regexp_set_match_limit(n: u64) { MATCH_LIMIT.store(n, Ordering::Relaxed); }
pub fn js_regexp_get_match_limit() -> u64 { MATCH_LIMIT.load(Ordering::Relaxed) }

// ============================================================================
// Repeat decoding
// ============================================================================

const UNBOUNDED: u32 = u32::MAX;

// Indexed by the distance from the STAR opcode of a family.
const REPEAT_MIN: [u32; 6] = [0, 0, 1, 1, 0, 0];
const REPEAT_MAX: [u32; 6] = [UNBOUNDED, UNBOUNDED, UNBOUNDED, UNBOUNDED, 1, 1];

/// Decode a single-item repeat at `ip` whose family starts at `star`.
/// Returns (min, max, minimize, operand position).
fn repeat_counts(code: &[u8], ip: usize, star: u8) -> (u32, u32, bool, usize) {
    let c = code[ip] - star;
    match c {
        8 => {
            let n = get2(code, ip + 1) as u32;
            (n, n, false, ip + 3)
        }
        6 | 7 => (0, get2(code, ip + 1) as u32, c == 7, ip + 3),
        _ => (REPEAT_MIN[c as usize], REPEAT_MAX[c as usize], c & 1 == 1, ip + 1),
    }
}

/// Decode the repeat that may follow a class or back-reference ending at
/// `ip`. Returns (min, max, minimize, next position) when there is one.
fn class_repeat(code: &[u8], ip: usize) -> Option<(u32, u32, bool, usize)> {
    let op = code[ip];
    if op < OpCode::CrStar as u8 || op > OpCode::CrMinRange as u8 {
        return None;
    }
    let c = op - OpCode::CrStar as u8;
    if c >= 6 {
        let min = get2(code, ip + 1) as u32;
        let max = match get2(code, ip + 3) {
            0 => UNBOUNDED,
            n => n as u32,
        };
        return Some((min, max, op == OpCode::CrMinRange as u8, ip + 5));
    }
    Some((REPEAT_MIN[c as usize], REPEAT_MAX[c as usize], c & 1 == 1, ip + 1))
}

fn bracket_number(code: &[u8], ip: usize) -> usize {
    let number = (code[ip] - OP_BRA) as usize;
    if number > EXTRACT_BASIC_MAX {
        get2(code, ip + 2 + LINK_SIZE)
    } else {
        number
    }
}

/// Follow the alternatives of the bracket at `ip` to its KET.
fn skip_alternatives(code: &[u8], mut ip: usize) -> usize {
    loop {
        ip += get_link(code, ip + 1);
        if code[ip] != OpCode::Alt as u8 {
            return ip;
        }
    }
}

fn match_type(op: u8, c: u32) -> bool {
    match OpCode::from_u8(op) {
        OpCode::NotDigit => !is_ascii_digit(c),
        OpCode::Digit => is_ascii_digit(c),
        OpCode::NotWhitespace => !is_space_char(c),
        OpCode::Whitespace => is_space_char(c),
        OpCode::NotWordchar => !is_word_char(c),
        OpCode::Wordchar => is_word_char(c),
        OpCode::AnyChar => !is_newline(c),
        _ => false,
    }
}

/// Test `c` against an extended class; `data` starts at its flags byte.
fn xclass_matches(c: u32, data: &[u8]) -> bool {
    let flags = data[0];
    let negated = flags & XCL_NOT != 0;
    let mut p = 1;
    if flags & XCL_MAP != 0 {
        if c < 256 && data[1 + (c / 8) as usize] & (1 << (c & 7)) != 0 {
            return !negated;
        }
        p += 32;
    }
    loop {
        let kind = data[p];
        p += 1;
        match kind {
            XCL_SINGLE => {
                let (x, len) = get_utf8_char(data, p);
                p += len;
                if c == x {
                    return !negated;
                }
            }
            XCL_RANGE => {
                let (lo, len) = get_utf8_char(data, p);
                p += len;
                let (hi, len) = get_utf8_char(data, p);
                p += len;
                if lo <= c && c <= hi {
                    return !negated;
                }
            }
            _ => return negated,
        }
    }
}

// ============================================================================
// Frames
// ============================================================================

/// One repeatable item: what a repeat loop matches on each iteration.
#[derive(Clone, Copy, Debug)]
enum Item {
    /// A literal; `oc` is its other case when matching caselessly.
    Char { fc: u32, oc: Option<u32> },
    /// Anything but this ASCII character.
    Not(u32),
    /// A character type opcode.
    Type(u8),
    /// The class whose opcode is at this position.
    Class(usize),
    /// Text captured by a group.
    Ref { start: usize, len: usize },
}

/// What a frame does with the result of its child.
#[derive(Clone, Copy, Debug)]
enum Resume {
    Start,
    /// Trying the alternatives of a non-capturing bracket.
    BraAlt,
    /// Trying the alternatives of a capturing bracket; `save` holds the
    /// slots to restore when all of them fail.
    CaptureAlt { number: usize, save: [i32; 3] },
    AssertAlt,
    AssertNotAlt,
    /// Tried the optional bracket first.
    BraZero { bracket: usize },
    /// Tried skipping the optional bracket first.
    BraMinZero,
    /// Tried the continuation; the bracket comes next.
    KetRmin { bracket: usize },
    /// Tried the bracket again; the continuation comes next.
    KetRmax { next: usize },
    RepeatLazy { item: Item, next: usize, count: u32, max: u32 },
    RepeatGreedy { item: Item, next: usize, floor: usize, pos: usize },
}

struct Frame {
    ip: usize,
    sp: usize,
    offset_top: usize,
    /// Subject positions at which the enclosing groups were entered, used
    /// to stop unbounded group repeats that match the empty string.
    groups: SmallVec<[usize; 4]>,
    resume: Resume,
}

impl Frame {
    /// A frame for the alternative following the bracket or ALT at `ip`,
    /// entering a new group.
    fn alternative(&self) -> Frame {
        let mut groups = self.groups.clone();
        groups.push(self.sp);
        Frame {
            ip: self.ip + 1 + LINK_SIZE,
            sp: self.sp,
            offset_top: self.offset_top,
            groups,
            resume: Resume::Start,
        }
    }

    /// A frame that carries on at `ip` within the current group.
    fn continuation(&self, ip: usize, sp: usize) -> Frame {
        Frame {
            ip,
            sp,
            offset_top: self.offset_top,
            groups: self.groups.clone(),
            resume: Resume::Start,
        }
    }
}

enum Step {
    Call(Frame),
    Return(bool),
}

// ============================================================================
// Match state
// ============================================================================

struct MatchData<'a> {
    code: &'a [u8],
    subject: &'a [u16],
    /// Capture pairs in the first two thirds, group-start working slots in
    /// the last third.
    offsets: &'a mut [i32],
    offset_end: usize,
    offset_max: usize,
    offset_overflow: bool,
    end_match: usize,
    end_offset_top: usize,
    ignore_case: bool,
    multiline: bool,
    pushes: u64,
    recursion_limit: usize,
    match_limit: u64,
}

impl<'a> MatchData<'a> {
    fn match_char(&self, fc: u32, oc: Option<u32>, pos: usize) -> Option<usize> {
        let s = self.subject;
        if fc <= 0xffff {
            let u = *s.get(pos)? as u32;
            return (u == fc || oc == Some(u)).then_some(pos + 1);
        }
        let pair_at = |c: u32| {
            let (lead, trail) = surrogate_units(c);
            s.get(pos) == Some(&lead) && s.get(pos + 1) == Some(&trail)
        };
        (pair_at(fc) || oc.map_or(false, |o| o > 0xffff && pair_at(o))).then_some(pos + 2)
    }

    fn match_class(&self, ip: usize, c: u32) -> bool {
        let code = self.code;
        match OpCode::from_u8(code[ip]) {
            OpCode::XClass => xclass_matches(c, &code[ip + 1 + LINK_SIZE..]),
            op => {
                if c > 255 {
                    op == OpCode::NClass
                } else {
                    code[ip + 1 + (c / 8) as usize] & (1 << (c & 7)) != 0
                }
            }
        }
    }

    /// Does the captured text `start..start + len` occur at `pos`?
    fn match_ref(&self, start: usize, len: usize, pos: usize) -> bool {
        let s = self.subject;
        if len > s.len() - pos {
            return false;
        }
        let (a, b) = (&s[start..start + len], &s[pos..pos + len]);
        if !self.ignore_case {
            return a == b;
        }
        a.iter().zip(b).all(|(&x, &y)| {
            let (x, y) = (x as u32, y as u32);
            x == y
                || if x < 128 {
                    to_lower_case(x) == to_lower_case(y)
                } else {
                    othercase(x) == Some(y)
                }
        })
    }

    /// Match one `item` at `pos`, returning the position after it.
    fn match_item(&self, item: Item, pos: usize) -> Option<usize> {
        match item {
            Item::Char { fc, oc } => self.match_char(fc, oc, pos),
            Item::Ref { start, len } => self.match_ref(start, len, pos).then_some(pos + len),
            _ => {
                if pos >= self.subject.len() {
                    return None;
                }
                let (c, n) = get_char(self.subject, pos);
                let ok = match item {
                    Item::Not(nc) => {
                        if self.ignore_case && c < 128 {
                            to_lower_case(c) != to_lower_case(nc)
                        } else {
                            c != nc
                        }
                    }
                    Item::Type(op) => match_type(op, c),
                    Item::Class(ip) => self.match_class(ip, c),
                    _ => false,
                };
                ok.then_some(pos + n)
            }
        }
    }

    /// Give back one `item` from the end of a greedy run that began at
    /// `floor`.
    fn back_off(&self, item: Item, pos: usize, floor: usize) -> usize {
        match item {
            Item::Char { fc, .. } => pos - if fc > 0xffff { 2 } else { 1 },
            Item::Ref { len, .. } => pos - len,
            _ => {
                let s = self.subject;
                let p = pos - 1;
                if p > floor
                    && is_trailing_surrogate(s[p] as u32)
                    && is_leading_surrogate(s[p - 1] as u32)
                {
                    p - 1
                } else {
                    p
                }
            }
        }
    }

    /// Start and length of group `number`'s capture; an unset group reads
    /// as empty.
    fn backref(&self, number: usize, offset_top: usize) -> (usize, usize) {
        let offset = number << 1;
        if offset >= offset_top || self.offsets[offset] < 0 {
            return (0, 0);
        }
        let start = self.offsets[offset] as usize;
        (start, (self.offsets[offset + 1] - self.offsets[offset]) as usize)
    }

    /// Enter the bracket at `f.ip`, saving capture state for a numbered one.
    fn enter_bracket(&mut self, f: &mut Frame, op: u8) -> Step {
        if op > OP_BRA {
            let number = bracket_number(self.code, f.ip);
            let offset = number << 1;
            if offset < self.offset_max {
                let slot = self.offset_end - number;
                let save = [self.offsets[offset], self.offsets[offset + 1], self.offsets[slot]];
                self.offsets[slot] = f.sp as i32;
                f.resume = Resume::CaptureAlt { number, save };
                return Step::Call(f.alternative());
            }
        }
        f.resume = Resume::BraAlt;
        Step::Call(f.alternative())
    }

    /// Start the variable part of a repeat after `min` items have matched.
    fn repeat(&self, f: &mut Frame, item: Item, min: u32, max: u32, minimize: bool, next: usize) -> Step {
        if minimize {
            f.resume = Resume::RepeatLazy { item, next, count: min, max };
            return Step::Call(f.continuation(next, f.sp));
        }
        let floor = f.sp;
        let mut pos = f.sp;
        let mut count = min;
        while count < max {
            match self.match_item(item, pos) {
                Some(p) => pos = p,
                None => break,
            }
            count += 1;
        }
        f.resume = Resume::RepeatGreedy { item, next, floor, pos };
        Step::Call(f.continuation(next, pos))
    }
}

// ============================================================================
// Interpreter
// ============================================================================

macro_rules! fail {
    () => {
        return Ok(Step::Return(false))
    };
}

/// Run `f` until it needs a child frame or knows its result.
fn run(md: &mut MatchData, f: &mut Frame) -> Result<Step, i32> {
    let code = md.code;
    let subject = md.subject;
    let end = subject.len();

    loop {
        let op = *code.get(f.ip).ok_or(JSREGEXP_ERROR_INTERNAL)?;
        match OpCode::from_u8(op) {
            OpCode::Bra => return Ok(md.enter_bracket(f, op)),
            OpCode::BraNumber => f.ip += 3,

            OpCode::End => {
                md.end_match = f.sp;
                md.end_offset_top = f.offset_top;
                return Ok(Step::Return(true));
            }

            OpCode::Assert => {
                f.resume = Resume::AssertAlt;
                return Ok(Step::Call(f.alternative()));
            }
            OpCode::AssertNot => {
                f.resume = Resume::AssertNotAlt;
                return Ok(Step::Call(f.alternative()));
            }

            // The end of a matched alternative: go straight to the KET.
            OpCode::Alt => f.ip = skip_alternatives(code, f.ip),

            OpCode::BraZero => {
                let bracket = f.ip + 1;
                f.resume = Resume::BraZero { bracket };
                return Ok(Step::Call(f.continuation(bracket, f.sp)));
            }
            OpCode::BraMinZero => {
                let after = skip_alternatives(code, f.ip + 1) + 1 + LINK_SIZE;
                f.resume = Resume::BraMinZero;
                return Ok(Step::Call(f.continuation(after, f.sp)));
            }

            OpCode::Ket | OpCode::KetRmax | OpCode::KetRmin => {
                let bracket = f
                    .ip
                    .checked_sub(get_link(code, f.ip + 1))
                    .ok_or(JSREGEXP_ERROR_INTERNAL)?;
                let bop = code[bracket];
                if bop == OpCode::Assert as u8 || bop == OpCode::AssertNot as u8 {
                    md.end_match = f.sp;
                    md.end_offset_top = f.offset_top;
                    return Ok(Step::Return(true));
                }

                let group_start = f.groups.pop().ok_or(JSREGEXP_ERROR_INTERNAL)?;
                if bop > OP_BRA {
                    let number = bracket_number(code, bracket);
                    let offset = number << 1;
                    if offset >= md.offset_max {
                        md.offset_overflow = true;
                    } else {
                        md.offsets[offset] = md.offsets[md.offset_end - number];
                        md.offsets[offset + 1] = f.sp as i32;
                        if f.offset_top <= offset {
                            f.offset_top = offset + 2;
                        }
                    }
                }

                let next = f.ip + 1 + LINK_SIZE;
                // An iteration that consumed nothing ends the repeat.
                if op == OpCode::Ket as u8 || f.sp == group_start {
                    f.ip = next;
                    continue;
                }
                if op == OpCode::KetRmin as u8 {
                    f.resume = Resume::KetRmin { bracket };
                    return Ok(Step::Call(f.continuation(next, f.sp)));
                }
                f.resume = Resume::KetRmax { next };
                return Ok(Step::Call(f.continuation(bracket, f.sp)));
            }

            OpCode::Circ => {
                if f.sp != 0 && !(md.multiline && is_newline(subject[f.sp - 1] as u32)) {
                    fail!();
                }
                f.ip += 1;
            }
            OpCode::Doll => {
                if f.sp < end && !(md.multiline && is_newline(subject[f.sp] as u32)) {
                    fail!();
                }
                f.ip += 1;
            }

            OpCode::NotWordBoundary | OpCode::WordBoundary => {
                let before = f.sp > 0 && is_word_char(subject[f.sp - 1] as u32);
                let after = f.sp < end && is_word_char(subject[f.sp] as u32);
                if (before != after) != (op == OpCode::WordBoundary as u8) {
                    fail!();
                }
                f.ip += 1;
            }

            OpCode::NotDigit
            | OpCode::Digit
            | OpCode::NotWhitespace
            | OpCode::Whitespace
            | OpCode::NotWordchar
            | OpCode::Wordchar
            | OpCode::AnyChar => {
                if f.sp >= end {
                    fail!();
                }
                let (c, n) = get_char(subject, f.sp);
                if !match_type(op, c) {
                    fail!();
                }
                f.sp += n;
                f.ip += 1;
            }

            OpCode::Ref => {
                let (start, len) = md.backref(get2(code, f.ip + 1), f.offset_top);
                f.ip += 3;
                match class_repeat(code, f.ip) {
                    None => {
                        if !md.match_ref(start, len, f.sp) {
                            fail!();
                        }
                        f.sp += len;
                    }
                    Some((min, max, minimize, next)) => {
                        f.ip = next;
                        if len == 0 {
                            continue;
                        }
                        for _ in 0..min {
                            if !md.match_ref(start, len, f.sp) {
                                fail!();
                            }
                            f.sp += len;
                        }
                        if min == max {
                            continue;
                        }
                        return Ok(md.repeat(f, Item::Ref { start, len }, min, max, minimize, next));
                    }
                }
            }

            OpCode::Class | OpCode::NClass | OpCode::XClass => {
                let item = Item::Class(f.ip);
                let after = f.ip + instruction_length(code, f.ip);
                match class_repeat(code, after) {
                    None => {
                        match md.match_item(item, f.sp) {
                            Some(p) => f.sp = p,
                            None => fail!(),
                        }
                        f.ip = after;
                    }
                    Some((min, max, minimize, next)) => {
                        for _ in 0..min {
                            match md.match_item(item, f.sp) {
                                Some(p) => f.sp = p,
                                None => fail!(),
                            }
                        }
                        f.ip = next;
                        if min == max {
                            continue;
                        }
                        return Ok(md.repeat(f, item, min, max, minimize, next));
                    }
                }
            }

            OpCode::Char | OpCode::CharIgnoringCase => {
                let (fc, len) = get_utf8_char(code, f.ip + 1);
                let oc = if op == OpCode::CharIgnoringCase as u8 { othercase(fc) } else { None };
                match md.match_char(fc, oc, f.sp) {
                    Some(p) => f.sp = p,
                    None => fail!(),
                }
                f.ip += 1 + len;
            }
            OpCode::AsciiChar => {
                if f.sp >= end || subject[f.sp] != code[f.ip + 1] as u16 {
                    fail!();
                }
                f.sp += 1;
                f.ip += 2;
            }
            OpCode::AsciiLetterIgnoringCase => {
                if f.sp >= end {
                    fail!();
                }
                let u = subject[f.sp];
                if u >= 128 || (u | 0x20) != code[f.ip + 1] as u16 {
                    fail!();
                }
                f.sp += 1;
                f.ip += 2;
            }
            OpCode::Not => {
                match md.match_item(Item::Not(code[f.ip + 1] as u32), f.sp) {
                    Some(p) => f.sp = p,
                    None => fail!(),
                }
                f.ip += 2;
            }

            OpCode::Star
            | OpCode::MinStar
            | OpCode::Plus
            | OpCode::MinPlus
            | OpCode::Query
            | OpCode::MinQuery
            | OpCode::Upto
            | OpCode::MinUpto
            | OpCode::Exact => {
                let (min, max, minimize, at) = repeat_counts(code, f.ip, OpCode::Star as u8);
                let (fc, len) = get_utf8_char(code, at);
                let oc = if md.ignore_case { othercase(fc) } else { None };
                let width = if fc > 0xffff { 2 } else { 1 };
                if (min as usize).saturating_mul(width) > end - f.sp {
                    fail!();
                }
                let item = Item::Char { fc, oc };
                for _ in 0..min {
                    match md.match_item(item, f.sp) {
                        Some(p) => f.sp = p,
                        None => fail!(),
                    }
                }
                let next = at + len;
                f.ip = next;
                if min == max {
                    continue;
                }
                return Ok(md.repeat(f, item, min, max, minimize, next));
            }

            OpCode::NotStar
            | OpCode::NotMinStar
            | OpCode::NotPlus
            | OpCode::NotMinPlus
            | OpCode::NotQuery
            | OpCode::NotMinQuery
            | OpCode::NotUpto
            | OpCode::NotMinUpto
            | OpCode::NotExact
            | OpCode::TypeStar
            | OpCode::TypeMinStar
            | OpCode::TypePlus
            | OpCode::TypeMinPlus
            | OpCode::TypeQuery
            | OpCode::TypeMinQuery
            | OpCode::TypeUpto
            | OpCode::TypeMinUpto
            | OpCode::TypeExact => {
                let is_type = op >= OpCode::TypeStar as u8;
                let star = (if is_type { OpCode::TypeStar } else { OpCode::NotStar }) as u8;
                let (min, max, minimize, at) = repeat_counts(code, f.ip, star);
                if min as usize > end - f.sp {
                    fail!();
                }
                let item = if is_type {
                    Item::Type(code[at])
                } else {
                    Item::Not(code[at] as u32)
                };
                for _ in 0..min {
                    match md.match_item(item, f.sp) {
                        Some(p) => f.sp = p,
                        None => fail!(),
                    }
                }
                let next = at + 1;
                f.ip = next;
                if min == max {
                    continue;
                }
                return Ok(md.repeat(f, item, min, max, minimize, next));
            }

            // Class repeats are consumed together with their class.
            OpCode::CrStar
            | OpCode::CrMinStar
            | OpCode::CrPlus
            | OpCode::CrMinPlus
            | OpCode::CrQuery
            | OpCode::CrMinQuery
            | OpCode::CrRange
            | OpCode::CrMinRange => {
                debug!("stray class repeat opcode {} at {}", op, f.ip);
                return Err(JSREGEXP_ERROR_INTERNAL);
            }
        }
    }
}

/// Hand a child's result to `f` and carry on.
fn resume(md: &mut MatchData, f: &mut Frame, matched: bool) -> Result<Step, i32> {
    let code = md.code;
    match f.resume {
        Resume::Start => Err(JSREGEXP_ERROR_INTERNAL),

        Resume::BraAlt => {
            if matched {
                return Ok(Step::Return(true));
            }
            f.ip += get_link(code, f.ip + 1);
            if code[f.ip] == OpCode::Alt as u8 {
                return Ok(Step::Call(f.alternative()));
            }
            Ok(Step::Return(false))
        }

        Resume::CaptureAlt { number, save } => {
            if matched {
                return Ok(Step::Return(true));
            }
            f.ip += get_link(code, f.ip + 1);
            if code[f.ip] == OpCode::Alt as u8 {
                return Ok(Step::Call(f.alternative()));
            }
            let offset = number << 1;
            md.offsets[offset] = save[0];
            md.offsets[offset + 1] = save[1];
            md.offsets[md.offset_end - number] = save[2];
            Ok(Step::Return(false))
        }

        Resume::AssertAlt => {
            if matched {
                f.ip = skip_alternatives(code, f.ip) + 1 + LINK_SIZE;
                f.offset_top = md.end_offset_top;
                return run(md, f);
            }
            f.ip += get_link(code, f.ip + 1);
            if code[f.ip] == OpCode::Alt as u8 {
                return Ok(Step::Call(f.alternative()));
            }
            Ok(Step::Return(false))
        }

        Resume::AssertNotAlt => {
            if matched {
                return Ok(Step::Return(false));
            }
            f.ip += get_link(code, f.ip + 1);
            if code[f.ip] == OpCode::Alt as u8 {
                return Ok(Step::Call(f.alternative()));
            }
            f.ip += 1 + LINK_SIZE;
            run(md, f)
        }

        Resume::BraZero { bracket } => {
            if matched {
                return Ok(Step::Return(true));
            }
            f.ip = skip_alternatives(code, bracket) + 1 + LINK_SIZE;
            run(md, f)
        }

        Resume::BraMinZero => {
            if matched {
                return Ok(Step::Return(true));
            }
            f.ip += 1;
            run(md, f)
        }

        Resume::KetRmin { bracket } => {
            if matched {
                return Ok(Step::Return(true));
            }
            f.ip = bracket;
            run(md, f)
        }

        Resume::KetRmax { next } => {
            if matched {
                return Ok(Step::Return(true));
            }
            f.ip = next;
            run(md, f)
        }

        Resume::RepeatLazy { item, next, count, max } => {
            if matched {
                return Ok(Step::Return(true));
            }
            if count >= max {
                return Ok(Step::Return(false));
            }
            match md.match_item(item, f.sp) {
                Some(p) => f.sp = p,
                None => return Ok(Step::Return(false)),
            }
            f.resume = Resume::RepeatLazy { item, next, count: count + 1, max };
            Ok(Step::Call(f.continuation(next, f.sp)))
        }

        Resume::RepeatGreedy { item, next, floor, pos } => {
            if matched {
                return Ok(Step::Return(true));
            }
            if pos <= floor {
                return Ok(Step::Return(false));
            }
            let pos = md.back_off(item, pos, floor);
            f.resume = Resume::RepeatGreedy { item, next, floor, pos };
            Ok(Step::Call(f.continuation(next, pos)))
        }
    }
}

/// Try to match the whole program at `start`.
fn match_at(md: &mut MatchData, start: usize) -> Result<bool, i32> {
    let mut stack: SmallVec<[Frame; 16]> = SmallVec::new();
    stack.push(Frame {
        ip: 0,
        sp: start,
        offset_top: 2,
        groups: SmallVec::new(),
        resume: Resume::Start,
    });
    let mut result: Option<bool> = None;

    loop {
        let frame = stack.last_mut().ok_or(JSREGEXP_ERROR_INTERNAL)?;
        let step = match result.take() {
            Some(matched) => resume(md, frame, matched)?,
            None => run(md, frame)?,
        };
        match step {
            Step::Call(child) => {
                if stack.len() >= md.recursion_limit {
                    warn!("recursion limit {} reached at {}", md.recursion_limit, start);
                    return Err(JSREGEXP_ERROR_RECURSION_LIMIT);
                }
                md.pushes += 1;
                if md.match_limit != 0 && md.pushes > md.match_limit {
                    warn!("match limit {} reached at {}", md.match_limit, start);
                    return Err(JSREGEXP_ERROR_HITLIMIT);
                }
                stack.push(child);
            }
            Step::Return(matched) => {
                stack.pop();
                if stack.is_empty() {
                    return Ok(matched);
                }
                result = Some(matched);
            }
        }
    }
}

// ============================================================================
// Search
// ============================================================================

/// A successful search: match bounds plus the extent of the capture slots.
struct Found {
    start: usize,
    end: usize,
    end_offset_top: usize,
    overflow: bool,
}

/// Scan forward from `start_offset` for the leftmost match, using `vector`
/// (a multiple of three long) as working storage. `count` is the length
/// of the caller's vector.
fn search(
    re: &JsRegExp,
    subject: &[u16],
    start_offset: usize,
    vector: &mut [i32],
    count: usize,
) -> Result<Option<Found>, i32> {
    let ocount = vector.len();
    let end = subject.len();

    let mut resetcount = 2 + 2 * re.top_bracket as usize;
    if resetcount > count {
        resetcount = ocount;
    }
    let resetcount = resetcount.min(ocount);

    // Working slots are always written before they are read, but they are
    // saved and restored along the way.
    for slot in &mut vector[(2 * ocount) / 3..] {
        *slot = -1;
    }

    let first_char = re
        .first_char()
        .map(|(c, caseless)| (if caseless { to_lower_case(c) } else { c }, caseless));
    let req_char = re.required_char().map(|(c, caseless)| {
        let other = if caseless { flip_case(c) } else { c };
        (c, other)
    });
    let anchored = re.is_anchored();
    let multiline_first = re.options.contains(RegExpOptions::MULTILINE_FIRST_BYTE);

    let mut md = MatchData {
        code: &re.code,
        subject,
        offsets: vector,
        offset_end: ocount,
        offset_max: (2 * ocount) / 3,
        offset_overflow: false,
        end_match: 0,
        end_offset_top: 0,
        ignore_case: re.ignore_case(),
        multiline: re.multiline(),
        pushes: 0,
        recursion_limit: js_regexp_get_recursion_limit() as usize,
        match_limit: js_regexp_get_match_limit(),
    };

    let mut start = start_offset;
    let mut req_found: Option<usize> = None;

    loop {
        for slot in &mut md.offsets[..resetcount] {
            *slot = -1;
        }
        md.offset_overflow = false;

        if let Some((fc, caseless)) = first_char {
            if caseless {
                while start < end {
                    let u = subject[start] as u32;
                    if (if u > 127 { u } else { to_lower_case(u) }) == fc {
                        break;
                    }
                    start += 1;
                }
            } else {
                while start < end && subject[start] as u32 != fc {
                    start += 1;
                }
            }
        } else if multiline_first {
            if start > start_offset {
                while start < end && !is_newline(subject[start - 1] as u32) {
                    start += 1;
                }
            }
        } else if let Some(bits) = &re.start_bits {
            while start < end && !bits.contains(subject[start]) {
                start += 1;
            }
            if start >= end {
                break;
            }
        }

        // A required character must occur at or after the match start;
        // searching for it is skipped on very long subjects.
        if let Some((rc, rc2)) = req_char {
            if end - start < REQ_BYTE_MAX {
                let from = start + usize::from(first_char.is_some());
                if req_found.map_or(true, |at| from > at) {
                    match (from..end).find(|&p| {
                        let u = subject[p] as u32;
                        u == rc || u == rc2
                    }) {
                        Some(at) => req_found = Some(at),
                        None => {
                            trace!("required character {:#x} absent", rc);
                            break;
                        }
                    }
                }
            }
        }

        if match_at(&mut md, start)? {
            return Ok(Some(Found {
                start,
                end: md.end_match,
                end_offset_top: md.end_offset_top,
                overflow: md.offset_overflow,
            }));
        }

        if anchored {
            break;
        }
        start += 1;
        if start < end && is_trailing_surrogate(subject[start] as u32) {
            start += 1;
        }
        if start > end {
            break;
        }
    }
    Ok(None)
}

/// Search `subject` from `start_offset`.
///
/// `offsets` receives the match as start/end pairs: the whole match first,
/// then one pair per capturing group, with -1 for unset groups. Only the
/// first two thirds of the vector (rounded down to a multiple of three)
/// hold pairs; the rest is working storage. Returns the number of pairs
/// set, 0 when the vector was too small to hold them all, or a negative
/// `JSREGEXP_ERROR_*` code.
pub fn js_regexp_execute(re: &JsRegExp, subject: &[u16], start_offset: usize, offsets: &mut [i32]) -> i32 {
    if start_offset > subject.len() {
        return JSREGEXP_ERROR_NOMATCH;
    }

    let count = offsets.len();
    let ocount = count - count % 3;
    let top_backref = re.top_backref as usize;

    // Back-references need every referenced group recorded, so a vector
    // that is too short is replaced by a temporary one.
    let mut temporary = None;
    let found = if top_backref > 0 && top_backref >= ocount / 3 {
        let scratch = temporary.insert(vec![-1i32; top_backref * 3 + 3]);
        search(re, subject, start_offset, scratch, count)
    } else {
        search(re, subject, start_offset, &mut offsets[..ocount], count)
    };

    match found {
        Err(code) => {
            debug!("execute failed with {}", code);
            code
        }
        Ok(None) => JSREGEXP_ERROR_NOMATCH,
        Ok(Some(found)) => {
            let mut overflow = found.overflow;
            if let Some(scratch) = &temporary {
                if count >= 4 {
                    offsets[2..count].copy_from_slice(&scratch[2..count]);
                }
                if found.end_offset_top > count {
                    overflow = true;
                }
            }
            if count < 2 {
                return 0;
            }
            offsets[0] = found.start as i32;
            offsets[1] = found.end as i32;
            if overflow {
                0
            } else {
                (found.end_offset_top / 2) as i32
            }
        }
    }
}
