// regcomp.rs - Compiler pass 2: emit the instruction buffer.
//
// compile_regex() and compile_branch() walk the pattern a second time and
// write opcodes into a buffer sized by pass 1, tracking the first and
// required character of every branch on the way. The analysis helpers at
// the bottom derive anchoring and the first-character hints from the
// finished program.

use log::{debug, trace};

use crate::chartables::{class_bitmap_for_char, flip_case, CBIT_DIGIT, CBIT_SPACE, CBIT_WORD};
use crate::jsregexp::*;
use crate::regescape::{check_escape, is_counted_repeat, read_repeat_counts, Escape};
use crate::regint::*;
use crate::reglength::{calculate_compiled_pattern_length, read_class_char, CompileData};
use crate::regstudy::js_regexp_study;
use crate::ucp::{get_othercase_range, othercase};

// ============================================================================
// Branch state
// ============================================================================

/// First/required character bookkeeping for the branch being compiled.
///
/// The `zero*` copies hold the values in force before the last item, so a
/// repeat with a minimum of zero can drop that item's contribution.
struct BranchState {
    firstbyte: i32,
    reqbyte: i32,
    zerofirstbyte: i32,
    zeroreqbyte: i32,
    /// Start of the last repeatable item.
    previous: Option<usize>,
    /// The first character came from a group; a repeat may reuse it as the
    /// required character.
    groupsetfirstbyte: bool,
    req_caseopt: i32,
}

impl BranchState {
    fn new(ignore_case: bool) -> Self {
        BranchState {
            firstbyte: REQ_UNSET,
            reqbyte: REQ_UNSET,
            zerofirstbyte: REQ_UNSET,
            zeroreqbyte: REQ_UNSET,
            previous: None,
            groupsetfirstbyte: false,
            req_caseopt: if ignore_case { REQ_IGNORE_CASE } else { 0 },
        }
    }

    #[inline]
    fn no_first_char(&mut self) {
        if self.firstbyte == REQ_UNSET {
            self.firstbyte = REQ_NONE;
        }
    }

    #[inline]
    fn save_zero(&mut self) {
        self.zerofirstbyte = self.firstbyte;
        self.zeroreqbyte = self.reqbyte;
    }
}

#[inline]
fn set_bit(bits: &mut [u8; 32], c: u32) {
    bits[(c / 8) as usize] |= 1 << (c & 7);
}

// ============================================================================
// Emitter
// ============================================================================

struct Compiler<'a> {
    pattern: &'a [u16],
    ptr: usize,
    code: Vec<u8>,
    ignore_case: bool,
    multiline: bool,
    /// Capture groups opened so far.
    brackets: usize,
    cd: CompileData,
}

impl<'a> Compiler<'a> {
    #[inline]
    fn at(&self, p: usize, ch: u8) -> bool {
        p < self.pattern.len() && self.pattern[p] == ch as u16
    }

    /// Compile a `|`-separated list of branches. The bracket opcode has
    /// already been written; this fills in its link, the branch links and
    /// the closing KET. Leaves `ptr` on the `)` or at the end of input.
    fn compile_regex(&mut self, bra_number: Option<usize>) -> Result<(i32, i32), i32> {
        let start_bracket = self.code.len() - 1;
        let mut last_branch = start_bracket;
        push_link(&mut self.code, 0);
        if let Some(n) = bra_number {
            self.code.push(OpCode::BraNumber as u8);
            push2(&mut self.code, n);
        }

        let mut firstbyte = REQ_UNSET;
        let mut reqbyte = REQ_UNSET;

        loop {
            let (branchfirstbyte, mut branchreqbyte) = self.compile_branch()?;

            if self.code[last_branch] != OpCode::Alt as u8 {
                firstbyte = branchfirstbyte;
                reqbyte = branchreqbyte;
            } else {
                // Branches that disagree on the first character lose it; it
                // may still survive as a required character.
                if firstbyte >= 0 && firstbyte != branchfirstbyte {
                    if reqbyte < 0 {
                        reqbyte = firstbyte;
                    }
                    firstbyte = REQ_NONE;
                }
                if firstbyte < 0 && branchfirstbyte >= 0 && branchreqbyte < 0 {
                    branchreqbyte = branchfirstbyte;
                }
                if (reqbyte & !REQ_VARY) != (branchreqbyte & !REQ_VARY) {
                    reqbyte = REQ_NONE;
                } else {
                    reqbyte |= branchreqbyte;
                }
            }

            if !self.at(self.ptr, b'|') {
                // Each branch link was written as the distance back to the
                // previous branch; turn the chain into forward links.
                let mut length = self.code.len() - last_branch;
                loop {
                    let prev_length = get_link(&self.code, last_branch + 1);
                    put_link(&mut self.code, last_branch + 1, length);
                    length = prev_length;
                    if length == 0 {
                        break;
                    }
                    last_branch -= length;
                }

                let ket = self.code.len();
                self.code.push(OpCode::Ket as u8);
                push_link(&mut self.code, ket - start_bracket);
                return Ok((firstbyte, reqbyte));
            }

            let alt = self.code.len();
            self.code.push(OpCode::Alt as u8);
            push_link(&mut self.code, alt - last_branch);
            last_branch = alt;
            self.ptr += 1;
        }
    }

    /// Compile one branch up to `|`, `)` or the end of the pattern.
    fn compile_branch(&mut self) -> Result<(i32, i32), i32> {
        let mut st = BranchState::new(self.ignore_case);

        while self.ptr < self.pattern.len() {
            let c = self.pattern[self.ptr] as u32;
            match c {
                0x7c /* | */ | 0x29 /* ) */ => break,

                0x5e /* ^ */ => {
                    if self.multiline {
                        st.no_first_char();
                    }
                    st.previous = None;
                    self.code.push(OpCode::Circ as u8);
                }

                0x24 /* $ */ => {
                    st.previous = None;
                    self.code.push(OpCode::Doll as u8);
                }

                0x2e /* . */ => {
                    st.no_first_char();
                    st.save_zero();
                    st.previous = Some(self.code.len());
                    self.code.push(OpCode::AnyChar as u8);
                }

                0x5b /* [ */ => self.compile_class(&mut st)?,

                0x7b /* { */ if is_counted_repeat(self.pattern, self.ptr + 1) => {
                    let (min, max, close) = read_repeat_counts(self.pattern, self.ptr + 1)?;
                    self.ptr = close;
                    self.compile_repeat(&mut st, min, max)?;
                }
                0x2a /* * */ => self.compile_repeat(&mut st, 0, -1)?,
                0x2b /* + */ => self.compile_repeat(&mut st, 1, -1)?,
                0x3f /* ? */ => self.compile_repeat(&mut st, 0, 1)?,

                0x28 /* ( */ => self.compile_group(&mut st)?,

                0x5c /* \ */ => self.compile_escape(&mut st)?,

                // Each UTF-16 unit is its own literal, surrogates included.
                _ => self.compile_literal(&mut st, c),
            }
            self.ptr += 1;
        }

        Ok((st.firstbyte, st.reqbyte))
    }

    fn compile_literal(&mut self, st: &mut BranchState, c: u32) {
        st.previous = Some(self.code.len());

        let single_byte = c < 128;
        if single_byte {
            let folded = c | 0x20;
            if self.ignore_case && (b'a' as u32..=b'z' as u32).contains(&folded) {
                self.code.push(OpCode::AsciiLetterIgnoringCase as u8);
                self.code.push(folded as u8);
            } else {
                self.code.push(OpCode::AsciiChar as u8);
                self.code.push(c as u8);
            }
        } else {
            let op = if self.ignore_case { OpCode::CharIgnoringCase } else { OpCode::Char };
            self.code.push(op as u8);
            push_utf8(&mut self.code, c);
        }

        let usable = single_byte || st.req_caseopt == 0;
        if st.firstbyte == REQ_UNSET {
            st.zerofirstbyte = REQ_NONE;
            st.zeroreqbyte = st.reqbyte;
            if usable {
                st.firstbyte = c as i32 | st.req_caseopt;
                if !single_byte {
                    st.reqbyte = c as i32 | self.cd.req_varyopt;
                }
            } else {
                st.firstbyte = REQ_NONE;
                st.reqbyte = REQ_NONE;
            }
        } else {
            st.save_zero();
            if usable {
                st.reqbyte = c as i32 | st.req_caseopt | self.cd.req_varyopt;
            }
        }
    }

    fn compile_escape(&mut self, st: &mut BranchState) -> Result<(), i32> {
        match check_escape(self.pattern, &mut self.ptr, self.brackets, false)? {
            Escape::Char(c) => self.compile_literal(st, c),
            Escape::BackRef(n) => {
                st.no_first_char();
                st.save_zero();
                st.previous = Some(self.code.len());
                self.code.push(OpCode::Ref as u8);
                push2(&mut self.code, n);
            }
            esc @ Escape::Type(op) => {
                if esc.consumes_char() {
                    st.no_first_char();
                    st.previous = Some(self.code.len());
                } else {
                    st.previous = None;
                }
                st.save_zero();
                self.code.push(op as u8);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Character classes
    // ------------------------------------------------------------------------

    fn compile_class(&mut self, st: &mut BranchState) -> Result<(), i32> {
        let pattern = self.pattern;
        let end = pattern.len();
        let ic = self.ignore_case;
        let previous = self.code.len();
        st.previous = Some(previous);

        let mut p = self.ptr;
        let negate = self.at(p + 1, b'^');
        if negate {
            p += 1;
        }

        let mut classbits = [0u8; 32];
        let mut xitems: Vec<u8> = Vec::new();
        let mut class_charcount = 0;
        let mut class_lastchar = 0u32;
        let mut class_utf8 = false;
        let mut should_flip_negation = false;

        loop {
            p += 1;
            if p >= end {
                return Err(JSREGEXP_ERR_MISSING_CLASS_TERMINATOR);
            }
            if pattern[p] == b']' as u16 {
                break;
            }

            let c = if pattern[p] == b'\\' as u16 {
                match check_escape(pattern, &mut p, self.brackets, true)? {
                    Escape::Char(ch) => ch,
                    Escape::Type(OpCode::WordBoundary) => 0x08,
                    Escape::Type(op) => {
                        let (offset, inverted) = match op {
                            OpCode::Digit => (CBIT_DIGIT, false),
                            OpCode::NotDigit => (CBIT_DIGIT, true),
                            OpCode::Wordchar => (CBIT_WORD, false),
                            OpCode::NotWordchar => (CBIT_WORD, true),
                            OpCode::Whitespace => (CBIT_SPACE, false),
                            OpCode::NotWhitespace => (CBIT_SPACE, true),
                            // \B has no class meaning: take the letter.
                            _ => (usize::MAX, false),
                        };
                        if offset == usize::MAX {
                            pattern[p] as u32
                        } else {
                            for (i, byte) in classbits.iter_mut().enumerate() {
                                let bits = class_bitmap_for_char(offset + i);
                                *byte |= if inverted { !bits } else { bits };
                            }
                            if inverted {
                                should_flip_negation = true;
                            }
                            class_charcount += 2;
                            continue;
                        }
                    }
                    Escape::BackRef(_) => pattern[p] as u32,
                }
            } else {
                read_class_char(pattern, &mut p)
            };

            // A range, unless the hyphen is last or the far end is a class
            // escape; then the hyphen is a literal.
            if self.at(p + 1, b'-') && p + 2 < end && pattern[p + 2] != b']' as u16 {
                let mut q = p + 2;
                let d = if pattern[q] == b'\\' as u16 {
                    match check_escape(pattern, &mut q, self.brackets, true)? {
                        Escape::Char(ch) => Some(ch),
                        Escape::Type(OpCode::WordBoundary) => Some(0x08),
                        _ => None,
                    }
                } else {
                    Some(read_class_char(pattern, &mut q))
                };

                if let Some(d) = d {
                    p = q;
                    if d != c {
                        self.class_range(
                            c,
                            d,
                            &mut classbits,
                            &mut xitems,
                            &mut class_utf8,
                            &mut class_charcount,
                            &mut class_lastchar,
                        );
                        continue;
                    }
                }
            }

            // Lone character.
            if c > 255 || (ic && c > 127) {
                class_utf8 = true;
                xitems.push(XCL_SINGLE);
                push_utf8(&mut xitems, c);
                if ic {
                    if let Some(oc) = othercase(c) {
                        xitems.push(XCL_SINGLE);
                        push_utf8(&mut xitems, oc);
                    }
                }
            } else {
                set_bit(&mut classbits, c);
                let mut last = c;
                if ic {
                    last = flip_case(c);
                    set_bit(&mut classbits, last);
                }
                class_charcount += 1;
                class_lastchar = last;
            }
        }
        self.ptr = p;

        // A class holding one character compiles like that character, or
        // as NOT when negated.
        if class_charcount == 1 && !class_utf8 && (!negate || class_lastchar < 128) {
            st.zeroreqbyte = st.reqbyte;
            if negate {
                st.no_first_char();
                st.zerofirstbyte = st.firstbyte;
                self.code.push(OpCode::Not as u8);
                self.code.push(class_lastchar as u8);
                return Ok(());
            }
            self.compile_literal(st, class_lastchar);
            return Ok(());
        }

        st.no_first_char();
        st.save_zero();

        if class_utf8 && !should_flip_negation {
            self.code.push(OpCode::XClass as u8);
            push_link(&mut self.code, 0);
            let mut flags = 0;
            if negate {
                flags |= XCL_NOT;
            }
            if class_charcount > 0 {
                flags |= XCL_MAP;
            }
            self.code.push(flags);
            if class_charcount > 0 {
                self.code.extend_from_slice(&classbits);
            }
            self.code.extend_from_slice(&xitems);
            self.code.push(XCL_END);
            let total = self.code.len() - previous;
            put_link(&mut self.code, previous + 1, total);
            return Ok(());
        }

        let op = if negate == should_flip_negation { OpCode::Class } else { OpCode::NClass };
        self.code.push(op as u8);
        if negate {
            self.code.extend(classbits.iter().map(|b| !b));
        } else {
            self.code.extend_from_slice(&classbits);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn class_range(
        &mut self,
        mut c: u32,
        mut d: u32,
        classbits: &mut [u8; 32],
        xitems: &mut Vec<u8>,
        class_utf8: &mut bool,
        class_charcount: &mut usize,
        class_lastchar: &mut u32,
    ) {
        let ic = self.ignore_case;
        if d > 255 || (ic && d > 127) {
            *class_utf8 = true;
            if ic {
                // Partner ranges inside the range are already covered;
                // adjacent ones widen it; the rest become extra items.
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
                    if occ == ocd {
                        xitems.push(XCL_SINGLE);
                    } else {
                        xitems.push(XCL_RANGE);
                        push_utf8(xitems, occ);
                    }
                    push_utf8(xitems, ocd);
                }
            }
            xitems.push(XCL_RANGE);
            push_utf8(xitems, c);
            push_utf8(xitems, d);
            return;
        }

        for ch in c..=d {
            set_bit(classbits, ch);
            if ic {
                set_bit(classbits, flip_case(ch));
            }
            *class_charcount += 1;
            *class_lastchar = ch;
        }
    }

    // ------------------------------------------------------------------------
    // Repeats
    // ------------------------------------------------------------------------

    /// Apply a quantifier to the previous item. `ptr` is on the last unit of
    /// the quantifier.
    fn compile_repeat(&mut self, st: &mut BranchState, repeat_min: i32, repeat_max: i32) -> Result<(), i32> {
        let previous = st.previous.ok_or(JSREGEXP_ERR_NOTHING_TO_REPEAT)?;

        if repeat_min == 0 {
            st.firstbyte = st.zerofirstbyte;
            st.reqbyte = st.zeroreqbyte;
        }
        let reqvary = if repeat_min == repeat_max { 0 } else { REQ_VARY };

        let repeat_type = if self.at(self.ptr + 1, b'?') {
            self.ptr += 1;
            1
        } else {
            0
        };

        let op = self.code[previous];
        match OpCode::from_u8(op) {
            OpCode::Char | OpCode::CharIgnoringCase => {
                let operand = self.code[previous + 1..].to_vec();
                self.single_repeat(previous, 0, &operand, repeat_min, repeat_max, repeat_type);
            }
            OpCode::AsciiChar | OpCode::AsciiLetterIgnoringCase => {
                let c = self.code[previous + 1];
                if repeat_min > 1 {
                    st.reqbyte = c as i32 | st.req_caseopt | self.cd.req_varyopt;
                }
                self.single_repeat(previous, 0, &[c], repeat_min, repeat_max, repeat_type);
            }
            OpCode::Not => {
                let c = self.code[previous + 1];
                self.single_repeat(previous, REPEAT_NOT_OFFSET, &[c], repeat_min, repeat_max, repeat_type);
            }
            _ if OpCode::is_char_type(op) => {
                self.single_repeat(previous, REPEAT_TYPE_OFFSET, &[op], repeat_min, repeat_max, repeat_type);
            }
            OpCode::Class | OpCode::NClass | OpCode::XClass | OpCode::Ref => {
                if repeat_max == 0 {
                    self.code.truncate(previous);
                } else {
                    self.push_class_repeat(repeat_min, repeat_max, repeat_type);
                }
            }
            OpCode::Bra => self.repeat_group(st, previous, repeat_min, repeat_max, repeat_type),
            _ => return Err(JSREGEXP_ERR_UNEXPECTED_REPEAT),
        }

        st.previous = None;
        self.cd.req_varyopt |= reqvary;
        Ok(())
    }

    /// Rewrite a one-character item as a repeat opcode. The character (or
    /// type) always follows the last opcode written.
    fn single_repeat(
        &mut self,
        previous: usize,
        op_type: u8,
        operand: &[u8],
        repeat_min: i32,
        repeat_max: i32,
        repeat_type: u8,
    ) {
        let item = self.code.split_off(previous);
        if repeat_max == 0 {
            return;
        }
        let rt = repeat_type + op_type;
        let code = &mut self.code;

        if repeat_min == 0 {
            match repeat_max {
                -1 => code.push(OpCode::Star as u8 + rt),
                1 => code.push(OpCode::Query as u8 + rt),
                _ => {
                    code.push(OpCode::Upto as u8 + rt);
                    push2(code, repeat_max as usize);
                }
            }
        } else if repeat_min == 1 {
            if repeat_max == -1 {
                code.push(OpCode::Plus as u8 + rt);
            } else {
                code.extend_from_slice(&item);
                if repeat_max == 1 {
                    return;
                }
                code.push(OpCode::Upto as u8 + rt);
                push2(code, (repeat_max - 1) as usize);
            }
        } else {
            code.push(OpCode::Exact as u8 + op_type);
            push2(code, repeat_min as usize);
            if repeat_max < 0 {
                code.extend_from_slice(operand);
                code.push(OpCode::Star as u8 + rt);
            } else if repeat_max != repeat_min {
                code.extend_from_slice(operand);
                code.push(OpCode::Upto as u8 + rt);
                push2(code, (repeat_max - repeat_min) as usize);
            }
        }
        code.extend_from_slice(operand);
    }

    fn push_class_repeat(&mut self, repeat_min: i32, repeat_max: i32, repeat_type: u8) {
        let code = &mut self.code;
        match (repeat_min, repeat_max) {
            (0, -1) => code.push(OpCode::CrStar as u8 + repeat_type),
            (1, -1) => code.push(OpCode::CrPlus as u8 + repeat_type),
            (0, 1) => code.push(OpCode::CrQuery as u8 + repeat_type),
            _ => {
                code.push(OpCode::CrRange as u8 + repeat_type);
                push2(code, repeat_min as usize);
                push2(code, if repeat_max == -1 { 0 } else { repeat_max as usize });
            }
        }
    }

    /// Repeat a bracketed group by replication: `min` copies, then optional
    /// copies nested inside BRAZERO brackets, or a KETRMAX loop when the
    /// maximum is unbounded.
    fn repeat_group(
        &mut self,
        st: &mut BranchState,
        mut previous: usize,
        repeat_min: i32,
        mut repeat_max: i32,
        repeat_type: u8,
    ) {
        let len = self.code.len() - previous;
        let mut bralink: Option<usize> = None;

        let mut ketoffset = 0;
        if repeat_max == -1 {
            let mut ket = previous;
            loop {
                ket += get_link(&self.code, ket + 1);
                if self.code[ket] == OpCode::Ket as u8 {
                    break;
                }
            }
            ketoffset = self.code.len() - ket;
        }

        if repeat_min == 0 {
            if repeat_max == 0 {
                self.code.truncate(previous);
                return;
            }
            if repeat_max <= 1 {
                self.code.insert(previous, OpCode::BraZero as u8 + repeat_type);
                previous += 1;
            } else {
                let head = [OpCode::BraZero as u8 + repeat_type, OP_BRA, 0, 0];
                self.code.splice(previous..previous, head);
                bralink = Some(previous + 2);
                previous += 2 + LINK_SIZE;
            }
            repeat_max -= 1;
        } else {
            if repeat_min > 1 {
                if st.groupsetfirstbyte && st.reqbyte < 0 {
                    st.reqbyte = st.firstbyte;
                }
                for _ in 1..repeat_min {
                    self.code.extend_from_within(previous..previous + len);
                }
            }
            if repeat_max > 0 {
                repeat_max -= repeat_min;
            }
        }

        if repeat_max < 0 {
            let ket = self.code.len() - ketoffset;
            self.code[ket] = OpCode::KetRmax as u8 + repeat_type;
            return;
        }

        // Each optional copy nests inside the previous one; the bracket
        // links chain back through the opened brackets until closed below.
        for i in (0..repeat_max).rev() {
            self.code.push(OpCode::BraZero as u8 + repeat_type);
            if i != 0 {
                self.code.push(OP_BRA);
                let offset = bralink.map_or(0, |bl| self.code.len() - bl);
                bralink = Some(self.code.len());
                push_link(&mut self.code, offset);
            }
            self.code.extend_from_within(previous..previous + len);
        }

        while let Some(bl) = bralink {
            let offset = self.code.len() - bl + 1;
            let bra = self.code.len() - offset;
            let oldlinkoffset = get_link(&self.code, bra + 1);
            bralink = if oldlinkoffset == 0 { None } else { Some(bl - oldlinkoffset) };
            self.code.push(OpCode::Ket as u8);
            push_link(&mut self.code, offset);
            put_link(&mut self.code, bra + 1, offset);
        }
    }

    // ------------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------------

    fn compile_group(&mut self, st: &mut BranchState) -> Result<(), i32> {
        let mut p = self.ptr + 1;
        let mut bra_number = None;

        let bravalue = if self.at(p, b'?') {
            let op = match self.pattern.get(p + 1).copied() {
                Some(0x3a) /* : */ => OP_BRA,
                Some(0x3d) /* = */ => OpCode::Assert as u8,
                Some(0x21) /* ! */ => OpCode::AssertNot as u8,
                _ => return Err(JSREGEXP_ERR_UNRECOGNIZED_GROUP),
            };
            p += 2;
            op
        } else {
            self.brackets += 1;
            if self.brackets > EXTRACT_BASIC_MAX {
                bra_number = Some(self.brackets);
                OP_BRA + EXTRACT_BASIC_MAX as u8 + 1
            } else {
                OP_BRA + self.brackets as u8
            }
        };
        self.ptr = p;

        let start = self.code.len();
        st.previous = if bravalue >= OP_BRA { Some(start) } else { None };
        self.code.push(bravalue);

        let tempreqvary = self.cd.req_varyopt;
        let (subfirstbyte, mut subreqbyte) = self.compile_regex(bra_number)?;

        st.zeroreqbyte = st.reqbyte;
        st.zerofirstbyte = st.firstbyte;
        st.groupsetfirstbyte = false;

        if bravalue >= OP_BRA {
            if st.firstbyte == REQ_UNSET {
                if subfirstbyte >= 0 {
                    st.firstbyte = subfirstbyte;
                    st.groupsetfirstbyte = true;
                } else {
                    st.firstbyte = REQ_NONE;
                }
                st.zerofirstbyte = REQ_NONE;
            } else if subfirstbyte >= 0 && subreqbyte < 0 {
                subreqbyte = subfirstbyte | tempreqvary;
            }
            if subreqbyte >= 0 {
                st.reqbyte = subreqbyte;
            }
        } else if bravalue == OpCode::Assert as u8 && subreqbyte >= 0 {
            st.reqbyte = subreqbyte;
        }

        if !self.at(self.ptr, b')') {
            return Err(JSREGEXP_ERR_MISSING_PARENTHESIS);
        }
        Ok(())
    }
}

// ============================================================================
// Program analysis
// ============================================================================

#[inline]
fn first_significant_opcode(code: &[u8], mut pos: usize) -> usize {
    while code[pos] == OpCode::BraNumber as u8 {
        pos += 3;
    }
    pos
}

fn first_significant_opcode_skipping_assertions(code: &[u8], mut pos: usize) -> usize {
    loop {
        match OpCode::from_u8(code[pos]) {
            OpCode::AssertNot => {
                loop {
                    pos += get_link(code, pos + 1);
                    if code[pos] != OpCode::Alt as u8 {
                        break;
                    }
                }
                pos += 1 + LINK_SIZE;
            }
            OpCode::WordBoundary | OpCode::NotWordBoundary => pos += 1,
            OpCode::BraNumber => pos += 3,
            _ => return pos,
        }
    }
}

/// Capture number of the bracket opcode at `pos`.
#[inline]
fn bracket_number(code: &[u8], pos: usize) -> usize {
    let n = (code[pos] - OP_BRA) as usize;
    if n > EXTRACT_BASIC_MAX {
        get2(code, pos + 2 + LINK_SIZE)
    } else {
        n
    }
}

#[inline]
fn bracket_bit(n: usize) -> u32 {
    if n < 32 {
        1 << n
    } else {
        1
    }
}

/// True when every alternative of the bracket at `pos` must start at the
/// beginning of the subject.
fn is_anchored(code: &[u8], mut pos: usize, multiline: bool, bracket_map: u32, backref_map: u32) -> bool {
    loop {
        let scode = first_significant_opcode(code, pos + 1 + LINK_SIZE);
        let op = code[scode];
        if op > OP_BRA {
            let new_map = bracket_map | bracket_bit(bracket_number(code, scode));
            if !is_anchored(code, scode, multiline, new_map, backref_map) {
                return false;
            }
        } else if op == OP_BRA || op == OpCode::Assert as u8 {
            if !is_anchored(code, scode, multiline, bracket_map, backref_map) {
                return false;
            }
        } else if multiline || op != OpCode::Circ as u8 {
            return false;
        }

        pos += get_link(code, pos + 1);
        if code[pos] != OpCode::Alt as u8 {
            return true;
        }
    }
}

/// True when every alternative starts with `^` or with `.*`, so a match can
/// only begin at the start of a line. A `.*` inside a group that is
/// referenced later does not count.
fn can_apply_first_char_optimization(code: &[u8], mut pos: usize, bracket_map: u32, backref_map: u32) -> bool {
    loop {
        let scode = first_significant_opcode(code, pos + 1 + LINK_SIZE);
        let op = code[scode];
        if op > OP_BRA {
            let new_map = bracket_map | bracket_bit(bracket_number(code, scode));
            if !can_apply_first_char_optimization(code, scode, new_map, backref_map) {
                return false;
            }
        } else if op == OP_BRA || op == OpCode::Assert as u8 {
            if !can_apply_first_char_optimization(code, scode, bracket_map, backref_map) {
                return false;
            }
        } else if op == OpCode::TypeStar as u8 || op == OpCode::TypeMinStar as u8 {
            if code[scode + 1] != OpCode::AnyChar as u8 || (bracket_map & backref_map) != 0 {
                return false;
            }
        } else if op != OpCode::Circ as u8 {
            return false;
        }

        pos += get_link(code, pos + 1);
        if code[pos] != OpCode::Alt as u8 {
            return true;
        }
    }
}

/// Find a character every match must start with, looking through positive
/// lookaheads. Returns -1 when there is none.
fn find_first_asserted_char(code: &[u8], mut pos: usize, ignore_case: bool, inassert: bool) -> i32 {
    let mut c: i32 = -1;
    loop {
        let mut scode = first_significant_opcode_skipping_assertions(code, pos + 1 + LINK_SIZE);
        match OpCode::from_u8(code[scode]) {
            op @ (OpCode::Bra | OpCode::Assert) => {
                let d = find_first_asserted_char(code, scode, ignore_case, op == OpCode::Assert);
                if d < 0 {
                    return -1;
                }
                if c < 0 {
                    c = d;
                } else if c != d {
                    return -1;
                }
            }
            op @ (OpCode::Exact
            | OpCode::Char
            | OpCode::CharIgnoringCase
            | OpCode::AsciiChar
            | OpCode::AsciiLetterIgnoringCase
            | OpCode::Plus
            | OpCode::MinPlus) => {
                if !inassert {
                    return -1;
                }
                if op == OpCode::Exact {
                    scode += 2;
                }
                let (ch, _) = get_utf8_char(code, scode + 1);
                let ch = ch as i32;
                if c < 0 {
                    c = ch;
                    if ignore_case {
                        c |= REQ_IGNORE_CASE;
                    }
                } else if (c & REQ_CHAR_MASK) != ch {
                    return -1;
                }
            }
            _ => return -1,
        }

        pos += get_link(code, pos + 1);
        if code[pos] != OpCode::Alt as u8 {
            return c;
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Compile a UTF-16 pattern.
///
/// Returns the program and its capture-group count, or the first syntax
/// error found.
pub fn js_regexp_compile(
    pattern: &[u16],
    ignore_case: IgnoreCaseOption,
    multiline: MultilineOption,
) -> Result<(JsRegExp, u32), CompileError> {
    let mut options = RegExpOptions::from_compile_options(ignore_case, multiline);
    let ic = options.contains(RegExpOptions::IGNORE_CASE);
    let ml = options.contains(RegExpOptions::MULTILINE);

    let mut cd = CompileData::default();
    let length = calculate_compiled_pattern_length(pattern, ic, &mut cd).map_err(CompileError::new)?;
    if length > MAX_PATTERN_SIZE {
        return Err(CompileError::new(JSREGEXP_ERR_PATTERN_TOO_LARGE));
    }
    trace!("pattern of {} units needs at most {} bytes", pattern.len(), length);

    let mut compiler = Compiler {
        pattern,
        ptr: 0,
        code: Vec::with_capacity(length),
        ignore_case: ic,
        multiline: ml,
        brackets: 0,
        cd,
    };

    compiler.code.push(OP_BRA);
    let (mut firstbyte, reqbyte) = compiler.compile_regex(None).map_err(CompileError::new)?;

    if compiler.cd.top_backref > compiler.brackets {
        return Err(CompileError::new(JSREGEXP_ERR_NONEXISTENT_SUBPATTERN));
    }
    if compiler.ptr < pattern.len() {
        return Err(CompileError::new(JSREGEXP_ERR_UNMATCHED_PARENTHESES));
    }
    compiler.code.push(OpCode::End as u8);
    if compiler.code.len() > length {
        return Err(CompileError::new(JSREGEXP_ERR_CODE_OVERFLOW));
    }

    let Compiler { code, brackets, cd, .. } = compiler;

    let mut first_byte = -1;
    let mut req_byte = -1;

    let anchored = is_anchored(&code, 0, ml, 0, cd.backref_map);
    if anchored {
        options |= RegExpOptions::ANCHORED;
    } else {
        if firstbyte < 0 {
            firstbyte = find_first_asserted_char(&code, 0, ic, false);
        }
        if firstbyte >= 0 {
            let ch = firstbyte & REQ_CHAR_MASK;
            if ch < 127 {
                first_byte = if flip_case(ch as u32) == ch as u32 {
                    ch
                } else {
                    firstbyte & (REQ_CHAR_MASK | REQ_IGNORE_CASE)
                };
                options |= RegExpOptions::FIRST_BYTE;
            }
        } else if can_apply_first_char_optimization(&code, 0, 0, cd.backref_map) {
            options |= RegExpOptions::MULTILINE_FIRST_BYTE;
        }
    }

    // An anchored pattern only benefits from a required character that
    // follows something variable-length.
    if reqbyte >= 0 && (!anchored || reqbyte & REQ_VARY != 0) {
        let ch = reqbyte & REQ_CHAR_MASK;
        if ch < 127 {
            req_byte = if flip_case(ch as u32) == ch as u32 {
                ch
            } else {
                reqbyte & (REQ_CHAR_MASK | REQ_IGNORE_CASE)
            };
            options |= RegExpOptions::REQ_BYTE;
        }
    }

    let mut re = JsRegExp {
        options,
        top_bracket: brackets as u16,
        top_backref: cd.top_backref as u16,
        first_byte,
        req_byte,
        start_bits: None,
        code,
    };

    if !re.options.intersects(
        RegExpOptions::ANCHORED | RegExpOptions::FIRST_BYTE | RegExpOptions::MULTILINE_FIRST_BYTE,
    ) {
        js_regexp_study(&mut re);
    }

    debug!(
        "compiled {} units into {} bytes (estimate {}), {} groups, {:?}",
        pattern.len(),
        re.code.len(),
        length,
        brackets,
        re.options
    );

    Ok((re, brackets as u32))
}

/// Release a compiled program.
pub fn js_regexp_free(re: JsRegExp) {
    trace!("freeing program of {} bytes", re.size());
    drop(re);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(s: &str) -> Result<JsRegExp, i32> {
        compile_with(s, false, false)
    }

    fn compile_with(s: &str, ic: bool, ml: bool) -> Result<JsRegExp, i32> {
        let p: Vec<u16> = s.encode_utf16().collect();
        js_regexp_compile(&p, ic.into(), ml.into())
            .map(|(re, _)| re)
            .map_err(|e| e.code)
    }

    fn op(o: OpCode) -> u8 {
        o as u8
    }

    #[test]
    fn literal_program_layout() {
        let re = compile("abc").unwrap();
        assert_eq!(
            re.code,
            vec![
                OP_BRA, 0, 9,
                op(OpCode::AsciiChar), b'a',
                op(OpCode::AsciiChar), b'b',
                op(OpCode::AsciiChar), b'c',
                op(OpCode::Ket), 0, 9,
                op(OpCode::End),
            ]
        );
        assert_eq!(re.first_char(), Some(('a' as u32, false)));
        assert_eq!(re.required_char(), Some(('c' as u32, false)));
        assert!(!re.is_anchored());
    }

    #[test]
    fn alternation_links() {
        let re = compile("a|b").unwrap();
        assert_eq!(
            re.code,
            vec![
                OP_BRA, 0, 5,
                op(OpCode::AsciiChar), b'a',
                op(OpCode::Alt), 0, 5,
                op(OpCode::AsciiChar), b'b',
                op(OpCode::Ket), 0, 10,
                op(OpCode::End),
            ]
        );
        assert_eq!(re.first_char(), None);
        assert_eq!(re.required_char(), None);
        // Neither hint applies, so the study pass ran.
        let bits = re.start_bits.as_ref().unwrap();
        assert!(bits.contains(b'a' as u16));
        assert!(bits.contains(b'b' as u16));
        assert!(!bits.contains(b'c' as u16));
    }

    #[test]
    fn capture_count() {
        let p: Vec<u16> = "(a)(b(c))(?:d)(?=e)".encode_utf16().collect();
        let (re, count) = js_regexp_compile(&p, false.into(), false.into()).unwrap();
        assert_eq!(count, 3);
        assert_eq!(re.capture_count(), 3);
    }

    #[test]
    fn many_groups_use_branumber() {
        let pattern = "(a)".repeat(120);
        let re = compile(&pattern).unwrap();
        assert_eq!(re.top_bracket, 120);
        assert!(re.code.contains(&op(OpCode::BraNumber)));
    }

    #[test]
    fn counted_repeat_encoding() {
        let re = compile("a{2,4}").unwrap();
        assert_eq!(
            &re.code[3..11],
            &[op(OpCode::Exact), 0, 2, b'a', op(OpCode::Upto), 0, 2, b'a']
        );
        let re = compile("a{3}").unwrap();
        assert_eq!(&re.code[3..7], &[op(OpCode::Exact), 0, 3, b'a']);
        let re = compile("x*?").unwrap();
        assert_eq!(&re.code[3..5], &[op(OpCode::MinStar), b'x']);
        let re = compile("\\d+").unwrap();
        assert_eq!(&re.code[3..5], &[op(OpCode::TypePlus), op(OpCode::Digit)]);
        let re = compile("[^x]?").unwrap();
        assert_eq!(&re.code[3..5], &[op(OpCode::NotQuery), b'x']);
        // {0} drops the item entirely.
        assert_eq!(compile("ab{0}").unwrap().code.len(), compile("a").unwrap().code.len());
    }

    #[test]
    fn class_repeat_encoding() {
        let re = compile("[ab]{2,}").unwrap();
        assert_eq!(re.code[3], op(OpCode::Class));
        assert_eq!(&re.code[36..41], &[op(OpCode::CrRange), 0, 2, 0, 0]);
        let re = compile("[ab]*?").unwrap();
        assert_eq!(re.code[36], op(OpCode::CrMinStar));
    }

    #[test]
    fn single_char_class_becomes_literal() {
        assert_eq!(compile("[a]").unwrap().code, compile("a").unwrap().code);
        let re = compile("[^a]").unwrap();
        assert_eq!(&re.code[3..5], &[op(OpCode::Not), b'a']);
        // Negated classes and \S use the inverted bitmap forms.
        assert_eq!(compile("[^ab]").unwrap().code[3], op(OpCode::NClass));
        assert_eq!(compile("[\\S]").unwrap().code[3], op(OpCode::NClass));
        assert_eq!(compile("[^\\S]").unwrap().code[3], op(OpCode::Class));
    }

    #[test]
    fn wide_classes_use_xclass() {
        let re = compile("[a\u{100}-\u{200}]").unwrap();
        assert_eq!(re.code[3], op(OpCode::XClass));
        assert_eq!(re.code[3 + 1 + LINK_SIZE], XCL_MAP);
        let re = compile("[^\u{3b1}]").unwrap();
        assert_eq!(re.code[3], op(OpCode::XClass));
        assert_eq!(re.code[3 + 1 + LINK_SIZE], XCL_NOT);
    }

    #[test]
    fn group_repeats() {
        let re = compile("(a){0,3}").unwrap();
        let brazeros = re.code.iter().filter(|&&b| b == op(OpCode::BraZero)).count();
        assert_eq!(brazeros, 3);
        let re = compile("(?:ab)+").unwrap();
        assert!(re.code.contains(&op(OpCode::KetRmax)));
        let re = compile("(?:ab)*?").unwrap();
        assert!(re.code.contains(&op(OpCode::BraMinZero)));
        assert!(re.code.contains(&op(OpCode::KetRmin)));
        assert!(compile("(a){2,5}").is_ok());
        assert!(compile("((a|b){2,3}c){0,4}").is_ok());
    }

    #[test]
    fn estimate_covers_emitted_code() {
        let patterns = [
            "",
            "a|b|c",
            "(a|bc)*d",
            "[a-z\u{100}-\u{10ffff}]+",
            "(?:x{2,5}|y{0,3}?){1,4}",
            "((a)(b)){3,}",
            "\\d{2,4}\\s*\\w+?",
            "[^\\d\\s]{0,3}",
            "(a)\\1{2,3}",
            "\u{1f600}{2}",
            "\u{e9}{2,9}",
            "(?=a)(?!b)\\bc\\B",
            "^$.|[\\b]",
            "((((a{0,2}){0,2}){0,2}){0,2})",
            "\\u0041\\x41\\101\\cA",
            "[\\u0100\\d]{2}",
            "(?:)*",
        ];
        for p in &patterns {
            assert!(compile(p).is_ok(), "pattern {:?}", p);
            assert!(compile_with(p, true, true).is_ok(), "pattern {:?} /im", p);
        }
    }

    #[test]
    fn estimate_covers_generated_patterns() {
        let atoms = [
            "a",
            "\u{e9}",
            "\u{1f600}",
            "\\u00ff",
            "[a-z\u{100}-\u{2000}]",
            "[^\u{3b1}]",
            "[\u{1f600}]",
            "[\\w\u{4e00}]",
            "\\d",
            "\\W",
            ".",
            "(a|bc)",
            "(?:x)",
            "\\1",
        ];
        let quantifiers = ["", "*", "+?", "?", "{2,5}", "{3}", "{0,4}?", "{2,}"];

        let mut checked = 0;
        for atom in &atoms {
            for q in &quantifiers {
                let mut body = format!("{}{}", atom, q);
                for depth in 0..3 {
                    body = match depth {
                        0 => format!("(?:{}|z){{1,3}}", body),
                        1 => format!("({}){{0,2}}", body),
                        _ => format!("(?={})y|(?!{})(?:{})?", body, body, body),
                    };
                    let pattern = format!("(a){}\\1", body);
                    let units: Vec<u16> = pattern.encode_utf16().collect();
                    for ic in [false, true] {
                        let mut cd = CompileData::default();
                        let estimate = calculate_compiled_pattern_length(&units, ic, &mut cd)
                            .unwrap_or_else(|e| panic!("pattern {:?} ic={}: error {}", pattern, ic, e));
                        let re = compile_with(&pattern, ic, false)
                            .unwrap_or_else(|e| panic!("pattern {:?} ic={}: error {}", pattern, ic, e));
                        assert!(
                            re.code.len() <= estimate,
                            "pattern {:?} ic={}: emitted {} bytes, estimated {}",
                            pattern,
                            ic,
                            re.code.len(),
                            estimate
                        );
                        checked += 1;
                    }
                }
            }
        }
        assert_eq!(checked, atoms.len() * quantifiers.len() * 3 * 2);
    }

    #[test]
    fn astral_single_char_class_stays_extended() {
        let re = compile("[\u{1f600}]+").unwrap();
        assert_eq!(re.code[1 + LINK_SIZE], op(OpCode::XClass));
        let units: Vec<u16> = "x\u{1f600}\u{1f600}y".encode_utf16().collect();
        let mut offsets = [0i32; 3];
        assert_eq!(crate::regexec::js_regexp_execute(&re, &units, 0, &mut offsets), 1);
        assert_eq!(&offsets[..2], &[1, 5]);
    }

    #[test]
    fn compile_errors() {
        assert_eq!(compile("a**").unwrap_err(), JSREGEXP_ERR_NOTHING_TO_REPEAT);
        assert_eq!(compile("*a").unwrap_err(), JSREGEXP_ERR_NOTHING_TO_REPEAT);
        assert_eq!(compile("a|?").unwrap_err(), JSREGEXP_ERR_NOTHING_TO_REPEAT);
        assert_eq!(compile("^*").unwrap_err(), JSREGEXP_ERR_NOTHING_TO_REPEAT);
        assert_eq!(compile("a{2}+").unwrap_err(), JSREGEXP_ERR_NOTHING_TO_REPEAT);
        assert_eq!(compile("(a").unwrap_err(), JSREGEXP_ERR_MISSING_PARENTHESIS);
        assert_eq!(compile("a)").unwrap_err(), JSREGEXP_ERR_UNMATCHED_PARENTHESES);
        assert_eq!(compile("(?<n>a)").unwrap_err(), JSREGEXP_ERR_UNRECOGNIZED_GROUP);
        assert_eq!(compile("[abc").unwrap_err(), JSREGEXP_ERR_MISSING_CLASS_TERMINATOR);
        assert_eq!(compile("a\\").unwrap_err(), JSREGEXP_ERR_BACKSLASH_AT_END);
        assert_eq!(compile("a{3,2}").unwrap_err(), JSREGEXP_ERR_REPEAT_OUT_OF_ORDER);
        assert_eq!(compile(&"(".repeat(201)).unwrap_err(), JSREGEXP_ERR_NESTED_TOO_DEEPLY);
        assert_eq!(
            compile("(?:a{65535}){65535}").unwrap_err(),
            JSREGEXP_ERR_PATTERN_TOO_LARGE
        );
    }

    #[test]
    fn anchoring() {
        assert!(compile("^abc").unwrap().is_anchored());
        assert!(compile("^a|^b").unwrap().is_anchored());
        assert!(compile("(?:^a|(^b))").unwrap().is_anchored());
        assert!(!compile("^a|b").unwrap().is_anchored());
        assert!(!compile_with("^a", false, true).unwrap().is_anchored());
        // Anchored programs carry no first-character hint and keep only a
        // variable-position required character.
        let re = compile("^abc").unwrap();
        assert_eq!(re.first_char(), None);
        assert_eq!(re.required_char(), None);
        let re = compile("^a*b").unwrap();
        assert_eq!(re.required_char(), Some(('b' as u32, false)));
    }

    #[test]
    fn line_start_optimization() {
        let re = compile_with("^a", false, true).unwrap();
        assert!(re.options.contains(RegExpOptions::MULTILINE_FIRST_BYTE));
        let re = compile(".*foo").unwrap();
        assert!(re.options.contains(RegExpOptions::MULTILINE_FIRST_BYTE));
        assert!(re.start_bits.is_none());
        let re = compile("(.*)x\\1").unwrap();
        assert!(!re.options.contains(RegExpOptions::MULTILINE_FIRST_BYTE));
    }

    #[test]
    fn first_and_required_hints() {
        let re = compile_with("abc", true, false).unwrap();
        assert_eq!(re.first_char(), Some(('a' as u32, true)));
        assert_eq!(re.required_char(), Some(('c' as u32, true)));

        // Caseless digits need no case folding.
        let re = compile_with("12", true, false).unwrap();
        assert_eq!(re.first_char(), Some(('1' as u32, false)));
        assert_eq!(re.required_char(), Some(('2' as u32, false)));

        let re = compile("(?=x)\\w").unwrap();
        assert_eq!(re.first_char(), Some(('x' as u32, false)));

        let re = compile("a?b").unwrap();
        assert_eq!(re.first_char(), None);
        assert_eq!(re.required_char(), Some(('b' as u32, false)));

        let re = compile("(abc|axc)").unwrap();
        assert_eq!(re.first_char(), Some(('a' as u32, false)));
        assert_eq!(re.required_char(), Some(('c' as u32, false)));

        // Characters outside ASCII never become hints.
        let re = compile("\u{e9}t").unwrap();
        assert_eq!(re.first_char(), None);
        assert_eq!(re.required_char(), Some(('t' as u32, false)));
    }

    #[test]
    fn free_accepts_program() {
        let re = compile("a+").unwrap();
        js_regexp_free(re);
    }
}
