// api.rs - Idiomatic Rust API for jsregex.
//
// Wraps js_regexp_compile / js_regexp_execute with Rust-native types:
// Regex, RegexBuilder, Match, Captures, FindIter. `&str` input is
// transcoded to UTF-16 for matching and offsets are mapped back to bytes.

use std::ops::Range;

use log::debug;

use crate::error::RegexError;
use crate::jsregexp::*;
use crate::regcomp::js_regexp_compile;
use crate::regexec::js_regexp_execute;
use crate::regint::{is_leading_surrogate, is_trailing_surrogate, JsRegExp};

// === UTF-16 subject ===

/// A `&str` transcoded to UTF-16, with the byte offset of every unit.
struct Utf16Text {
    units: Vec<u16>,
    /// `byte_at[i]` is the byte offset of the character holding unit `i`;
    /// the extra last entry is the text length.
    byte_at: Vec<usize>,
}

impl Utf16Text {
    fn new(text: &str) -> Self {
        let mut units = Vec::with_capacity(text.len());
        let mut byte_at = Vec::with_capacity(text.len() + 1);
        let mut buf = [0u16; 2];
        for (i, ch) in text.char_indices() {
            for &u in ch.encode_utf16(&mut buf).iter() {
                units.push(u);
                byte_at.push(i);
            }
        }
        byte_at.push(text.len());
        Utf16Text { units, byte_at }
    }

    /// Byte offset for a unit offset. A unit offset that splits a
    /// surrogate pair maps to the start of that character.
    fn byte_offset(&self, unit: usize) -> usize {
        self.byte_at[unit]
    }

    /// Unit offset for a byte offset on a character boundary.
    fn unit_offset(&self, byte: usize) -> Option<usize> {
        let i = self.byte_at.partition_point(|&b| b < byte);
        (self.byte_at.get(i) == Some(&byte)).then_some(i)
    }

    /// The unit offset one character after `unit`.
    fn next_char(&self, unit: usize) -> usize {
        let u = &self.units;
        if unit + 1 < u.len()
            && is_leading_surrogate(u[unit] as u32)
            && is_trailing_surrogate(u[unit + 1] as u32)
        {
            unit + 2
        } else {
            unit + 1
        }
    }
}

/// A compiled regular expression.
///
/// # Examples
///
/// ```
/// use jsregex::api::Regex;
///
/// let re = Regex::new(r"\d+").unwrap();
/// assert!(re.is_match("hello 42"));
///
/// let m = re.find("hello 42").unwrap();
/// assert_eq!(m.as_str(), "42");
/// assert_eq!(m.start(), 6);
/// assert_eq!(m.end(), 8);
/// ```
pub struct Regex {
    inner: JsRegExp,
}

impl Regex {
    /// Compile a pattern with default options (case-sensitive, single-line).
    pub fn new(pattern: &str) -> Result<Regex, RegexError> {
        RegexBuilder::new(pattern).build()
    }

    /// Compile a pattern given as UTF-16 code units.
    pub fn new_utf16(pattern: &[u16]) -> Result<Regex, RegexError> {
        let (inner, _) = js_regexp_compile(
            pattern,
            IgnoreCaseOption::DoNotIgnoreCase,
            MultilineOption::SingleLine,
        )?;
        Ok(Regex { inner })
    }

    /// Create a [`RegexBuilder`] for fine-grained control over compilation.
    pub fn builder(pattern: &str) -> RegexBuilder {
        RegexBuilder::new(pattern)
    }

    fn vector_len(&self) -> usize {
        3 * (self.inner.capture_count() + 1)
    }

    /// Run one search. `offsets` receives the pairs; on a match, returns
    /// how many of them were set.
    fn execute(&self, units: &[u16], start: usize, offsets: &mut [i32]) -> Result<Option<usize>, RegexError> {
        match js_regexp_execute(&self.inner, units, start, offsets) {
            JSREGEXP_ERROR_NOMATCH => Ok(None),
            rc if rc < 0 => {
                debug!("search failed: {}", rc);
                Err(RegexError::from(rc))
            }
            // Truncated: every pair that fits is set.
            0 => Ok(Some(offsets.len() / 3)),
            rc => Ok(Some(rc as usize)),
        }
    }

    /// Return the first match in `text`, or `None` if no match.
    ///
    /// A search that hits the match or recursion limit reports no match;
    /// use [`Regex::try_find`] to see the error.
    pub fn find<'t>(&self, text: &'t str) -> Option<Match<'t>> {
        self.try_find(text).ok().flatten()
    }

    /// Return the first match in `text`, surfacing run-time errors.
    pub fn try_find<'t>(&self, text: &'t str) -> Result<Option<Match<'t>>, RegexError> {
        let subject = Utf16Text::new(text);
        self.find_in(text, &subject, 0)
    }

    /// Return the first match starting at or after byte offset `start`.
    ///
    /// Anchors still see the whole text, so `^` does not match at `start`
    /// unless it is the beginning of a line in multiline mode. Returns
    /// `None` when `start` is past the end or not on a character boundary.
    ///
    /// ```
    /// use jsregex::api::Regex;
    ///
    /// let re = Regex::new(r"\bx").unwrap();
    /// assert_eq!(re.find_at("x ax x", 1).unwrap().start(), 5);
    /// ```
    pub fn find_at<'t>(&self, text: &'t str, start: usize) -> Option<Match<'t>> {
        let subject = Utf16Text::new(text);
        let unit = subject.unit_offset(start)?;
        self.find_in(text, &subject, unit).ok().flatten()
    }

    fn find_in<'t>(
        &self,
        text: &'t str,
        subject: &Utf16Text,
        unit: usize,
    ) -> Result<Option<Match<'t>>, RegexError> {
        let mut offsets = [0i32; 3];
        if self.execute(&subject.units, unit, &mut offsets)?.is_none() {
            return Ok(None);
        }
        Ok(Some(Match {
            text,
            start: subject.byte_offset(offsets[0] as usize),
            end: subject.byte_offset(offsets[1] as usize),
        }))
    }

    /// Check whether `text` matches the pattern anywhere.
    pub fn is_match(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    /// Return the first match with all capture groups, or `None`.
    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        let subject = Utf16Text::new(text);
        let spans = self.spans(&subject.units, 0).ok()??;
        let spans = spans
            .into_iter()
            .map(|span| span.map(|r| (subject.byte_offset(r.start), subject.byte_offset(r.end))))
            .collect();
        Some(Captures { text, spans })
    }

    /// Iterate over all non-overlapping matches in `text`.
    pub fn find_iter<'r, 't>(&'r self, text: &'t str) -> FindIter<'r, 't> {
        FindIter {
            regex: self,
            text,
            subject: Utf16Text::new(text),
            last_end: 0,
            last_was_empty: false,
        }
    }

    /// Search UTF-16 `text` from unit offset `start`, returning the unit
    /// range of the first match.
    ///
    /// ```
    /// use jsregex::api::Regex;
    ///
    /// let re = Regex::new("b+").unwrap();
    /// let text: Vec<u16> = "\u{1F600}abbc".encode_utf16().collect();
    /// assert_eq!(re.find_utf16(&text, 0).unwrap(), Some(3..5));
    /// ```
    pub fn find_utf16(&self, text: &[u16], start: usize) -> Result<Option<Range<usize>>, RegexError> {
        let mut offsets = [0i32; 3];
        if self.execute(text, start, &mut offsets)?.is_none() {
            return Ok(None);
        }
        Ok(Some(offsets[0] as usize..offsets[1] as usize))
    }

    /// Search UTF-16 `text` from unit offset `start`, returning the unit
    /// range of the match and of every group (`None` for unset groups).
    pub fn captures_utf16(
        &self,
        text: &[u16],
        start: usize,
    ) -> Result<Option<Vec<Option<Range<usize>>>>, RegexError> {
        self.spans(text, start)
    }

    fn spans(&self, text: &[u16], start: usize) -> Result<Option<Vec<Option<Range<usize>>>>, RegexError> {
        let mut offsets = vec![0i32; self.vector_len()];
        let Some(pairs) = self.execute(text, start, &mut offsets)? else {
            return Ok(None);
        };
        // Pairs past the returned count belong to groups that never matched.
        let spans = (0..=self.inner.capture_count())
            .map(|i| {
                let (lo, hi) = (offsets[2 * i], offsets[2 * i + 1]);
                (i < pairs && lo >= 0).then(|| lo as usize..hi as usize)
            })
            .collect();
        Ok(Some(spans))
    }

    /// Return the number of capture groups in the pattern (excluding group 0).
    pub fn captures_len(&self) -> usize {
        self.inner.capture_count()
    }

    /// Access the compiled program for use with the low-level functions.
    pub fn as_raw(&self) -> &JsRegExp {
        &self.inner
    }
}

impl std::fmt::Debug for Regex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Regex")
            .field("captures", &self.inner.capture_count())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

// === RegexBuilder ===

/// Builder for compiling a [`Regex`] with custom options.
///
/// # Examples
///
/// ```
/// use jsregex::api::Regex;
///
/// let re = Regex::builder(r"^world")
///     .case_insensitive(true)
///     .multiline(true)
///     .build()
///     .unwrap();
/// assert!(re.is_match("Hello\nWorld"));
/// ```
pub struct RegexBuilder {
    pattern: Vec<u16>,
    ignore_case: bool,
    multiline: bool,
}

impl RegexBuilder {
    /// Create a new builder for the given pattern.
    pub fn new(pattern: &str) -> Self {
        RegexBuilder {
            pattern: pattern.encode_utf16().collect(),
            ignore_case: false,
            multiline: false,
        }
    }

    /// Enable or disable case-insensitive matching.
    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.ignore_case = yes;
        self
    }

    /// Enable or disable `^`/`$` matching at every line boundary.
    pub fn multiline(mut self, yes: bool) -> Self {
        self.multiline = yes;
        self
    }

    /// Compile the pattern into a [`Regex`].
    pub fn build(self) -> Result<Regex, RegexError> {
        let (inner, _) = js_regexp_compile(&self.pattern, self.ignore_case.into(), self.multiline.into())?;
        Ok(Regex { inner })
    }
}

// === Match ===

/// A single match result referencing the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'t> {
    text: &'t str,
    start: usize,
    end: usize,
}

impl<'t> Match<'t> {
    /// Byte offset of the start of the match.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset of the end of the match (exclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    /// Byte range of the match.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The matched text.
    pub fn as_str(&self) -> &'t str {
        &self.text[self.start..self.end]
    }

    /// Returns the length of the match in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the match is empty (zero-length).
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

// === Captures ===

/// All capture groups from a single match.
///
/// Group 0 is the entire match. Groups 1..N correspond to `(...)` in the pattern.
pub struct Captures<'t> {
    text: &'t str,
    spans: Vec<Option<(usize, usize)>>,
}

impl<'t> Captures<'t> {
    /// Get capture group `i`, or `None` if the group did not participate.
    ///
    /// Group 0 is the entire match.
    pub fn get(&self, i: usize) -> Option<Match<'t>> {
        let (start, end) = (*self.spans.get(i)?)?;
        Some(Match {
            text: self.text,
            start,
            end,
        })
    }

    /// Number of capture groups (including group 0).
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns `true` if there are no capture groups (never the case for a match).
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Iterate over all capture groups.
    pub fn iter(&self) -> CapturesIter<'_, 't> {
        CapturesIter {
            captures: self,
            index: 0,
        }
    }
}

impl std::fmt::Debug for Captures<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// === CapturesIter ===

/// Iterator over capture groups in a [`Captures`].
pub struct CapturesIter<'c, 't> {
    captures: &'c Captures<'t>,
    index: usize,
}

impl<'c, 't> Iterator for CapturesIter<'c, 't> {
    type Item = Option<Match<'t>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.captures.len() {
            return None;
        }
        let m = self.captures.get(self.index);
        self.index += 1;
        Some(m)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.captures.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CapturesIter<'_, '_> {}

// === FindIter ===

/// Iterator over all non-overlapping matches in a text.
///
/// The text is transcoded once; iteration stops at the first run-time error.
pub struct FindIter<'r, 't> {
    regex: &'r Regex,
    text: &'t str,
    subject: Utf16Text,
    /// Unit offset where the next search starts.
    last_end: usize,
    last_was_empty: bool,
}

impl<'r, 't> Iterator for FindIter<'r, 't> {
    type Item = Match<'t>;

    fn next(&mut self) -> Option<Match<'t>> {
        let len = self.subject.units.len();
        loop {
            if self.last_end > len {
                return None;
            }

            let mut offsets = [0i32; 3];
            if self
                .regex
                .execute(&self.subject.units, self.last_end, &mut offsets)
                .ok()?
                .is_none()
            {
                return None;
            }
            let (start, end) = (offsets[0] as usize, offsets[1] as usize);

            // An empty match right after another one: step over a character.
            if start == end {
                if self.last_was_empty {
                    if self.last_end >= len {
                        return None;
                    }
                    self.last_end = self.subject.next_char(self.last_end);
                    self.last_was_empty = false;
                    continue;
                }
                self.last_was_empty = true;
            } else {
                self.last_was_empty = false;
            }

            self.last_end = end;
            return Some(Match {
                text: self.text,
                start: self.subject.byte_offset(start),
                end: self.subject.byte_offset(end),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_text_offsets() {
        let t = Utf16Text::new("a\u{e9}\u{1f600}z");
        assert_eq!(t.units.len(), 5);
        assert_eq!(t.byte_at, vec![0, 1, 3, 3, 7, 8]);
        // The trailing half of a pair maps to the start of its character.
        assert_eq!(t.byte_offset(3), 3);
        assert_eq!(t.unit_offset(3), Some(2));
        assert_eq!(t.unit_offset(7), Some(4));
        assert_eq!(t.unit_offset(8), Some(5));
        assert_eq!(t.unit_offset(2), None);
        assert_eq!(t.unit_offset(9), None);
        assert_eq!(t.next_char(2), 4);
        assert_eq!(t.next_char(4), 5);
    }

    #[test]
    fn find_reports_bytes() {
        let re = Regex::new(r"\w+").unwrap();
        let m = re.find("\u{3b1}\u{3b2} word").unwrap();
        assert_eq!(m.as_str(), "word");
        assert_eq!(m.range(), 5..9);
        assert_eq!(m.len(), 4);
        assert!(!Regex::new(r"\d").unwrap().is_match("\u{663}"));
    }

    #[test]
    fn byte_offsets_follow_utf8() {
        let re = Regex::new("b+").unwrap();
        let m = re.find("\u{e9}\u{1f600}bb").unwrap();
        assert_eq!(m.range(), 6..8);
        assert_eq!(m.as_str(), "bb");

        let re = Regex::new(".").unwrap();
        assert_eq!(re.find("\u{1f600}").unwrap().as_str(), "\u{1f600}");
    }

    #[test]
    fn captures_map_every_group() {
        let re = Regex::new(r"(\u{1f600}+)(x)?(\w)").unwrap();
        let caps = re.captures("-\u{1f600}q").unwrap();
        assert_eq!(caps.len(), 4);
        assert_eq!(caps.get(0).unwrap().range(), 1..6);
        assert_eq!(caps.get(1).unwrap().as_str(), "\u{1f600}");
        assert!(caps.get(2).is_none());
        assert_eq!(caps.get(3).unwrap().as_str(), "q");
        let present: Vec<bool> = caps.iter().map(|m| m.is_some()).collect();
        assert_eq!(present, vec![true, true, false, true]);
    }

    #[test]
    fn spans_stop_at_returned_pair_count() {
        let re = Regex::new(r"(a)(b)?(c)?").unwrap();
        let text: Vec<u16> = "a".encode_utf16().collect();
        let mut offsets = vec![0i32; re.vector_len()];
        assert_eq!(re.execute(&text, 0, &mut offsets).unwrap(), Some(2));
        assert_eq!(
            re.spans(&text, 0).unwrap(),
            Some(vec![Some(0..1), Some(0..1), None, None])
        );

        let caps = re.captures("xa").unwrap();
        assert_eq!(caps.len(), 4);
        assert_eq!(caps.get(1).unwrap().range(), 1..2);
        assert!(caps.get(2).is_none() && caps.get(3).is_none());
    }

    #[test]
    fn find_iter_resumes_after_match() {
        let re = Regex::new(r"a|ab").unwrap();
        let found: Vec<&str> = re.find_iter("abab aab").map(|m| m.as_str()).collect();
        assert_eq!(found, vec!["a", "a", "a", "a"]);
    }

    #[test]
    fn empty_match_find_iter() {
        let re = Regex::new(r"").unwrap();
        let starts: Vec<_> = re.find_iter("a\u{1f600}").map(|m| m.start()).collect();
        assert_eq!(starts, vec![0, 1, 5]);

        let re = Regex::new(r"a*").unwrap();
        let spans: Vec<_> = re.find_iter("baa").map(|m| m.range()).collect();
        assert_eq!(spans, vec![0..0, 1..3, 3..3]);
    }

    #[test]
    fn find_at_checks_boundaries() {
        let re = Regex::new("a").unwrap();
        assert_eq!(re.find_at("aXa", 1).unwrap().start(), 2);
        assert!(re.find_at("\u{e9}a", 1).is_none());
        assert!(re.find_at("a", 2).is_none());
    }

    #[test]
    fn regex_builder_flags() {
        let re = Regex::builder(r"hello").case_insensitive(true).build().unwrap();
        assert!(re.is_match("HELLO"));
        assert!(re.is_match("Hello"));

        let re = Regex::builder(r"^b$").multiline(true).build().unwrap();
        assert_eq!(re.find("a\nb\nc").unwrap().start(), 2);
        assert!(!Regex::new(r"^b$").unwrap().is_match("a\nb\nc"));
    }

    #[test]
    fn utf16_variants() {
        let text: Vec<u16> = "x-12".encode_utf16().collect();
        let re = Regex::new(r"(\d)(z)?(\d)").unwrap();
        assert_eq!(re.find_utf16(&text, 0).unwrap(), Some(2..4));
        assert_eq!(
            re.captures_utf16(&text, 0).unwrap(),
            Some(vec![Some(2..4), Some(2..3), None, Some(3..4)])
        );
        assert_eq!(re.find_utf16(&text, 3).unwrap(), None);

        let pattern: Vec<u16> = "[\u{3b1}-\u{3c9}]".encode_utf16().collect();
        let re = Regex::new_utf16(&pattern).unwrap();
        assert!(re.is_match("\u{3b2}"));
    }

    #[test]
    fn regex_invalid_pattern() {
        let err = Regex::new(r"(unclosed").unwrap_err();
        assert!(matches!(err, RegexError::Syntax { code: 14, .. }));
        let err = Regex::new(r"a**").unwrap_err();
        assert_eq!(err.code(), JSREGEXP_ERR_NOTHING_TO_REPEAT);
    }

    #[test]
    fn regex_captures_len() {
        let re = Regex::new(r"(a)(?:b)(c)").unwrap();
        assert_eq!(re.captures_len(), 2);
        assert_eq!(re.as_raw().capture_count(), 2);
    }
}
