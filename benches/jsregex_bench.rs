// Criterion benchmark suite for jsregex.
//
// Run: cargo bench
// Specific group: cargo bench -- search
// HTML report: target/criterion/report/index.html

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use jsregex::jsregexp::{IgnoreCaseOption, MultilineOption};
use jsregex::regcomp::js_regexp_compile;
use jsregex::regexec::js_regexp_execute;
use jsregex::regint::JsRegExp;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn compile(pattern: &str, ignore_case: bool) -> JsRegExp {
    let (re, _) = js_regexp_compile(
        &utf16(pattern),
        IgnoreCaseOption::from(ignore_case),
        MultilineOption::from(false),
    )
    .expect("compile failed");
    re
}

fn execute(re: &JsRegExp, subject: &[u16], offsets: &mut [i32]) -> i32 {
    js_regexp_execute(re, subject, 0, offsets)
}

/// Filler text with no digits, no `@` and no `q`.
fn haystack(len: usize) -> String {
    "the lazy brown fox jumps over a dog; ".chars().cycle().take(len).collect()
}

// ---------------------------------------------------------------------------
// 1. compile -- measure compilation time
// ---------------------------------------------------------------------------

fn bench_compile(c: &mut Criterion) {
    let patterns: &[(&str, &str)] = &[
        ("literal", "hello world"),
        ("dot_star", "foo.*bar"),
        ("alternation", "alpha|beta|gamma|delta"),
        ("char_class", "[a-zA-Z0-9_]+"),
        ("wide_class", "[\\u0100-\\uffff\\d]+"),
        ("quantifier", "a{2,5}b+c?d*"),
        ("group", "(abc)+(def)*"),
        ("backref", "(\\w+)\\s+\\1"),
        ("lookahead", "foo(?=bar)(?!baz)"),
        ("date", "(\\d{4})-(\\d{2})-(\\d{2})"),
    ];

    let mut group = c.benchmark_group("compile");
    for (name, pat) in patterns {
        let pattern = utf16(pat);
        group.bench_with_input(BenchmarkId::from_parameter(name), &pattern, |b, pattern| {
            b.iter(|| {
                let re = js_regexp_compile(
                    black_box(pattern),
                    IgnoreCaseOption::from(false),
                    MultilineOption::from(false),
                );
                black_box(&re);
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 2. search -- hits near the end of a long subject
// ---------------------------------------------------------------------------

fn bench_search_hit(c: &mut Criterion) {
    let cases: &[(&str, &str, bool)] = &[
        ("first_char", "needle", false),
        ("caseless_first_char", "NEEDLE", true),
        ("start_bits", "\\d+|@\\w+", false),
        ("anchored_line", "^needle", false),
        ("captures", "(\\w+)@(\\w+)\\.com", false),
        ("backref", "(\\w)\\1\\1", false),
    ];

    let mut text = haystack(10_000);
    text.push_str("\nneedle me@host.com 777");
    let subject = utf16(&text);

    let mut group = c.benchmark_group("search_hit");
    for (name, pat, ic) in cases {
        let re = compile(pat, *ic);
        let mut offsets = vec![0i32; 3 * (re.capture_count() + 1)];
        group.bench_function(*name, |b| {
            b.iter(|| black_box(execute(&re, black_box(&subject), &mut offsets)));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 3. search -- subjects without a match
// ---------------------------------------------------------------------------

fn bench_search_miss(c: &mut Criterion) {
    let cases: &[(&str, &str)] = &[
        ("literal", "needle"),
        ("class_plus", "[0-9]+x"),
        ("alternation", "alpha|beta|gamma"),
        ("required_char", "a.*q"),
        ("lookahead", "\\w+(?=@)"),
    ];

    let subject = utf16(&haystack(10_000));

    let mut group = c.benchmark_group("search_miss");
    for (name, pat) in cases {
        let re = compile(pat, false);
        let mut offsets = vec![0i32; 3 * (re.capture_count() + 1)];
        group.bench_function(*name, |b| {
            b.iter(|| black_box(execute(&re, black_box(&subject), &mut offsets)));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 4. backtracking -- nested quantifiers that fail late
// ---------------------------------------------------------------------------

fn bench_backtracking(c: &mut Criterion) {
    let re = compile("(a+)+b", false);
    let mut offsets = [0i32; 6];

    let mut group = c.benchmark_group("backtracking");
    for n in [10usize, 14, 18] {
        let subject = utf16(&format!("{}!b", "a".repeat(n)));
        group.bench_with_input(BenchmarkId::new("nested_plus", n), &subject, |b, subject| {
            b.iter(|| black_box(execute(&re, black_box(subject), &mut offsets)));
        });
    }

    let re = compile("(?:a|b)*c", false);
    for n in [100usize, 1_000, 10_000] {
        let subject = utf16(&format!("{}c", "ab".repeat(n / 2)));
        group.bench_with_input(BenchmarkId::new("group_star", n), &subject, |b, subject| {
            b.iter(|| black_box(execute(&re, black_box(subject), &mut offsets)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_compile,
    bench_search_hit,
    bench_search_miss,
    bench_backtracking,
);

criterion_main!(benches);
