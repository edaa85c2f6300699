// ucp.rs - Unicode case partner lookup.
//
// Case-insensitive matching folds a character onto its single "other case"
// partner. Only simple one-to-one mappings count; characters whose case
// mapping expands to several code points have no partner.

/// Return the other-case partner of `c`, or `None`.
pub fn othercase(c: u32) -> Option<u32> {
    let ch = char::from_u32(c)?;
    if ch.is_lowercase() {
        single_mapping(ch, ch.to_uppercase()).or_else(|| single_mapping(ch, ch.to_lowercase()))
    } else {
        single_mapping(ch, ch.to_lowercase()).or_else(|| single_mapping(ch, ch.to_uppercase()))
    }
}

fn single_mapping(ch: char, mut mapped: impl Iterator<Item = char>) -> Option<u32> {
    match (mapped.next(), mapped.next()) {
        (Some(m), None) if m != ch => Some(m as u32),
        _ => None,
    }
}

/// Find the next run of characters in `*cptr..=d` whose partners form a
/// contiguous range. On success returns that partner range and advances
/// `*cptr` past the run.
pub fn get_othercase_range(cptr: &mut u32, d: u32) -> Option<(u32, u32)> {
    let mut c = *cptr;
    let mut partner = None;
    while c <= d {
        partner = othercase(c);
        if partner.is_some() {
            break;
        }
        c += 1;
    }
    let occ = match partner {
        Some(occ) if c <= d => occ,
        _ => return None,
    };

    let mut next = occ + 1;
    c += 1;
    while c <= d {
        if othercase(c) != Some(next) {
            break;
        }
        next += 1;
        c += 1;
    }
    *cptr = c;
    Some((occ, next - 1))
}
