//! String normalization applied to every node attribute

/// Separator between packed capability ids in a single string
pub const TERMINATOR: char = '\0';

/// Characters allowed in node and capability ids (after lowercasing)
const ID_CHARS: &str = "0123456789abcdefghijklmnopqrstuvwxyz_.:-";

/// Clean a scanner-supplied string.
///
/// Everything from the first terminator onward is dropped, then leading and
/// trailing whitespace and control characters are trimmed and embedded
/// control characters removed.
pub fn strip(s: &str) -> String {
    let s = match s.find(TERMINATOR) {
        Some(pos) => &s[..pos],
        None => s,
    };

    s.trim_matches(|c: char| c <= ' ')
        .chars()
        .filter(|&c| c >= ' ')
        .collect()
}

/// Decode raw bytes read from firmware or sysfs into clean text.
///
/// Invalid UTF-8 sequences are replaced before stripping.
pub fn sanitize(raw: &[u8]) -> String {
    strip(&String::from_utf8_lossy(raw))
}

/// Normalize an id: strip, lowercase, and map every character outside
/// `[0-9a-z_.:-]` to `_`.
pub fn normalize_id(id: &str) -> String {
    strip(id)
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if ID_CHARS.contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `radical:count`, used to disambiguate sibling ids
pub fn numbered_id(radical: &str, count: usize) -> String {
    format!("{}:{}", radical, count)
}

/// True when `s` has the `major:minor` shape (digits on both sides)
pub fn is_dev_id(s: &str) -> bool {
    match s.split_once(':') {
        Some((major, minor)) => {
            !major.is_empty()
                && !minor.is_empty()
                && major.bytes().all(|b| b.is_ascii_digit())
                && minor.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Strip a physical id and drop redundant leading zeros.
///
/// A zero directly in front of a `.` separator is significant and kept.
pub fn normalize_phys_id(physid: &str) -> String {
    let physid = strip(physid);
    let mut rest = physid.as_str();
    while rest.len() > 1 && rest.starts_with('0') && !rest[1..].starts_with('.') {
        rest = &rest[1..];
    }
    rest.to_string()
}

/// Lowercase hexadecimal form of a numeric physical id
pub fn hex_phys_id(physid: u64) -> String {
    format!("{:x}", physid)
}
