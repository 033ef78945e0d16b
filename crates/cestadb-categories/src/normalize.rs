//! Label canonicalization shared by retailer text and taxonomy keywords.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonicalize a free-text label for comparison.
///
/// Lower-cases, decomposes (NFKD) and drops combining marks, turns every
/// run of characters outside `[a-z0-9]` into a single space, and trims.
/// The output only ever contains ASCII lowercase letters, digits, and
/// single interior spaces, so the function is idempotent.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut gap = false;

    for c in text.to_lowercase().nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_ascii_alphanumeric() {
            if gap && !out.is_empty() {
                out.push(' ');
            }
            gap = false;
            out.push(c.to_ascii_lowercase());
        } else {
            gap = true;
        }
    }

    out
}
