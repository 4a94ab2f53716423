//! Identifier sanitizer
//!
//! Maps an arbitrary remote key to a candidate identifier: every character
//! outside `[A-Za-z0-9_]` (dots included) becomes `_`, runs of `_` collapse
//! to one, and leading/trailing `_` are stripped.

/// Sanitize a remote key into a candidate identifier.
///
/// Pure and total. The result may be empty when the key has no identifier
/// characters; callers must treat that as a naming failure.
pub fn sanitize(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut last_was_underscore = false;

    for c in key.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        out.push(c);
    }

    out.trim_matches('_').to_string()
}
