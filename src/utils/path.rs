//! Asset identity normalization.
//!
//! Identities are the canonical names assets travel under: relative,
//! forward-slashed, free of `.`/`..` segments. Every path entering the
//! engine is normalized once at the boundary.

/// Normalize a raw path into its identity form.
///
/// Backslashes become `/`, leading slashes and `./` segments are
/// stripped, `..` pops the previous segment, empty segments collapse.
pub fn normalize_identity(raw: &str) -> String {
    let slashed = raw.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in slashed.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Identity with its final extension stripped (`app.min.js` -> `app.min`).
///
/// Only a dot inside the last segment counts; dotfiles keep their name.
pub fn strip_extension(identity: &str) -> &str {
    let seg_start = identity.rfind('/').map_or(0, |s| s + 1);
    match identity.rfind('.') {
        Some(idx) if idx > seg_start => &identity[..idx],
        _ => identity,
    }
}

/// Final extension of an identity, without the dot.
pub fn extension(identity: &str) -> Option<&str> {
    let seg_start = identity.rfind('/').map_or(0, |s| s + 1);
    match identity.rfind('.') {
        Some(idx) if idx > seg_start => Some(&identity[idx + 1..]),
        _ => None,
    }
}
