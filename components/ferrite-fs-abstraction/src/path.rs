//! Path validation and splitting.
//!
//! Backend paths are slash-separated and relative to the backend root; the
//! mount layer strips its own prefix before calling into a backend. The
//! single dot names the backend root itself.

/// Reports whether `name` is a valid backend-relative path.
///
/// `"."` names the backend root and is valid. Every other valid path is a
/// sequence of non-empty segments separated by single slashes, with no
/// leading or trailing slash and no `"."` or `".."` segments.
pub fn valid_path(name: &str) -> bool {
    if name == "." {
        return true;
    }
    if name.is_empty() {
        return false;
    }
    name.split('/')
        .all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

/// Splits a path into its directory part and final component.
///
/// The directory part is empty when the path has a single component.
pub fn split_base(name: &str) -> (&str, &str) {
    match name.rfind('/') {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => ("", name),
    }
}
