//! Path string canonicalization.
//!
//! Diagnostics arrive with Windows-style or mixed separators. Every path that
//! reaches the result tree goes through [`normalize`] first so that folder and
//! file lookups compare like with like.

/// Replace backslashes (single or doubled) with `/` and strip one trailing slash.
///
/// A lone `/` is kept as is.
pub fn normalize(path: &str) -> String {
    let mut out = path.replace("\\\\", "/").replace('\\', "/");
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Normalized parent directory of `path`, without trailing slash.
///
/// Returns an empty string when the path has no directory component.
pub fn directory_of(path: &str) -> String {
    let norm = normalize(path);
    match norm.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => normalize(&norm[..idx]),
        None => String::new(),
    }
}

/// Final segment of `path`.
pub fn base_name_of(path: &str) -> String {
    let norm = normalize(path);
    match norm.rfind('/') {
        Some(idx) if idx + 1 < norm.len() => norm[idx + 1..].to_string(),
        _ => norm,
    }
}
