//! Absolute drive paths.
//!
//! Drive metadata addresses items by absolute, slash-separated paths.
//! Normalisation is purely textual: it never consults a filesystem.

/// Check whether a path is absolute.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Normalise a path: collapse repeated slashes, resolve `.` and `..`
/// textually, and strip any trailing slash. The root stays `/`.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// The parent of a normalised path. The root is its own parent.
pub fn dirname(path: &str) -> String {
    let path = normalize(path);
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// The final component of a normalised path. Empty for the root.
pub fn basename(path: &str) -> String {
    let path = normalize(path);
    match path.rfind('/') {
        Some(idx) => path[idx + 1..].to_string(),
        None => path,
    }
}

/// Join a base path and a child fragment, normalising the result.
/// An absolute `child` replaces `base` entirely.
pub fn join(base: &str, child: &str) -> String {
    if is_absolute(child) {
        normalize(child)
    } else {
        normalize(&format!("{}/{}", base, child))
    }
}

/// True iff `child` has `parent` as a proper ancestor under
/// component-wise comparison, so `/a` is not within `/ab`.
pub fn is_within(parent: &str, child: &str) -> bool {
    let parent = normalize(parent);
    let child = normalize(child);
    if child == parent {
        return false;
    }
    if parent == "/" {
        return child != "/";
    }
    child.starts_with(&format!("{}/", parent))
}
