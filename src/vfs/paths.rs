/*!
 * Virtual Paths
 * Normalization shared by the mount table, the cache and the backends
 */

/// Normalize a virtual path
///
/// Backslashes become `/`, repeated separators collapse, `.` segments are
/// dropped and `..` pops a segment without ever escaping the root. The result
/// carries no leading or trailing `/`.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::with_capacity(8);

    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    segments.join("/")
}

/// Normalize a mount prefix: a normalized path with a trailing `/`, or the
/// empty string for a root mount
pub fn normalize_prefix(prefix: &str) -> String {
    let mut normalized = normalize_path(prefix);
    if !normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Strip a normalized prefix from a normalized path
///
/// Returns the backend-relative remainder, or `None` when the prefix does
/// not apply or nothing would remain.
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    path.strip_prefix(prefix).filter(|rel| !rel.is_empty())
}

/// Join a normalized prefix with a backend-relative path
pub fn join(prefix: &str, relative: &str) -> String {
    let mut joined = String::with_capacity(prefix.len() + relative.len());
    joined.push_str(prefix);
    joined.push_str(&normalize_path(relative));
    joined
}
