//! Path grouping
//!
//! A dotted metric path such as `pipeline.processor.1.count` names a leaf
//! value inside one component instance. Grouping splits the path into the
//! object key (the instance, `pipeline.processor.1`) and the value key (the
//! leaf name within it, `count`), so that all values of one instance land in
//! the same emitted document.

/// Split a dotted metric path into `(object_key, value_key)`.
///
/// Segments are scanned from the right; the first one that parses as a base-10
/// integer marks the instance index, and the object key is everything up to
/// and including it. Paths without an integer segment are grouped under their
/// first segment, with the full path as the value key.
///
/// A single-token path degenerates to object key == value key == the token,
/// which puts a field named after the object key inside its own document.
/// Longstanding quirk, kept as-is; callers and tests rely on it.
pub fn group(path: &str) -> (String, String) {
    let parts: Vec<&str> = path.split('.').collect();

    // Walk segments backwards looking for an instance index
    for i in (0..parts.len()).rev() {
        if parts[i].parse::<i64>().is_ok() {
            return (parts[..=i].join("."), parts[i + 1..].join("."));
        }
    }

    (parts[0].to_string(), path.to_string())
}
