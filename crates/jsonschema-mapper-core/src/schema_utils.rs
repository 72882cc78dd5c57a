//! JSON Pointer helpers (RFC 6901) shared by the schema loader and the
//! validator.
//!
//! Schema errors are reported at `#/...` pointers into the schema document;
//! validation errors are reported at `/...` pointers into the data.

use std::borrow::Cow;

/// `~` becomes `~0` and `/` becomes `~1`. Plain segments are borrowed.
pub fn escape_pointer_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains(['~', '/']) {
        Cow::Owned(segment.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Append escaped segments to a schema (`#`) or data (`""`) pointer.
///
/// ```
/// use jsonschema_mapper_core::build_path;
/// assert_eq!(build_path("#", &["properties", "a/b"]), "#/properties/a~1b");
/// ```
pub fn build_path(parent: &str, segments: &[&str]) -> String {
    segments.iter().fold(parent.to_string(), |mut path, segment| {
        path.push('/');
        path.push_str(&escape_pointer_segment(segment));
        path
    })
}

/// Inverse of [`escape_pointer_segment`]. `~01` decodes to `~1`, not `/`.
pub fn unescape_pointer_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains('~') {
        Cow::Owned(segment.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Decoded segments of a pointer, with or without the `#` prefix.
///
/// ```
/// use jsonschema_mapper_core::split_path;
/// assert_eq!(split_path("#/$defs/Address"), vec!["$defs", "Address"]);
/// assert_eq!(split_path("#"), Vec::<String>::new());
/// ```
pub fn split_path(path: &str) -> Vec<String> {
    let pointer = path.strip_prefix('#').unwrap_or(path);
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer
        .strip_prefix('/')
        .unwrap_or(pointer)
        .split('/')
        .map(|segment| unescape_pointer_segment(segment).into_owned())
        .collect()
}
