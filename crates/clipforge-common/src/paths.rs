//! Path utilities for detecting convertible files by extension.

use std::path::Path;

/// Extensions accepted by default for conversion input.
pub const DEFAULT_INPUT_EXTENSIONS: &[&str] = &["webm"];

/// Check if a path has one of the given extensions (case-insensitive).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use clipforge_common::paths::has_extension;
///
/// assert!(has_extension(Path::new("clip.webm"), &["webm"]));
/// assert!(has_extension(Path::new("/drop/CLIP.WebM"), &["webm"]));
/// assert!(!has_extension(Path::new("clip.mp4"), &["webm"]));
/// assert!(!has_extension(Path::new("no_extension"), &["webm"]));
/// ```
pub fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.as_ref().eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Check if a path is a convertible input using [`DEFAULT_INPUT_EXTENSIONS`].
pub fn is_convertible_file(path: &Path) -> bool {
    has_extension(path, DEFAULT_INPUT_EXTENSIONS)
}

/// Return the final path component as an owned string, if it is valid UTF-8.
pub fn file_name_string(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
}
