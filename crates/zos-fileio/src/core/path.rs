//! Path resolution for file handles.
//!
//! Every open handle carries a canonical absolute path. Child names are
//! resolved against the parent's path, alternate delimiters are rewritten,
//! and the result is cleaned of repeated delimiters and `.`/`..` segments.

use alloc::string::String;
use alloc::vec::Vec;

use super::error::{FileError, FileResult};

/// Canonical path delimiter.
pub const PATH_CHAR: char = '/';

/// Secondary delimiter accepted from callers and rewritten to [`PATH_CHAR`].
pub const DOS_PATH_CHAR: char = '\\';

/// Check whether a character is an accepted path delimiter.
pub fn is_path_delimiter(c: char) -> bool {
    c == PATH_CHAR || c == DOS_PATH_CHAR
}

/// Names that can never be created: `""`, `"."` and `".."`.
pub fn is_reserved_name(name: &str) -> bool {
    matches!(name, "" | "." | "..")
}

/// Names that refer to the handle they are opened from.
pub fn is_self_reference(name: &str) -> bool {
    matches!(name, "" | ".")
}

/// Collapse repeated delimiters and process `.` and `..` segments.
///
/// A `..` that would climb above the root is dropped, so the result never
/// escapes `/`.
pub fn clean_path(path: &str) -> String {
    let mut components: Vec<&str> = Vec::new();

    for component in path.split(PATH_CHAR) {
        match component {
            "" | "." => continue,
            ".." => {
                components.pop();
            }
            c => components.push(c),
        }
    }

    if components.is_empty() {
        return String::from("/");
    }

    let mut result = String::with_capacity(path.len());
    for component in components {
        result.push(PATH_CHAR);
        result.push_str(component);
    }
    result
}

/// Resolve `name` against the absolute path of its parent directory.
///
/// A name starting with a delimiter replaces the parent path entirely.
/// `path_max` bounds the length of the concatenated path in UTF-16 code
/// units.
///
/// # Panics
///
/// If the cleaned path is not absolute. That can only happen through a bug
/// in this module, never through caller input.
pub fn resolve(parent: &str, name: &str, path_max: usize) -> FileResult<String> {
    if name.contains('\0') {
        return Err(FileError::InvalidParameter);
    }

    let mut path = String::with_capacity(parent.len() + name.len() + 1);
    if !name.starts_with(is_path_delimiter) {
        path.push_str(parent);
        path.push(PATH_CHAR);
    }
    path.extend(name.chars().map(|c| if c == DOS_PATH_CHAR { PATH_CHAR } else { c }));

    if path.encode_utf16().count() > path_max {
        return Err(FileError::InvalidParameter);
    }

    let path = clean_path(&path);
    assert!(
        path.starts_with(PATH_CHAR),
        "resolved path is not absolute: {path:?}"
    );
    Ok(path)
}

/// Byte offset of the base name inside an absolute path.
pub fn base_name_offset(path: &str) -> usize {
    path.rfind(PATH_CHAR).map_or(0, |pos| pos + 1)
}

/// Get the parent path of a given absolute path.
pub fn parent_path(path: &str) -> &str {
    match path.rfind(PATH_CHAR) {
        Some(0) | None => "/",
        Some(pos) => &path[..pos],
    }
}
