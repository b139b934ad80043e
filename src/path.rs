//! Virtual paths into compound archives
//!
//! A virtual path addresses a leaf entry at any nesting depth:
//!
//! ```text
//! virtual-path  ::= nested-prefix* segment
//! nested-prefix ::= segment "#/"
//! ```
//!
//! so `app.ear#/lib/connector.rar#/META-INF/ra.xml` is `META-INF/ra.xml`
//! inside `lib/connector.rar`, which is itself inside `app.ear`.
//!
//! # Examples
//!
//! ```
//! use earpatch::path::{nested_prefix, split_virtual_path};
//!
//! assert_eq!(nested_prefix("", "lib/x.jar"), "lib/x.jar#/");
//! assert_eq!(
//!     split_virtual_path("lib/x.jar#/META-INF/ra.xml"),
//!     vec!["lib/x.jar", "META-INF/ra.xml"]
//! );
//! ```

/// Separator inserted once per nesting level.
pub const NESTING_SEPARATOR: &str = "#/";

/// Suffixes treated as nested archives while reading (`expand`, `fetch_file`, `list`, `verify`).
pub const EXPAND_EXTENSIONS: &[&str] = &[".jar", ".zip", ".nbm", ".war", ".ear", ".rar", ".sar"];

/// Suffixes treated as nested archives while rewriting (`update`, `recompress`).
pub const UPDATE_EXTENSIONS: &[&str] = &[".jar", ".rar", ".war"];

/// Whether `name` ends with one of `extensions`. Matching is case-sensitive.
pub fn is_container(name: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| name.ends_with(ext))
}

/// Prefix under which the entries of the nested archive `name` are addressed.
pub fn nested_prefix(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}{NESTING_SEPARATOR}")
}

/// Split a virtual path into one segment per nesting level.
pub fn split_virtual_path(path: &str) -> Vec<&str> {
    path.split(NESTING_SEPARATOR).collect()
}

/// Last path component of an entry name, ignoring a trailing `/`.
pub fn short_name(entry_name: &str) -> &str {
    let trimmed = entry_name.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
