//! File path to route pattern compilation.
//!
//! # Responsibilities
//! - Strip the file extension and normalize separators
//! - Collapse a trailing `index` segment into its directory
//! - Rewrite `[name]` into a single-segment named group
//! - Rewrite `[...name]` into an optional catch-all named group
//! - Drop parenthesis-wrapped middleware scope segments
//!
//! # Design Decisions
//! - Literal segments are regex-escaped, so `a.b.html` only matches `/a.b`
//! - Patterns are anchored with `^` and a trailing `/?$`
//! - An empty catch-all matches: `/docs/[...slug]` accepts `/docs`

use std::collections::HashSet;
use std::path::Path;

use crate::routing::StartupError;

/// Turn a path relative to a route directory into a registry key.
///
/// `users\[id].rs` and `/users/[id]` both become `users/[id]`.
pub fn route_key(relative: &str) -> String {
    let normalized = relative.replace('\\', "/");
    let trimmed = normalized.trim_start_matches('/');
    strip_extension(trimmed).to_string()
}

/// Registry key of `file` relative to `base`.
pub fn relative_key(file: &Path, base: &Path) -> String {
    let relative = file.strip_prefix(base).unwrap_or(file);
    route_key(&relative.to_string_lossy())
}

fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let ext = &path[file_start + dot + 1..];
            if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                &path[..file_start + dot]
            } else {
                path
            }
        }
        _ => path,
    }
}

/// Whether a segment is a `(scope)` middleware marker.
pub fn is_scope_segment(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('(') && segment.ends_with(')')
}

fn catch_all_name(segment: &str) -> Option<&str> {
    segment.strip_prefix("[...")?.strip_suffix(']')
}

fn dynamic_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('[')?.strip_suffix(']')
}

fn validate_name<'a>(name: &'a str, key: &str) -> Result<&'a str, StartupError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(StartupError::InvalidPattern {
            file: key.to_string(),
            reason: format!("parameter name {:?} must be a word starting with a letter", name),
        })
    }
}

/// Compile a file under `base` into an anchored pattern string.
pub fn compile(file: &Path, base: &Path) -> Result<String, StartupError> {
    compile_key(&relative_key(file, base))
}

/// Compile a registry key (as produced by [`route_key`]) into a pattern string.
pub fn compile_key(key: &str) -> Result<String, StartupError> {
    let segments: Vec<&str> = key
        .split('/')
        .filter(|s| !s.is_empty() && !is_scope_segment(s))
        .collect();

    let mut pattern = String::from("^");
    let mut seen = HashSet::new();

    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        if last && segment.eq_ignore_ascii_case("index") {
            continue;
        }

        if let Some(name) = catch_all_name(segment) {
            let name = validate_name(name, key)?;
            if !seen.insert(name) {
                return Err(duplicate(key, name));
            }
            pattern.push_str(&format!("(?:/(?<{}>.*))?", name));
        } else if let Some(name) = dynamic_name(segment) {
            let name = validate_name(name, key)?;
            if !seen.insert(name) {
                return Err(duplicate(key, name));
            }
            pattern.push_str(&format!("/(?<{}>[^/]+)", name));
        } else {
            pattern.push('/');
            pattern.push_str(&regex::escape(segment));
        }
    }

    pattern.push_str("/?$");
    Ok(pattern)
}

/// Sort key for a compiled pattern: total capture groups, then catch-all
/// groups, then length. Lower sorts first and wins lookups.
pub fn specificity(pattern: &str) -> (usize, usize, usize) {
    let catch_all = pattern.matches(">.*)").count();
    let dynamic = pattern.matches(">[^/]+)").count();
    (dynamic + catch_all, catch_all, pattern.len())
}

fn duplicate(key: &str, name: &str) -> StartupError {
    StartupError::DuplicateParam {
        file: key.to_string(),
        param: name.to_string(),
    }
}
