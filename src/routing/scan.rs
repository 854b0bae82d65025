//! Recursive route directory listing.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::routing::pattern::is_scope_segment;
use crate::routing::StartupError;

/// List every file under `dir`, sorted by `/`-separated relative path for a
/// stable discovery order (`users.rs` comes before `users/index.rs`).
///
/// A missing directory yields no files; the caller decides whether that matters.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, StartupError> {
    if !dir.exists() {
        tracing::warn!(directory = %dir.display(), "Route directory does not exist, skipping");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| StartupError::Scan {
            dir: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort_by_cached_key(|f| sort_key(f, dir));
    Ok(files)
}

fn sort_key(file: &Path, dir: &Path) -> String {
    file.strip_prefix(dir)
        .unwrap_or(file)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Whether a registry key names a middleware file rather than a route.
pub fn is_middleware_key(key: &str) -> bool {
    key.split('/').any(is_scope_segment)
}

/// Whether a static file becomes a view route.
pub fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        .unwrap_or(false)
}
