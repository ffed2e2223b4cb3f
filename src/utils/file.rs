//! File utilities for indexing operations.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Component, Path};

/// Deterministic record ID: SHA-256 of the relative path, hex encoded.
pub fn record_id(relative_path: &str) -> String {
    let hash = Sha256::digest(relative_path.as_bytes());
    hex::encode(hash)
}

/// Get the `/`-separated path of `path` relative to `base`.
pub fn relative_path(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Lowercased extension without the leading dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Check if the extension of `path` is in `binary_extensions`.
///
/// Entries may be given with or without a leading dot and in any case.
pub fn has_binary_extension(path: &Path, binary_extensions: &[String]) -> bool {
    let Some(ext) = extension_of(path) else {
        return false;
    };
    binary_extensions
        .iter()
        .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(&ext))
}

/// Read a file as strict UTF-8.
///
/// Returns `Ok(None)` when the bytes are not valid UTF-8.
pub fn read_utf8_text(path: &Path) -> std::io::Result<Option<String>> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8(bytes).ok())
}
