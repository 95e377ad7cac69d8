//! Per-database store of input hashes.
//!
//! Each tracked file or setting owns one file in the database's status
//! directory holding the hash recorded at the last check. Checking always
//! rewrites that file, so a check is also a recording.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use testdb_domain::{canonical_setting_json, content_hash, file_hash_name, setting_hash_name};

use crate::effects::FileSystem;

/// Records the hash of `content` in `hash_file` and reports whether it
/// matches what was stored before. A missing hash file never matches.
pub(crate) fn check_hash(fs: &dyn FileSystem, hash_file: &Path, content: &str) -> Result<bool> {
    let current = content_hash(content);
    let previous = if fs.exists(hash_file) {
        Some(fs.read_to_string(hash_file)?.trim().to_string())
    } else {
        None
    };
    fs.write(hash_file, current.as_bytes())?;
    let unchanged = previous.as_deref() == Some(current.as_str());
    tracing::trace!(hash_file = %hash_file.display(), unchanged, "checked hash");
    Ok(unchanged)
}

/// Hashes the tracked file at `target` against its record in `status_dir`.
pub(crate) fn check_file_hash(fs: &dyn FileSystem, target: &Path, status_dir: &Path) -> Result<bool> {
    let content = fs
        .read_to_string(target)
        .with_context(|| format!("tracked file {} is unreadable", target.display()))?;
    check_hash(fs, &status_dir.join(file_hash_name(target)), &content)
}

/// Hashes the canonical JSON of a configured setting value.
pub(crate) fn check_setting_hash(
    fs: &dyn FileSystem,
    setting: &str,
    value: &Value,
    status_dir: &Path,
) -> Result<bool> {
    let content = canonical_setting_json(value);
    check_hash(fs, &status_dir.join(setting_hash_name(setting)), &content)
}
