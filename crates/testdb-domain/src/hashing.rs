use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `content`.
#[must_use]
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Name of the hash file that tracks `path` inside a status directory.
///
/// Only the basename participates: every character that is not alphanumeric
/// (which includes `-` and `_`) becomes a separator, the pieces are rejoined
/// with `_`, and the result is lowercased. `lib/bulk_create.py` maps to
/// `bulk_create_py`.
#[must_use]
pub fn file_hash_name(path: &Path) -> String {
    let basename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    basename
        .split(|c: char| !c.is_alphanumeric())
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

#[must_use]
pub fn setting_hash_name(setting: &str) -> String {
    format!("settings_{setting}")
}

/// Serializes a setting value with object keys in sorted order so that the
/// hash does not depend on how the value was declared.
#[must_use]
pub fn canonical_setting_json(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, inner)| (key.clone(), sorted(inner)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
