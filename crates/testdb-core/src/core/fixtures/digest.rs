use std::path::{Path, PathBuf};

use anyhow::Result;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::effects::FileSystem;

/// Migration modules (`<app>/migrations/*.py` directly under `root`) plus
/// `extra` files, as sorted paths relative to `root`.
pub(crate) fn migration_paths(root: &Path, extra: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(3)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            !hidden && (entry.depth() != 2 || entry.file_name() == "migrations")
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.depth() == 3
                && entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "py")
        })
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    paths.extend(extra.iter().cloned());
    paths.sort();
    paths.dedup();
    paths
}

/// Digest over each path and its contents. Paths that do not exist
/// contribute only their name.
pub(crate) fn compute_digest(fs: &dyn FileSystem, root: &Path, paths: &[PathBuf]) -> Result<String> {
    let mut hasher = Sha256::new();
    for path in paths {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        let absolute = root.join(path);
        if fs.exists(&absolute) {
            hasher.update(fs.read(&absolute)?);
        }
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// A stored digest for a set of inputs, kept in one file.
pub(crate) struct DigestFile<'a> {
    fs: &'a dyn FileSystem,
    path: PathBuf,
}

impl<'a> DigestFile<'a> {
    pub(crate) fn new(fs: &'a dyn FileSystem, digests_dir: &Path, name: &str) -> Self {
        Self {
            fs,
            path: digests_dir.join(name),
        }
    }

    pub(crate) fn is_obsolete(&self, current: &str) -> Result<bool> {
        if !self.fs.exists(&self.path) {
            return Ok(true);
        }
        let stored = self.fs.read_to_string(&self.path)?;
        Ok(stored.trim() != current)
    }

    pub(crate) fn write(&self, current: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            self.fs.create_dir_all(parent)?;
        }
        self.fs.write(&self.path, current.as_bytes())
    }
}
