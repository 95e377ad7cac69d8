//! Cleanup of per-run test databases and scratch directories left behind by
//! crashed or interrupted test sessions.
//!
//! Each running session writes a marker file listing the template clones it
//! owns. A clone is only dropped once no unexpired marker claims it.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use serde::Serialize;
use testdb_domain::{plan_leak_cleanup, run_dir_expired, LeakMarker};

use super::lifecycle::drop_databases;
use crate::effects::{is_not_found, FileSystem};
use crate::CommandContext;

#[derive(Clone, Debug, Default, Serialize)]
pub struct LeakReport {
    pub dropped: Vec<String>,
    pub in_use: Vec<String>,
    pub removed_markers: Vec<PathBuf>,
}

/// Drops test databases that no live session claims and deletes expired
/// marker files.
///
/// # Errors
/// Returns an error if the marker directory or a marker cannot be read, a marker cannot
/// be removed, or the database client fails to drop (fatal).
pub fn destroy_leaked_test_databases(ctx: &CommandContext, expiry: Duration) -> Result<LeakReport> {
    let prefix = &ctx.config().cleanup().leak_prefix;
    let live = match ctx.database().list_databases() {
        Ok(live) => live,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "cannot list databases; nothing to reap");
            Vec::new()
        }
    };
    let markers = read_markers(ctx.fs(), &ctx.config().paths().template_database_dir)?;
    let plan = plan_leak_cleanup(live, &markers, prefix, expiry, SystemTime::now());

    let mut removed_markers = Vec::new();
    for path in &plan.expired_markers {
        match ctx.fs().remove_file(path) {
            Ok(()) => removed_markers.push(path.clone()),
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(err),
        }
    }

    let dropped = drop_databases(ctx, &plan.to_drop)?;
    tracing::info!(
        dropped = dropped.len(),
        in_use = plan.in_use.len(),
        removed_markers = removed_markers.len(),
        "reaped leaked test databases"
    );
    Ok(LeakReport {
        dropped,
        in_use: plan.in_use.into_iter().collect(),
        removed_markers,
    })
}

fn read_markers(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<LeakMarker>> {
    if !fs.is_dir(dir) {
        return Ok(Vec::new());
    }
    let mut markers = Vec::new();
    for path in fs.list_dir(dir)? {
        if fs.is_dir(&path) {
            continue;
        }
        let marker = fs.modified(&path).and_then(|modified| {
            Ok(LeakMarker {
                contents: String::from_utf8_lossy(&fs.read(&path)?).into_owned(),
                path: path.clone(),
                modified,
            })
        });
        match marker {
            Ok(marker) => markers.push(marker),
            Err(err) if is_not_found(&err) => {
                tracing::debug!(path = %path.display(), "marker vanished while reading");
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("cannot read test database marker {}", path.display())
                });
            }
        }
    }
    Ok(markers)
}

/// Removes `run_*` directories under the run root older than `expiry` and
/// returns how many were removed.
///
/// # Errors
/// Returns an error if the run root cannot be listed or a directory cannot
/// be removed.
pub fn remove_test_run_directories(ctx: &CommandContext, expiry: Duration) -> Result<usize> {
    let fs = ctx.fs();
    let run_root = &ctx.config().paths().run_root;
    if !fs.is_dir(run_root) {
        return Ok(0);
    }
    let now = SystemTime::now();
    let mut removed = 0;
    for path in fs.list_dir(run_root)? {
        let is_run_dir = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with("run_"));
        if !is_run_dir || !fs.is_dir(&path) {
            continue;
        }
        let modified = match fs.modified(&path) {
            Ok(modified) => modified,
            Err(err) if is_not_found(&err) => continue,
            Err(err) => return Err(err),
        };
        if !run_dir_expired(modified, now, expiry) {
            continue;
        }
        match fs.remove_dir_all(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed test run directory");
                removed += 1;
            }
            Err(err) if is_not_found(&err) => {}
            Err(err) => {
                return Err(err).context("failed to remove an expired test run directory");
            }
        }
    }
    Ok(removed)
}
