use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Identifier of a single migration as printed by `showmigrations --list`,
/// e.g. `0042_add_index`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationName(String);

impl MigrationName {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MigrationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MigrationName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// What the recorded migration history says about the template.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationVerdict {
    /// History shrank or diverged; the template has to be rebuilt.
    Scrap,
    /// Same migrations as last time.
    MigrationsAreLatest,
    /// Only new migrations were added on top of the recorded ones.
    Migrate,
}

fn migration_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[[X| ]\] (\d+_.+?)(?:\r?\n|$)").expect("migration line pattern is valid")
    })
}

fn ansi_emphasis() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[(1|0)m").expect("ansi pattern is valid"))
}

/// Removes the bold/reset escapes the framework emits around app labels.
#[must_use]
pub fn strip_ansi(text: &str) -> String {
    ansi_emphasis().replace_all(text, "").into_owned()
}

/// Extracts migration names, in output order, from `showmigrations --list`
/// text. Applied (`[X]`) and pending (`[ ]`) entries are both returned.
#[must_use]
pub fn extract_migrations(status: &str) -> Vec<MigrationName> {
    migration_line()
        .captures_iter(status)
        .filter_map(|caps| caps.get(1))
        .map(|m| MigrationName::new(m.as_str()))
        .collect()
}

/// Compares the migration list recorded when the template was built with the
/// list the framework reports now.
#[must_use]
pub fn compare_migrations(
    previous: &[MigrationName],
    current: &[MigrationName],
) -> MigrationVerdict {
    if current.len() < previous.len() {
        return MigrationVerdict::Scrap;
    }
    let known: HashSet<&MigrationName> = current.iter().collect();
    if previous.iter().any(|migration| !known.contains(migration)) {
        return MigrationVerdict::Scrap;
    }
    if current.len() == previous.len() {
        MigrationVerdict::MigrationsAreLatest
    } else {
        MigrationVerdict::Migrate
    }
}
