use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Dev,
    Test,
}

impl Platform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Dev => "dev",
            Platform::Test => "test",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A database whose contents are derived from migrations plus generated
/// fixtures, together with the files that record what it was built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateDatabase {
    pub platform: Platform,
    pub name: String,
    /// Framework settings module exported while migrating this database.
    pub settings: String,
}

impl TemplateDatabase {
    #[must_use]
    pub fn new(platform: Platform, name: impl Into<String>, settings: impl Into<String>) -> Self {
        Self {
            platform,
            name: name.into(),
            settings: settings.into(),
        }
    }

    #[must_use]
    pub fn migration_status_file(&self) -> String {
        format!("migration_status_{}", self.platform)
    }

    #[must_use]
    pub fn migration_digest_file(&self) -> String {
        format!("migrations_hash_{}", self.name)
    }

    /// Recorded `showmigrations --list` output from the last migration run.
    #[must_use]
    pub fn migration_status_path(&self, var_dir: &Path) -> PathBuf {
        var_dir.join(self.migration_status_file())
    }

    /// Directory holding one hash file per tracked input.
    #[must_use]
    pub fn status_dir(&self, var_dir: &Path) -> PathBuf {
        var_dir.join(format!("{}_db_status", self.name))
    }
}
