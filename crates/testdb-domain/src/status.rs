use std::fmt;

use serde::{Deserialize, Serialize};

use crate::migrations::MigrationVerdict;

/// State of a template database and the action it calls for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    NeedsRebuild,
    RunMigrations,
    Current,
}

impl TemplateStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateStatus::NeedsRebuild => "needs_rebuild",
            TemplateStatus::RunMigrations => "run_migrations",
            TemplateStatus::Current => "current",
        }
    }
}

impl From<MigrationVerdict> for TemplateStatus {
    fn from(verdict: MigrationVerdict) -> Self {
        match verdict {
            MigrationVerdict::Scrap => TemplateStatus::NeedsRebuild,
            MigrationVerdict::Migrate => TemplateStatus::RunMigrations,
            MigrationVerdict::MigrationsAreLatest => TemplateStatus::Current,
        }
    }
}

impl fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
