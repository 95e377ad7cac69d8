use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde::Serialize;
use testdb_domain::TemplateStatus;

use super::migration_status::record_migration_status;
use super::template::{evaluate_template, TemplateReport};
use super::{Platform, TemplateDatabase};
use crate::CommandContext;

/// Applies pending migrations to `database` and records the resulting
/// migration status for the next evaluation.
///
/// # Errors
/// Returns an error if the framework's migrate command fails or the status
/// cannot be recorded.
pub fn run_db_migrations(ctx: &CommandContext, database: &TemplateDatabase) -> Result<()> {
    tracing::info!(database = %database.name, platform = %database.platform, "applying migrations");
    ctx.migrations()
        .migrate(database)
        .with_context(|| format!("failed to migrate {}", database.name))?;
    record_migration_status(ctx, database)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAction {
    /// Fixtures regenerated from scratch.
    Rebuilt,
    /// Migrations applied, then fixtures regenerated.
    Migrated,
    /// Fixtures regenerated on request.
    Regenerated,
    Nothing,
}

#[derive(Clone, Debug, Serialize)]
pub struct UpdateReport {
    pub template: TemplateReport,
    pub action: UpdateAction,
    pub forced: bool,
}

/// Brings the test template up to date, doing the least work its status
/// allows.
///
/// # Errors
/// Returns an error if evaluation fails or any subprocess exits non-zero.
pub fn update_test_databases_if_required(
    ctx: &CommandContext,
    force: bool,
    rebuild_test_database: bool,
) -> Result<UpdateReport> {
    let database = ctx.config().database(Platform::Test).clone();
    let template = evaluate_template(ctx, &database)?;

    let action = if force || template.status == TemplateStatus::NeedsRebuild {
        ctx.fixtures().generate(true)?;
        UpdateAction::Rebuilt
    } else if template.status == TemplateStatus::RunMigrations {
        run_db_migrations(ctx, &database)?;
        ctx.fixtures().generate(false)?;
        UpdateAction::Migrated
    } else if rebuild_test_database {
        ctx.fixtures().generate(false)?;
        UpdateAction::Regenerated
    } else {
        UpdateAction::Nothing
    };
    tracing::info!(database = %database.name, ?action, force, "test template updated");
    Ok(UpdateReport {
        template,
        action,
        forced: force,
    })
}

/// Drops `names` in sorted order. An empty set makes no client call.
pub(crate) fn drop_databases(ctx: &CommandContext, names: &BTreeSet<String>) -> Result<Vec<String>> {
    let names: Vec<String> = names.iter().cloned().collect();
    if names.is_empty() {
        return Ok(names);
    }
    tracing::info!(count = names.len(), databases = ?names, "dropping databases");
    ctx.database().drop_databases(&names)?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::testing::{Harness, Presence};

    const APPLIED: &str = "zerver\n [X] 0001_initial\n";
    const WITH_NEW: &str = "zerver\n [X] 0001_initial\n [ ] 0002_add_stream\n";

    fn at_status(harness: &Harness, recorded: &str, reported: &str) {
        harness.write("zerver/migrations/0001_initial.py", "ops = []\n");
        harness.write("var/migration_status_test", recorded);
        harness.fake.set_migration_status(reported);
    }

    #[test]
    fn force_rebuilds_regardless_of_status() -> Result<()> {
        let harness = Harness::new();
        at_status(&harness, APPLIED, APPLIED);
        let report = update_test_databases_if_required(&harness.context(), true, false)?;

        assert_eq!(report.template.status, TemplateStatus::Current);
        assert_eq!(report.action, UpdateAction::Rebuilt);
        assert!(harness.fake.calls().contains(&"generate --force".to_string()));
        Ok(())
    }

    #[test]
    fn missing_template_is_rebuilt() -> Result<()> {
        let harness = Harness::new();
        harness.fake.set_presence(Presence::Absent);
        let report = update_test_databases_if_required(&harness.context(), false, false)?;
        assert_eq!(report.action, UpdateAction::Rebuilt);
        assert_eq!(harness.fake.calls().last().map(String::as_str), Some("generate --force"));
        Ok(())
    }

    #[test]
    fn new_migrations_are_applied_then_fixtures_regenerated() -> Result<()> {
        let harness = Harness::new();
        at_status(&harness, APPLIED, WITH_NEW);
        let report = update_test_databases_if_required(&harness.context(), false, false)?;

        assert_eq!(report.action, UpdateAction::Migrated);
        let calls = harness.fake.calls();
        let migrate = calls.iter().position(|c| c == "migrate app_test_template").unwrap();
        let generate = calls.iter().position(|c| c == "generate").unwrap();
        assert!(migrate < generate);
        let recorded = std::fs::read_to_string(harness.root().join("var/migration_status_test"))?;
        assert_eq!(recorded, WITH_NEW);
        Ok(())
    }

    #[test]
    fn current_template_is_left_alone_unless_asked() -> Result<()> {
        let harness = Harness::new();
        at_status(&harness, APPLIED, APPLIED);
        let report = update_test_databases_if_required(&harness.context(), false, false)?;
        assert_eq!(report.action, UpdateAction::Nothing);
        assert!(!harness.fake.calls().iter().any(|c| c.starts_with("generate")));

        let report = update_test_databases_if_required(&harness.context(), false, true)?;
        assert_eq!(report.template.reason, crate::StatusReason::DigestUnchanged);
        assert_eq!(report.action, UpdateAction::Regenerated);
        assert!(harness.fake.calls().contains(&"generate".to_string()));
        Ok(())
    }

    #[test]
    fn failed_migration_keeps_previous_status() {
        let harness = Harness::new();
        at_status(&harness, APPLIED, WITH_NEW);
        *harness.fake.fail_migrate.lock().unwrap() = true;
        let ctx = harness.context();
        let database = ctx.config().database(Platform::Dev).clone();

        let err = run_db_migrations(&ctx, &database).unwrap_err();
        assert!(format!("{err:#}").contains("failed to migrate app"));
        assert!(!harness.root().join("var/migration_status_dev").exists());
    }

    #[test]
    fn empty_drop_set_makes_no_call() -> Result<()> {
        let harness = Harness::new();
        let dropped = drop_databases(&harness.context(), &BTreeSet::new())?;
        assert!(dropped.is_empty());
        assert!(harness.fake.calls().is_empty());
        Ok(())
    }
}
