use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use crate::core::fixtures::{
    destroy_leaked_test_databases, evaluate_template, remove_test_run_directories,
    run_db_migrations, update_test_databases_if_required, LeakReport, Platform, UpdateAction,
};
use crate::outcome::ExecutionOutcome;
use crate::CommandContext;

#[derive(Clone, Copy, Debug)]
pub struct StatusRequest {
    pub platform: Platform,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateRequest {
    pub force: bool,
    pub rebuild_test_database: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct MigrateRequest {
    pub platform: Platform,
}

#[derive(Clone, Copy, Debug)]
pub struct ReapRequest {
    /// Overrides the configured expiry.
    pub expiry: Option<Duration>,
    pub databases: bool,
    pub run_dirs: bool,
}

impl Default for ReapRequest {
    fn default() -> Self {
        Self {
            expiry: None,
            databases: true,
            run_dirs: true,
        }
    }
}

/// Reports whether a template database is current.
///
/// # Errors
/// Returns an error if the template cannot be evaluated.
pub fn status(ctx: &CommandContext, request: &StatusRequest) -> Result<ExecutionOutcome> {
    let database = ctx.config().database(request.platform).clone();
    let report = evaluate_template(ctx, &database)?;
    let message = format!(
        "{} is {} ({})",
        report.database,
        report.status,
        report.reason.as_str()
    );
    Ok(ExecutionOutcome::success(message, serde_json::to_value(&report)?))
}

/// # Errors
/// Returns an error if evaluation or any rebuild step fails.
pub fn update(ctx: &CommandContext, request: &UpdateRequest) -> Result<ExecutionOutcome> {
    let report =
        update_test_databases_if_required(ctx, request.force, request.rebuild_test_database)?;
    let message = match report.action {
        UpdateAction::Rebuilt => format!("rebuilt {}", report.template.database),
        UpdateAction::Migrated => format!(
            "applied new migrations to {}",
            report.template.database
        ),
        UpdateAction::Regenerated => format!("regenerated {}", report.template.database),
        UpdateAction::Nothing => format!("{} is up to date", report.template.database),
    };
    Ok(ExecutionOutcome::success(message, serde_json::to_value(&report)?))
}

/// # Errors
/// Returns an error if migrating fails.
pub fn migrate(ctx: &CommandContext, request: &MigrateRequest) -> Result<ExecutionOutcome> {
    let database = ctx.config().database(request.platform).clone();
    run_db_migrations(ctx, &database)?;
    Ok(ExecutionOutcome::success(
        format!("migrated {}", database.name),
        json!({
            "database": database.name,
            "platform": database.platform,
            "status_file": database.migration_status_path(ctx.var_dir()),
        }),
    ))
}

/// Reaps leaked test databases and expired run directories.
///
/// # Errors
/// Returns an error if a drop fails or a directory cannot be cleaned.
pub fn reap(ctx: &CommandContext, request: &ReapRequest) -> Result<ExecutionOutcome> {
    let expiry = request.expiry.unwrap_or(ctx.config().cleanup().expiry);
    let leaks = if request.databases {
        destroy_leaked_test_databases(ctx, expiry)?
    } else {
        LeakReport::default()
    };
    let removed_run_dirs = if request.run_dirs {
        remove_test_run_directories(ctx, expiry)?
    } else {
        0
    };
    let message = format!(
        "dropped {} database(s), removed {} run director{}",
        leaks.dropped.len(),
        removed_run_dirs,
        if removed_run_dirs == 1 { "y" } else { "ies" }
    );
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "expiry_secs": expiry.as_secs(),
            "dropped": leaks.dropped,
            "in_use": leaks.in_use,
            "removed_markers": leaks.removed_markers,
            "removed_run_dirs": removed_run_dirs,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::testing::{Harness, Presence};
    use crate::outcome::CommandStatus;

    #[test]
    fn status_details_carry_the_report() -> Result<()> {
        let harness = Harness::new();
        harness.fake.set_presence(Presence::Absent);
        let outcome = status(
            &harness.context(),
            &StatusRequest {
                platform: Platform::Test,
            },
        )?;
        assert_eq!(outcome.status, CommandStatus::Ok);
        assert_eq!(outcome.details["status"], "needs_rebuild");
        assert_eq!(outcome.details["reason"], "database_missing");
        assert_eq!(outcome.details["platform"], "test");
        assert_eq!(
            outcome.message,
            "app_test_template is needs_rebuild (database_missing)"
        );
        Ok(())
    }

    #[test]
    fn update_reports_action() -> Result<()> {
        let harness = Harness::new();
        harness.fake.set_presence(Presence::Absent);
        let outcome = update(&harness.context(), &UpdateRequest::default())?;
        assert_eq!(outcome.details["action"], "rebuilt");
        assert_eq!(outcome.details["template"]["status"], "needs_rebuild");
        Ok(())
    }

    #[test]
    fn migrate_targets_requested_platform() -> Result<()> {
        let harness = Harness::new();
        let outcome = migrate(
            &harness.context(),
            &MigrateRequest {
                platform: Platform::Dev,
            },
        )?;
        assert_eq!(outcome.details["database"], "app");
        assert_eq!(harness.fake.calls()[0], "migrate app");
        Ok(())
    }

    #[test]
    fn reap_can_skip_databases() -> Result<()> {
        let harness = Harness::new();
        let request = ReapRequest {
            expiry: Some(Duration::from_secs(5)),
            databases: false,
            run_dirs: true,
        };
        let outcome = reap(&harness.context(), &request)?;
        assert_eq!(outcome.details["expiry_secs"], 5);
        assert_eq!(outcome.details["removed_run_dirs"], 0);
        assert!(harness.fake.calls().is_empty());
        Ok(())
    }
}
