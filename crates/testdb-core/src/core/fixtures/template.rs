//! Decides whether a template database can be reused as-is, needs new
//! migrations applied, or has to be rebuilt from scratch.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use testdb_domain::{compare_migrations, extract_migrations, MigrationVerdict, TemplateStatus};

use super::digest::{compute_digest, migration_paths, DigestFile};
use super::hash_store::{check_file_hash, check_setting_hash};
use super::migration_status::{get_migration_status, recorded_migration_status};
use super::{Platform, TemplateDatabase};
use crate::CommandContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusReason {
    DatabaseMissing,
    InputsChanged,
    DigestUnchanged,
    NoRecordedStatus,
    HistoryDiverged,
    MigrationsLatest,
    NewMigrations,
}

impl StatusReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StatusReason::DatabaseMissing => "database_missing",
            StatusReason::InputsChanged => "inputs_changed",
            StatusReason::DigestUnchanged => "digest_unchanged",
            StatusReason::NoRecordedStatus => "no_recorded_status",
            StatusReason::HistoryDiverged => "history_diverged",
            StatusReason::MigrationsLatest => "migrations_latest",
            StatusReason::NewMigrations => "new_migrations",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TemplateReport {
    pub database: String,
    pub platform: Platform,
    pub status: TemplateStatus,
    pub reason: StatusReason,
    /// Tracked files and settings whose hash differed from the record.
    pub changed_inputs: Vec<String>,
}

impl TemplateReport {
    fn new(database: &TemplateDatabase, status: TemplateStatus, reason: StatusReason) -> Self {
        Self {
            database: database.name.clone(),
            platform: database.platform,
            status,
            reason,
            changed_inputs: Vec::new(),
        }
    }
}

/// Evaluates `database` against its recorded inputs.
///
/// Evaluation has side effects: every tracked input's hash is re-recorded and
/// the migration digest is rewritten once it is found obsolete, before the
/// migration lists are compared.
///
/// # Errors
/// Returns an error if a tracked file is unreadable, a status file cannot be
/// written, or the framework fails to report migrations.
pub fn evaluate_template(ctx: &CommandContext, database: &TemplateDatabase) -> Result<TemplateReport> {
    let status_dir = database.status_dir(ctx.var_dir());
    ctx.fs().create_dir_all(&status_dir)?;

    if !database_present(ctx, database) {
        tracing::info!(database = %database.name, "template database is missing");
        return Ok(TemplateReport::new(
            database,
            TemplateStatus::NeedsRebuild,
            StatusReason::DatabaseMissing,
        ));
    }

    let changed = changed_inputs(ctx, &status_dir)?;
    if !changed.is_empty() {
        tracing::info!(database = %database.name, ?changed, "tracked inputs changed");
        let mut report = TemplateReport::new(
            database,
            TemplateStatus::NeedsRebuild,
            StatusReason::InputsChanged,
        );
        report.changed_inputs = changed;
        return Ok(report);
    }

    let paths = migration_paths(ctx.root(), &ctx.config().tracking().migration_extra_files);
    let digest = compute_digest(ctx.fs(), ctx.root(), &paths)?;
    let digest_file = DigestFile::new(
        ctx.fs(),
        &ctx.config().paths().digests_dir,
        &database.migration_digest_file(),
    );
    if !digest_file.is_obsolete(&digest)? {
        tracing::debug!(database = %database.name, "migration digest unchanged");
        return Ok(TemplateReport::new(
            database,
            TemplateStatus::Current,
            StatusReason::DigestUnchanged,
        ));
    }
    digest_file
        .write(&digest)
        .context("failed to record the migration digest")?;

    let (status, reason) = what_to_do_with_migrations(ctx, database)?;
    tracing::info!(database = %database.name, %status, reason = reason.as_str(), "evaluated migrations");
    Ok(TemplateReport::new(database, status, reason))
}

/// Shorthand for [`evaluate_template`] when only the status matters.
///
/// # Errors
/// See [`evaluate_template`].
pub fn template_status(ctx: &CommandContext, database: &TemplateDatabase) -> Result<TemplateStatus> {
    Ok(evaluate_template(ctx, database)?.status)
}

fn database_present(ctx: &CommandContext, database: &TemplateDatabase) -> bool {
    match ctx.database().database_exists(&database.name) {
        Ok(present) => present,
        Err(err) => {
            tracing::warn!(
                database = %database.name,
                error = %format!("{err:#}"),
                "cannot reach the database server; treating the template as missing"
            );
            false
        }
    }
}

/// Checks every tracked file and setting, returning those that changed.
/// No check is skipped, so every hash file ends up current.
fn changed_inputs(ctx: &CommandContext, status_dir: &Path) -> Result<Vec<String>> {
    let tracking = ctx.config().tracking();
    let mut changed = Vec::new();
    for file in &tracking.files {
        if !check_file_hash(ctx.fs(), &ctx.root().join(file), status_dir)? {
            changed.push(file.display().to_string());
        }
    }
    for (name, value) in &tracking.settings {
        if !check_setting_hash(ctx.fs(), name, value, status_dir)? {
            changed.push(format!("settings.{name}"));
        }
    }
    Ok(changed)
}

fn what_to_do_with_migrations(
    ctx: &CommandContext,
    database: &TemplateDatabase,
) -> Result<(TemplateStatus, StatusReason)> {
    let Some(previous) = recorded_migration_status(ctx, database)? else {
        return Ok((TemplateStatus::NeedsRebuild, StatusReason::NoRecordedStatus));
    };
    let current = get_migration_status(ctx, database)?;
    let verdict = compare_migrations(&extract_migrations(&previous), &extract_migrations(&current));
    let reason = match verdict {
        MigrationVerdict::Scrap => StatusReason::HistoryDiverged,
        MigrationVerdict::MigrationsAreLatest => StatusReason::MigrationsLatest,
        MigrationVerdict::Migrate => StatusReason::NewMigrations,
    };
    Ok((verdict.into(), reason))
}
