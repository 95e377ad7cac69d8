use anyhow::{Context, Result};
use testdb_domain::strip_ansi;

use super::TemplateDatabase;
use crate::CommandContext;

/// Current `showmigrations --list` output for `database`, without the
/// terminal emphasis the framework adds around app labels.
pub(crate) fn get_migration_status(ctx: &CommandContext, database: &TemplateDatabase) -> Result<String> {
    let raw = ctx
        .migrations()
        .show_migrations(database)
        .with_context(|| format!("failed to read migration status of {}", database.name))?;
    Ok(strip_ansi(&raw))
}

/// Status recorded after the last successful migration run, if any.
pub(crate) fn recorded_migration_status(
    ctx: &CommandContext,
    database: &TemplateDatabase,
) -> Result<Option<String>> {
    let path = database.migration_status_path(ctx.var_dir());
    if !ctx.fs().exists(&path) {
        return Ok(None);
    }
    ctx.fs().read_to_string(&path).map(Some)
}

pub(crate) fn record_migration_status(ctx: &CommandContext, database: &TemplateDatabase) -> Result<()> {
    let status = get_migration_status(ctx, database)?;
    ctx.fs().create_dir_all(ctx.var_dir())?;
    let path = database.migration_status_path(ctx.var_dir());
    ctx.fs().write(&path, status.as_bytes())?;
    tracing::debug!(database = %database.name, path = %path.display(), "recorded migration status");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::testing::Harness;
    use crate::core::fixtures::Platform;

    #[test]
    fn status_is_stripped_and_recorded_per_platform() -> Result<()> {
        let harness = Harness::new();
        harness
            .fake
            .set_migration_status("\x1b[1mzerver\x1b[0m\n [X] 0001_initial\n");
        let ctx = harness.context();
        let database = ctx.config().database(Platform::Dev).clone();

        assert_eq!(recorded_migration_status(&ctx, &database)?, None);
        record_migration_status(&ctx, &database)?;

        let stored = std::fs::read_to_string(harness.root().join("var/migration_status_dev"))?;
        assert_eq!(stored, "zerver\n [X] 0001_initial\n");
        assert_eq!(recorded_migration_status(&ctx, &database)?.as_deref(), Some(stored.as_str()));
        Ok(())
    }
}
