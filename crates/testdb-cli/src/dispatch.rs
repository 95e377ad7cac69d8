use std::time::Duration;

use color_eyre::Result;
use testdb_core::api::{
    self, CommandContext, CommandGroup, CommandInfo, MigrateRequest, ReapRequest, StatusRequest,
    UpdateRequest,
};

use crate::cli::CommandGroupCli;

pub fn dispatch_command(
    ctx: &CommandContext,
    group: &CommandGroupCli,
) -> Result<(CommandInfo, api::ExecutionOutcome)> {
    match group {
        CommandGroupCli::Status(args) => {
            let info = CommandInfo::new(CommandGroup::Status, "status");
            let request = StatusRequest {
                platform: args.platform.into(),
            };
            core_call(info, || api::status(ctx, &request))
        }
        CommandGroupCli::Update(args) => {
            let info = CommandInfo::new(CommandGroup::Update, "update");
            let request = UpdateRequest {
                force: args.force,
                rebuild_test_database: args.rebuild_test_db,
            };
            core_call(info, || api::update(ctx, &request))
        }
        CommandGroupCli::Migrate(args) => {
            let info = CommandInfo::new(CommandGroup::Migrate, "migrate");
            let request = MigrateRequest {
                platform: args.platform.into(),
            };
            core_call(info, || api::migrate(ctx, &request))
        }
        CommandGroupCli::Reap(args) => {
            let info = CommandInfo::new(CommandGroup::Reap, "reap");
            let request = ReapRequest {
                expiry: args.expiry.map(Duration::from_secs),
                databases: !args.skip_databases,
                run_dirs: !args.skip_run_dirs,
            };
            core_call(info, || api::reap(ctx, &request))
        }
    }
}

/// The CLI label for a command group, used before any context exists.
pub fn command_info(group: &CommandGroupCli) -> CommandInfo {
    match group {
        CommandGroupCli::Status(_) => CommandInfo::new(CommandGroup::Status, "status"),
        CommandGroupCli::Update(_) => CommandInfo::new(CommandGroup::Update, "update"),
        CommandGroupCli::Migrate(_) => CommandInfo::new(CommandGroup::Migrate, "migrate"),
        CommandGroupCli::Reap(_) => CommandInfo::new(CommandGroup::Reap, "reap"),
    }
}

pub fn core_call<F>(
    info: CommandInfo,
    action: F,
) -> Result<(CommandInfo, api::ExecutionOutcome)>
where
    F: FnOnce() -> anyhow::Result<api::ExecutionOutcome>,
{
    match action() {
        Ok(outcome) => Ok((info, outcome)),
        Err(err) => {
            tracing::debug!(error = %format!("{err:#}"), command = info.name, "command failed");
            Ok((info, api::error_outcome(&err)))
        }
    }
}
