use std::path::PathBuf;

use clap::{value_parser, ArgAction, Args, Parser, Subcommand, ValueEnum};
use testdb_core::api::Platform;

pub const TESTDB_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nGlobal options:\n{options}\n";

pub const TESTDB_BEFORE_HELP: &str = concat!(
    "testdb ",
    env!("CARGO_PKG_VERSION"),
    " – Template database upkeep for test suites\n\n",
    "\x1b[1;36mCommands\x1b[0m\n",
    "  status           Report whether a template database is current.\n",
    "  update           Rebuild or migrate the test template when its inputs changed.\n",
    "  migrate          Apply migrations and record the resulting status.\n",
    "  reap             Drop leaked test databases and expired run directories.\n",
);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = TESTDB_BEFORE_HELP,
    help_template = TESTDB_HELP_TEMPLATE
)]
#[allow(clippy::struct_excessive_bools)]
pub struct TestdbCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[arg(
        long,
        value_name = "PATH",
        value_parser = value_parser!(PathBuf),
        help = "Read settings from PATH instead of ./testdb.toml",
        global = true
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        value_name = "DIR",
        value_parser = value_parser!(PathBuf),
        help = "Project root (defaults to the current directory)",
        global = true
    )]
    pub root: Option<PathBuf>,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(
        about = "Report whether a template database is current.",
        long_about = "Evaluate the template database and print needs_rebuild, run_migrations, or current. Evaluation refreshes the recorded input hashes."
    )]
    Status(PlatformArgs),
    #[command(about = "Rebuild or migrate the test template when its inputs changed.")]
    Update(UpdateArgs),
    #[command(about = "Apply migrations and record the resulting status.")]
    Migrate(PlatformArgs),
    #[command(about = "Drop leaked test databases and expired run directories.")]
    Reap(ReapArgs),
}

#[derive(Args, Debug)]
pub struct PlatformArgs {
    #[arg(
        long,
        value_enum,
        default_value_t = PlatformArg::Test,
        help = "Which template database to act on"
    )]
    pub platform: PlatformArg,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[arg(long, help = "Regenerate fixtures from scratch even if nothing changed")]
    pub force: bool,
    #[arg(
        long = "rebuild-test-db",
        help = "Regenerate fixtures even when the template is current"
    )]
    pub rebuild_test_db: bool,
}

#[derive(Args, Debug)]
pub struct ReapArgs {
    #[arg(
        long,
        value_name = "SECS",
        help = "Treat markers and run directories older than SECS as stale"
    )]
    pub expiry: Option<u64>,
    #[arg(long, help = "Leave leaked databases alone")]
    pub skip_databases: bool,
    #[arg(long, help = "Leave run directories alone")]
    pub skip_run_dirs: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Dev,
    Test,
}

impl From<PlatformArg> for Platform {
    fn from(value: PlatformArg) -> Self {
        match value {
            PlatformArg::Dev => Platform::Dev,
            PlatformArg::Test => Platform::Test,
        }
    }
}
