// Intended public API surface for `testdb-core`.
//
// The CLI imports from here; the crate root re-exports the same items for
// tests and other callers.

pub use crate::core::config::context::{CommandContext, CommandInfo};
pub use crate::core::config::{Config, ConfigError, GlobalOptions, Settings};
pub use crate::core::fixtures::{
    destroy_leaked_test_databases, evaluate_template, remove_test_run_directories,
    run_db_migrations, template_status, update_test_databases_if_required, LeakReport, Platform,
    StatusReason, TemplateDatabase, TemplateReport, UpdateAction, UpdateReport,
};
pub use crate::core::runtime::commands::{
    migrate, reap, status, update, MigrateRequest, ReapRequest, StatusRequest, UpdateRequest,
};
pub use crate::core::runtime::effects::{
    DatabaseClient, Effects, FileSystem, FixtureGenerator, MigrationRunner, SharedEffects,
    SystemEffects,
};
pub use crate::core::runtime::errors::{error_outcome, DropDatabasesFailed};
pub use crate::core::runtime::{format_status_message, to_json_response, CommandGroup};
pub use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};
pub use testdb_domain::TemplateStatus;
