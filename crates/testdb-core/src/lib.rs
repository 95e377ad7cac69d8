#![deny(clippy::all)]

mod core;

pub mod api;

pub(crate) use crate::core::config::context;
pub(crate) use crate::core::runtime::effects;
pub(crate) use crate::core::tooling::outcome;

pub use crate::core::config::context::{CommandContext, CommandInfo};
pub use crate::core::config::{
    CleanupConfig, ClientConfig, Config, ConfigError, FrameworkConfig, GlobalOptions, PathsConfig,
    Settings, TrackingConfig,
};
pub use crate::core::fixtures::{
    destroy_leaked_test_databases, evaluate_template, remove_test_run_directories,
    run_db_migrations, template_status, update_test_databases_if_required, LeakReport, Platform,
    StatusReason, TemplateDatabase, TemplateReport, UpdateAction, UpdateReport,
};
pub use crate::core::runtime::commands::{
    migrate, reap, status, update, MigrateRequest, ReapRequest, StatusRequest, UpdateRequest,
};
pub use crate::core::runtime::effects::{Effects, SharedEffects, SystemEffects};
pub use crate::core::runtime::errors::{error_outcome, DropDatabasesFailed};
pub use crate::core::runtime::process::RunOutput;
pub use crate::core::runtime::{format_status_message, to_json_response, CommandGroup};
pub use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};
pub use testdb_domain::TemplateStatus;
