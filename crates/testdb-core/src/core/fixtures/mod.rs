mod database;
mod digest;
mod hash_store;
mod lifecycle;
mod migration_status;
mod reaper;
mod template;

#[cfg(test)]
pub(crate) mod testing;

pub use database::{Platform, TemplateDatabase};
pub use lifecycle::{
    run_db_migrations, update_test_databases_if_required, UpdateAction, UpdateReport,
};
pub use reaper::{destroy_leaked_test_databases, remove_test_run_directories, LeakReport};
pub use template::{evaluate_template, template_status, StatusReason, TemplateReport};
