//! Pure decision logic shared by the `testdb` crates.
//!
//! Nothing in here touches the database or spawns processes; callers in
//! `testdb-core` gather the inputs (file contents, status text, marker files)
//! and hand them to these functions.

#![deny(clippy::all)]

pub mod hashing;
pub mod leak;
pub mod migrations;
pub mod status;

pub use hashing::{canonical_setting_json, content_hash, file_hash_name, setting_hash_name};
pub use leak::{
    is_leak_candidate, marker_databases, plan_leak_cleanup, run_dir_expired, LeakMarker, LeakPlan,
};
pub use migrations::{
    compare_migrations, extract_migrations, strip_ansi, MigrationName, MigrationVerdict,
};
pub use status::TemplateStatus;
