use serde_json::json;

use crate::core::config::ConfigError;
use crate::outcome::ExecutionOutcome;

/// The database client refused to drop leaked databases. Cleanup cannot
/// continue safely, so this is always fatal.
#[derive(thiserror::Error, Debug)]
#[error("error cleaning up test databases: {detail}")]
pub struct DropDatabasesFailed {
    pub databases: Vec<String>,
    pub detail: String,
}

/// Maps an error escaping a command handler onto an outcome.
#[must_use]
pub fn error_outcome(err: &anyhow::Error) -> ExecutionOutcome {
    if let Some(config) = err.downcast_ref::<ConfigError>() {
        return ExecutionOutcome::user_error(
            config.to_string(),
            json!({
                "reason": config.reason(),
                "hint": "Fix testdb.toml (or the TESTDB_* variables) and rerun.",
            }),
        );
    }
    let issues: Vec<String> = err.chain().map(ToString::to_string).collect();
    if let Some(drop) = err.downcast_ref::<DropDatabasesFailed>() {
        return ExecutionOutcome::failure(
            drop.to_string(),
            json!({
                "reason": "drop_failed",
                "databases": drop.databases,
                "issues": issues,
            }),
        );
    }
    ExecutionOutcome::failure(
        err.to_string(),
        json!({
            "reason": "internal_error",
            "error": err.to_string(),
            "issues": issues,
            "hint": "Re-run with `-vv` for subprocess details.",
        }),
    )
}
