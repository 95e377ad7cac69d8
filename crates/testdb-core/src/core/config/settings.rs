use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::fixtures::{Platform, TemplateDatabase};

pub const CONFIG_FILE_NAME: &str = "testdb.toml";
pub const DEFAULT_EXPIRY_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub config: Option<String>,
    pub root: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config file {} not found", .path.display())]
    Missing { path: PathBuf },
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not valid: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid value `{value}` for {key}")]
    InvalidEnv { key: String, value: String },
    #[error("`{field}` must not be empty")]
    Empty { field: &'static str },
}

impl ConfigError {
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ConfigError::Missing { .. } => "missing_config",
            ConfigError::Read { .. } => "unreadable_config",
            ConfigError::Parse { .. } => "invalid_config",
            ConfigError::InvalidEnv { .. } => "invalid_env",
            ConfigError::Empty { .. } => "empty_setting",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Contents of `testdb.toml`. Every field has a default, so an absent file
/// behaves like an empty one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub var_dir: PathBuf,
    pub template_database_dir: PathBuf,
    pub run_dir: PathBuf,
    pub digests_dir: PathBuf,
    pub expiry_secs: u64,
    pub leak_prefix: Option<String>,
    pub tracked_files: Vec<PathBuf>,
    pub tracked_settings: BTreeMap<String, Value>,
    pub migration_extra_files: Vec<PathBuf>,
    pub framework: FrameworkSettings,
    pub client: ClientSettings,
    pub databases: DatabaseSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            var_dir: PathBuf::from("var"),
            template_database_dir: PathBuf::from("test-backend/databases"),
            run_dir: PathBuf::from("test-backend"),
            digests_dir: PathBuf::from("digests"),
            expiry_secs: DEFAULT_EXPIRY_SECS,
            leak_prefix: None,
            tracked_files: Vec::new(),
            tracked_settings: BTreeMap::new(),
            migration_extra_files: vec![PathBuf::from("requirements/dev.txt")],
            framework: FrameworkSettings::default(),
            client: ClientSettings::default(),
            databases: DatabaseSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameworkSettings {
    pub manage: Vec<String>,
    pub settings_env: String,
    pub db_name_env: String,
    pub generate_fixtures: Vec<String>,
}

impl Default for FrameworkSettings {
    fn default() -> Self {
        Self {
            manage: vec!["./manage.py".to_string()],
            settings_env: "DJANGO_SETTINGS_MODULE".to_string(),
            db_name_env: "TESTDB_DB_NAME".to_string(),
            generate_fixtures: vec!["tools/setup/generate-fixtures".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSettings {
    pub program: String,
    pub host: String,
    pub user: Option<String>,
    pub maintenance_db: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            program: "psql".to_string(),
            host: "localhost".to_string(),
            user: None,
            maintenance_db: "postgres".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSettings {
    pub dev: DatabaseEntry,
    pub test: DatabaseEntry,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            dev: DatabaseEntry {
                name: "app".to_string(),
                settings: "project.settings".to_string(),
            },
            test: DatabaseEntry {
                name: "app_test_template".to_string(),
                settings: "project.test_settings".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseEntry {
    pub name: String,
    pub settings: String,
}

impl Settings {
    /// Loads settings from `explicit`, or from `testdb.toml` under `root`
    /// when no path is given. A missing default file yields the defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when an explicit file is missing or any file
    /// cannot be read or parsed.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => root.join(path),
            None => root.join(CONFIG_FILE_NAME),
        };
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                if explicit.is_some() {
                    return Err(ConfigError::Missing { path });
                }
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        Self::from_toml_str(&contents, &path)
    }

    /// Parses settings from TOML text; `path` is only used in errors.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml_edit::de::from_str(contents).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string().trim().to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub var_dir: PathBuf,
    pub template_database_dir: PathBuf,
    pub run_root: PathBuf,
    pub digests_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FrameworkConfig {
    pub manage: Vec<String>,
    pub settings_env: String,
    pub db_name_env: String,
    pub generate_fixtures: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub program: String,
    pub host: String,
    pub user: Option<String>,
    pub maintenance_db: String,
}

#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub files: Vec<PathBuf>,
    pub settings: BTreeMap<String, Value>,
    pub migration_extra_files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub expiry: Duration,
    pub leak_prefix: String,
}

#[derive(Debug)]
pub struct Config {
    pub(crate) root: PathBuf,
    pub(crate) paths: PathsConfig,
    pub(crate) framework: FrameworkConfig,
    pub(crate) client: ClientConfig,
    pub(crate) tracking: TrackingConfig,
    pub(crate) cleanup: CleanupConfig,
    pub(crate) dev: TemplateDatabase,
    pub(crate) test: TemplateDatabase,
}

impl Config {
    /// Builds a configuration from the config file and the current process
    /// environment.
    ///
    /// # Errors
    /// Returns an error if the project root cannot be determined or the
    /// configuration is invalid (see [`ConfigError`]).
    pub fn load(global: &GlobalOptions) -> anyhow::Result<Self> {
        let root = match &global.root {
            Some(root) => PathBuf::from(root),
            None => env::current_dir().context("failed to determine the current directory")?,
        };
        let settings = Settings::load(&root, global.config.as_deref().map(Path::new))?;
        let snapshot = EnvSnapshot::capture();
        Ok(Self::from_snapshot(&snapshot, root, settings)?)
    }

    pub(crate) fn from_snapshot(
        snapshot: &EnvSnapshot,
        root: PathBuf,
        settings: Settings,
    ) -> Result<Self, ConfigError> {
        let var_dir = root.join(
            snapshot
                .var("TESTDB_VAR_DIR")
                .map_or(settings.var_dir, PathBuf::from),
        );
        let expiry_secs = match snapshot.var("TESTDB_EXPIRY_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidEnv {
                    key: "TESTDB_EXPIRY_SECS".to_string(),
                    value: raw.to_string(),
                })?,
            None => settings.expiry_secs,
        };

        if settings.framework.manage.is_empty() {
            return Err(ConfigError::Empty {
                field: "framework.manage",
            });
        }
        if settings.framework.generate_fixtures.is_empty() {
            return Err(ConfigError::Empty {
                field: "framework.generate_fixtures",
            });
        }

        let client = ClientConfig {
            program: snapshot
                .var("TESTDB_PSQL")
                .map_or(settings.client.program, ToOwned::to_owned),
            host: snapshot
                .var("TESTDB_DB_HOST")
                .map_or(settings.client.host, ToOwned::to_owned),
            user: snapshot
                .var("TESTDB_DB_USER")
                .map(ToOwned::to_owned)
                .or(settings.client.user),
            maintenance_db: settings.client.maintenance_db,
        };
        if client.program.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "client.program",
            });
        }

        let test = TemplateDatabase::new(
            Platform::Test,
            settings.databases.test.name,
            settings.databases.test.settings,
        );
        let dev = TemplateDatabase::new(
            Platform::Dev,
            settings.databases.dev.name,
            settings.databases.dev.settings,
        );
        let leak_prefix = settings
            .leak_prefix
            .unwrap_or_else(|| format!("{}_", test.name));

        Ok(Self {
            paths: PathsConfig {
                template_database_dir: var_dir.join(settings.template_database_dir),
                run_root: var_dir.join(settings.run_dir),
                digests_dir: var_dir.join(settings.digests_dir),
                var_dir,
            },
            framework: FrameworkConfig {
                manage: settings.framework.manage,
                settings_env: settings.framework.settings_env,
                db_name_env: settings.framework.db_name_env,
                generate_fixtures: settings.framework.generate_fixtures,
            },
            client,
            tracking: TrackingConfig {
                files: settings.tracked_files,
                settings: settings.tracked_settings,
                migration_extra_files: settings.migration_extra_files,
            },
            cleanup: CleanupConfig {
                expiry: Duration::from_secs(expiry_secs),
                leak_prefix,
            },
            dev,
            test,
            root,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    #[must_use]
    pub fn framework(&self) -> &FrameworkConfig {
        &self.framework
    }

    #[must_use]
    pub fn client(&self) -> &ClientConfig {
        &self.client
    }

    #[must_use]
    pub fn tracking(&self) -> &TrackingConfig {
        &self.tracking
    }

    #[must_use]
    pub fn cleanup(&self) -> &CleanupConfig {
        &self.cleanup
    }

    #[must_use]
    pub fn database(&self, platform: Platform) -> &TemplateDatabase {
        match platform {
            Platform::Dev => &self.dev,
            Platform::Test => &self.test,
        }
    }
}
