use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{bail, Context, Result};

use super::errors::DropDatabasesFailed;
use super::process::{run_command, run_command_streaming, run_command_with_input};
use crate::core::config::{ClientConfig, Config, FrameworkConfig};
use crate::core::fixtures::TemplateDatabase;

pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    fn modified(&self, path: &Path) -> Result<SystemTime>;
    fn is_dir(&self, path: &Path) -> bool;
    /// Entries of `path`, sorted by name.
    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// The web framework's migration engine.
pub trait MigrationRunner: Send + Sync {
    fn migrate(&self, database: &TemplateDatabase) -> Result<()>;
    /// Raw `showmigrations --list` output for `database`.
    fn show_migrations(&self, database: &TemplateDatabase) -> Result<String>;
}

/// Administrative access to the database server.
pub trait DatabaseClient: Send + Sync {
    /// `Err` means the server could not be asked at all.
    fn database_exists(&self, name: &str) -> Result<bool>;
    fn list_databases(&self) -> Result<Vec<String>>;
    /// Fails with [`DropDatabasesFailed`] when the client reports an error.
    fn drop_databases(&self, names: &[String]) -> Result<()>;
}

pub trait FixtureGenerator: Send + Sync {
    fn generate(&self, force: bool) -> Result<()>;
}

pub trait Effects: Send + Sync {
    fn fs(&self) -> &dyn FileSystem;
    fn migrations(&self) -> &dyn MigrationRunner;
    fn database(&self) -> &dyn DatabaseClient;
    fn fixtures(&self) -> &dyn FixtureGenerator;
}

pub type SharedEffects = Arc<dyn Effects>;

pub struct SystemEffects {
    fs: Arc<SystemFileSystem>,
    migrations: Arc<SystemMigrationRunner>,
    database: Arc<SystemDatabaseClient>,
    fixtures: Arc<SystemFixtureGenerator>,
}

impl SystemEffects {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let root = config.root().to_path_buf();
        Self {
            fs: Arc::new(SystemFileSystem),
            migrations: Arc::new(SystemMigrationRunner {
                framework: config.framework().clone(),
                root: root.clone(),
            }),
            database: Arc::new(SystemDatabaseClient {
                client: config.client().clone(),
                root: root.clone(),
            }),
            fixtures: Arc::new(SystemFixtureGenerator {
                command: config.framework().generate_fixtures.clone(),
                root,
            }),
        }
    }
}

impl Effects for SystemEffects {
    fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    fn migrations(&self) -> &dyn MigrationRunner {
        self.migrations.as_ref()
    }

    fn database(&self) -> &dyn DatabaseClient {
        self.database.as_ref()
    }

    fn fixtures(&self) -> &dyn FixtureGenerator {
        self.fixtures.as_ref()
    }
}

/// Whether `err` (or anything it wraps) is an I/O "not found".
pub(crate) fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|io_err| io_err.kind() == io::ErrorKind::NotFound)
    })
}

/// Resolves a configured program: paths are taken relative to the project
/// root, bare names are looked up on `PATH`.
fn resolve_program(program: &str, root: &Path) -> String {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return root.join(candidate).to_string_lossy().into_owned();
    }
    which::which(program)
        .unwrap_or_else(|_| PathBuf::from(program))
        .to_string_lossy()
        .into_owned()
}

pub(crate) struct SystemFileSystem;

impl FileSystem for SystemFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).with_context(|| format!("creating {}", path.display()))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).with_context(|| format!("removing file {}", path.display()))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::remove_dir_all(path).with_context(|| format!("removing dir {}", path.display()))
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("metadata for {}", path.display()))
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = std::fs::read_dir(path)
            .with_context(|| format!("reading dir {}", path.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .collect::<Vec<_>>();
        entries.sort();
        Ok(entries)
    }
}

struct SystemMigrationRunner {
    framework: FrameworkConfig,
    root: PathBuf,
}

impl SystemMigrationRunner {
    fn invocation(&self, database: &TemplateDatabase, extra: &[&str]) -> (String, Vec<String>) {
        let program = resolve_program(&self.framework.manage[0], &self.root);
        let mut args: Vec<String> = self.framework.manage[1..].to_vec();
        args.extend(extra.iter().map(ToString::to_string));
        tracing::debug!(database = %database.name, ?args, "framework command");
        (program, args)
    }

    fn envs(&self, database: &TemplateDatabase) -> Vec<(String, String)> {
        vec![
            (self.framework.settings_env.clone(), database.settings.clone()),
            (self.framework.db_name_env.clone(), database.name.clone()),
        ]
    }
}

impl MigrationRunner for SystemMigrationRunner {
    fn migrate(&self, database: &TemplateDatabase) -> Result<()> {
        let (program, args) = self.invocation(database, &["migrate", "--no-input"]);
        let output = run_command_streaming(&program, &args, &self.envs(database), &self.root)?;
        if !output.success() {
            bail!(
                "migrating {} failed: {}",
                database.name,
                output.summary()
            );
        }
        Ok(())
    }

    fn show_migrations(&self, database: &TemplateDatabase) -> Result<String> {
        let (program, args) = self.invocation(database, &["showmigrations", "--list"]);
        let output = run_command(&program, &args, &self.envs(database), &self.root)?;
        if !output.success() {
            bail!(
                "listing migrations for {} failed: {}",
                database.name,
                output.summary()
            );
        }
        Ok(output.stdout)
    }
}

struct SystemDatabaseClient {
    client: ClientConfig,
    root: PathBuf,
}

impl SystemDatabaseClient {
    fn connection_args(&self) -> Vec<String> {
        let mut args = vec!["-X".to_string(), "-h".to_string(), self.client.host.clone()];
        if let Some(user) = &self.client.user {
            args.push("-U".to_string());
            args.push(user.clone());
        }
        args
    }

    fn query(&self, sql: &str) -> Result<String> {
        let program = resolve_program(&self.client.program, &self.root);
        let mut args = self.connection_args();
        args.extend([
            "-d".to_string(),
            self.client.maintenance_db.clone(),
            "-tA".to_string(),
            "-c".to_string(),
            sql.to_string(),
        ]);
        let output = run_command(&program, &args, &[], &self.root)?;
        if !output.success() {
            bail!("{} query failed: {}", self.client.program, output.summary());
        }
        Ok(output.stdout)
    }
}

impl DatabaseClient for SystemDatabaseClient {
    fn database_exists(&self, name: &str) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM pg_database WHERE datname = {};",
            quote_literal(name)
        );
        Ok(self.query(&sql)?.trim() == "1")
    }

    fn list_databases(&self) -> Result<Vec<String>> {
        let stdout = self.query("SELECT datname FROM pg_database;")?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    fn drop_databases(&self, names: &[String]) -> Result<()> {
        let program = resolve_program(&self.client.program, &self.root);
        let mut args = vec![
            "-q".to_string(),
            "-v".to_string(),
            "ON_ERROR_STOP=1".to_string(),
        ];
        args.extend(self.connection_args());
        args.push(self.client.maintenance_db.clone());
        let script = drop_script(names);
        let output = run_command_with_input(&program, &args, &[], &self.root, Some(script.as_bytes()))
            .map_err(|err| DropDatabasesFailed {
                databases: names.to_vec(),
                detail: format!("{err:#}"),
            })?;
        if !output.success() {
            return Err(DropDatabasesFailed {
                databases: names.to_vec(),
                detail: output.summary(),
            }
            .into());
        }
        Ok(())
    }
}

struct SystemFixtureGenerator {
    command: Vec<String>,
    root: PathBuf,
}

impl FixtureGenerator for SystemFixtureGenerator {
    fn generate(&self, force: bool) -> Result<()> {
        let program = resolve_program(&self.command[0], &self.root);
        let mut args = self.command[1..].to_vec();
        if force {
            args.push("--force".to_string());
        }
        let output = run_command_streaming(&program, &args, &[], &self.root)?;
        if !output.success() {
            bail!("fixture generation failed: {}", output.summary());
        }
        Ok(())
    }
}

pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn quote_ident(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// One `DROP DATABASE IF EXISTS` statement per name, in the given order.
pub(crate) fn drop_script(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("DROP DATABASE IF EXISTS {};", quote_ident(name)))
        .collect::<Vec<_>>()
        .join("\n")
}
