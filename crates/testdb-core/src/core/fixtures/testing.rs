//! Fakes for the external effects, shared by the fixture tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use tempfile::TempDir;

use crate::core::config::settings::EnvSnapshot;
use crate::core::config::{Config, Settings};
use crate::core::fixtures::TemplateDatabase;
use crate::core::runtime::errors::DropDatabasesFailed;
use crate::effects::{
    DatabaseClient, Effects, FileSystem, FixtureGenerator, MigrationRunner, SystemFileSystem,
};
use crate::CommandContext;

static REAL_FS: SystemFileSystem = SystemFileSystem;

pub(crate) fn real_fs() -> &'static dyn FileSystem {
    &REAL_FS
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Presence {
    Present,
    Absent,
    Unreachable,
}

/// Every external effect in one struct, recording each call in `log`.
pub(crate) struct FakeEffects {
    pub(crate) presence: Mutex<Presence>,
    /// `None` makes listing fail.
    pub(crate) live: Mutex<Option<Vec<String>>>,
    pub(crate) migration_status: Mutex<String>,
    pub(crate) fail_migrate: Mutex<bool>,
    pub(crate) fail_drop: Mutex<bool>,
    log: Mutex<Vec<String>>,
}

impl Default for FakeEffects {
    fn default() -> Self {
        Self {
            presence: Mutex::new(Presence::Present),
            live: Mutex::new(Some(Vec::new())),
            migration_status: Mutex::new(String::new()),
            fail_migrate: Mutex::new(false),
            fail_drop: Mutex::new(false),
            log: Mutex::new(Vec::new()),
        }
    }
}

impl FakeEffects {
    pub(crate) fn set_presence(&self, presence: Presence) {
        *self.presence.lock().unwrap() = presence;
    }

    pub(crate) fn set_live(&self, live: Option<&[&str]>) {
        *self.live.lock().unwrap() =
            live.map(|names| names.iter().map(ToString::to_string).collect());
    }

    pub(crate) fn set_migration_status(&self, status: &str) {
        *self.migration_status.lock().unwrap() = status.to_string();
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }
}

impl Effects for FakeEffects {
    fn fs(&self) -> &dyn FileSystem {
        &REAL_FS
    }

    fn migrations(&self) -> &dyn MigrationRunner {
        self
    }

    fn database(&self) -> &dyn DatabaseClient {
        self
    }

    fn fixtures(&self) -> &dyn FixtureGenerator {
        self
    }
}

impl MigrationRunner for FakeEffects {
    fn migrate(&self, database: &TemplateDatabase) -> Result<()> {
        self.record(format!("migrate {}", database.name));
        if *self.fail_migrate.lock().unwrap() {
            return Err(anyhow!("migration 0002_add_stream failed"));
        }
        Ok(())
    }

    fn show_migrations(&self, database: &TemplateDatabase) -> Result<String> {
        self.record(format!("showmigrations {}", database.name));
        Ok(self.migration_status.lock().unwrap().clone())
    }
}

impl DatabaseClient for FakeEffects {
    fn database_exists(&self, name: &str) -> Result<bool> {
        self.record(format!("exists {name}"));
        match *self.presence.lock().unwrap() {
            Presence::Present => Ok(true),
            Presence::Absent => Ok(false),
            Presence::Unreachable => Err(anyhow!("could not connect to server")),
        }
    }

    fn list_databases(&self) -> Result<Vec<String>> {
        self.record("list".to_string());
        self.live
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("could not connect to server"))
    }

    fn drop_databases(&self, names: &[String]) -> Result<()> {
        self.record(format!("drop {}", names.join(",")));
        if *self.fail_drop.lock().unwrap() {
            return Err(DropDatabasesFailed {
                databases: names.to_vec(),
                detail: "database is being accessed by other users".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl FixtureGenerator for FakeEffects {
    fn generate(&self, force: bool) -> Result<()> {
        self.record(if force {
            "generate --force".to_string()
        } else {
            "generate".to_string()
        });
        Ok(())
    }
}

/// A scratch project root plus fakes, handing out command contexts.
pub(crate) struct Harness {
    pub(crate) temp: TempDir,
    pub(crate) fake: Arc<FakeEffects>,
    pub(crate) settings: Settings,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self {
            temp: tempfile::tempdir().unwrap(),
            fake: Arc::new(FakeEffects::default()),
            settings: Settings::default(),
        }
    }

    pub(crate) fn root(&self) -> &Path {
        self.temp.path()
    }

    pub(crate) fn config(&self) -> Config {
        Config::from_snapshot(
            &EnvSnapshot::testing(&[]),
            self.root().to_path_buf(),
            self.settings.clone(),
        )
        .unwrap()
    }

    pub(crate) fn context(&self) -> CommandContext {
        CommandContext::new(self.config(), self.fake.clone())
    }

    /// Writes `contents` to `relative` under the project root.
    pub(crate) fn write(&self, relative: &str, contents: &str) {
        let path = self.root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }
}
