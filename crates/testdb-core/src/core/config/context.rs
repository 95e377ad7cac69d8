use std::path::Path;

use crate::core::config::Config;
use crate::core::runtime::CommandGroup;
use crate::effects::{self, SharedEffects};

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub group: CommandGroup,
    pub name: &'static str,
}

impl CommandInfo {
    #[must_use]
    pub const fn new(group: CommandGroup, name: &'static str) -> Self {
        Self { group, name }
    }
}

/// Resolved configuration plus the effects a command uses to touch the
/// outside world.
pub struct CommandContext {
    config: Config,
    effects: SharedEffects,
}

impl CommandContext {
    #[must_use]
    pub fn new(config: Config, effects: SharedEffects) -> Self {
        Self { config, effects }
    }

    pub fn fs(&self) -> &dyn effects::FileSystem {
        self.effects.fs()
    }

    pub fn migrations(&self) -> &dyn effects::MigrationRunner {
        self.effects.migrations()
    }

    pub fn database(&self) -> &dyn effects::DatabaseClient {
        self.effects.database()
    }

    pub fn fixtures(&self) -> &dyn effects::FixtureGenerator {
        self.effects.fixtures()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root(&self) -> &Path {
        self.config.root()
    }

    pub fn var_dir(&self) -> &Path {
        &self.config.paths().var_dir
    }
}
