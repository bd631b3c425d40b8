//! Strongly typed configuration schemas.

use std::path::{Path, PathBuf};

use pcore_primitives::{Error, Result};
use serde::{Deserialize, Serialize};

fn default_environment_name() -> String {
    "production".to_owned()
}

/// Where a compilation finds its environment, modules and system library.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderSettings {
    #[serde(default = "default_environment_name")]
    environment_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    environment_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    module_path: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_path: Option<PathBuf>,
    #[serde(default)]
    tasks: bool,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            environment_name: default_environment_name(),
            environment_path: None,
            module_path: Vec::new(),
            system_path: None,
            tasks: false,
        }
    }
}

impl LoaderSettings {
    /// Creates settings for the named environment.
    #[must_use]
    pub fn new(environment_name: impl Into<String>) -> Self {
        Self {
            environment_name: environment_name.into(),
            ..Self::default()
        }
    }

    /// Replaces the environment name.
    #[must_use]
    pub fn with_environment_name(mut self, name: impl Into<String>) -> Self {
        self.environment_name = name.into();
        self
    }

    /// Sets the environment directory.
    #[must_use]
    pub fn with_environment_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.environment_path = Some(path.into());
        self
    }

    /// Replaces the module path.
    #[must_use]
    pub fn with_module_path<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.module_path = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the system library directory searched for script functions and data types.
    #[must_use]
    pub fn with_system_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_path = Some(path.into());
        self
    }

    /// Enables or disables task and plan loading.
    #[must_use]
    pub fn with_tasks(mut self, enabled: bool) -> Self {
        self.tasks = enabled;
        self
    }

    /// Returns the environment name.
    #[must_use]
    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    /// Returns the environment directory.
    #[must_use]
    pub fn environment_path(&self) -> Option<&Path> {
        self.environment_path.as_deref()
    }

    /// Returns the module path, highest precedence first.
    #[must_use]
    pub fn module_path(&self) -> &[PathBuf] {
        &self.module_path
    }

    /// Returns the system library directory.
    #[must_use]
    pub fn system_path(&self) -> Option<&Path> {
        self.system_path.as_deref()
    }

    /// Returns `true` when tasks and plans are loadable.
    #[must_use]
    pub const fn tasks(&self) -> bool {
        self.tasks
    }

    /// Checks the settings for values no loader chain can be built from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty environment name or an
    /// empty module path entry.
    pub fn validate(&self) -> Result<()> {
        if self.environment_name.trim().is_empty() {
            return Err(Error::InvalidConfig {
                reason: "environment name cannot be empty".into(),
            });
        }
        if self.module_path.iter().any(|path| path.as_os_str().is_empty()) {
            return Err(Error::InvalidConfig {
                reason: "module path entries cannot be empty".into(),
            });
        }
        Ok(())
    }
}

/// The parts of a module's `metadata.json` the loaders care about.
///
/// Other keys are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Forge name, e.g. `puppetlabs-stdlib`.
    #[serde(default)]
    pub name: Option<String>,
    /// Module version.
    #[serde(default)]
    pub version: Option<String>,
    /// Declared dependencies.
    #[serde(default)]
    pub dependencies: Vec<ModuleDependency>,
}

impl ModuleMetadata {
    /// Parses `metadata.json` text.
    ///
    /// # Errors
    ///
    /// Propagates JSON syntax and shape errors.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Returns the short names of the declared dependencies, in order.
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(ModuleDependency::module_name)
    }
}

/// One entry of `metadata.json`'s `dependencies` array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDependency {
    /// Qualified name, e.g. `puppetlabs/stdlib`.
    pub name: String,
    /// Accepted versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_requirement: Option<String>,
}

impl ModuleDependency {
    /// Returns the module name without its author prefix.
    #[must_use]
    pub fn module_name(&self) -> &str {
        self.name
            .split_once(['/', '-'])
            .map_or(self.name.as_str(), |(_, module)| module)
    }
}
