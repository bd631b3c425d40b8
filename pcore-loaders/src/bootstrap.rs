//! Wiring of settings, collaborators and instantiators into a loader chain.

use std::fmt;
use std::rc::Rc;

use pcore_config::LoaderSettings;
use pcore_instantiators::{PlanDispatch, ScriptEngine, default_registry};
use pcore_loader::{LoaderContext, Loaders};
use pcore_primitives::ast::Parser;
use pcore_primitives::{FileSystem, OsFileSystem, Result};
use tracing::debug;

/// Collaborators for building a [`Loaders`] chain.
#[must_use]
pub struct Bootstrap {
    files: Rc<dyn FileSystem>,
    parser: Rc<dyn Parser>,
    engine: Option<Rc<dyn ScriptEngine>>,
    plans: PlanDispatch,
}

impl fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("script_engine", &self.engine.is_some())
            .field("plans", &self.plans)
            .finish_non_exhaustive()
    }
}

impl Bootstrap {
    /// Starts from the operating system's files and the given parser.
    pub fn new(parser: Rc<dyn Parser>) -> Self {
        Self {
            files: Rc::new(OsFileSystem::new()),
            parser,
            engine: None,
            plans: PlanDispatch::new(),
        }
    }

    /// Reads sources through `files` instead of the operating system.
    pub fn with_files(mut self, files: Rc<dyn FileSystem>) -> Self {
        self.files = files;
        self
    }

    /// Enables script sources, evaluated by `engine`.
    pub fn with_script_engine(mut self, engine: Rc<dyn ScriptEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replaces the plan dispatch, e.g. to support non-`.pp` plans.
    pub fn with_plans(mut self, plans: PlanDispatch) -> Self {
        self.plans = plans;
        self
    }

    /// Builds the loader chain for `settings`.
    ///
    /// # Errors
    ///
    /// See [`Loaders::new`].
    pub fn build(self, settings: &LoaderSettings) -> Result<Rc<Loaders>> {
        let registry = default_registry(self.engine, self.plans);
        debug!(instantiators = registry.len(), "bootstrapping loaders");
        let context = LoaderContext::new(self.files, self.parser, registry)
            .with_environment(settings.environment_name())
            .with_tasks(settings.tasks());
        Loaders::new(settings, Rc::new(context))
    }
}

/// Builds the loader chain for `settings` over the operating system's files,
/// without script support.
///
/// # Errors
///
/// See [`Loaders::new`].
pub fn bootstrap(settings: &LoaderSettings, parser: Rc<dyn Parser>) -> Result<Rc<Loaders>> {
    Bootstrap::new(parser).build(settings)
}
