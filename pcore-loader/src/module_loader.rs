//! Loader resolving names below one module or environment root.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use pcore_primitives::ast::Parser;
use pcore_primitives::{EntityKind, Error, FileSystem, Result, TypedName};
use tracing::debug;

use crate::base::BaseLoader;
use crate::entity::Value;
use crate::entry::NamedEntry;
use crate::instantiator::{InstantiationRequest, InstantiatorRegistry};
use crate::loader::{Discovery, Loader, LoaderKind, LoaderRef};
use crate::loaders::Loaders;
use crate::smart_path::{Loadable, SmartPath, SmartPaths};

/// Collaborators shared by every path-based loader of one compilation.
pub struct LoaderContext {
    files: Rc<dyn FileSystem>,
    parser: Rc<dyn Parser>,
    instantiators: InstantiatorRegistry,
    environment: String,
    tasks_enabled: bool,
}

impl LoaderContext {
    /// Creates a context for the `production` environment with tasks disabled.
    #[must_use]
    pub fn new(
        files: Rc<dyn FileSystem>,
        parser: Rc<dyn Parser>,
        instantiators: InstantiatorRegistry,
    ) -> Self {
        Self {
            files,
            parser,
            instantiators,
            environment: "production".to_owned(),
            tasks_enabled: false,
        }
    }

    /// Sets the environment name handed to instantiators.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Enables or disables task and plan loading.
    #[must_use]
    pub fn with_tasks(mut self, enabled: bool) -> Self {
        self.tasks_enabled = enabled;
        self
    }

    /// Returns the file provider.
    #[must_use]
    pub fn files(&self) -> &dyn FileSystem {
        self.files.as_ref()
    }

    /// Returns the parser.
    #[must_use]
    pub fn parser(&self) -> &dyn Parser {
        self.parser.as_ref()
    }

    /// Returns the instantiator registry.
    #[must_use]
    pub fn instantiators(&self) -> &InstantiatorRegistry {
        &self.instantiators
    }

    /// Returns the environment name.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Returns `true` when tasks and plans are loadable.
    #[must_use]
    pub const fn tasks_enabled(&self) -> bool {
        self.tasks_enabled
    }
}

impl fmt::Debug for LoaderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderContext")
            .field("instantiators", &self.instantiators)
            .field("environment", &self.environment)
            .field("tasks_enabled", &self.tasks_enabled)
            .finish_non_exhaustive()
    }
}

/// Module name of the environment loader.
pub const ENVIRONMENT: &str = "environment";

/// Path-based loader for one module, or for a global component such as the
/// environment.
///
/// A global loader serves unqualified names of every kind. Qualified names
/// are served only when their first segment is the module name, so a loader
/// without one serves none.
pub struct ModuleLoader {
    base: BaseLoader,
    module_name: Option<String>,
    global: bool,
    root: PathBuf,
    smart_paths: SmartPaths,
    context: Rc<LoaderContext>,
    loaders: Weak<Loaders>,
    private_loader: RefCell<Weak<Loader>>,
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("name", &self.base.name())
            .field("module_name", &self.module_name)
            .field("root", &self.root)
            .field("smart_paths", &self.smart_paths)
            .finish_non_exhaustive()
    }
}

impl ModuleLoader {
    /// Starts building a loader rooted at `root`.
    #[must_use]
    pub fn builder(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        context: Rc<LoaderContext>,
    ) -> ModuleLoaderBuilder {
        ModuleLoaderBuilder {
            name: name.into(),
            root: root.into(),
            context,
            module_name: None,
            global: false,
            parent: None,
            loadables: Loadable::MODULE.to_vec(),
            allow_shadowing: false,
            loaders: Weak::new(),
        }
    }

    pub(crate) fn base(&self) -> &BaseLoader {
        &self.base
    }

    /// Returns the module name; `None` for system and resource type loaders.
    #[must_use]
    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// Returns `true` for a loader without a module name or one marked global.
    #[must_use]
    pub const fn is_global(&self) -> bool {
        self.global || self.module_name.is_none()
    }

    /// Module prefix of names derived from file paths; `None` when paths spell
    /// full names.
    fn namespace(&self) -> Option<&str> {
        if self.is_global() { None } else { self.module_name() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the smart paths searched.
    #[must_use]
    pub fn smart_paths(&self) -> &SmartPaths {
        &self.smart_paths
    }

    /// Assigns the loader that code found here resolves names in.
    ///
    /// Only a weak reference is kept; the owner must keep `loader` alive.
    pub fn set_private_loader(&self, loader: &LoaderRef) {
        *self.private_loader.borrow_mut() = Rc::downgrade(loader);
    }

    pub(crate) fn private_loader(&self, this: &LoaderRef) -> LoaderRef {
        let assigned = self.private_loader.borrow().upgrade();
        if let Some(loader) = assigned {
            return loader;
        }
        let resolved = self
            .loaders
            .upgrade()
            .zip(self.namespace())
            .and_then(|(loaders, module)| loaders.private_loader_for_module(module));
        match resolved {
            Some(loader) => {
                self.set_private_loader(&loader);
                loader
            }
            None => Rc::clone(this),
        }
    }

    const fn start_index(&self) -> usize {
        if self.is_global() { 0 } else { 1 }
    }

    pub(crate) fn find(&self, this: &LoaderRef, typed_name: &TypedName) -> Result<Option<NamedEntry>> {
        if !typed_name.authority().is_runtime() {
            return Ok(None);
        }
        let first = typed_name.name_parts()[0].as_str();
        if typed_name.is_qualified() {
            if self.module_name.as_deref() != Some(first) {
                return Ok(None);
            }
        } else if let Some(module) = self.namespace() {
            match typed_name.kind() {
                EntityKind::Function | EntityKind::ResourceType | EntityKind::ResourceTypeImpl => {}
                EntityKind::Plan | EntityKind::Task => {
                    if first != module {
                        return Ok(None);
                    }
                    let init = TypedName::new(typed_name.kind(), &format!("{module}::init"));
                    return self.load_from(this, &init, typed_name, |_| true);
                }
                EntityKind::Type => {
                    if first != module {
                        return self.load_from(this, typed_name, typed_name, |path| {
                            path.loadable() == Loadable::RubyDataType
                        });
                    }
                    return self.find_init_typeset(this, module, typed_name);
                }
                EntityKind::TypeAlias => return Ok(None),
            }
        }

        if let Some(entry) = self.load_from(this, typed_name, typed_name, |_| true)? {
            return Ok(Some(entry));
        }
        if typed_name.kind() == EntityKind::Type && typed_name.is_qualified() {
            return self.find_in_type_sets(this, typed_name);
        }
        Ok(None)
    }

    fn find_init_typeset(
        &self,
        this: &LoaderRef,
        module: &str,
        typed_name: &TypedName,
    ) -> Result<Option<NamedEntry>> {
        let init = TypedName::new(EntityKind::Type, &format!("{module}::init_typeset"));
        let Some((path, candidates)) = self.locate(&init, |_| true)? else {
            return Ok(None);
        };
        let value = self.instantiate(this, path, &candidates, typed_name)?;
        if !matches!(value, Value::TypeSet(_)) {
            return Err(Error::instantiation(
                typed_name.name(),
                candidates[0].display().to_string(),
                format!("does not define the TypeSet '{}'", capitalize(module)),
            ));
        }
        self.bind(typed_name, value, &candidates[0]).map(Some)
    }

    fn find_in_type_sets(&self, this: &LoaderRef, typed_name: &TypedName) -> Result<Option<NamedEntry>> {
        let mut candidate = typed_name.parent();
        while let Some(set_name) = candidate {
            let entry = match self.base.cache().get_found(&set_name) {
                Some(entry) => Some(entry),
                None => self.find(this, &set_name)?,
            };
            if let Some(Value::TypeSet(type_set)) = entry.as_ref().and_then(NamedEntry::value) {
                type_set.resolve(this)?;
                if let Some(found) = self.base.cache().get_found(typed_name) {
                    return Ok(Some(found));
                }
            }
            candidate = set_name.parent();
        }
        Ok(None)
    }

    fn locate(
        &self,
        lookup: &TypedName,
        accept: impl Fn(&SmartPath) -> bool,
    ) -> Result<Option<(&SmartPath, Vec<PathBuf>)>> {
        let files = self.context.files();
        for path in self.smart_paths.for_kind(lookup.kind()).filter(|path| accept(path)) {
            if !path.meaningful_to_search(files)? {
                continue;
            }
            let candidates = path.candidates(files, lookup, self.start_index())?;
            if !candidates.is_empty() {
                return Ok(Some((path, candidates)));
            }
        }
        Ok(None)
    }

    fn load_from(
        &self,
        this: &LoaderRef,
        lookup: &TypedName,
        typed_name: &TypedName,
        accept: impl Fn(&SmartPath) -> bool,
    ) -> Result<Option<NamedEntry>> {
        let Some((path, candidates)) = self.locate(lookup, accept)? else {
            return Ok(None);
        };
        let value = self.instantiate(this, path, &candidates, typed_name)?;
        self.bind(typed_name, value, &candidates[0]).map(Some)
    }

    fn instantiate(
        &self,
        this: &LoaderRef,
        path: &SmartPath,
        candidates: &[PathBuf],
        typed_name: &TypedName,
    ) -> Result<Value> {
        let loadable = path.loadable();
        let origin = &candidates[0];
        let instantiator = self
            .context
            .instantiators()
            .get(loadable.format(), loadable.kind())
            .ok_or_else(|| {
                Error::instantiation(
                    typed_name.name(),
                    origin.display().to_string(),
                    format!("has no instantiator for {:?} {}", loadable.format(), loadable.kind()),
                )
            })?;
        let source = if loadable.match_many() {
            None
        } else {
            Some(
                self.context
                    .files()
                    .read(origin)
                    .map_err(|source| Error::io(origin, source))?,
            )
        };
        debug!(
            loader = %self.base.name(),
            name = %typed_name,
            origin = %origin.display(),
            "instantiating"
        );
        instantiator.create(&InstantiationRequest {
            loader: this,
            typed_name,
            origin,
            source: source.as_deref(),
            candidates,
            files: self.context.files(),
            parser: self.context.parser(),
            environment: self.context.environment(),
        })
    }

    fn bind(&self, typed_name: &TypedName, value: Value, origin: &Path) -> Result<NamedEntry> {
        self.base
            .set_entry(typed_name, value, Some(origin.display().to_string()))
    }

    pub(crate) fn discover_local(&self, this: &LoaderRef, request: &Discovery) -> Vec<TypedName> {
        if request.authority().is_runtime() {
            let files = self.context.files();
            let mut seen = HashSet::new();
            for path in self.smart_paths.for_kind(request.kind()) {
                let index = match path.index(files) {
                    Ok(index) => index,
                    Err(error) => {
                        request.report(error);
                        continue;
                    }
                };
                for file in index {
                    let Some(name) = path.typed_name(file, self.namespace()) else {
                        continue;
                    };
                    if !request.accepts(&name) || !seen.insert(name.clone()) {
                        continue;
                    }
                    if let Err(error) = this.load_typed(&name) {
                        request.report(error);
                    }
                }
            }
        }
        self.base.discover_own(request)
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

/// Builder for [`ModuleLoader`].
#[derive(Debug)]
pub struct ModuleLoaderBuilder {
    name: String,
    root: PathBuf,
    context: Rc<LoaderContext>,
    module_name: Option<String>,
    global: bool,
    parent: Option<LoaderRef>,
    loadables: Vec<Loadable>,
    allow_shadowing: bool,
    loaders: Weak<Loaders>,
}

impl ModuleLoaderBuilder {
    /// Restricts the loader to one module's namespace.
    #[must_use]
    pub fn module_name(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = Some(module_name.into());
        self
    }

    /// Serves unqualified names of every kind and maps paths to full names,
    /// as the environment does.
    #[must_use]
    pub fn global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    /// Sets the parent loader.
    #[must_use]
    pub fn parent(mut self, parent: LoaderRef) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Replaces the searched loadables. Defaults to [`Loadable::MODULE`].
    #[must_use]
    pub fn loadables(mut self, loadables: &[Loadable]) -> Self {
        self.loadables = loadables.to_vec();
        self
    }

    /// Lets bound types replace types visible from ancestors.
    #[must_use]
    pub fn allow_shadowing(mut self, allow: bool) -> Self {
        self.allow_shadowing = allow;
        self
    }

    /// Links the aggregator that resolves the module's private loader.
    #[must_use]
    pub fn loaders(mut self, loaders: Weak<Loaders>) -> Self {
        self.loaders = loaders;
        self
    }

    /// Finishes the loader.
    #[must_use]
    pub fn build(self) -> LoaderRef {
        let smart_paths = SmartPaths::new(
            &self.root,
            &self.loadables,
            self.context.instantiators(),
            self.context.tasks_enabled(),
        );
        Loader::new(LoaderKind::Module(ModuleLoader {
            base: BaseLoader::new(self.name, self.parent).with_shadowing(self.allow_shadowing),
            module_name: self.module_name,
            global: self.global,
            root: self.root,
            smart_paths,
            context: self.context,
            loaders: self.loaders,
            private_loader: RefCell::new(Weak::new()),
        }))
    }
}
