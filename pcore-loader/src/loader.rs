//! The closed set of loaders and the operations every loader answers.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use pcore_primitives::{EntityKind, Error, NameAuthority, Result, TypedName};
use tracing::warn;

use crate::base::{BaseLoader, LoaderStats, dedup};
use crate::dependency::DependencyLoader;
use crate::entity::Value;
use crate::entry::NamedEntry;
use crate::module_loader::ModuleLoader;
use crate::null_loader::NullLoader;
use crate::predefined::PredefinedLoader;
use crate::static_loader::StaticLoader;

/// Shared handle to a loader owned by one compilation.
pub type LoaderRef = Rc<Loader>;

/// Concrete loader behind a [`Loader`].
#[derive(Debug)]
pub enum LoaderKind {
    /// Process-wide built-ins; root of every chain.
    Static(Arc<StaticLoader>),
    /// Delegates everything to its parent.
    Null(NullLoader),
    /// Populated by its owner.
    Predefined(PredefinedLoader),
    /// Resolves names below one module or environment root.
    Module(ModuleLoader),
    /// Restricted view of a module's dependencies.
    Dependency(DependencyLoader),
}

/// Node in the resolution hierarchy.
///
/// Lookups walk toward the root before doing any filesystem work, so a name
/// bound by an ancestor always wins over a descendant's own sources.
#[derive(Debug)]
pub struct Loader {
    kind: LoaderKind,
}

impl Loader {
    /// Wraps a concrete loader in a shared handle.
    #[must_use]
    pub fn new(kind: LoaderKind) -> LoaderRef {
        Rc::new(Self { kind })
    }

    /// Creates a root loader over the process-wide static loader.
    #[must_use]
    pub fn from_static(loader: Arc<StaticLoader>) -> LoaderRef {
        Self::new(LoaderKind::Static(loader))
    }

    /// Returns the concrete loader.
    #[must_use]
    pub const fn kind(&self) -> &LoaderKind {
        &self.kind
    }

    fn base(&self) -> Option<&BaseLoader> {
        match &self.kind {
            LoaderKind::Predefined(loader) => Some(loader.base()),
            LoaderKind::Module(loader) => Some(loader.base()),
            LoaderKind::Dependency(loader) => Some(loader.base()),
            LoaderKind::Static(_) | LoaderKind::Null(_) => None,
        }
    }

    /// Returns the loader name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.kind {
            LoaderKind::Static(loader) => loader.name(),
            LoaderKind::Null(loader) => loader.name(),
            LoaderKind::Predefined(loader) => loader.base().name(),
            LoaderKind::Module(loader) => loader.base().name(),
            LoaderKind::Dependency(loader) => loader.base().name(),
        }
    }

    /// Returns the parent loader, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&LoaderRef> {
        match &self.kind {
            LoaderKind::Static(_) => None,
            LoaderKind::Null(loader) => loader.parent(),
            _ => self.base().and_then(BaseLoader::parent),
        }
    }

    /// Returns the module this loader serves; `None` for loaders outside any module.
    #[must_use]
    pub fn module_name(&self) -> Option<&str> {
        match &self.kind {
            LoaderKind::Module(loader) => loader.module_name(),
            LoaderKind::Dependency(loader) => loader.module_name(),
            _ => None,
        }
    }

    /// Returns `true` if this loader may shadow types visible from ancestors.
    #[must_use]
    pub fn allow_shadowing(&self) -> bool {
        self.base().is_some_and(BaseLoader::allow_shadowing)
    }

    /// Returns lookup counters for caching loaders.
    #[must_use]
    pub fn stats(&self) -> Option<LoaderStats> {
        self.base().map(BaseLoader::stats)
    }

    /// Loads `name` of the given kind and returns its value.
    ///
    /// # Errors
    ///
    /// Propagates instantiation, redefinition and I/O failures raised while
    /// searching.
    pub fn load(self: &Rc<Self>, kind: EntityKind, name: &str) -> Result<Option<Value>> {
        Ok(self
            .load_typed(&TypedName::new(kind, name))?
            .and_then(NamedEntry::into_value))
    }

    /// Resolves a name: memo, own cache, parent chain, then this loader's `find`.
    ///
    /// A name that cannot be found yields `Ok(None)` and is remembered as a miss.
    ///
    /// # Errors
    ///
    /// Propagates instantiation, redefinition and I/O failures raised by `find`.
    pub fn load_typed(self: &Rc<Self>, typed_name: &TypedName) -> Result<Option<NamedEntry>> {
        match &self.kind {
            LoaderKind::Static(loader) => Ok(loader.load_typed(typed_name)),
            LoaderKind::Null(loader) => match loader.parent() {
                Some(parent) => parent.load_typed(typed_name),
                None => Ok(None),
            },
            LoaderKind::Predefined(loader) => loader
                .base()
                .search(typed_name, || loader.find(typed_name)),
            LoaderKind::Module(loader) => loader
                .base()
                .search(typed_name, || loader.find(self, typed_name)),
            LoaderKind::Dependency(loader) => loader
                .base()
                .search(typed_name, || loader.find(typed_name)),
        }
    }

    /// Returns what is already bound here or in an ancestor without searching.
    ///
    /// With `check_dependencies`, a dependency loader also consults what its
    /// dependencies have bound. The result may be a miss sentinel.
    #[must_use]
    pub fn loaded_entry(&self, typed_name: &TypedName, check_dependencies: bool) -> Option<NamedEntry> {
        match &self.kind {
            LoaderKind::Static(loader) => loader.get_entry(typed_name),
            LoaderKind::Null(loader) => loader
                .parent()
                .and_then(|parent| parent.loaded_entry(typed_name, check_dependencies)),
            LoaderKind::Dependency(loader) => {
                let entry = loader.base().loaded_entry(typed_name);
                if check_dependencies && !entry.as_ref().is_some_and(NamedEntry::is_found) {
                    loader.loaded_in_dependencies(typed_name).or(entry)
                } else {
                    entry
                }
            }
            LoaderKind::Predefined(loader) => loader.base().loaded_entry(typed_name),
            LoaderKind::Module(loader) => loader.base().loaded_entry(typed_name),
        }
    }

    /// Searches this loader's own sources, ignoring the parent's bindings.
    ///
    /// # Errors
    ///
    /// Propagates instantiation, redefinition and I/O failures, and
    /// [`Error::UnknownPredefinedType`] from a predefined loader.
    pub fn find(self: &Rc<Self>, typed_name: &TypedName) -> Result<Option<NamedEntry>> {
        match &self.kind {
            LoaderKind::Static(_) => Ok(None),
            LoaderKind::Null(loader) => match loader.parent() {
                Some(parent) => parent.find(typed_name),
                None => Ok(None),
            },
            LoaderKind::Predefined(loader) => loader.find(typed_name),
            LoaderKind::Module(loader) => loader.find(self, typed_name),
            LoaderKind::Dependency(loader) => loader.find(typed_name),
        }
    }

    /// Returns the local binding, sentinel or not.
    #[must_use]
    pub fn get_entry(&self, typed_name: &TypedName) -> Option<NamedEntry> {
        match &self.kind {
            LoaderKind::Static(loader) => loader.get_entry(typed_name),
            LoaderKind::Null(_) => None,
            _ => self.base().and_then(|base| base.cache().get(typed_name)),
        }
    }

    /// Binds `value` under `typed_name` in this loader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Redefinition`] when the binding would replace a value
    /// here or shadow an inherited type, and [`Error::Sealed`] for loaders
    /// that do not accept bindings.
    pub fn set_entry(
        &self,
        typed_name: &TypedName,
        value: Value,
        origin: Option<String>,
    ) -> Result<NamedEntry> {
        match self.base() {
            Some(base) => base.set_entry(typed_name, value, origin),
            None => Err(Error::Sealed {
                loader: self.name().to_owned(),
            }),
        }
    }

    /// Returns the loader that code defined by this loader resolves names in.
    ///
    /// Module loaders obtain their dependency view from the aggregator on first
    /// use; every other loader is its own private loader.
    #[must_use]
    pub fn private_loader(self: &Rc<Self>) -> LoaderRef {
        match &self.kind {
            LoaderKind::Module(loader) => loader.private_loader(self),
            _ => Rc::clone(self),
        }
    }

    /// Lists the names of the requested kind visible from this loader,
    /// instantiating discoverable sources on the way.
    ///
    /// Every loader reachable through parents and dependencies contributes its
    /// own content exactly once. Failures are reported to the request's error
    /// collector, or logged.
    #[must_use]
    pub fn discover(self: &Rc<Self>, request: &Discovery) -> Vec<TypedName> {
        let mut visited = Vec::new();
        let mut names = Vec::new();
        let mut next = Some(Rc::clone(self));
        while let Some(loader) = next {
            loader.discover_local(request, &mut visited, &mut names);
            next = loader.parent().cloned();
        }
        dedup(names)
    }

    /// Adds the names this loader holds itself, skipping loaders in `visited`.
    pub(crate) fn discover_local(
        self: &Rc<Self>,
        request: &Discovery,
        visited: &mut Vec<LoaderRef>,
        names: &mut Vec<TypedName>,
    ) {
        if visited.iter().any(|seen| Rc::ptr_eq(seen, self)) {
            return;
        }
        visited.push(Rc::clone(self));
        match &self.kind {
            LoaderKind::Static(loader) => names.extend(loader.discover(request)),
            LoaderKind::Null(_) => {}
            LoaderKind::Predefined(loader) => names.extend(loader.base().discover_own(request)),
            LoaderKind::Module(loader) => names.extend(loader.discover_local(self, request)),
            LoaderKind::Dependency(loader) => loader.discover_local(request, visited, names),
        }
    }
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(Loader '{}')", self.name())
    }
}

type NameFilter = Box<dyn Fn(&TypedName) -> bool>;

/// Parameters of a [`Loader::discover`] call.
pub struct Discovery {
    kind: EntityKind,
    authority: NameAuthority,
    filter: Option<NameFilter>,
    errors: Option<RefCell<Vec<Error>>>,
}

impl Discovery {
    /// Discovers names of `kind` under the runtime authority.
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            authority: NameAuthority::Runtime,
            filter: None,
            errors: None,
        }
    }

    /// Restricts discovery to another name authority.
    #[must_use]
    pub fn with_authority(mut self, authority: NameAuthority) -> Self {
        self.authority = authority;
        self
    }

    /// Keeps only names accepted by `filter`. Rejected sources are not instantiated.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Fn(&TypedName) -> bool + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Collects instantiation failures instead of logging them.
    #[must_use]
    pub fn collecting_errors(mut self) -> Self {
        self.errors = Some(RefCell::new(Vec::new()));
        self
    }

    /// Returns the requested kind.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns the requested authority.
    #[must_use]
    pub const fn authority(&self) -> &NameAuthority {
        &self.authority
    }

    /// Returns `true` when `name` has the requested kind and authority and passes the filter.
    #[must_use]
    pub fn accepts(&self, name: &TypedName) -> bool {
        name.kind() == self.kind
            && name.authority() == &self.authority
            && self.filter.as_ref().is_none_or(|filter| filter(name))
    }

    /// Records a discovery failure. Each distinct message is kept once.
    pub fn report(&self, error: Error) {
        match &self.errors {
            Some(errors) => {
                let mut errors = errors.borrow_mut();
                let message = error.to_string();
                if !errors.iter().any(|known| known.to_string() == message) {
                    errors.push(error);
                }
            }
            None => warn!(kind = %self.kind, error = %error, "discovery failed to load entity"),
        }
    }

    /// Returns the collected failures.
    #[must_use]
    pub fn into_errors(self) -> Vec<Error> {
        self.errors.map(RefCell::into_inner).unwrap_or_default()
    }
}

impl fmt::Debug for Discovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discovery")
            .field("kind", &self.kind)
            .field("authority", &self.authority)
            .field("filtered", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}
