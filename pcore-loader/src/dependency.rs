//! A module's restricted view of the modules it depends on.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::rc::Rc;

use pcore_primitives::{Result, TypedName};
use tracing::debug;

use crate::base::BaseLoader;
use crate::entry::NamedEntry;
use crate::loader::{Discovery, LoaderRef};

/// Loader that sees its parent plus a fixed list of dependency loaders.
///
/// Qualified names are routed on their first segment; unqualified names are
/// searched in declaration order and the hit is promoted into this loader.
#[derive(Debug)]
pub struct DependencyLoader {
    base: BaseLoader,
    module_name: Option<String>,
    dependencies: Vec<LoaderRef>,
    index: OnceCell<HashMap<String, LoaderRef>>,
}

impl DependencyLoader {
    /// Creates the view for `module_name` (or for a global component).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        parent: LoaderRef,
        module_name: Option<String>,
        dependencies: Vec<LoaderRef>,
    ) -> Self {
        Self {
            base: BaseLoader::new(name, Some(parent)),
            module_name,
            dependencies,
            index: OnceCell::new(),
        }
    }

    pub(crate) fn base(&self) -> &BaseLoader {
        &self.base
    }

    /// Returns the module whose view this is.
    #[must_use]
    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// Returns the dependency loaders in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[LoaderRef] {
        &self.dependencies
    }

    fn index(&self) -> &HashMap<String, LoaderRef> {
        self.index.get_or_init(|| {
            let mut index = HashMap::with_capacity(self.dependencies.len());
            for dependency in &self.dependencies {
                if let Some(module) = dependency.module_name() {
                    index
                        .entry(module.to_owned())
                        .or_insert_with(|| Rc::clone(dependency));
                }
            }
            index
        })
    }

    pub(crate) fn find(&self, typed_name: &TypedName) -> Result<Option<NamedEntry>> {
        if typed_name.is_qualified() {
            let Some(dependency) = self.index().get(&typed_name.name_parts()[0]) else {
                return Ok(None);
            };
            return dependency.load_typed(typed_name);
        }
        for dependency in &self.dependencies {
            let found = dependency.load_typed(typed_name)?;
            let Some(value) = found.as_ref().and_then(NamedEntry::value).cloned() else {
                continue;
            };
            debug!(
                loader = %self.base.name(),
                name = %typed_name,
                from = %dependency.name(),
                "promoting entry"
            );
            let origin = found.as_ref().and_then(NamedEntry::origin).map(str::to_owned);
            return self.base.set_entry(typed_name, value, origin).map(Some);
        }
        Ok(None)
    }

    pub(crate) fn loaded_in_dependencies(&self, typed_name: &TypedName) -> Option<NamedEntry> {
        if typed_name.is_qualified() {
            return self
                .index()
                .get(&typed_name.name_parts()[0])
                .and_then(|dependency| dependency.loaded_entry(typed_name, true))
                .filter(NamedEntry::is_found);
        }
        self.dependencies.iter().find_map(|dependency| {
            dependency
                .loaded_entry(typed_name, true)
                .filter(NamedEntry::is_found)
        })
    }

    /// Adds each dependency's own names, then the names promoted here.
    /// Parents are left to the caller so shared ancestors are walked once.
    pub(crate) fn discover_local(
        &self,
        request: &Discovery,
        visited: &mut Vec<LoaderRef>,
        names: &mut Vec<TypedName>,
    ) {
        for dependency in &self.dependencies {
            dependency.discover_local(request, visited, names);
        }
        names.extend(self.base.discover_own(request));
    }
}
