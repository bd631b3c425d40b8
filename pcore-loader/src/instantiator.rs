//! Contract between path-based loaders and the code that turns source into values.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use pcore_primitives::ast::Parser;
use pcore_primitives::{EntityKind, Error, FileSystem, Result, TypedName};

use crate::entity::Value;
use crate::loader::LoaderRef;

/// Language a source file is written in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum SourceFormat {
    /// Script files evaluated by an embedded engine.
    Ruby,
    /// Declarative-language files read through the [`Parser`].
    Puppet,
    /// Task executables plus optional JSON metadata.
    Task,
}

/// Everything an instantiator may look at while creating one value.
///
/// Scope is passed explicitly; instantiators never consult ambient state.
pub struct InstantiationRequest<'a> {
    /// Loader that located the source.
    pub loader: &'a LoaderRef,
    /// Requested name.
    pub typed_name: &'a TypedName,
    /// Location reported in diagnostics and bindings.
    pub origin: &'a Path,
    /// Source text; absent for kinds assembled from several files.
    pub source: Option<&'a str>,
    /// Every file that matched the requested name.
    pub candidates: &'a [PathBuf],
    /// File access for kinds assembled from several files.
    pub files: &'a dyn FileSystem,
    /// Parser for declarative source and type expressions.
    pub parser: &'a dyn Parser,
    /// Name of the environment being compiled.
    pub environment: &'a str,
}

impl InstantiationRequest<'_> {
    /// Returns the origin as a display string.
    #[must_use]
    pub fn origin_label(&self) -> String {
        self.origin.display().to_string()
    }

    /// Builds an [`Error::Instantiation`] for this request.
    #[must_use]
    pub fn fail(&self, reason: impl Into<String>) -> Error {
        Error::instantiation(self.typed_name.name(), self.origin_label(), reason)
    }

    /// Returns the source text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Instantiation`] when the loader supplied no text.
    pub fn source(&self) -> Result<&str> {
        self.source
            .ok_or_else(|| self.fail("has no readable source text"))
    }
}

impl fmt::Debug for InstantiationRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstantiationRequest")
            .field("loader", &self.loader.name())
            .field("typed_name", self.typed_name)
            .field("origin", &self.origin)
            .field("candidates", &self.candidates)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

/// Converts located source into a runtime value for one (format, kind) pair.
pub trait Instantiator {
    /// Creates the value named by the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Instantiation`] when the source does not define exactly
    /// the requested entity, and [`Error::Parse`] when it cannot be parsed.
    fn create(&self, request: &InstantiationRequest<'_>) -> Result<Value>;
}

impl<F> Instantiator for F
where
    F: Fn(&InstantiationRequest<'_>) -> Result<Value>,
{
    fn create(&self, request: &InstantiationRequest<'_>) -> Result<Value> {
        (self)(request)
    }
}

/// Instantiators keyed by source format and entity kind.
#[derive(Clone, Default)]
pub struct InstantiatorRegistry {
    inner: HashMap<(SourceFormat, EntityKind), Rc<dyn Instantiator>>,
}

impl fmt::Debug for InstantiatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.inner.keys().copied().collect();
        keys.sort();
        f.debug_struct("InstantiatorRegistry")
            .field("registered", &keys)
            .finish()
    }
}

impl InstantiatorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instantiator, returning the one it replaces.
    pub fn register(
        &mut self,
        format: SourceFormat,
        kind: EntityKind,
        instantiator: impl Instantiator + 'static,
    ) -> Option<Rc<dyn Instantiator>> {
        self.inner.insert((format, kind), Rc::new(instantiator))
    }

    /// Registers an instantiator and returns the registry.
    #[must_use]
    pub fn with(
        mut self,
        format: SourceFormat,
        kind: EntityKind,
        instantiator: impl Instantiator + 'static,
    ) -> Self {
        self.register(format, kind, instantiator);
        self
    }

    /// Returns the instantiator for the pair.
    #[must_use]
    pub fn get(&self, format: SourceFormat, kind: EntityKind) -> Option<&Rc<dyn Instantiator>> {
        self.inner.get(&(format, kind))
    }

    /// Returns `true` if the pair has an instantiator.
    #[must_use]
    pub fn supports(&self, format: SourceFormat, kind: EntityKind) -> bool {
        self.inner.contains_key(&(format, kind))
    }

    /// Returns the number of registered pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
