//! Lazy per-loader index of the source files each entity kind can come from.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pcore_primitives::{EntityKind, Error, FileSystem, Result, TypedName, escape_path};
use regex::Regex;
use tracing::debug;

use crate::instantiator::{InstantiatorRegistry, SourceFormat};

/// Module-relative location of one kind of source.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Loadable {
    /// `lib/puppet/functions/**/*.rb`
    RubyFunction,
    /// `functions/**/*.pp`
    PuppetFunction,
    /// `lib/puppet/datatypes/**/*.rb`
    RubyDataType,
    /// `types/**/*.pp`
    PuppetType,
    /// `tasks/**/*`, excluding documentation and configuration files. Flat
    /// within modules.
    Task,
    /// `plans/**/*.pp` and `plans/**/*.yaml`
    Plan,
    /// `lib/puppet/type/**/*.rb`
    RubyResourceType,
    /// `.resource_types/**/*.pp`
    ResourceTypeImpl,
}

impl Loadable {
    /// Every loadable.
    pub const ALL: [Self; 8] = [
        Self::RubyFunction,
        Self::PuppetFunction,
        Self::RubyDataType,
        Self::PuppetType,
        Self::Task,
        Self::Plan,
        Self::RubyResourceType,
        Self::ResourceTypeImpl,
    ];

    /// Loadables searched in modules and environments.
    pub const MODULE: [Self; 7] = [
        Self::RubyFunction,
        Self::PuppetFunction,
        Self::RubyDataType,
        Self::PuppetType,
        Self::Task,
        Self::Plan,
        Self::RubyResourceType,
    ];

    /// Loadables searched in the system library.
    pub const SYSTEM: [Self; 2] = [Self::RubyFunction, Self::RubyDataType];

    /// Returns the entity kind the files define.
    #[must_use]
    pub const fn kind(self) -> EntityKind {
        match self {
            Self::RubyFunction | Self::PuppetFunction => EntityKind::Function,
            Self::RubyDataType | Self::PuppetType => EntityKind::Type,
            Self::Task => EntityKind::Task,
            Self::Plan => EntityKind::Plan,
            Self::RubyResourceType => EntityKind::ResourceType,
            Self::ResourceTypeImpl => EntityKind::ResourceTypeImpl,
        }
    }

    /// Returns the source format of the files.
    #[must_use]
    pub const fn format(self) -> SourceFormat {
        match self {
            Self::RubyFunction | Self::RubyDataType | Self::RubyResourceType => SourceFormat::Ruby,
            Self::PuppetFunction | Self::PuppetType | Self::Plan | Self::ResourceTypeImpl => {
                SourceFormat::Puppet
            }
            Self::Task => SourceFormat::Task,
        }
    }

    /// Returns the directory below the loader root.
    #[must_use]
    pub const fn generic_path(self) -> &'static str {
        match self {
            Self::RubyFunction => "lib/puppet/functions",
            Self::PuppetFunction => "functions",
            Self::RubyDataType => "lib/puppet/datatypes",
            Self::PuppetType => "types",
            Self::Task => "tasks",
            Self::Plan => "plans",
            Self::RubyResourceType => "lib/puppet/type",
            Self::ResourceTypeImpl => ".resource_types",
        }
    }

    const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::RubyFunction | Self::RubyDataType | Self::RubyResourceType => &["rb"],
            Self::PuppetFunction | Self::PuppetType | Self::ResourceTypeImpl => &["pp"],
            Self::Plan => &["pp", "yaml"],
            Self::Task => &[],
        }
    }

    /// Returns `true` when one name may match several files that differ in extension.
    #[must_use]
    pub const fn match_many(self) -> bool {
        matches!(self, Self::Task | Self::Plan)
    }

    /// Returns `true` when the path spells the full name, module segment included.
    #[must_use]
    pub const fn uses_full_name(self) -> bool {
        matches!(self.format(), SourceFormat::Ruby)
    }

    /// Module-scoped names of flat loadables have exactly one segment below the module.
    const fn is_flat(self) -> bool {
        matches!(self, Self::Task)
    }

    fn accepts(self, path: &Path) -> bool {
        let extension = path.extension().and_then(|ext| ext.to_str());
        match self {
            Self::Task => !matches!(extension, Some("md" | "conf")),
            _ => extension.is_some_and(|ext| self.extensions().contains(&ext)),
        }
    }
}

fn name_segment() -> &'static Regex {
    static SEGMENT: OnceLock<Regex> = OnceLock::new();
    SEGMENT.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid name pattern"))
}

/// Returns `true` when every segment is a lower-case identifier.
#[must_use]
pub fn is_valid_name<S: AsRef<str>>(segments: &[S]) -> bool {
    !segments.is_empty() && segments.iter().all(|segment| name_segment().is_match(segment.as_ref()))
}

/// One loadable below one loader root, with its lazily built file index.
#[derive(Debug)]
pub struct SmartPath {
    loadable: Loadable,
    directory: PathBuf,
    index: OnceCell<Vec<PathBuf>>,
}

impl SmartPath {
    /// Creates the smart path for `loadable` below `root`.
    #[must_use]
    pub fn new(root: &Path, loadable: Loadable) -> Self {
        Self {
            loadable,
            directory: root.join(loadable.generic_path()),
            index: OnceCell::new(),
        }
    }

    /// Returns the loadable.
    #[must_use]
    pub const fn loadable(&self) -> Loadable {
        self.loadable
    }

    /// Returns the absolute directory searched.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns every matching file below the directory, listing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the directory cannot be listed.
    pub fn index(&self, files: &dyn FileSystem) -> Result<&[PathBuf]> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }
        let pattern = format!("{}/**/*", escape_path(&self.directory));
        let found: Vec<PathBuf> = files
            .list_matching(&pattern)
            .map_err(|source| Error::io(&self.directory, source))?
            .into_iter()
            .filter(|path| self.loadable.accepts(path))
            .collect();
        debug!(
            directory = %self.directory.display(),
            files = found.len(),
            "indexed smart path"
        );
        Ok(self.index.get_or_init(|| found))
    }

    /// Returns `true` when at least one file is indexed.
    ///
    /// # Errors
    ///
    /// Propagates [`SmartPath::index`] failures.
    pub fn meaningful_to_search(&self, files: &dyn FileSystem) -> Result<bool> {
        Ok(!self.index(files)?.is_empty())
    }

    /// Computes where `typed_name` would live, skipping `start_index` leading
    /// segments unless the loadable spells full names.
    ///
    /// Kinds matching several extensions yield the path without extension.
    #[must_use]
    pub fn effective_path(&self, typed_name: &TypedName, start_index: usize) -> Option<PathBuf> {
        let parts = typed_name.name_parts();
        let parts = if self.loadable.uses_full_name() {
            parts
        } else {
            parts.get(start_index..)?
        };
        if parts.is_empty() || (self.loadable.is_flat() && start_index > 0 && parts.len() > 1) {
            return None;
        }
        let mut path = self.directory.clone();
        path.extend(parts);
        if let [extension] = self.loadable.extensions() {
            path.set_extension(extension);
        }
        Some(path)
    }

    /// Returns the indexed files that define `typed_name`.
    ///
    /// # Errors
    ///
    /// Propagates [`SmartPath::index`] failures.
    pub fn candidates(
        &self,
        files: &dyn FileSystem,
        typed_name: &TypedName,
        start_index: usize,
    ) -> Result<Vec<PathBuf>> {
        if !is_valid_name(typed_name.name_parts()) {
            return Ok(Vec::new());
        }
        let Some(path) = self.effective_path(typed_name, start_index) else {
            return Ok(Vec::new());
        };
        let index = self.index(files)?;
        if !self.loadable.match_many() {
            return Ok(index.iter().filter(|file| **file == path).cloned().collect());
        }
        Ok(index
            .iter()
            .filter(|file| file.parent() == path.parent() && file.file_stem() == path.file_name())
            .cloned()
            .collect())
    }

    /// Maps an indexed file back to the name it defines.
    ///
    /// `init` plans and tasks and the `init_typeset` type stand for the module
    /// itself. Returns `None` for files whose path is not a valid name.
    #[must_use]
    pub fn typed_name(&self, file: &Path, module_name: Option<&str>) -> Option<TypedName> {
        let relative = file.strip_prefix(&self.directory).ok()?.with_extension("");
        if self.loadable.is_flat() && module_name.is_some() && relative.components().count() > 1 {
            return None;
        }
        let mut segments: Vec<String> = Vec::new();
        if !self.loadable.uses_full_name() {
            segments.extend(module_name.map(str::to_owned));
        }
        for component in relative.components() {
            segments.push(component.as_os_str().to_str()?.to_owned());
        }
        if !is_valid_name(&segments) {
            return None;
        }
        if let (Some(module), [first, last]) = (module_name, segments.as_slice()) {
            let init = match self.loadable.kind() {
                EntityKind::Plan | EntityKind::Task => last == "init",
                EntityKind::Type => last == "init_typeset",
                _ => false,
            };
            if init && first == module {
                segments.truncate(1);
            }
        }
        Some(TypedName::new(self.loadable.kind(), &segments.join("::")))
    }
}

/// Smart paths a loader searches, in search order.
#[derive(Debug, Default)]
pub struct SmartPaths {
    paths: Vec<SmartPath>,
}

impl SmartPaths {
    /// Builds the smart paths for `loadables` below `root`, keeping those with
    /// a registered instantiator and, unless `tasks_enabled`, dropping tasks and plans.
    #[must_use]
    pub fn new(
        root: &Path,
        loadables: &[Loadable],
        registry: &InstantiatorRegistry,
        tasks_enabled: bool,
    ) -> Self {
        let paths = loadables
            .iter()
            .copied()
            .filter(|loadable| registry.supports(loadable.format(), loadable.kind()))
            .filter(|loadable| {
                tasks_enabled || !matches!(loadable.kind(), EntityKind::Task | EntityKind::Plan)
            })
            .map(|loadable| SmartPath::new(root, loadable))
            .collect();
        Self { paths }
    }

    /// Returns the smart paths producing `kind`.
    pub fn for_kind(&self, kind: EntityKind) -> impl Iterator<Item = &SmartPath> {
        self.paths
            .iter()
            .filter(move |path| path.loadable().kind() == kind)
    }

    /// Returns every smart path.
    pub fn iter(&self) -> impl Iterator<Item = &SmartPath> {
        self.paths.iter()
    }
}
