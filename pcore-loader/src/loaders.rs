//! Builds and owns the loader chain of one compilation.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use pcore_config::{LoaderSettings, ModuleMetadata};
use pcore_primitives::{Error, FileSystem, Result};
use tracing::{debug, info, warn};

use crate::dependency::DependencyLoader;
use crate::loader::{Loader, LoaderKind, LoaderRef};
use crate::module_loader::{ENVIRONMENT, LoaderContext, ModuleLoader};
use crate::null_loader::NullLoader;
use crate::smart_path::{Loadable, is_valid_name};
use crate::static_loader::StaticLoader;

const METADATA_FILE: &str = "metadata.json";

/// A module found on the module path.
#[derive(Debug)]
pub struct ModuleData {
    name: String,
    path: PathBuf,
    metadata: Option<ModuleMetadata>,
    public_loader: LoaderRef,
}

impl ModuleData {
    /// Returns the module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the module directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the parsed `metadata.json`, if the module has one.
    #[must_use]
    pub fn metadata(&self) -> Option<&ModuleMetadata> {
        self.metadata.as_ref()
    }

    /// Returns the loader other modules see this module through.
    #[must_use]
    pub fn public_loader(&self) -> &LoaderRef {
        &self.public_loader
    }
}

struct FoundModule {
    name: String,
    path: PathBuf,
    metadata: Option<ModuleMetadata>,
}

/// Owner of every loader in a compilation.
///
/// The chain is static, then the optional system library, then the resource
/// type compatibility loader, then the environment. Each module's public
/// loader has the environment as parent; its private loader is built on first
/// request and sees the module plus its dependencies.
#[derive(Debug)]
pub struct Loaders {
    environment_name: String,
    static_loader: LoaderRef,
    system_loader: Option<LoaderRef>,
    resource_type_loader: Option<LoaderRef>,
    environment_loader: LoaderRef,
    private_environment_loader: LoaderRef,
    modules: Vec<ModuleData>,
    private_loaders: RefCell<HashMap<String, LoaderRef>>,
}

impl Loaders {
    /// Builds the chain over the process-wide static loader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for invalid settings, [`Error::Io`] when a
    /// module path directory cannot be listed, and [`Error::Parse`] for a
    /// malformed `metadata.json`.
    pub fn new(settings: &LoaderSettings, context: Rc<LoaderContext>) -> Result<Rc<Self>> {
        Self::with_static_loader(settings, context, StaticLoader::shared())
    }

    /// Builds the chain over the given static loader.
    ///
    /// # Errors
    ///
    /// See [`Loaders::new`].
    pub fn with_static_loader(
        settings: &LoaderSettings,
        context: Rc<LoaderContext>,
        static_loader: Arc<StaticLoader>,
    ) -> Result<Rc<Self>> {
        settings.validate()?;
        let files = context.files();
        let found = find_modules(files, settings.module_path())?;
        let environment_root = settings
            .environment_path()
            .filter(|path| files.exists(path))
            .map(Path::to_path_buf);
        if environment_root.is_none() {
            debug!(
                environment = settings.environment_name(),
                "environment directory missing; using an empty loader"
            );
        }
        let system_path = settings.system_path().map(Path::to_path_buf);

        let loaders = Rc::new_cyclic(|weak: &Weak<Self>| {
            let static_loader = Loader::from_static(static_loader);
            let system_loader = system_path.map(|path| {
                ModuleLoader::builder("puppet_system", path, Rc::clone(&context))
                    .parent(Rc::clone(&static_loader))
                    .loadables(&Loadable::SYSTEM)
                    .build()
            });
            let base = system_loader
                .clone()
                .unwrap_or_else(|| Rc::clone(&static_loader));

            let (resource_type_loader, environment_loader) = match environment_root {
                Some(root) => {
                    let resource_types = ModuleLoader::builder(
                        "pcore resource types",
                        root.clone(),
                        Rc::clone(&context),
                    )
                    .parent(base)
                    .loadables(&[Loadable::ResourceTypeImpl])
                    .allow_shadowing(true)
                    .build();
                    let environment =
                        ModuleLoader::builder(ENVIRONMENT, root, Rc::clone(&context))
                            .module_name(ENVIRONMENT)
                            .global(true)
                            .parent(Rc::clone(&resource_types))
                            .loaders(weak.clone())
                            .build();
                    (Some(resource_types), environment)
                }
                None => (
                    None,
                    Loader::new(LoaderKind::Null(NullLoader::empty(ENVIRONMENT, base))),
                ),
            };

            let modules: Vec<ModuleData> = found
                .into_iter()
                .map(|module| {
                    let public_loader = ModuleLoader::builder(
                        module.name.clone(),
                        module.path.clone(),
                        Rc::clone(&context),
                    )
                    .module_name(module.name.clone())
                    .parent(Rc::clone(&environment_loader))
                    .loaders(weak.clone())
                    .build();
                    ModuleData {
                        name: module.name,
                        path: module.path,
                        metadata: module.metadata,
                        public_loader,
                    }
                })
                .collect();

            let private_environment_loader = Loader::new(LoaderKind::Dependency(
                DependencyLoader::new(
                    "environment private",
                    Rc::clone(&environment_loader),
                    None,
                    modules
                        .iter()
                        .map(|module| Rc::clone(&module.public_loader))
                        .collect(),
                ),
            ));
            if let LoaderKind::Module(environment) = environment_loader.kind() {
                environment.set_private_loader(&private_environment_loader);
            }

            info!(
                environment = settings.environment_name(),
                modules = modules.len(),
                system = system_loader.is_some(),
                "loader chain ready"
            );
            Self {
                environment_name: settings.environment_name().to_owned(),
                static_loader,
                system_loader,
                resource_type_loader,
                environment_loader,
                private_environment_loader,
                modules,
                private_loaders: RefCell::new(HashMap::new()),
            }
        });
        Ok(loaders)
    }

    /// Returns the environment name.
    #[must_use]
    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    /// Returns the root of the chain.
    #[must_use]
    pub fn static_loader(&self) -> &LoaderRef {
        &self.static_loader
    }

    /// Returns the system library loader, when configured.
    #[must_use]
    pub fn system_loader(&self) -> Option<&LoaderRef> {
        self.system_loader.as_ref()
    }

    /// Returns the resource type compatibility loader, when the environment exists.
    #[must_use]
    pub fn resource_type_loader(&self) -> Option<&LoaderRef> {
        self.resource_type_loader.as_ref()
    }

    /// Returns the loader modules see the environment through.
    #[must_use]
    pub fn environment_loader(&self) -> &LoaderRef {
        &self.environment_loader
    }

    /// Returns the environment's view of every module.
    #[must_use]
    pub fn private_environment_loader(&self) -> &LoaderRef {
        &self.private_environment_loader
    }

    /// Returns the modules in module path order.
    #[must_use]
    pub fn modules(&self) -> &[ModuleData] {
        &self.modules
    }

    /// Returns the named module.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&ModuleData> {
        self.modules.iter().find(|module| module.name == name)
    }

    /// Returns the public loader of the named module.
    #[must_use]
    pub fn public_loader_for_module(&self, name: &str) -> Option<LoaderRef> {
        self.module(name)
            .map(|module| Rc::clone(&module.public_loader))
    }

    /// Returns the private loader of the named module, building it on first request.
    ///
    /// With `metadata.json` only declared dependencies are visible; unmet
    /// ones are logged. Without it every module is visible.
    #[must_use]
    pub fn private_loader_for_module(&self, name: &str) -> Option<LoaderRef> {
        if let Some(loader) = self.private_loaders.borrow().get(name) {
            return Some(Rc::clone(loader));
        }
        let module = self.module(name)?;
        let dependencies: Vec<LoaderRef> = match module.metadata() {
            Some(metadata) => metadata
                .dependency_names()
                .filter_map(|dependency| {
                    let loader = self.public_loader_for_module(dependency);
                    if loader.is_none() {
                        warn!(module = name, dependency, "unmet module dependency");
                    }
                    loader
                })
                .collect(),
            None => self
                .modules
                .iter()
                .map(|module| Rc::clone(&module.public_loader))
                .collect(),
        };
        debug!(module = name, visible = dependencies.len(), "resolved module dependencies");
        let loader = Loader::new(LoaderKind::Dependency(DependencyLoader::new(
            format!("{name} private"),
            Rc::clone(&module.public_loader),
            Some(name.to_owned()),
            dependencies,
        )));
        self.private_loaders
            .borrow_mut()
            .insert(name.to_owned(), Rc::clone(&loader));
        Some(loader)
    }

    /// Returns the loader code in `module_name` is evaluated against: the
    /// environment's private loader for `None`, else the module's public loader.
    #[must_use]
    pub fn find_loader(&self, module_name: Option<&str>) -> Option<LoaderRef> {
        match module_name {
            None | Some("") => Some(Rc::clone(&self.private_environment_loader)),
            Some(name) => self.public_loader_for_module(name),
        }
    }
}

fn find_modules(files: &dyn FileSystem, module_path: &[PathBuf]) -> Result<Vec<FoundModule>> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for directory in module_path {
        if !files.exists(directory) {
            debug!(directory = %directory.display(), "module path entry does not exist");
            continue;
        }
        let children = files
            .subdirectories(directory)
            .map_err(|source| Error::io(directory, source))?;
        for path in children {
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !is_valid_name(&[name]) {
                warn!(path = %path.display(), "skipping directory with an invalid module name");
                continue;
            }
            if !seen.insert(name.to_owned()) {
                debug!(path = %path.display(), "module shadowed by an earlier module path entry");
                continue;
            }
            let metadata = read_metadata(files, &path)?;
            found.push(FoundModule {
                name: name.to_owned(),
                path,
                metadata,
            });
        }
    }
    Ok(found)
}

fn read_metadata(files: &dyn FileSystem, module: &Path) -> Result<Option<ModuleMetadata>> {
    let path = module.join(METADATA_FILE);
    if !files.exists(&path) {
        return Ok(None);
    }
    let text = files.read(&path).map_err(|source| Error::io(&path, source))?;
    ModuleMetadata::from_json(&text)
        .map(Some)
        .map_err(|err| Error::parse(path.display().to_string(), err.to_string()))
}

#[cfg(test)]
mod tests {
    use pcore_primitives::{EntityKind, MemoryFileSystem};

    use super::*;
    use crate::test_support::{CountingFs, context};

    fn tree() -> MemoryFileSystem {
        MemoryFileSystem::new()
            .with_file("/env/functions/site.pp", "function site")
            .with_file("/env/modules/a/functions/helper.pp", "function a::helper")
            .with_file(
                "/env/modules/a/metadata.json",
                r#"{"name": "acme-a", "dependencies": [{"name": "acme/b"}, {"name": "acme/absent"}]}"#,
            )
            .with_file("/env/modules/b/functions/util.pp", "function b::util")
            .with_file("/env/modules/c/functions/tool.pp", "function c::tool")
            .with_file("/env/modules/Bad-Name/functions/x.pp", "function x")
            .with_file("/site/modules/b/functions/util.pp", "function b::util")
            .with_file("/site/modules/d/functions/deep.pp", "function d::deep")
    }

    fn settings() -> LoaderSettings {
        LoaderSettings::new("production")
            .with_environment_path("/env")
            .with_module_path(["/env/modules", "/site/modules", "/missing"])
    }

    fn build(files: MemoryFileSystem, settings: &LoaderSettings) -> Rc<Loaders> {
        Loaders::new(settings, context(&CountingFs::new(files))).unwrap()
    }

    #[test]
    fn modules_are_found_in_path_order_first_occurrence_wins() {
        let loaders = build(tree(), &settings());
        let names: Vec<&str> = loaders.modules().iter().map(ModuleData::name).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(
            loaders.module("b").map(ModuleData::path),
            Some(Path::new("/env/modules/b"))
        );
        assert!(loaders.module("a").and_then(ModuleData::metadata).is_some());
        assert!(loaders.resource_type_loader().is_some());
        assert!(loaders.system_loader().is_none());
    }

    #[test]
    fn find_loader_selects_environment_view_or_public_loader() {
        let loaders = build(tree(), &settings());
        let environment = loaders.find_loader(None).unwrap();
        assert!(Rc::ptr_eq(&environment, loaders.private_environment_loader()));
        assert!(environment.load(EntityKind::Function, "c::tool").unwrap().is_some());
        assert!(environment.load(EntityKind::Function, "site").unwrap().is_some());

        let public = loaders.find_loader(Some("a")).unwrap();
        assert!(Rc::ptr_eq(&public, loaders.module("a").unwrap().public_loader()));
        assert!(loaders.find_loader(Some("zzz")).is_none());
        assert!(Rc::ptr_eq(
            &loaders.environment_loader().private_loader(),
            loaders.private_environment_loader()
        ));
    }

    #[test]
    fn declared_dependencies_limit_module_visibility() {
        let loaders = build(tree(), &settings());
        let private = loaders.private_loader_for_module("a").unwrap();
        assert!(private.load(EntityKind::Function, "a::helper").unwrap().is_some());
        assert!(private.load(EntityKind::Function, "b::util").unwrap().is_some());
        assert!(private.load(EntityKind::Function, "c::tool").unwrap().is_none());
        assert!(Rc::ptr_eq(
            &private,
            &loaders.private_loader_for_module("a").unwrap()
        ));

        let open = loaders.private_loader_for_module("c").unwrap();
        assert!(open.load(EntityKind::Function, "d::deep").unwrap().is_some());
        assert!(loaders.private_loader_for_module("zzz").is_none());
    }

    #[test]
    fn module_loader_private_loader_comes_from_aggregator() {
        let loaders = build(tree(), &settings());
        let public = loaders.public_loader_for_module("a").unwrap();
        let private = public.private_loader();
        assert!(matches!(private.kind(), LoaderKind::Dependency(_)));
        assert!(Rc::ptr_eq(
            &private,
            &loaders.private_loader_for_module("a").unwrap()
        ));
        assert_eq!(private.module_name(), Some("a"));
    }

    #[test]
    fn missing_environment_directory_uses_empty_loader() {
        let settings = LoaderSettings::new("dev")
            .with_environment_path("/nowhere")
            .with_module_path(["/env/modules"]);
        let loaders = build(tree(), &settings);
        assert!(matches!(loaders.environment_loader().kind(), LoaderKind::Null(_)));
        assert!(loaders.resource_type_loader().is_none());
        let environment = loaders.find_loader(None).unwrap();
        assert!(environment.load(EntityKind::Function, "b::util").unwrap().is_some());
        assert!(environment.load(EntityKind::Type, "Integer").unwrap().is_some());
        assert_eq!(loaders.environment_name(), "dev");
    }

    #[test]
    fn malformed_metadata_is_a_parse_error() {
        let files = MemoryFileSystem::new().with_file("/mods/a/metadata.json", "{not json");
        let settings = LoaderSettings::new("production").with_module_path(["/mods"]);
        let err = Loaders::new(&settings, context(&CountingFs::new(files))).unwrap_err();
        assert!(matches!(err, Error::Parse { ref origin, .. } if origin.ends_with("metadata.json")));
    }

    #[test]
    fn system_loader_sits_below_the_environment() {
        let files = tree().with_file("/system/lib/puppet/functions/sysfn.rb", "function sysfn");
        let loaders = build(files, &settings().with_system_path("/system"));
        let system = loaders.system_loader().unwrap();
        assert!(Rc::ptr_eq(system.parent().unwrap(), loaders.static_loader()));
        let environment = loaders.find_loader(None).unwrap();
        assert!(environment.load(EntityKind::Function, "sysfn").unwrap().is_some());
    }
}
