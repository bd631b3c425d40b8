//! Loader hierarchy for Pcore.
//!
//! A compilation resolves functions, types, tasks, plans and resource types
//! through a chain of loaders rooted at the shared [`StaticLoader`]. Lookups
//! walk toward the root before touching the filesystem, bindings are cached
//! per loader, and confirmed misses are remembered so repeated lookups do not
//! probe again. Turning located source into values is delegated to the
//! [`Instantiator`]s registered in the [`InstantiatorRegistry`].

#![warn(missing_docs, clippy::pedantic)]

mod base;
mod cache;
mod dependency;
pub mod entity;
mod entry;
mod instantiator;
mod loader;
mod loaders;
mod module_loader;
mod null_loader;
mod predefined;
mod smart_path;
mod static_loader;

#[cfg(test)]
mod test_support;

pub use base::{BaseLoader, LoaderStats};
pub use cache::EntryCache;
pub use dependency::DependencyLoader;
pub use entity::Value;
pub use entry::NamedEntry;
pub use instantiator::{InstantiationRequest, Instantiator, InstantiatorRegistry, SourceFormat};
pub use loader::{Discovery, Loader, LoaderKind, LoaderRef};
pub use loaders::{Loaders, ModuleData};
pub use module_loader::{ENVIRONMENT, LoaderContext, ModuleLoader, ModuleLoaderBuilder};
pub use null_loader::NullLoader;
pub use predefined::PredefinedLoader;
pub use smart_path::{Loadable, SmartPath, SmartPaths, is_valid_name};
pub use static_loader::{
    BUILTIN_DATA_TYPES, BUILTIN_RESOURCE_TYPES, StaticLoader, StaticLoaderBuilder,
};
