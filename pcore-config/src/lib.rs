//! Configuration management for Pcore loaders.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use loader::{load_settings, settings_from_env};
pub use schema::{LoaderSettings, ModuleDependency, ModuleMetadata};
