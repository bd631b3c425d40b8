//! Core shared types and collaborator contracts for Pcore loaders.

#![warn(missing_docs, clippy::pedantic)]

pub mod ast;
mod error;
mod source;
mod typed_name;

/// Error type and result alias shared across the loader crates.
pub use error::{Error, Result};
/// Source-text provider contract and its bundled implementations.
pub use source::{FileSystem, MemoryFileSystem, OsFileSystem, escape_path};
/// Compound lookup key and its components.
pub use typed_name::{EntityKind, NameAuthority, RUNTIME_NAME_AUTHORITY, TypedName};
