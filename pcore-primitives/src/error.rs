//! Shared error definitions for the loader crates.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the loader subsystem.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while binding, locating, or instantiating named entities.
///
/// A name that simply cannot be found is not an error; lookups report it as
/// `Ok(None)`.
#[derive(Debug, Error)]
pub enum Error {
    /// A name already bound to a value was bound again, or a type visible from
    /// an ancestor loader would be shadowed.
    #[error("attempt to redefine entity `{name}`, originally set at {origin}")]
    Redefinition {
        /// Display form of the offending typed name.
        name: String,
        /// Origin of the existing binding.
        origin: String,
    },

    /// A predefined loader was asked for a type it was never given.
    #[error("loader `{loader}` has no predefined type `{name}`")]
    UnknownPredefinedType {
        /// Name of the predefined loader.
        loader: String,
        /// Requested type name.
        name: String,
    },

    /// Source was found but does not produce the requested entity.
    #[error("the code loaded from {origin} {reason}")]
    Instantiation {
        /// Requested entity name.
        name: String,
        /// Location of the offending source.
        origin: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Source text or metadata could not be parsed.
    #[error("parse error in {origin}: {message}")]
    Parse {
        /// Location of the offending source.
        origin: String,
        /// Message produced by the parser.
        message: String,
    },

    /// Reading a source file failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A loader that only accepts bindings during bootstrap was asked to bind.
    #[error("loader `{loader}` does not accept new bindings")]
    Sealed {
        /// Name of the loader.
        loader: String,
    },

    /// Loader configuration failed validation.
    #[error("invalid loader configuration: {reason}")]
    InvalidConfig {
        /// Human-readable reason for rejection.
        reason: String,
    },
}

impl Error {
    /// Creates an instantiation error for the named entity.
    #[must_use]
    pub fn instantiation(
        name: impl Into<String>,
        origin: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Instantiation {
            name: name.into(),
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Creates a parse error tagged with the given origin.
    #[must_use]
    pub fn parse(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Wraps an I/O failure for the given path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
