//! Loader with no content of its own.

use crate::loader::LoaderRef;

/// Placeholder loader that forwards every lookup to its parent.
///
/// Stands in for an environment whose directory does not exist, and refuses
/// bindings.
#[derive(Debug)]
pub struct NullLoader {
    name: String,
    parent: Option<LoaderRef>,
}

impl NullLoader {
    /// Creates a loader with no parent that never finds anything.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "null-loader".to_owned(),
            parent: None,
        }
    }

    /// Creates a named placeholder that forwards to `parent`.
    #[must_use]
    pub fn empty(name: impl Into<String>, parent: LoaderRef) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent),
        }
    }

    /// Returns the loader name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parent loader.
    #[must_use]
    pub fn parent(&self) -> Option<&LoaderRef> {
        self.parent.as_ref()
    }
}

impl Default for NullLoader {
    fn default() -> Self {
        Self::new()
    }
}
