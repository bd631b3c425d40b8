//! Bindings stored in loader caches.

use pcore_primitives::TypedName;

use crate::entity::Value;

/// Binding of a [`TypedName`] to a value and the place it came from.
///
/// An entry without a value records a confirmed miss, so later lookups of the
/// same name skip the search.
#[derive(Clone, Debug)]
pub struct NamedEntry {
    typed_name: TypedName,
    value: Option<Value>,
    origin: Option<String>,
}

impl NamedEntry {
    /// Creates a binding for a found value.
    #[must_use]
    pub fn found(typed_name: TypedName, value: Value, origin: Option<String>) -> Self {
        Self {
            typed_name,
            value: Some(value),
            origin,
        }
    }

    /// Creates the confirmed-miss sentinel for `typed_name`.
    #[must_use]
    pub fn missing(typed_name: TypedName) -> Self {
        Self {
            typed_name,
            value: None,
            origin: None,
        }
    }

    /// Returns the bound name.
    #[must_use]
    pub fn typed_name(&self) -> &TypedName {
        &self.typed_name
    }

    /// Returns the bound value, or `None` for a sentinel.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Consumes the entry and returns its value.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        self.value
    }

    /// Returns the source locator.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Returns `true` unless this is a sentinel.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        self.value.is_some()
    }
}
