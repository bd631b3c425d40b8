//! Per-loader binding table with a single most-recent memo slot.

use std::cell::RefCell;
use std::collections::HashMap;

use pcore_primitives::TypedName;

use crate::entry::NamedEntry;

/// Local `TypedName -> NamedEntry` map owned by exactly one loader.
///
/// The memo remembers the outcome of the last full search so that a
/// dependency loader retrying the same name against several children does
/// not walk the chain again. Every insertion clears it.
#[derive(Debug, Default)]
pub struct EntryCache {
    entries: RefCell<HashMap<TypedName, NamedEntry>>,
    last: RefCell<Option<(TypedName, Option<NamedEntry>)>>,
}

impl EntryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored entry, sentinel or not.
    #[must_use]
    pub fn get(&self, typed_name: &TypedName) -> Option<NamedEntry> {
        self.entries.borrow().get(typed_name).cloned()
    }

    /// Returns the stored entry only when it holds a value.
    #[must_use]
    pub fn get_found(&self, typed_name: &TypedName) -> Option<NamedEntry> {
        self.entries
            .borrow()
            .get(typed_name)
            .filter(|entry| entry.is_found())
            .cloned()
    }

    /// Stores an entry, replacing whatever was there.
    ///
    /// Invariant checks are the caller's job; see `BaseLoader::set_entry`.
    pub fn insert(&self, entry: NamedEntry) {
        self.last.borrow_mut().take();
        self.entries
            .borrow_mut()
            .insert(entry.typed_name().clone(), entry);
    }

    /// Records a confirmed miss unless something is already stored.
    pub fn remember_miss(&self, typed_name: &TypedName) {
        let mut entries = self.entries.borrow_mut();
        if !entries.contains_key(typed_name) {
            entries.insert(typed_name.clone(), NamedEntry::missing(typed_name.clone()));
        }
    }

    /// Returns the memoized outcome for `typed_name`, if it was the last search.
    #[must_use]
    pub fn recall(&self, typed_name: &TypedName) -> Option<Option<NamedEntry>> {
        self.last
            .borrow()
            .as_ref()
            .filter(|(last, _)| last == typed_name)
            .map(|(_, entry)| entry.clone())
    }

    /// Memoizes the outcome of a completed search.
    pub fn memoize(&self, typed_name: &TypedName, entry: Option<&NamedEntry>) {
        *self.last.borrow_mut() = Some((typed_name.clone(), entry.cloned()));
    }

    /// Returns the found entries, in no particular order.
    #[must_use]
    pub fn found_entries(&self) -> Vec<NamedEntry> {
        self.entries
            .borrow()
            .values()
            .filter(|entry| entry.is_found())
            .cloned()
            .collect()
    }

    /// Returns the number of stored entries including sentinels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pcore_primitives::EntityKind;

    use super::*;
    use crate::entity::{DataType, Value};

    fn value() -> Value {
        Value::DataType(std::sync::Arc::new(DataType::Builtin {
            name: "Integer".into(),
        }))
    }

    #[test]
    fn miss_does_not_replace_found_entry() {
        let cache = EntryCache::new();
        let name = TypedName::new(EntityKind::Type, "integer");
        cache.insert(NamedEntry::found(name.clone(), value(), None));
        cache.remember_miss(&name);
        assert!(cache.get_found(&name).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn insert_clears_memo() {
        let cache = EntryCache::new();
        let name = TypedName::new(EntityKind::Function, "f");
        cache.memoize(&name, None);
        assert!(matches!(cache.recall(&name), Some(None)));
        assert!(cache.recall(&TypedName::new(EntityKind::Function, "g")).is_none());

        cache.insert(NamedEntry::found(name.clone(), value(), None));
        assert!(cache.recall(&name).is_none());
    }

    #[test]
    fn found_entries_skip_sentinels() {
        let cache = EntryCache::new();
        cache.remember_miss(&TypedName::new(EntityKind::Type, "a"));
        cache.insert(NamedEntry::found(
            TypedName::new(EntityKind::Type, "b"),
            value(),
            None,
        ));
        let found = cache.found_entries();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].typed_name().name(), "b");
        assert!(!cache.is_empty());
    }
}
