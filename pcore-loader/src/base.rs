//! Caching and delegation skeleton shared by the concrete loaders.

use std::cell::Cell;
use std::collections::HashSet;

use pcore_primitives::{EntityKind, Error, Result, TypedName};
use tracing::debug;

use crate::cache::EntryCache;
use crate::entity::Value;
use crate::entry::NamedEntry;
use crate::loader::{Discovery, LoaderRef};

/// Snapshot of lookup activity in one loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Calls to `load_typed` that reached this loader.
    pub lookups: usize,
    /// Lookups answered by the most-recent memo.
    pub memo_hits: usize,
    /// Calls to the loader's own `find`.
    pub finds: usize,
}

/// Local binding table, parent link, and redefinition rules.
#[derive(Debug)]
pub struct BaseLoader {
    name: String,
    parent: Option<LoaderRef>,
    cache: EntryCache,
    allow_shadowing: bool,
    stats: Cell<LoaderStats>,
}

impl BaseLoader {
    /// Creates an empty loader body.
    #[must_use]
    pub fn new(name: impl Into<String>, parent: Option<LoaderRef>) -> Self {
        Self {
            name: name.into(),
            parent,
            cache: EntryCache::new(),
            allow_shadowing: false,
            stats: Cell::new(LoaderStats::default()),
        }
    }

    /// Lets `type` bindings replace types visible from ancestors.
    #[must_use]
    pub fn with_shadowing(mut self, allow: bool) -> Self {
        self.allow_shadowing = allow;
        self
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

    /// Returns the local binding table.
    #[must_use]
    pub fn cache(&self) -> &EntryCache {
        &self.cache
    }

    /// Returns `true` when type shadowing is permitted.
    #[must_use]
    pub const fn allow_shadowing(&self) -> bool {
        self.allow_shadowing
    }

    /// Returns the current activity counters.
    #[must_use]
    pub fn stats(&self) -> LoaderStats {
        self.stats.get()
    }

    fn bump(&self, update: impl FnOnce(&mut LoaderStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }

    /// Runs the lookup order: memo, own found entry, parent, then `find`
    /// unless a miss is already recorded.
    ///
    /// Nothing is cached when `find` fails.
    pub(crate) fn search(
        &self,
        typed_name: &TypedName,
        find: impl FnOnce() -> Result<Option<NamedEntry>>,
    ) -> Result<Option<NamedEntry>> {
        self.bump(|stats| stats.lookups += 1);
        if let Some(remembered) = self.cache.recall(typed_name) {
            self.bump(|stats| stats.memo_hits += 1);
            return Ok(remembered);
        }
        let result = self.search_chain(typed_name, find)?;
        self.cache.memoize(typed_name, result.as_ref());
        Ok(result)
    }

    fn search_chain(
        &self,
        typed_name: &TypedName,
        find: impl FnOnce() -> Result<Option<NamedEntry>>,
    ) -> Result<Option<NamedEntry>> {
        let own = self.cache.get(typed_name);
        if let Some(entry) = own.as_ref().filter(|entry| entry.is_found()) {
            return Ok(Some(entry.clone()));
        }
        if let Some(parent) = &self.parent {
            if let Some(entry) = parent.load_typed(typed_name)?.filter(NamedEntry::is_found) {
                return Ok(Some(entry));
            }
        }
        if own.is_some() {
            return Ok(None);
        }
        self.bump(|stats| stats.finds += 1);
        match find()?.filter(NamedEntry::is_found) {
            Some(entry) => Ok(Some(entry)),
            None => {
                debug!(loader = %self.name, name = %typed_name, "recording miss");
                self.cache.remember_miss(typed_name);
                Ok(None)
            }
        }
    }

    /// Returns what is already bound here or in an ancestor, never searching.
    #[must_use]
    pub fn loaded_entry(&self, typed_name: &TypedName) -> Option<NamedEntry> {
        let own = self.cache.get(typed_name);
        if own.as_ref().is_some_and(NamedEntry::is_found) {
            return own;
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.loaded_entry(typed_name, false))
            .filter(NamedEntry::is_found)
            .or(own)
    }

    /// Binds `value` under `typed_name` in this loader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Redefinition`] if the name already holds a value here,
    /// or if it is a `type` visible from an ancestor and shadowing is not allowed.
    pub fn set_entry(
        &self,
        typed_name: &TypedName,
        value: Value,
        origin: Option<String>,
    ) -> Result<NamedEntry> {
        if let Some(existing) = self.cache.get_found(typed_name) {
            return Err(redefinition(typed_name, &existing));
        }
        if typed_name.kind() == EntityKind::Type && !self.allow_shadowing {
            let inherited = self
                .parent
                .as_ref()
                .and_then(|parent| parent.loaded_entry(typed_name, false))
                .filter(NamedEntry::is_found);
            if let Some(existing) = inherited {
                return Err(redefinition(typed_name, &existing));
            }
        }
        let entry = NamedEntry::found(typed_name.clone(), value, origin);
        debug!(
            loader = %self.name,
            name = %typed_name,
            origin = entry.origin().unwrap_or("<none>"),
            "bound entry"
        );
        self.cache.insert(entry.clone());
        Ok(entry)
    }

    /// Lists found names of the requested kind bound in this loader.
    pub(crate) fn discover_own(&self, request: &Discovery) -> Vec<TypedName> {
        let mut own: Vec<TypedName> = self
            .cache
            .found_entries()
            .into_iter()
            .map(|entry| entry.typed_name().clone())
            .filter(|name| request.accepts(name))
            .collect();
        own.sort();
        own
    }
}

/// Removes repeated names, keeping the first occurrence.
pub(crate) fn dedup(names: Vec<TypedName>) -> Vec<TypedName> {
    let mut seen = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

fn redefinition(typed_name: &TypedName, existing: &NamedEntry) -> Error {
    Error::Redefinition {
        name: typed_name.to_string(),
        origin: existing.origin().unwrap_or("an unknown location").to_owned(),
    }
}
