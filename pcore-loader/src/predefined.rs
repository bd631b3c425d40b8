//! Loader populated by its owner before first use.

use pcore_primitives::{EntityKind, Error, Result, TypedName};

use crate::base::BaseLoader;
use crate::entry::NamedEntry;
use crate::loader::LoaderRef;

/// Loader whose content is bound explicitly through `set_entry`.
///
/// Asking it for a `type` it was never given is an error rather than a miss.
#[derive(Debug)]
pub struct PredefinedLoader {
    base: BaseLoader,
}

impl PredefinedLoader {
    /// Creates an empty predefined loader.
    #[must_use]
    pub fn new(name: impl Into<String>, parent: Option<LoaderRef>) -> Self {
        Self {
            base: BaseLoader::new(name, parent),
        }
    }

    /// Lets bound types replace types visible from ancestors.
    #[must_use]
    pub fn with_shadowing(self, allow: bool) -> Self {
        Self {
            base: self.base.with_shadowing(allow),
        }
    }

    pub(crate) fn base(&self) -> &BaseLoader {
        &self.base
    }

    pub(crate) fn find(&self, typed_name: &TypedName) -> Result<Option<NamedEntry>> {
        if typed_name.kind() == EntityKind::Type {
            return Err(Error::UnknownPredefinedType {
                loader: self.base.name().to_owned(),
                name: typed_name.name().to_owned(),
            });
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::entity::{DataType, Value};
    use crate::loader::{Discovery, Loader, LoaderKind};
    use crate::static_loader::StaticLoader;

    fn data_type(name: &str) -> Value {
        Value::DataType(Arc::new(DataType::Builtin { name: name.into() }))
    }

    fn predefined(allow_shadowing: bool) -> LoaderRef {
        let root = Loader::from_static(StaticLoader::shared());
        Loader::new(LoaderKind::Predefined(
            PredefinedLoader::new("predefined", Some(root)).with_shadowing(allow_shadowing),
        ))
    }

    #[test]
    fn redefinition_is_rejected_with_original_origin() {
        let loader = predefined(false);
        let name = TypedName::new(EntityKind::Type, "Widget");
        loader
            .set_entry(&name, data_type("Widget"), Some("/first.pp".into()))
            .unwrap();
        let err = loader
            .set_entry(&name, data_type("Widget"), Some("/second.pp".into()))
            .unwrap_err();
        assert!(matches!(err, Error::Redefinition { ref origin, .. } if origin == "/first.pp"));
        assert!(err.to_string().contains("/first.pp"));
    }

    #[test]
    fn sentinel_can_be_replaced_once() {
        let loader = predefined(false);
        let name = TypedName::new(EntityKind::Function, "helper");
        assert!(loader.load_typed(&name).unwrap().is_none());
        assert!(loader.get_entry(&name).is_some_and(|entry| !entry.is_found()));

        loader
            .set_entry(&name, data_type("Helper"), Some("/helper.pp".into()))
            .unwrap();
        assert!(loader.load_typed(&name).unwrap().is_some_and(|entry| entry.is_found()));
        assert!(loader.set_entry(&name, data_type("Helper"), None).is_err());
    }

    #[test]
    fn missing_type_is_an_error_but_other_kinds_are_absent() {
        let loader = predefined(false);
        let err = loader.load(EntityKind::Type, "Gadget").unwrap_err();
        assert!(matches!(err, Error::UnknownPredefinedType { ref name, .. } if name == "gadget"));
        assert!(loader.load(EntityKind::Function, "gadget").unwrap().is_none());
        assert!(loader.load(EntityKind::Type, "Integer").unwrap().is_some());
    }

    #[test]
    fn inherited_types_cannot_be_shadowed_without_permission() {
        let name = TypedName::new(EntityKind::Type, "String");
        let strict = predefined(false);
        assert!(matches!(
            strict.set_entry(&name, data_type("String"), None),
            Err(Error::Redefinition { .. })
        ));

        let lenient = predefined(true);
        assert!(lenient.allow_shadowing());
        let bound = lenient.set_entry(&name, data_type("String"), None).unwrap();
        let found = lenient.loaded_entry(&name, false).unwrap();
        assert!(found.value().unwrap().ptr_eq(bound.value().unwrap()));
    }

    #[test]
    fn shadowing_binding_is_served_from_own_cache() {
        let loader = predefined(true);
        let name = TypedName::new(EntityKind::Type, "Integer");
        loader.set_entry(&name, data_type("Integer"), None).unwrap();
        let entry = loader.load_typed(&name).unwrap().unwrap();
        // own found entries are consulted first
        assert!(entry.value().unwrap().ptr_eq(loader.get_entry(&name).unwrap().value().unwrap()));
    }

    #[test]
    fn discovery_lists_own_then_inherited_names() {
        let loader = predefined(false);
        loader
            .set_entry(&TypedName::new(EntityKind::Type, "Widget"), data_type("Widget"), None)
            .unwrap();
        let names = loader.discover(&Discovery::new(EntityKind::Type));
        assert_eq!(names[0].name(), "widget");
        assert!(names.iter().any(|name| name.name() == "integer"));

        let filtered = loader.discover(
            &Discovery::new(EntityKind::Type).with_filter(|name| name.name().starts_with("wid")),
        );
        assert_eq!(filtered.len(), 1);
    }
}
