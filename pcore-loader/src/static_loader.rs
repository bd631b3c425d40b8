//! Built-in types shared by every compilation in the process.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use pcore_primitives::{EntityKind, TypedName};
use tracing::debug;

use crate::entity::{DataType, ResourceTypeRef, Value};
use crate::entry::NamedEntry;
use crate::loader::Discovery;

const LOADER_NAME: &str = "static loader";

/// Data types every chain can resolve.
pub const BUILTIN_DATA_TYPES: [&str; 39] = [
    "Any",
    "Array",
    "Binary",
    "Boolean",
    "Callable",
    "Collection",
    "Data",
    "Default",
    "Enum",
    "Error",
    "Float",
    "Hash",
    "Init",
    "Integer",
    "Iterable",
    "Iterator",
    "NotUndef",
    "Numeric",
    "Object",
    "Optional",
    "Pattern",
    "Regexp",
    "Runtime",
    "Scalar",
    "ScalarData",
    "SemVer",
    "SemVerRange",
    "Sensitive",
    "String",
    "Struct",
    "Timespan",
    "Timestamp",
    "Tuple",
    "Type",
    "TypeSet",
    "URI",
    "Undef",
    "Unit",
    "Variant",
];

/// Resource types registered on first use.
pub const BUILTIN_RESOURCE_TYPES: [&str; 15] = [
    "Component",
    "Exec",
    "File",
    "Filebucket",
    "Group",
    "Node",
    "Notify",
    "Package",
    "Resources",
    "Schedule",
    "Service",
    "Stage",
    "Tidy",
    "User",
    "Whit",
];

type ResourceTypeTable = HashMap<TypedName, Arc<ResourceTypeRef>>;

/// Root loader holding the built-in catalog.
///
/// Read-only once built. The resource-type references are registered by
/// [`StaticLoader::runtime3_init`], which runs at most once even when first
/// used from several threads.
#[derive(Debug)]
pub struct StaticLoader {
    data_types: HashMap<TypedName, Arc<DataType>>,
    resource_type_names: Vec<String>,
    resource_types: OnceLock<ResourceTypeTable>,
}

impl StaticLoader {
    /// Creates a loader with the standard built-ins.
    #[must_use]
    pub fn new() -> Self {
        StaticLoaderBuilder::new().build()
    }

    /// Starts a builder pre-populated with the standard built-ins.
    #[must_use]
    pub fn builder() -> StaticLoaderBuilder {
        StaticLoaderBuilder::new()
    }

    /// Returns the process-wide instance.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<StaticLoader>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new())))
    }

    /// Returns the loader name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        LOADER_NAME
    }

    /// Registers the built-in resource-type references.
    ///
    /// Returns `true` only for the call that performed the registration.
    pub fn runtime3_init(&self) -> bool {
        let mut performed = false;
        self.resource_types.get_or_init(|| {
            performed = true;
            debug!(count = self.resource_type_names.len(), "registering built-in resource types");
            self.resource_type_names
                .iter()
                .map(|name| {
                    (
                        TypedName::new(EntityKind::Type, name),
                        Arc::new(ResourceTypeRef::new(name.as_str(), None)),
                    )
                })
                .collect()
        });
        performed
    }

    /// Returns `true` once the resource-type references are registered.
    #[must_use]
    pub fn is_runtime3_initialized(&self) -> bool {
        self.resource_types.get().is_some()
    }

    /// Returns what is bound without triggering registration.
    #[must_use]
    pub fn get_entry(&self, typed_name: &TypedName) -> Option<NamedEntry> {
        if let Some(data_type) = self.data_types.get(typed_name) {
            return Some(NamedEntry::found(
                typed_name.clone(),
                Value::DataType(Arc::clone(data_type)),
                None,
            ));
        }
        self.resource_types
            .get()
            .and_then(|table| table.get(typed_name))
            .map(|resource_type| {
                NamedEntry::found(
                    typed_name.clone(),
                    Value::ResourceType(Arc::clone(resource_type)),
                    None,
                )
            })
    }

    /// Looks a name up, registering resource types when a `type` name is not a data type.
    #[must_use]
    pub fn load_typed(&self, typed_name: &TypedName) -> Option<NamedEntry> {
        if let Some(entry) = self.get_entry(typed_name) {
            return Some(entry);
        }
        if typed_name.kind() != EntityKind::Type || !typed_name.authority().is_runtime() {
            return None;
        }
        if self.is_runtime3_initialized() {
            return None;
        }
        self.runtime3_init();
        self.get_entry(typed_name)
    }

    /// Lists built-in names of the requested kind, sorted.
    #[must_use]
    pub fn discover(&self, request: &Discovery) -> Vec<TypedName> {
        if request.kind() != EntityKind::Type {
            return Vec::new();
        }
        self.runtime3_init();
        let resource_types = self.resource_types.get().into_iter().flat_map(HashMap::keys);
        let mut names: Vec<TypedName> = self
            .data_types
            .keys()
            .chain(resource_types)
            .filter(|name| request.accepts(name))
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for StaticLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Bootstrap-time builder for [`StaticLoader`].
#[derive(Debug, Clone)]
pub struct StaticLoaderBuilder {
    data_types: Vec<DataType>,
    resource_types: Vec<String>,
}

impl StaticLoaderBuilder {
    /// Creates a builder holding the standard built-ins.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data_types: BUILTIN_DATA_TYPES
                .iter()
                .map(|name| DataType::Builtin {
                    name: (*name).to_owned(),
                })
                .collect(),
            resource_types: BUILTIN_RESOURCE_TYPES
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
        }
    }

    /// Adds a data type bound eagerly.
    #[must_use]
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_types.push(data_type);
        self
    }

    /// Adds a resource type registered on first use.
    #[must_use]
    pub fn with_resource_type(mut self, name: impl Into<String>) -> Self {
        self.resource_types.push(name.into());
        self
    }

    /// Finishes bootstrap. Later additions of the same name win.
    #[must_use]
    pub fn build(self) -> StaticLoader {
        let data_types = self
            .data_types
            .into_iter()
            .map(|data_type| {
                (
                    TypedName::new(EntityKind::Type, data_type.name()),
                    Arc::new(data_type),
                )
            })
            .collect();
        StaticLoader {
            data_types,
            resource_type_names: self.resource_types,
            resource_types: OnceLock::new(),
        }
    }
}

impl Default for StaticLoaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
