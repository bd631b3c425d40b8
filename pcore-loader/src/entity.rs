//! Runtime entities produced by loaders.

use std::any::Any;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use pcore_primitives::ast::{Closure, TypeExpr};
use pcore_primitives::{EntityKind, Result, TypedName};
use tracing::debug;

use crate::{Loader, LoaderRef};

/// Opaque object produced by a script engine.
#[derive(Clone)]
pub struct ScriptHandle(Arc<dyn Any + Send + Sync>);

impl ScriptHandle {
    /// Wraps an engine-specific value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Returns the wrapped value if it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for ScriptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScriptHandle(..)")
    }
}

/// Data type bound under a `type` name.
#[derive(Clone, Debug)]
pub enum DataType {
    /// Type provided by the runtime itself.
    Builtin {
        /// Type name, as written.
        name: String,
    },
    /// Alias for another type expression.
    Alias {
        /// Alias name, as written.
        name: String,
        /// Aliased expression.
        type_expr: TypeExpr,
    },
    /// Named object type.
    Object {
        /// Type name, as written.
        name: String,
        /// Optional parent type name.
        parent: Option<String>,
        /// Declared attributes.
        attributes: BTreeMap<String, TypeExpr>,
    },
    /// Type produced by a script engine.
    Script {
        /// Type name, as declared by the script.
        name: String,
        /// Engine-specific implementation.
        handle: ScriptHandle,
    },
}

impl DataType {
    /// Returns the type name as written.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Builtin { name }
            | Self::Alias { name, .. }
            | Self::Object { name, .. }
            | Self::Script { name, .. } => name,
        }
    }
}

/// Reference to a resource type known to the runtime, e.g. `File`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceTypeRef {
    name: String,
    origin: Option<String>,
}

impl ResourceTypeRef {
    /// Creates a reference, optionally recording where the type was defined.
    #[must_use]
    pub fn new(name: impl Into<String>, origin: Option<String>) -> Self {
        Self {
            name: name.into(),
            origin,
        }
    }

    /// Returns the resource type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the defining source, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

/// Implementation of a function or plan body.
#[derive(Clone, Debug)]
pub enum CallableBody {
    /// Parsed closure evaluated by the language runtime.
    Closure(Closure),
    /// Object produced by an external engine.
    External(ScriptHandle),
}

/// Function or plan bound together with the loader its body resolves names in.
#[derive(Debug)]
pub struct Callable {
    name: TypedName,
    origin: Option<String>,
    body: CallableBody,
    loader: Weak<Loader>,
}

impl Callable {
    /// Creates a callable whose body resolves names through `loader`.
    #[must_use]
    pub fn new(
        name: TypedName,
        body: CallableBody,
        loader: &LoaderRef,
        origin: Option<String>,
    ) -> Self {
        Self {
            name,
            origin,
            body,
            loader: Rc::downgrade(loader),
        }
    }

    /// Returns the bound name.
    #[must_use]
    pub fn name(&self) -> &TypedName {
        &self.name
    }

    /// Returns the defining source.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &CallableBody {
        &self.body
    }

    /// Returns the closure loader while its compilation is alive.
    #[must_use]
    pub fn loader(&self) -> Option<LoaderRef> {
        self.loader.upgrade()
    }
}

/// Named collection of types that binds its members on resolution.
#[derive(Debug)]
pub struct TypeSet {
    name: String,
    origin: Option<String>,
    types: BTreeMap<String, TypeExpr>,
    resolved: Cell<bool>,
}

impl TypeSet {
    /// Creates an unresolved type set.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        types: BTreeMap<String, TypeExpr>,
        origin: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            origin,
            types,
            resolved: Cell::new(false),
        }
    }

    /// Returns the type set name as written.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the member expressions keyed by unqualified name.
    #[must_use]
    pub fn types(&self) -> &BTreeMap<String, TypeExpr> {
        &self.types
    }

    /// Returns `true` once the members have been bound.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get()
    }

    /// Binds every member as `<set>::<member>` in `loader`. Repeated calls are no-ops.
    ///
    /// # Errors
    ///
    /// Propagates [`pcore_primitives::Error::Redefinition`] when a member name is
    /// already bound to something else.
    pub fn resolve(&self, loader: &Loader) -> Result<()> {
        if self.resolved.get() {
            return Ok(());
        }
        for (member, type_expr) in &self.types {
            let qualified = format!("{}::{member}", self.name);
            let typed_name = TypedName::new(EntityKind::Type, &qualified);
            if loader
                .get_entry(&typed_name)
                .is_some_and(|entry| entry.is_found())
            {
                continue;
            }
            let value = Value::named_type(&qualified, type_expr, self.origin.clone());
            loader.set_entry(&typed_name, value, self.origin.clone())?;
        }
        self.resolved.set(true);
        debug!(type_set = %self.name, members = self.types.len(), "resolved type set");
        Ok(())
    }
}

/// Task parameter declared in task metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskParameter {
    /// Parameter name.
    pub name: String,
    /// Parsed parameter type.
    pub type_expr: Option<TypeExpr>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Whether the value must be treated as sensitive.
    pub sensitive: bool,
}

/// Executable implementing a task, with its feature requirements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskImplementation {
    /// Path of the executable.
    pub path: PathBuf,
    /// Features a target must provide to run it.
    pub requirements: Vec<String>,
}

/// Task: executables sharing a base name plus optional metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    /// Task name.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// How parameters reach the executable.
    pub input_method: Option<String>,
    /// Declared parameters.
    pub parameters: Vec<TaskParameter>,
    /// Executables able to run the task.
    pub implementations: Vec<TaskImplementation>,
    /// Whether the task honours no-op mode.
    pub supports_noop: bool,
    /// Whether the task is hidden from listings.
    pub private: bool,
    /// Whether the task runs against a remote target proxy.
    pub remote: bool,
    /// Extra module files shipped alongside the executables.
    pub files: Vec<String>,
    /// Metadata file, when present.
    pub metadata_origin: Option<PathBuf>,
}

/// Resource type implementation created from Pcore source.
#[derive(Debug)]
pub struct ResourceTypeImpl {
    name: String,
    properties: Vec<String>,
    parameters: Vec<String>,
    title_patterns: Vec<String>,
    isomorphic: bool,
    loader: Weak<Loader>,
}

impl ResourceTypeImpl {
    /// Creates an implementation bound to the loader that found it.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        properties: Vec<String>,
        parameters: Vec<String>,
        title_patterns: Vec<String>,
        isomorphic: bool,
        loader: &LoaderRef,
    ) -> Self {
        Self {
            name: name.into(),
            properties,
            parameters,
            title_patterns,
            isomorphic,
            loader: Rc::downgrade(loader),
        }
    }

    /// Returns the resource type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared properties.
    #[must_use]
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// Returns the declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Returns the title patterns.
    #[must_use]
    pub fn title_patterns(&self) -> &[String] {
        &self.title_patterns
    }

    /// Returns `true` if titles uniquely identify resources.
    #[must_use]
    pub const fn is_isomorphic(&self) -> bool {
        self.isomorphic
    }

    /// Returns the loader that produced the implementation while it is alive.
    #[must_use]
    pub fn loader(&self) -> Option<LoaderRef> {
        self.loader.upgrade()
    }
}

/// Value bound to a [`TypedName`].
///
/// Cloning is cheap and preserves identity; [`Value::ptr_eq`] tells whether
/// two values are the same cached object.
#[derive(Clone, Debug)]
pub enum Value {
    /// Function.
    Function(Rc<Callable>),
    /// Data type, alias, or object type.
    DataType(Arc<DataType>),
    /// Type set.
    TypeSet(Rc<TypeSet>),
    /// Task.
    Task(Rc<Task>),
    /// Plan.
    Plan(Rc<Callable>),
    /// Resource type reference.
    ResourceType(Arc<ResourceTypeRef>),
    /// Resource type implementation.
    ResourceTypeImpl(Rc<ResourceTypeImpl>),
}

impl Value {
    /// Builds the value a named type expression denotes: object types and type
    /// sets take the name directly; anything else becomes an alias.
    #[must_use]
    pub fn named_type(name: &str, type_expr: &TypeExpr, origin: Option<String>) -> Self {
        match type_expr {
            TypeExpr::Object { parent, attributes } => Self::DataType(Arc::new(DataType::Object {
                name: name.to_owned(),
                parent: parent.clone(),
                attributes: attributes.clone(),
            })),
            TypeExpr::TypeSet { types } => {
                Self::TypeSet(Rc::new(TypeSet::new(name, types.clone(), origin)))
            }
            other => Self::DataType(Arc::new(DataType::Alias {
                name: name.to_owned(),
                type_expr: other.clone(),
            })),
        }
    }

    /// Returns the kind of name this value is normally bound under.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Function(_) => EntityKind::Function,
            Self::DataType(_) | Self::TypeSet(_) => EntityKind::Type,
            Self::Task(_) => EntityKind::Task,
            Self::Plan(_) => EntityKind::Plan,
            Self::ResourceType(_) => EntityKind::ResourceType,
            Self::ResourceTypeImpl(_) => EntityKind::ResourceTypeImpl,
        }
    }

    /// Returns `true` when both values are the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Function(a), Self::Function(b)) | (Self::Plan(a), Self::Plan(b)) => {
                Rc::ptr_eq(a, b)
            }
            (Self::DataType(a), Self::DataType(b)) => Arc::ptr_eq(a, b),
            (Self::TypeSet(a), Self::TypeSet(b)) => Rc::ptr_eq(a, b),
            (Self::Task(a), Self::Task(b)) => Rc::ptr_eq(a, b),
            (Self::ResourceType(a), Self::ResourceType(b)) => Arc::ptr_eq(a, b),
            (Self::ResourceTypeImpl(a), Self::ResourceTypeImpl(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Returns the function or plan, if this is one.
    #[must_use]
    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Self::Function(callable) | Self::Plan(callable) => Some(callable),
            _ => None,
        }
    }

    /// Returns the data type, if this is one.
    #[must_use]
    pub fn as_data_type(&self) -> Option<&DataType> {
        match self {
            Self::DataType(data_type) => Some(data_type),
            _ => None,
        }
    }

    /// Returns the type set, if this is one.
    #[must_use]
    pub fn as_type_set(&self) -> Option<&Rc<TypeSet>> {
        match self {
            Self::TypeSet(type_set) => Some(type_set),
            _ => None,
        }
    }

    /// Returns the task, if this is one.
    #[must_use]
    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Self::Task(task) => Some(task),
            _ => None,
        }
    }

    /// Returns the resource type implementation, if this is one.
    #[must_use]
    pub fn as_resource_type_impl(&self) -> Option<&ResourceTypeImpl> {
        match self {
            Self::ResourceTypeImpl(implementation) => Some(implementation),
            _ => None,
        }
    }
}
