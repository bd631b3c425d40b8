//! Functions, data types and resource types registered by script files.
//!
//! Script sources are evaluated by an embedded [`ScriptEngine`]. The loaders
//! only check that a file performs the expected registration call and that
//! the engine produced an object with the requested name.

use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::sync::{Arc, OnceLock};

use pcore_loader::entity::{
    Callable, CallableBody, DataType, ResourceTypeRef, ScriptHandle, Value,
};
use pcore_loader::{InstantiationRequest, Instantiator, LoaderRef};
use pcore_primitives::{EntityKind, Result};
use regex::Regex;
use tracing::debug;

/// Registration call a script file is expected to make.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Registration {
    /// `Puppet::Functions.create_function(:name)`
    Function,
    /// `Puppet::DataTypes.create_type('Name')`
    DataType,
    /// `Puppet::Type.newtype(:name)`
    ResourceType,
}

impl Registration {
    /// Every registration call.
    pub const ALL: [Self; 3] = [Self::Function, Self::DataType, Self::ResourceType];

    /// Returns the entity kind the registration produces.
    #[must_use]
    pub const fn kind(self) -> EntityKind {
        match self {
            Self::Function => EntityKind::Function,
            Self::DataType => EntityKind::Type,
            Self::ResourceType => EntityKind::ResourceType,
        }
    }

    /// Returns the registration call as written in scripts.
    #[must_use]
    pub const fn call(self) -> &'static str {
        match self {
            Self::Function => "Puppet::Functions.create_function",
            Self::DataType => "Puppet::DataTypes.create_type",
            Self::ResourceType => "Puppet::Type.newtype",
        }
    }

    const fn noun(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::DataType => "data type",
            Self::ResourceType => "resource type",
        }
    }

    fn pattern(self) -> &'static Regex {
        static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(|| {
            Self::ALL.map(|registration| {
                let call = regex::escape(registration.call());
                Regex::new(&format!(
                    r#"{call}\s*\(?\s*(?::'(?P<quoted>[\w:]+)'|:"(?P<dquoted>[\w:]+)"|:(?P<symbol>[\w:]+)|'(?P<string>[\w:]+)'|"(?P<dstring>[\w:]+)")"#
                ))
                .expect("valid registration pattern")
            })
        });
        &patterns[self as usize]
    }

    /// Returns `true` when the source performs this registration.
    #[must_use]
    pub fn is_registered_by(self, source: &str) -> bool {
        self.pattern().is_match(source)
    }

    /// Returns the name passed to the first registration call in `source`.
    #[must_use]
    pub fn declared_name(self, source: &str) -> Option<String> {
        let captures = self.pattern().captures(source)?;
        ["quoted", "dquoted", "symbol", "string", "dstring"]
            .into_iter()
            .find_map(|group| captures.name(group))
            .map(|found| found.as_str().to_owned())
    }
}

/// Scope a script is evaluated in, passed explicitly rather than read from
/// ambient state.
#[derive(Debug)]
pub struct ScriptScope<'a> {
    /// Loader the produced object resolves names through.
    pub loader: &'a LoaderRef,
    /// Script location.
    pub origin: &'a Path,
    /// Name of the environment being compiled.
    pub environment: &'a str,
}

/// Object a script registered.
#[derive(Clone, Debug)]
pub struct ScriptObject {
    /// Name the script registered, as written.
    pub name: String,
    /// Engine-specific implementation.
    pub handle: ScriptHandle,
}

/// Evaluates registration scripts.
pub trait ScriptEngine {
    /// Evaluates `source`, which performs `registration`, and returns what it registered.
    ///
    /// # Errors
    ///
    /// Returns [`pcore_primitives::Error::Parse`] when the script fails to
    /// evaluate.
    fn evaluate(
        &self,
        source: &str,
        registration: Registration,
        scope: &ScriptScope<'_>,
    ) -> Result<ScriptObject>;
}

/// Instantiator for one registration call, backed by a [`ScriptEngine`].
#[derive(Clone)]
pub struct ScriptInstantiator {
    engine: Rc<dyn ScriptEngine>,
    registration: Registration,
}

impl fmt::Debug for ScriptInstantiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptInstantiator")
            .field("registration", &self.registration)
            .finish_non_exhaustive()
    }
}

impl ScriptInstantiator {
    /// Creates an instantiator expecting `registration`.
    #[must_use]
    pub fn new(engine: Rc<dyn ScriptEngine>, registration: Registration) -> Self {
        Self {
            engine,
            registration,
        }
    }

    /// Returns the expected registration.
    #[must_use]
    pub const fn registration(&self) -> Registration {
        self.registration
    }
}

impl Instantiator for ScriptInstantiator {
    fn create(&self, request: &InstantiationRequest<'_>) -> Result<Value> {
        let registration = self.registration;
        let source = request.source()?;
        if !registration.is_registered_by(source) {
            return Err(request.fail(format!(
                "does not define the {} '{}' - no call to {} found",
                registration.noun(),
                request.typed_name.name(),
                registration.call()
            )));
        }
        let loader = match registration {
            Registration::ResourceType => Rc::clone(request.loader),
            Registration::Function | Registration::DataType => request.loader.private_loader(),
        };
        let object = self.engine.evaluate(
            source,
            registration,
            &ScriptScope {
                loader: &loader,
                origin: request.origin,
                environment: request.environment,
            },
        )?;
        let expected = request.typed_name.name();
        if object.name.strip_prefix("::").unwrap_or(&object.name).to_lowercase() != expected {
            return Err(request.fail(format!(
                "produced {} with the wrong name, expected {expected}, actual {}",
                registration.noun(),
                object.name
            )));
        }
        debug!(name = %object.name, registration = registration.call(), "evaluated script");
        let origin = Some(request.origin_label());
        Ok(match registration {
            Registration::Function => Value::Function(Rc::new(Callable::new(
                request.typed_name.clone(),
                CallableBody::External(object.handle),
                &loader,
                origin,
            ))),
            Registration::DataType => Value::DataType(Arc::new(DataType::Script {
                name: object.name,
                handle: object.handle,
            })),
            Registration::ResourceType => {
                Value::ResourceType(Arc::new(ResourceTypeRef::new(object.name, origin)))
            }
        })
    }
}
