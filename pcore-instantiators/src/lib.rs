//! Instantiators that turn located source into loader values.
//!
//! Each instantiator handles one `(SourceFormat, EntityKind)` pair and
//! enforces the same contract: the source must define exactly the requested
//! entity, under exactly the requested name, and nothing else.
//! [`default_registry`] wires them all into an [`InstantiatorRegistry`].

#![warn(missing_docs, clippy::pedantic)]

mod definition;
pub mod function;
pub mod plan;
pub mod resource_type_impl;
pub mod script;
pub mod task;
pub mod type_definition;

#[cfg(test)]
mod test_support;

use std::rc::Rc;

use pcore_loader::{InstantiatorRegistry, SourceFormat};
use pcore_primitives::EntityKind;

pub use function::puppet_function;
pub use plan::{PlanDispatch, puppet_plan};
pub use resource_type_impl::resource_type_impl;
pub use script::{Registration, ScriptEngine, ScriptInstantiator, ScriptObject, ScriptScope};
pub use task::task;
pub use type_definition::type_definition;

/// Builds a registry with every declarative-language and task instantiator.
///
/// Plans are routed through `plans`, so callers can add instantiators for
/// non-`.pp` plan files. Script sources are only loadable when an `engine` is
/// supplied; without one the loaders skip `lib/puppet` directories entirely.
#[must_use]
pub fn default_registry(
    engine: Option<Rc<dyn ScriptEngine>>,
    plans: PlanDispatch,
) -> InstantiatorRegistry {
    let mut registry = InstantiatorRegistry::new()
        .with(SourceFormat::Puppet, EntityKind::Function, puppet_function)
        .with(SourceFormat::Puppet, EntityKind::Type, type_definition)
        .with(SourceFormat::Puppet, EntityKind::Plan, plans)
        .with(
            SourceFormat::Puppet,
            EntityKind::ResourceTypeImpl,
            resource_type_impl,
        )
        .with(SourceFormat::Task, EntityKind::Task, task);
    if let Some(engine) = engine {
        for registration in Registration::ALL {
            registry.register(
                SourceFormat::Ruby,
                registration.kind(),
                ScriptInstantiator::new(Rc::clone(&engine), registration),
            );
        }
    }
    registry
}
