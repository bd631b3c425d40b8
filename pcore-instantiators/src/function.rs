//! Functions written in the declarative language.

use std::rc::Rc;

use pcore_loader::InstantiationRequest;
use pcore_loader::entity::{Callable, CallableBody, Value};
use pcore_primitives::Result;
use pcore_primitives::ast::Definition;
use tracing::debug;

use crate::definition::{check_name, check_no_extra_logic, parse, sole_definition};

/// Creates a function from a file that contains exactly one `function`
/// definition with the requested name.
///
/// The closure resolves names through the private loader of the loader that
/// found it, so a module's functions see the module's dependencies.
///
/// # Errors
///
/// Returns [`pcore_primitives::Error::Parse`] for unparsable source and
/// [`pcore_primitives::Error::Instantiation`] when the file is empty, holds
/// other or additional definitions or logic, or names a different function.
pub fn puppet_function(request: &InstantiationRequest<'_>) -> Result<Value> {
    let program = parse(request)?;
    let (name, closure) =
        sole_definition(request, &program, "function", |definition| match definition {
            Definition::Function { name, closure } => Some((name, closure)),
            _ => None,
        })?;
    check_name(request, "function", name)?;
    check_no_extra_logic(request, &program, "function")?;
    debug!(function = %request.typed_name.name(), "created function");
    Ok(Value::Function(Rc::new(Callable::new(
        request.typed_name.clone(),
        CallableBody::Closure(closure.clone()),
        &request.loader.private_loader(),
        Some(request.origin_label()),
    ))))
}
