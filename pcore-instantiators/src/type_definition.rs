//! Type aliases and type definitions.

use std::sync::Arc;

use pcore_loader::InstantiationRequest;
use pcore_loader::entity::{DataType, Value};
use pcore_primitives::Result;
use pcore_primitives::ast::Definition;

use crate::definition::{check_name, check_no_extra_logic, parse, sole_definition};

/// Creates the type declared by a file with exactly one `type` alias or
/// definition.
///
/// `type X = Object[...]` and `type X inherits Y {}` become named object
/// types, `type X = TypeSet[...]` becomes a type set whose members are bound
/// on first use, and any other expression becomes an alias.
///
/// # Errors
///
/// Same contract as [`crate::puppet_function`], for types.
pub fn type_definition(request: &InstantiationRequest<'_>) -> Result<Value> {
    let program = parse(request)?;
    let origin = request.origin_label();
    let (name, value) = sole_definition(request, &program, "type", |definition| {
        match definition {
            Definition::TypeAlias { name, type_expr } => Some((
                name,
                Value::named_type(name, type_expr, Some(origin.clone())),
            )),
            Definition::TypeDefinition {
                name,
                parent,
                attributes,
            } => Some((
                name,
                Value::DataType(Arc::new(DataType::Object {
                    name: name.clone(),
                    parent: parent.clone(),
                    attributes: attributes.clone(),
                })),
            )),
            _ => None,
        }
    })?;
    check_name(request, "type", name)?;
    check_no_extra_logic(request, &program, "type")?;
    Ok(value)
}
