//! Checks shared by the declarative-language instantiators.

use pcore_loader::InstantiationRequest;
use pcore_primitives::Result;
use pcore_primitives::ast::{Definition, Program};

/// Parses the request's source text.
pub(crate) fn parse(request: &InstantiationRequest<'_>) -> Result<Program> {
    request
        .parser
        .parse_program(request.source()?, request.origin)
}

/// Extracts the program's only definition through `extract`.
pub(crate) fn sole_definition<'p, T>(
    request: &InstantiationRequest<'_>,
    program: &'p Program,
    noun: &str,
    extract: impl Fn(&'p Definition) -> Option<T>,
) -> Result<T> {
    let name = request.typed_name.name();
    match program.definitions.as_slice() {
        [] => Err(request.fail(format!("does not define the {noun} '{name}' - it is empty"))),
        [definition] => extract(definition).ok_or_else(|| {
            request.fail(format!("does not define the {noun} '{name}' - no {noun} found"))
        }),
        _ => Err(request.fail(format!(
            "must contain only the {noun} '{name}' - it has additional definitions"
        ))),
    }
}

/// Rejects a declared name that differs from the requested one.
pub(crate) fn check_name(request: &InstantiationRequest<'_>, noun: &str, declared: &str) -> Result<()> {
    let expected = request.typed_name.name();
    if normalize(declared) == expected {
        return Ok(());
    }
    Err(request.fail(format!(
        "produced {noun} with the wrong name, expected {expected}, actual {declared}"
    )))
}

/// Rejects programs whose body does more than declare the definition.
pub(crate) fn check_no_extra_logic(
    request: &InstantiationRequest<'_>,
    program: &Program,
    noun: &str,
) -> Result<()> {
    if program.is_sole_definition(0) {
        return Ok(());
    }
    Err(request.fail(format!(
        "contains additional logic - can only contain the {noun} '{}'",
        request.typed_name.name()
    )))
}

fn normalize(name: &str) -> String {
    name.strip_prefix("::").unwrap_or(name).to_lowercase()
}
