//! Resource type implementations generated into `.resource_types`.

use std::rc::Rc;

use pcore_loader::InstantiationRequest;
use pcore_loader::entity::{ResourceTypeImpl, Value};
use pcore_primitives::Result;
use pcore_primitives::ast::Statement;
use serde::Deserialize;
use tracing::debug;

use crate::definition::{check_name, parse};

const RECEIVER: &str = "Puppet::Resource::ResourceType3";
const METHOD: &str = "new";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceTypeArguments {
    name: String,
    #[serde(default)]
    properties: Vec<String>,
    #[serde(default)]
    parameters: Vec<String>,
    #[serde(default)]
    title_patterns: Vec<TitlePattern>,
    #[serde(default = "default_isomorphic")]
    isomorphic: bool,
    #[serde(default)]
    capability: bool,
}

/// Either a bare regular expression or `[regex, [captured attributes]]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TitlePattern {
    Plain(String),
    Mapped(String, Vec<serde_json::Value>),
}

impl TitlePattern {
    fn into_regex(self) -> String {
        match self {
            Self::Plain(regex) | Self::Mapped(regex, _) => regex,
        }
    }
}

const fn default_isomorphic() -> bool {
    true
}

/// Creates a resource type implementation from a file consisting of exactly
/// one `Puppet::Resource::ResourceType3.new({...})` call.
///
/// # Errors
///
/// Returns [`pcore_primitives::Error::Instantiation`] when the file holds
/// anything else, when the call arguments are malformed, or when the created
/// type has a different name.
pub fn resource_type_impl(request: &InstantiationRequest<'_>) -> Result<Value> {
    let program = parse(request)?;
    let name = request.typed_name.name();
    let mut statements = program.statements();
    let arguments = match (statements.next(), statements.next()) {
        (
            Some(Statement::Call {
                receiver,
                method,
                arguments,
            }),
            None,
        ) if receiver == RECEIVER && method == METHOD && program.definitions.is_empty() => {
            arguments
        }
        _ => {
            return Err(request.fail(format!(
                "does not define the resource type '{name}' - expected exactly one call to {RECEIVER}.{METHOD}"
            )));
        }
    };
    let arguments = ResourceTypeArguments::deserialize(arguments).map_err(|err| {
        request.fail(format!(
            "does not define the resource type '{name}' - invalid arguments: {err}"
        ))
    })?;
    check_name(request, "resource type", &arguments.name)?;
    debug!(
        resource_type = %arguments.name,
        capability = arguments.capability,
        "created resource type implementation"
    );
    Ok(Value::ResourceTypeImpl(Rc::new(ResourceTypeImpl::new(
        arguments.name,
        arguments.properties,
        arguments.parameters,
        arguments
            .title_patterns
            .into_iter()
            .map(TitlePattern::into_regex)
            .collect(),
        arguments.isomorphic,
        request.loader,
    ))))
}
